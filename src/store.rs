use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::import::{self, CsvLayout};
use crate::{RawRow, TransactionRecord, MAX_AMOUNT, UNKNOWN_LABEL};

/// Reasons a single row can be rejected
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RowError {
    #[error("The mandatory field `{0}` is missing")]
    MissingField(&'static str),
    #[error("`{0}` is not a valid timestamp")]
    InvalidTimestamp(String),
    #[error("`{0}` is not a valid amount")]
    InvalidAmount(String),
    #[error("`{0}` is beyond the largest supported amount")]
    AmountOutOfRange(String),
    #[error("The row could not be read: {0}")]
    Malformed(String),
    #[error("The header row could not be read: {0}")]
    Header(String),
}

/// A rejected row together with its zero-based position in the input
///
/// A broken header row is reported at position `0` with [`RowError::Header`].
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("row {row}: {reason}")]
pub struct ParseError {
    pub row: usize,
    pub reason: RowError,
}

/// What to do when a row fails validation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Drop the row, remember why, and keep loading
    #[default]
    Skip,
    /// Fail the whole load on the first bad row
    Abort,
}

/// Assigns a company to rows that don't name one, based on their description
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompanyRule {
    company: String,
    keywords: Vec<String>,
}

impl CompanyRule {
    pub fn new<K, S>(company: impl Into<String>, keywords: K) -> Self
        where K: IntoIterator<Item = S>,
              S: AsRef<str>,
    {
        Self {
            company: company.into(),
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    /// Case-insensitive substring match against any keyword
    pub fn matches(&self, description: &str) -> bool {
        let description = description.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| description.contains(keyword.as_str()))
    }
}

/// Parses rules written as `Company Name=keyword one,keyword two`
///
/// Without keywords, the lowercased company name itself is the keyword.
impl FromStr for CompanyRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (company, keywords) = match s.split_once('=') {
            Some((company, keywords)) => (company.trim(), keywords),
            None => (s.trim(), s),
        };
        if company.is_empty() {
            return Err(format!("`{}` does not name a company", s));
        }

        let rule = CompanyRule::new(company, keywords.split(','));
        match rule.keywords.is_empty() {
            true => Err(format!("`{}` has no keywords", s)),
            false => Ok(rule),
        }
    }
}

/// Settings that control how rows are turned into records
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub policy: RejectionPolicy,
    /// The date of game day `0`, used for exports that count days instead of
    /// writing timestamps, see [`CsvLayout::default_day_epoch`]
    pub day_epoch: Option<NaiveDate>,
    /// Checked in order, the first match wins
    pub company_rules: Vec<CompanyRule>,
}

/// The outcome of a load: the store and every row that was left out
#[derive(Debug)]
pub struct Loaded {
    pub store: TransactionStore,
    pub rejected: Vec<ParseError>,
}

impl Loaded {
    /// The number of rows that were rejected
    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }
}

/// All records of one session
///
/// The store is immutable. Loading a new export builds a new store, together
/// with freshly derived company and type sets.
#[derive(Debug, Default, Clone)]
pub struct TransactionStore {
    /// Sorted by timestamp, ties keep their input order
    records: Vec<TransactionRecord>,
    companies: BTreeSet<String>,
    types: BTreeSet<String>,
    time_bounds: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl TransactionStore {
    /// Creates a store without any records
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates and loads already tokenized rows
    pub fn load<I>(rows: I, options: &LoadOptions) -> Result<Loaded, ParseError>
        where I: IntoIterator<Item = RawRow>
    {
        Self::load_results(rows.into_iter().map(Ok), options, options.day_epoch)
    }

    /// Tokenizes CSV data with the given layout and loads the rows
    ///
    /// Rows the tokenizer cannot read are handled like any other invalid row.
    /// An unreadable header fails the load whatever the policy.
    pub fn load_csv<R>(reader: R, layout: CsvLayout, options: &LoadOptions) -> Result<Loaded, ParseError>
        where R: std::io::Read
    {
        let rows = import::read_rows(reader, layout)
            .map_err(|e| ParseError {
                row: 0,
                reason: RowError::Header(e.to_string()),
            })?
            .map(|row| row.map_err(RowError::Malformed));
        let day_epoch = options.day_epoch.or_else(|| layout.default_day_epoch());
        Self::load_results(rows, options, day_epoch)
    }

    fn load_results<I>(rows: I, options: &LoadOptions, day_epoch: Option<NaiveDate>) -> Result<Loaded, ParseError>
        where I: IntoIterator<Item = Result<RawRow, RowError>>
    {
        let mut records = Vec::new();
        let mut rejected = Vec::new();

        for (row, raw) in rows.into_iter().enumerate() {
            match raw.and_then(|raw| parse_row(raw, options, day_epoch)) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    let error = ParseError { row, reason };
                    match options.policy {
                        RejectionPolicy::Abort => return Err(error),
                        RejectionPolicy::Skip => {
                            warn!(%error, "skipping row");
                            rejected.push(error);
                        }
                    }
                }
            }
        }

        let store = Self::from_records(records);
        debug!(
            records = store.len(),
            skipped = rejected.len(),
            companies = store.companies.len(),
            types = store.types.len(),
            "loaded transactions"
        );

        Ok(Loaded { store, rejected })
    }

    /// Builds a store from records that were validated elsewhere
    pub fn from_records(mut records: Vec<TransactionRecord>) -> Self {
        records.sort_by_key(TransactionRecord::timestamp);

        let companies = records
            .iter()
            .map(|record| record.company().to_owned())
            .collect();
        let types = records
            .iter()
            .map(|record| record.kind().to_owned())
            .collect();
        let time_bounds = records
            .first()
            .zip(records.last())
            .map(|(first, last)| (first.timestamp(), last.timestamp()));

        Self { records, companies, types, time_bounds }
    }

    /// Every record, ordered by timestamp
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// The distinct companies, in lexical order
    pub fn companies(&self) -> &BTreeSet<String> {
        &self.companies
    }

    /// The distinct transaction types, in lexical order
    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    /// The earliest and latest timestamp, or `None` for an empty store
    pub fn time_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.time_bounds
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_row(raw: RawRow, options: &LoadOptions, day_epoch: Option<NaiveDate>) -> Result<TransactionRecord, RowError> {
    let timestamp = non_empty(raw.timestamp.as_deref())
        .ok_or(RowError::MissingField("timestamp"))?;
    let timestamp = parse_timestamp(timestamp, day_epoch)?;

    let amount = non_empty(raw.amount.as_deref())
        .ok_or(RowError::MissingField("amount"))?;
    let amount = Decimal::from_str_exact(amount)
        .map_err(|_| RowError::InvalidAmount(amount.to_owned()))?;
    let amount = match amount.abs() <= MAX_AMOUNT {
        true => amount,
        false => return Err(RowError::AmountOutOfRange(amount.to_string())),
    };

    let description = non_empty(raw.description.as_deref());
    let company = non_empty(raw.company.as_deref())
        .or_else(|| {
            let description = description?;
            options.company_rules
                .iter()
                .find(|rule| rule.matches(description))
                .map(CompanyRule::company)
        })
        .unwrap_or(UNKNOWN_LABEL);
    let kind = non_empty(raw.kind.as_deref()).unwrap_or(UNKNOWN_LABEL);

    let record = TransactionRecord::new(timestamp, company, kind, amount);
    Ok(match description {
        Some(description) => record.with_description(description),
        None => record,
    })
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field
        .map(str::trim)
        .filter(|field| !field.is_empty())
}

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses the timestamp formats found in exports
///
/// A bare day count is only accepted when a day epoch is configured.
pub fn parse_timestamp(value: &str, day_epoch: Option<NaiveDate>) -> Result<NaiveDateTime, RowError> {
    let invalid = || RowError::InvalidTimestamp(value.to_owned());

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(timestamp);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).ok_or_else(invalid);
    }

    match (day_epoch, value.parse::<u64>()) {
        (Some(epoch), Ok(days)) => epoch
            .checked_add_days(Days::new(days))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
