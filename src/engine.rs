use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{FilterSpec, Flow, TransactionRecord, TransactionStore};

/// Possible errors to occur when asking the engine for an aggregation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("`{0}` is not a dimension records can be grouped by")]
    InvalidDimension(String),
}

/// The field records are grouped by before their amounts are summed
#[derive(Clone, Copy, Debug, serde::Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Company,
    Type,
    /// The calendar day of the timestamp
    Day,
}

impl Dimension {
    fn key(self, record: &TransactionRecord) -> GroupKey {
        match self {
            Dimension::Company => GroupKey::Label(record.company().to_owned()),
            Dimension::Type => GroupKey::Label(record.kind().to_owned()),
            Dimension::Day => GroupKey::Day(record.day()),
        }
    }

    fn is_chronological(self) -> bool {
        matches!(self, Dimension::Day)
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "company" => Ok(Dimension::Company),
            "type" => Ok(Dimension::Type),
            "day" => Ok(Dimension::Day),
            _ => Err(EngineError::InvalidDimension(s.to_owned())),
        }
    }
}

/// The value records share within one group
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// A company or a transaction type
    Label(String),
    Day(NaiveDate),
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Label(label) => f.write_str(label),
            GroupKey::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

impl serde::Serialize for GroupKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: serde::Serializer
    {
        serializer.collect_str(self)
    }
}

/// Summed amounts, one row per group
///
/// Categorical results are ordered by descending absolute total, with ties in
/// key order. Results grouped by day are chronological.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationResult {
    dimension: Dimension,
    rows: Vec<(GroupKey, Decimal)>,
}

impl AggregationResult {
    fn from_totals(dimension: Dimension, totals: HashMap<GroupKey, Decimal>) -> Self {
        let mut rows = totals.into_iter().collect::<Vec<_>>();
        match dimension.is_chronological() {
            true => rows.sort_by(|(a, _), (b, _)| a.cmp(b)),
            false => rows.sort_by(|(a_key, a_total), (b_key, b_total)| {
                Reverse(a_total.abs())
                    .cmp(&Reverse(b_total.abs()))
                    .then_with(|| a_key.cmp(b_key))
            }),
        }

        Self { dimension, rows }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn rows(&self) -> &[(GroupKey, Decimal)] {
        &self.rows
    }

    /// The total of a single group, `None` if no record fell into it
    pub fn get(&self, key: &GroupKey) -> Option<Decimal> {
        self.rows
            .iter()
            .find(|(row_key, _)| row_key == key)
            .map(|(_, total)| *total)
    }

    /// The sum over all groups, saturating at the bounds of [`Decimal`]
    pub fn total(&self) -> Decimal {
        self.rows
            .iter()
            .fold(Decimal::ZERO, |sum, (_, total)| sum.saturating_add(*total))
    }

    /// The same rows with absolute totals, as used for pie charts
    pub fn magnitudes(&self) -> Self {
        Self {
            dimension: self.dimension,
            rows: self.rows
                .iter()
                .map(|(key, total)| (key.clone(), total.abs()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(GroupKey, Decimal)> {
        self.rows.iter()
    }
}

impl IntoIterator for AggregationResult {
    type Item = (GroupKey, Decimal);
    type IntoIter = std::vec::IntoIter<(GroupKey, Decimal)>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// An aggregation split into income and expense
///
/// Corresponds to grouping by the pair (flow, key).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowBreakdown {
    pub income: AggregationResult,
    pub expense: AggregationResult,
}

impl FlowBreakdown {
    pub fn get(&self, flow: Flow) -> &AggregationResult {
        match flow {
            Flow::Income => &self.income,
            Flow::Expense => &self.expense,
        }
    }
}

/// Selects the records of `store` that match `spec`, in store order
pub fn filter<'a>(store: &'a TransactionStore, spec: &FilterSpec) -> Vec<&'a TransactionRecord> {
    store.records()
        .iter()
        .filter(|record| spec.matches(record))
        .collect()
}

/// Groups `records` by `dimension` and sums the amounts of each group
///
/// Only groups that occur in `records` are part of the result. Amounts within
/// [`MAX_AMOUNT`](crate::MAX_AMOUNT) can't overflow a sum, larger ones saturate.
pub fn aggregate_by<'a, I>(records: I, dimension: Dimension) -> AggregationResult
    where I: IntoIterator<Item = &'a TransactionRecord>
{
    let mut totals = HashMap::new();
    for record in records {
        let total = totals
            .entry(dimension.key(record))
            .or_insert(Decimal::ZERO);
        *total = total.saturating_add(record.amount());
    }

    AggregationResult::from_totals(dimension, totals)
}

/// Partitions `records` into income and expense, keeping their order
///
/// Records with an amount of zero count as income.
pub fn split_income_expense<'a, I>(records: I) -> (Vec<&'a TransactionRecord>, Vec<&'a TransactionRecord>)
    where I: IntoIterator<Item = &'a TransactionRecord>
{
    records
        .into_iter()
        .partition(|record| record.flow() == Flow::Income)
}

/// Splits `records` by flow, then aggregates each side by `dimension`
pub fn aggregate_by_flow<'a, I>(records: I, dimension: Dimension) -> FlowBreakdown
    where I: IntoIterator<Item = &'a TransactionRecord>
{
    let (income, expense) = split_income_expense(records);
    FlowBreakdown {
        income: aggregate_by(income, dimension),
        expense: aggregate_by(expense, dimension),
    }
}

/// Net amount per day for every day between the first and last record
///
/// Unlike [`aggregate_by`] with [`Dimension::Day`], days without records are
/// included with a total of zero.
pub fn daily_series<'a, I>(records: I) -> AggregationResult
    where I: IntoIterator<Item = &'a TransactionRecord>
{
    let mut totals = BTreeMap::new();
    for record in records {
        let total = totals.entry(record.day()).or_insert(Decimal::ZERO);
        *total = total.saturating_add(record.amount());
    }

    let span = totals
        .keys()
        .next()
        .copied()
        .zip(totals.keys().next_back().copied());
    let rows = match span {
        Some((first, last)) => first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| (GroupKey::Day(day), totals.get(&day).copied().unwrap_or(Decimal::ZERO)))
            .collect(),
        None => Vec::new(),
    };

    AggregationResult { dimension: Dimension::Day, rows }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{LoadOptions, Selection, TimeRange};
    use crate::import::CsvLayout;

    macro_rules! aggregation_test {
        (
            $name:ident
            $dimension:expr,
            $transactions:literal
            $($key:expr => $total:expr),* $(,)?
        ) => {
            #[test]
            fn $name() {
                let store = TransactionStore::load_csv(
                    $transactions.as_bytes(),
                    CsvLayout::Headed,
                    &LoadOptions::default(),
                )
                .unwrap()
                .store;
                let result = aggregate_by(store.records(), $dimension);
                let expected: Vec<(GroupKey, Decimal)> = vec![$(($key, $total)),*];
                assert_eq!(result.rows(), expected.as_slice());
            }
        };
    }

    fn label(label: &str) -> GroupKey {
        GroupKey::Label(label.to_owned())
    }

    fn day(day: u32) -> GroupKey {
        GroupKey::Day(NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample() -> TransactionStore {
        TransactionStore::from_records(vec![
            TransactionRecord::new(at(1), "Cafe", "Sale", dec!(100)),
            TransactionRecord::new(at(1), "Cafe", "Rent", dec!(-50)),
            TransactionRecord::new(at(2), "Shop", "Sale", dec!(200)),
            TransactionRecord::new(at(4), "Shop", "Wage", dec!(0)),
        ])
    }

    aggregation_test!(by_company
        Dimension::Company,
        r#"timestamp, company, type, amount
           2024-01-01, Cafe, Sale, 100
           2024-01-01, Cafe, Rent, -50
           2024-01-02, Shop, Sale, 200"#
        label("Shop") => dec!(200),
        label("Cafe") => dec!(50),
    );
    aggregation_test!(by_type_orders_by_absolute_total
        Dimension::Type,
        r#"timestamp, company, type, amount
           2024-01-01, Cafe, Sale, 100
           2024-01-01, Cafe, Rent, -150
           2024-01-02, Shop, Wage, -20.25
           2024-01-02, Shop, Sale, 25"#
        label("Rent") => dec!(-150),
        label("Sale") => dec!(125),
        label("Wage") => dec!(-20.25),
    );
    aggregation_test!(ties_in_key_order
        Dimension::Company,
        r#"timestamp, company, type, amount
           2024-01-01, Shop, Sale, 10
           2024-01-01, Cafe, Sale, -10
           2024-01-01, Bar, Sale, 10"#
        label("Bar") => dec!(10),
        label("Cafe") => dec!(-10),
        label("Shop") => dec!(10),
    );
    aggregation_test!(by_day_is_chronological
        Dimension::Day,
        r#"timestamp, company, type, amount
           2024-01-03 18:00:00, Shop, Sale, 1
           2024-01-01 09:00:00, Cafe, Sale, 500
           2024-01-03 08:00:00, Cafe, Rent, -3.5"#
        day(1) => dec!(500),
        day(3) => dec!(-2.5),
    );
    aggregation_test!(empty_input
        Dimension::Company,
        r#"timestamp, company, type, amount"#
    );

    #[test]
    fn unrestricted_filter_returns_everything() {
        let store = sample();
        let filtered = filter(&store, &FilterSpec::unrestricted());
        assert_eq!(filtered, store.records().iter().collect::<Vec<_>>());

        let filtered = filter(&store, &FilterSpec::for_store(&store));
        assert_eq!(filtered.len(), store.len());
    }

    #[test]
    fn filter_combines_predicates() {
        let store = sample();
        let spec = FilterSpec::unrestricted()
            .with_time_range(TimeRange::new(at(1), at(2)))
            .with_types(Selection::only(["Sale"]));
        let filtered = filter(&store, &spec);
        let amounts = filtered.iter().map(|record| record.amount()).collect::<Vec<_>>();
        assert_eq!(amounts, vec![dec!(100), dec!(200)]);

        let spec = spec.with_companies(Selection::only(["Nobody"]));
        assert!(filter(&store, &spec).is_empty());
    }

    #[test]
    fn zero_amounts_are_income() {
        let store = sample();
        let (income, expense) = split_income_expense(store.records());
        assert_eq!(income.len(), 3);
        assert_eq!(expense.len(), 1);
        assert!(income.iter().any(|record| record.amount().is_zero()));
        assert_eq!(expense[0].kind(), "Rent");
    }

    #[test]
    fn aggregation_is_repeatable() {
        let store = sample();
        assert_eq!(
            aggregate_by(store.records(), Dimension::Type),
            aggregate_by(store.records(), Dimension::Type),
        );
    }

    #[test]
    fn totals_are_conserved() {
        let store = sample();
        let result = aggregate_by(store.records(), Dimension::Company);
        assert_eq!(result.total(), dec!(250));
        assert_eq!(result.get(&label("Cafe")), Some(dec!(50)));
        assert_eq!(result.get(&label("Bar")), None);
        assert_eq!(aggregate_by(Vec::<&TransactionRecord>::new(), Dimension::Company).total(), Decimal::ZERO);
    }

    #[test]
    fn sums_saturate_instead_of_overflowing() {
        let records = vec![
            TransactionRecord::new(at(1), "Cafe", "Sale", Decimal::MAX),
            TransactionRecord::new(at(1), "Cafe", "Sale", Decimal::ONE),
            TransactionRecord::new(at(2), "Shop", "Sale", Decimal::MAX),
        ];
        let result = aggregate_by(&records, Dimension::Company);
        assert_eq!(result.get(&label("Cafe")), Some(Decimal::MAX));
        assert_eq!(result.total(), Decimal::MAX);
        assert_eq!(daily_series(&records).get(&day(1)), Some(Decimal::MAX));
    }

    #[test]
    fn flow_breakdown() {
        let store = sample();
        let breakdown = aggregate_by_flow(store.records(), Dimension::Company);
        assert_eq!(breakdown.get(Flow::Income).rows(), &[
            (label("Shop"), dec!(200)),
            (label("Cafe"), dec!(100)),
        ]);
        assert_eq!(breakdown.get(Flow::Expense).magnitudes().rows(), &[
            (label("Cafe"), dec!(50)),
        ]);
    }

    #[test]
    fn daily_series_fills_gaps() {
        let store = sample();
        let series = daily_series(store.records());
        assert_eq!(series.rows(), &[
            (day(1), dec!(50)),
            (day(2), dec!(200)),
            (day(3), dec!(0)),
            (day(4), dec!(0)),
        ]);
        assert!(daily_series(Vec::<&TransactionRecord>::new()).is_empty());
    }

    #[test]
    fn dimension_names() {
        assert_eq!("company".parse(), Ok(Dimension::Company));
        assert_eq!(" Type ".parse(), Ok(Dimension::Type));
        assert_eq!("day".parse(), Ok(Dimension::Day));
        assert_eq!(
            "month".parse::<Dimension>(),
            Err(EngineError::InvalidDimension("month".to_owned())),
        );
    }
}
