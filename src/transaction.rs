use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// The label used for transactions without a company or a type
pub const UNKNOWN_LABEL: &str = "Unknown";

/// The largest absolute amount a loaded transaction may have, `10^15`
///
/// Sums over more records than fit in memory still stay below [`Decimal::MAX`].
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Whether a transaction brought money in or took it out
#[derive(Clone, Copy, Debug, serde::Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flow {
    /// Amounts greater than or equal to zero
    Income,
    /// Amounts below zero
    Expense,
}

impl Flow {
    /// Classifies an amount by its sign
    ///
    /// Zero is counted as income.
    pub fn of(amount: Decimal) -> Self {
        match amount.is_sign_negative() && !amount.is_zero() {
            false => Flow::Income,
            true => Flow::Expense,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Income => f.write_str("Income"),
            Flow::Expense => f.write_str("Expense"),
        }
    }
}

/// One row of an exported transaction list, as handed over by the tokenizer
///
/// Every field is optional here, validation happens when the row is loaded
/// into a [`TransactionStore`](crate::TransactionStore).
#[derive(Clone, Debug, Default, serde::Deserialize, PartialEq, Eq)]
pub struct RawRow {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single validated transaction
///
/// Records are immutable once constructed. A positive amount is income,
/// a negative amount an expense.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    timestamp: NaiveDateTime,
    company: String,
    kind: String,
    amount: Decimal,
    description: Option<String>,
}

impl TransactionRecord {
    /// Creates a record, replacing an empty company or type with [`UNKNOWN_LABEL`]
    pub fn new(
        timestamp: NaiveDateTime,
        company: impl Into<String>,
        kind: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            timestamp,
            company: label_or_unknown(company.into()),
            kind: label_or_unknown(kind.into()),
            amount,
            description: None,
        }
    }

    /// Attaches the free-text description the record was exported with
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// The calendar day the transaction happened on
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    /// The transaction category, e.g. `Sale` or `Rent`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn flow(&self) -> Flow {
        Flow::of(self.amount)
    }
}

fn label_or_unknown(label: String) -> String {
    let trimmed = label.trim();
    match trimmed.is_empty() {
        true => UNKNOWN_LABEL.to_owned(),
        false if trimmed.len() == label.len() => label,
        false => trimmed.to_owned(),
    }
}
