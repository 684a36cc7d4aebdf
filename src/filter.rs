use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::{TransactionRecord, TransactionStore};

/// An inclusive span of time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Whether `timestamp` lies within the range, both ends included
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// A range that ends before it starts contains nothing
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl From<(NaiveDateTime, NaiveDateTime)> for TimeRange {
    fn from((start, end): (NaiveDateTime, NaiveDateTime)) -> Self {
        Self::new(start, end)
    }
}

/// A set of labels to include
///
/// An explicit but empty selection doesn't restrict anything either.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(labels: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>,
    {
        Selection::Only(labels.into_iter().map(Into::into).collect())
    }

    pub fn is_unrestricted(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(labels) => labels.is_empty(),
        }
    }

    pub fn allows(&self, label: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(labels) => labels.is_empty() || labels.contains(label),
        }
    }

    /// Adds or removes `label`
    ///
    /// Toggling out of [`Selection::All`] needs to know every label that
    /// exists, so the result still lists all the others.
    pub fn toggle(&mut self, label: &str, known: &BTreeSet<String>) {
        let mut labels = match std::mem::take(self) {
            Selection::All => known.clone(),
            Selection::Only(labels) if labels.is_empty() => known.clone(),
            Selection::Only(labels) => labels,
        };
        if !labels.remove(label) {
            labels.insert(label.to_owned());
        }

        *self = match &labels == known {
            true => Selection::All,
            false => Selection::Only(labels),
        };
    }
}

/// The constraints of the current view
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// `None` leaves time unrestricted
    pub time_range: Option<TimeRange>,
    pub companies: Selection,
    pub types: Selection,
}

impl FilterSpec {
    /// A filter every record passes
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// The initial filter for a store: all of its time, companies and types
    pub fn for_store(store: &TransactionStore) -> Self {
        Self {
            time_range: store.time_bounds().map(TimeRange::from),
            ..Self::default()
        }
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn with_companies(mut self, companies: Selection) -> Self {
        self.companies = companies;
        self
    }

    pub fn with_types(mut self, types: Selection) -> Self {
        self.types = types;
        self
    }

    /// Whether `record` satisfies the time, company and type constraints
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.time_range
            .map_or(true, |range| range.contains(record.timestamp()))
            && self.companies.allows(record.company())
            && self.types.allows(record.kind())
    }
}

/// Quick time ranges relative to the loaded data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimePreset {
    /// The calendar day before the day of the latest record
    ///
    /// Empty if no record is that old.
    LastDay,
    /// The seven days up to the latest record
    LastWeek,
    AllTime,
}

impl TimePreset {
    /// The range this preset covers, given the store's time bounds
    ///
    /// Ranges never start before the earliest record.
    pub fn range(self, (min, max): (NaiveDateTime, NaiveDateTime)) -> TimeRange {
        match self {
            TimePreset::LastDay => {
                let latest_midnight = max.date().and_time(NaiveTime::MIN);
                let start = latest_midnight
                    .checked_sub_signed(Duration::days(1))
                    .unwrap_or(min)
                    .max(min);
                let end = latest_midnight - Duration::nanoseconds(1);
                TimeRange::new(start, end)
            }
            TimePreset::LastWeek => TimeRange::new((max - Duration::days(7)).max(min), max),
            TimePreset::AllTime => TimeRange::new(min, max),
        }
    }
}

impl std::str::FromStr for TimePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-day" => Ok(TimePreset::LastDay),
            "last-week" => Ok(TimePreset::LastWeek),
            "all-time" => Ok(TimePreset::AllTime),
            other => Err(format!("unknown preset `{}`", other)),
        }
    }
}
