use std::collections::BTreeSet;

use tracing::debug;

use crate::{Dashboard, FilterSpec, Selection, TimePreset, TimeRange, TransactionStore};

/// Changes to the view, as produced by the filter widgets
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterEvent {
    /// `None` removes the time restriction
    SetTimeRange(Option<TimeRange>),
    Preset(TimePreset),
    SelectAllCompanies,
    SetCompanies(BTreeSet<String>),
    ToggleCompany(String),
    SelectAllTypes,
    SetTypes(BTreeSet<String>),
    ToggleType(String),
}

/// One user's loaded data and current view
///
/// Sessions don't share anything, every session owns its store.
#[derive(Debug, Clone)]
pub struct Session {
    store: TransactionStore,
    filter: FilterSpec,
}

impl Session {
    pub fn new(store: TransactionStore) -> Self {
        let filter = FilterSpec::for_store(&store);
        Self { store, filter }
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Discards the current data and starts over with `store`
    ///
    /// The filter is reset, selections made for the old data don't carry over.
    pub fn replace(&mut self, store: TransactionStore) {
        debug!(previous = self.store.len(), records = store.len(), "replacing session data");
        *self = Self::new(store);
    }

    /// Updates the filter and recomputes the charts
    pub fn apply(&mut self, event: FilterEvent) -> Dashboard {
        match event {
            FilterEvent::SetTimeRange(range) => self.filter.time_range = range,
            FilterEvent::Preset(preset) => {
                self.filter.time_range = self.store
                    .time_bounds()
                    .map(|bounds| preset.range(bounds));
            }
            FilterEvent::SelectAllCompanies => self.filter.companies = Selection::All,
            FilterEvent::SetCompanies(companies) => self.filter.companies = Selection::Only(companies),
            FilterEvent::ToggleCompany(company) => {
                self.filter.companies.toggle(&company, self.store.companies());
            }
            FilterEvent::SelectAllTypes => self.filter.types = Selection::All,
            FilterEvent::SetTypes(types) => self.filter.types = Selection::Only(types),
            FilterEvent::ToggleType(kind) => {
                self.filter.types.toggle(&kind, self.store.types());
            }
        }

        self.dashboard()
    }

    /// The charts for the current filter
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::build(&self.store, &self.filter)
    }
}
