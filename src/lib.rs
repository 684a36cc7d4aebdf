pub use self::{
    dashboard::{Chart, ChartRow, Dashboard},
    engine::{
        aggregate_by, aggregate_by_flow, daily_series, filter, split_income_expense,
        AggregationResult, Dimension, EngineError, FlowBreakdown, GroupKey,
    },
    filter::{FilterSpec, Selection, TimePreset, TimeRange},
    import::CsvLayout,
    session::{FilterEvent, Session},
    store::{
        parse_timestamp, CompanyRule, LoadOptions, Loaded, ParseError, RejectionPolicy, RowError,
        TransactionStore,
    },
    transaction::{Flow, RawRow, TransactionRecord, MAX_AMOUNT, UNKNOWN_LABEL},
};

mod dashboard;
pub mod engine;
mod filter;
pub mod import;
mod session;
mod store;
mod transaction;
