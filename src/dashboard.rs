use rust_decimal::Decimal;
use tracing::debug;

use crate::engine::{self, AggregationResult, Dimension, FlowBreakdown, GroupKey};
use crate::{FilterSpec, Flow, TransactionStore};

/// The tables the dashboard displays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Chart {
    /// Income and expenses stacked by transaction type
    ByType,
    /// Income and expenses stacked by company
    ByCompany,
    ExpensesByCompany,
    ExpensesByType,
    IncomeByCompany,
    /// Net amount per day
    Daily,
}

impl Chart {
    pub const ALL: [Chart; 6] = [
        Chart::ByType,
        Chart::ByCompany,
        Chart::ExpensesByCompany,
        Chart::ExpensesByType,
        Chart::IncomeByCompany,
        Chart::Daily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Chart::ByType => "by-type",
            Chart::ByCompany => "by-company",
            Chart::ExpensesByCompany => "expenses-by-company",
            Chart::ExpensesByType => "expenses-by-type",
            Chart::IncomeByCompany => "income-by-company",
            Chart::Daily => "daily",
        }
    }
}

impl std::fmt::Display for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Chart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chart::ALL
            .into_iter()
            .find(|chart| chart.name() == s)
            .ok_or_else(|| format!("unknown chart `{}`", s))
    }
}

impl serde::Serialize for Chart {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: serde::Serializer
    {
        serializer.serialize_str(self.name())
    }
}

/// One row of a chart table
#[derive(Clone, Debug, serde::Serialize, PartialEq, Eq)]
pub struct ChartRow {
    pub chart: Chart,
    /// Only set for the stacked income/expense charts
    pub series: Option<Flow>,
    pub key: GroupKey,
    pub amount: Decimal,
}

/// Every chart for one filter state
///
/// Apart from `daily`, amounts are absolute, so expenses show up as positive
/// slices and bars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dashboard {
    /// How many records passed the filter
    pub transactions: usize,
    pub by_type: FlowBreakdown,
    pub by_company: FlowBreakdown,
    pub expenses_by_company: AggregationResult,
    pub expenses_by_type: AggregationResult,
    pub income_by_company: AggregationResult,
    pub daily: AggregationResult,
}

impl Dashboard {
    pub fn build(store: &TransactionStore, spec: &FilterSpec) -> Self {
        let records = engine::filter(store, spec);
        let (income, expense) = engine::split_income_expense(records.iter().copied());

        let breakdown = |dimension| {
            let breakdown = engine::aggregate_by_flow(records.iter().copied(), dimension);
            FlowBreakdown {
                income: breakdown.income.magnitudes(),
                expense: breakdown.expense.magnitudes(),
            }
        };

        let dashboard = Self {
            transactions: records.len(),
            by_type: breakdown(Dimension::Type),
            by_company: breakdown(Dimension::Company),
            expenses_by_company: engine::aggregate_by(expense.iter().copied(), Dimension::Company).magnitudes(),
            expenses_by_type: engine::aggregate_by(expense.iter().copied(), Dimension::Type).magnitudes(),
            income_by_company: engine::aggregate_by(income.iter().copied(), Dimension::Company).magnitudes(),
            daily: engine::daily_series(records.iter().copied()),
        };
        debug!(transactions = dashboard.transactions, "built dashboard");

        dashboard
    }

    /// The rows of a single chart
    pub fn table(&self, chart: Chart) -> Vec<ChartRow> {
        let rows = |series: Option<Flow>, result: &AggregationResult| {
            result
                .iter()
                .map(move |(key, amount)| ChartRow {
                    chart,
                    series,
                    key: key.clone(),
                    amount: *amount,
                })
                .collect::<Vec<_>>()
        };
        let stacked = |breakdown: &FlowBreakdown| {
            [Flow::Income, Flow::Expense]
                .into_iter()
                .flat_map(|flow| rows(Some(flow), breakdown.get(flow)))
                .collect::<Vec<_>>()
        };

        match chart {
            Chart::ByType => stacked(&self.by_type),
            Chart::ByCompany => stacked(&self.by_company),
            Chart::ExpensesByCompany => rows(None, &self.expenses_by_company),
            Chart::ExpensesByType => rows(None, &self.expenses_by_type),
            Chart::IncomeByCompany => rows(None, &self.income_by_company),
            Chart::Daily => rows(None, &self.daily),
        }
    }
}
