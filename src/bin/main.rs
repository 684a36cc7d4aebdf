use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use transaction_dashboard::{
    Chart, CompanyRule, CsvLayout, Dashboard, FilterSpec, LoadOptions, RejectionPolicy, Selection,
    TimePreset, TimeRange, TransactionStore, parse_timestamp,
};

/// Summarizes an exported list of in-game transactions as chart tables
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// The path to the transaction CSV file
    filename: std::path::PathBuf,
    /// `headed` for CSV with a header row, `game-export` for the game's headerless export
    #[clap(long, default_value = "headed")]
    layout: CsvLayout,
    /// Fail on the first malformed row instead of skipping it
    #[clap(long)]
    abort_on_error: bool,
    /// The date of game day 0, for exports that count days [default for game exports: 1970-01-01]
    #[clap(long)]
    day_epoch: Option<NaiveDate>,
    /// Assigns a company by description keywords, e.g. `Best Inc=best inc`
    #[clap(long = "company-rule")]
    company_rules: Vec<CompanyRule>,
    /// Only include transactions at or after this time
    #[clap(long, parse(try_from_str = parse_time))]
    from: Option<NaiveDateTime>,
    /// Only include transactions at or before this time
    #[clap(long, parse(try_from_str = parse_time))]
    to: Option<NaiveDateTime>,
    /// `last-day`, `last-week` or `all-time`, ignored when `--from` or `--to` is given
    #[clap(long)]
    preset: Option<TimePreset>,
    /// Only include these companies
    #[clap(long = "company")]
    companies: Vec<String>,
    /// Only include these transaction types
    #[clap(long = "type")]
    types: Vec<String>,
    /// The charts to print, all of them by default
    #[clap(long = "chart")]
    charts: Vec<Chart>,
    /// The log level, `RUST_LOG` takes precedence
    #[clap(long, default_value = "warn")]
    log_level: String,
}

fn parse_time(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value, None).map_err(|e| e.to_string())
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn filter_spec(args: &Args, store: &TransactionStore) -> FilterSpec {
    let mut spec = FilterSpec::for_store(store);

    match (args.from, args.to, store.time_bounds()) {
        (None, None, Some(bounds)) => {
            if let Some(preset) = args.preset {
                spec.time_range = Some(preset.range(bounds));
            }
        }
        (None, None, None) => {}
        (from, to, bounds) => {
            let start = from.or(bounds.map(|(min, _)| min)).unwrap_or(NaiveDateTime::MIN);
            let end = to.or(bounds.map(|(_, max)| max)).unwrap_or(NaiveDateTime::MAX);
            spec.time_range = Some(TimeRange::new(start, end));
        }
    }

    spec.with_companies(Selection::only(args.companies.iter().cloned()))
        .with_types(Selection::only(args.types.iter().cloned()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let options = LoadOptions {
        policy: match args.abort_on_error {
            false => RejectionPolicy::Skip,
            true => RejectionPolicy::Abort,
        },
        day_epoch: args.day_epoch,
        company_rules: args.company_rules.clone(),
    };
    let file = std::fs::File::open(&args.filename)?;
    let loaded = TransactionStore::load_csv(std::io::BufReader::new(file), args.layout, &options)?;
    if loaded.skipped() > 0 {
        warn!(skipped = loaded.skipped(), "some rows were rejected");
    }
    info!(records = loaded.store.len(), "loaded {}", args.filename.display());

    let spec = filter_spec(&args, &loaded.store);
    let dashboard = Dashboard::build(&loaded.store, &spec);

    let charts = match args.charts.is_empty() {
        true => Chart::ALL.to_vec(),
        false => args.charts.clone(),
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(std::io::stdout());

    for chart in charts {
        for row in dashboard.table(chart) {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;

    Ok(())
}
