//! itacovid - Italian COVID-19 regional statistics from the command line
//!
//! Downloads the Kaggle regional dataset, summarizes it per region, keeps the
//! summaries in an append-only results file and renders charts.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use itacovid::charts::{ChartKind, ChartRenderer};
use itacovid::data::{
    download_covid_dataset, subset_by_month, subset_by_period, subset_by_region, DataLoader,
    KaggleCredentials, ObservationTable,
};
use itacovid::results::{ConfigError, ResultsLocation, ResultsStore, StoreConfig};
use itacovid::stats::StatsCalculator;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Italian COVID-19 regional statistics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the regional dataset from Kaggle
    Download {
        /// Destination directory (working directory by default)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// File name to save the dataset under
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "KAGGLE_USERNAME", requires = "key")]
        username: Option<String>,
        #[arg(long, env = "KAGGLE_KEY", hide_env_values = true, requires = "username")]
        key: Option<String>,
    },
    /// Summarize the dataset per region, optionally saving the result
    Analyze {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Append the result to the results file
        #[arg(long)]
        save: bool,
        /// Label identifying the saved run (timestamp by default)
        #[arg(long, requires = "save")]
        run_label: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the saved results
    Results {
        /// Only print this run
        #[arg(long)]
        run_label: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Store where the results file lives
    Config {
        /// Directory of the results file
        #[arg(long)]
        path: Option<PathBuf>,
        /// Name of the results file
        #[arg(long)]
        name: Option<String>,
        /// Directory the configuration is written to
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },
    /// Render a chart to SVG or PNG
    Chart {
        #[arg(value_enum)]
        kind: ChartArg,
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Output file; `.svg` writes SVG, anything else PNG
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 1000)]
        width: u32,
        #[arg(long, default_value_t = 500)]
        height: u32,
    },
}

/// Chart names accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum ChartArg {
    Bar,
    Barh,
    Line,
    NewPositives,
    PositiveVariation,
    Pie,
    NestedPie,
}

impl From<ChartArg> for ChartKind {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Bar => ChartKind::Bar,
            ChartArg::Barh => ChartKind::Barh,
            ChartArg::Line => ChartKind::Line,
            ChartArg::NewPositives => ChartKind::NewPositives,
            ChartArg::PositiveVariation => ChartKind::PositiveVariation,
            ChartArg::Pie => ChartKind::Pie,
            ChartArg::NestedPie => ChartKind::NestedPie,
        }
    }
}

#[derive(Args)]
struct DatasetArgs {
    /// Directory holding the dataset
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,
    /// Dataset file name
    #[arg(long = "data-name")]
    data_name: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep only these regions
    #[arg(long = "region")]
    regions: Vec<String>,
    /// Keep only these months (Italian names)
    #[arg(long = "month")]
    months: Vec<String>,
    /// Period start, dd/mm/yyyy
    #[arg(long, requires = "to")]
    from: Option<String>,
    /// Period end, dd/mm/yyyy
    #[arg(long, requires = "from")]
    to: Option<String>,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory of the results file (overrides the stored configuration)
    #[arg(long)]
    results_dir: Option<PathBuf>,
    /// Name of the results file (overrides the stored configuration)
    #[arg(long)]
    results_name: Option<String>,
    /// Directory holding the stored configuration
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Download {
            dir,
            name,
            username,
            key,
        } => {
            let credentials = match (username, key) {
                (Some(username), Some(key)) => KaggleCredentials::new(username, key),
                _ => KaggleCredentials::discover().context("No Kaggle credentials available")?,
            };
            let path = download_covid_dataset(&credentials, dir.as_deref(), name.as_deref())
                .context("Failed to download the dataset")?;
            println!("{}", path.display());
        }
        Command::Analyze {
            dataset,
            filters,
            save,
            run_label,
            json,
            store,
        } => {
            let table = apply_filters(load_dataset(&dataset)?, &filters)?;
            let aggregate = StatsCalculator::analyze(&table).context("Aggregation failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&aggregate)?);
            } else {
                print!("{aggregate}");
            }

            if save {
                let store = results_store(&store)?;
                let label = store
                    .save(&aggregate, run_label.as_deref())
                    .with_context(|| {
                        format!("Failed to save to {}", store.location().file_path().display())
                    })?;
                info!(run_label = %label, "run saved");
            }
        }
        Command::Results { run_label, store } => {
            let store = results_store(&store)?;
            let results = store.load().with_context(|| {
                format!("Failed to read {}", store.location().file_path().display())
            })?;

            let labels: Vec<&str> = match run_label.as_deref() {
                Some(label) => vec![label],
                None => results.run_labels(),
            };
            for label in labels {
                let Some(aggregate) = results.to_aggregate(label) else {
                    bail!("No run labelled {label:?}");
                };
                println!("== {label}");
                print!("{aggregate}");
            }
        }
        Command::Config {
            path,
            name,
            config_dir,
        } => {
            let location = StoreConfig::new(path, name).resolve()?;
            let written = location
                .store_config(&config_dir)
                .context("Failed to store the configuration")?;
            println!("{} -> {}", written.display(), location.file_path().display());
        }
        Command::Chart {
            kind,
            dataset,
            filters,
            out,
            width,
            height,
        } => {
            let table = apply_filters(load_dataset(&dataset)?, &filters)?;
            let figure = ChartRenderer::render(kind.into(), &table)
                .context("Failed to build the chart")?;
            figure
                .save(&out, (width, height))
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), "chart written");
        }
    }
    Ok(())
}

fn load_dataset(args: &DatasetArgs) -> Result<ObservationTable> {
    DataLoader::read_covid_dataset(args.data_dir.as_deref(), args.data_name.as_deref())
        .context("Failed to load the dataset")
}

fn apply_filters(mut table: ObservationTable, filters: &FilterArgs) -> Result<ObservationTable> {
    if !filters.regions.is_empty() {
        table = subset_by_region(&table, &filters.regions)?;
    }
    if !filters.months.is_empty() {
        table = subset_by_month(&table, &filters.months)?;
    }
    if let (Some(from), Some(to)) = (&filters.from, &filters.to) {
        table = subset_by_period(&table, from, to)?;
    }
    Ok(table)
}

/// Results store from the stored configuration, if any, with flags on top.
fn results_store(args: &StoreArgs) -> Result<ResultsStore> {
    let stored = match ResultsLocation::load_config(&args.config_dir) {
        Ok(location) => Some(location),
        Err(ConfigError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(err).context("Failed to read the stored configuration"),
    };

    let config = StoreConfig::new(
        args.results_dir
            .clone()
            .or_else(|| stored.as_ref().map(|l| l.dir.clone())),
        args.results_name
            .clone()
            .or_else(|| stored.map(|l| l.file_name)),
    );
    Ok(ResultsStore::from_config(config)?)
}
