//! itacovid - Italian COVID-19 regional statistics
//!
//! Loads the regional time series, subsets it, computes per-region summary
//! statistics, keeps an append-only CSV store of results and renders charts.

pub mod charts;
pub mod data;
pub mod results;
pub mod stats;
pub mod util;

pub use charts::{ChartError, ChartRenderer, Figure};
pub use data::{
    download_covid_dataset, subset_by_month, subset_by_period, subset_by_region, DataLoader,
    DownloadError, KaggleCredentials, LoaderError, ObservationTable, SubsetError,
};
pub use results::{
    ConfigError, ResultsLocation, ResultsStore, ResultsTable, StoreConfig, StoreError,
    StoredRecord,
};
pub use stats::{AggregateResult, DescriptiveStats, StatKind, StatsCalculator, StatsError};
