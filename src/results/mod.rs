//! Results module - append-only CSV store of aggregate results and its configuration

mod config;
mod store;

pub use config::{ConfigError, ResultsLocation, StoreConfig, CONFIG_FILE_NAME, DEFAULT_RESULTS_NAME};
pub use store::{
    default_run_label, ColumnKey, ResultsStore, ResultsTable, StoreError, StoredRecord,
    PERIOD_HEADER, REGION_HEADER, RUN_LABEL_HEADER,
};
