//! Results Store Module
//! Appends aggregate results to a CSV file with a three-level row index
//! (run label, period, region) and a two-level column header (statistic, field).
//!
//! Layout:
//! 1. three empty cells, then one statistic label per column
//! 2. three empty cells, then one field name per column
//! 3. `unique_identification,periodo,regioni`, then empty cells
//! 4. one data row per (run label, period, region)

use super::config::{ConfigError, ResultsLocation, StoreConfig};
use crate::stats::{AggregateResult, DescriptiveStats, FieldSummary, RegionSummary, StatKind};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Header token of the run-label column; never accepted as a run label.
pub const RUN_LABEL_HEADER: &str = "unique_identification";
pub const PERIOD_HEADER: &str = "periodo";
pub const REGION_HEADER: &str = "regioni";

const INDEX_WIDTH: usize = 3;
const HEADER_ROWS: usize = 3;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Run label {0:?} is already in use; labels must be unique and differ from the header")]
    DuplicateRunLabel(String),
    #[error("Run label must not be empty")]
    EmptyRunLabel,
    #[error("Results file {path} has different columns than this batch")]
    HeaderMismatch { path: PathBuf },
    #[error("Malformed results file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Column key of the results file.
pub type ColumnKey = (StatKind, String);

/// One stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub run_label: String,
    pub period: String,
    pub region: String,
    /// One value per column of the owning [`ResultsTable`].
    pub values: Vec<f64>,
}

/// Everything read back from the results file.
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    pub columns: Vec<ColumnKey>,
    pub records: Vec<StoredRecord>,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct run labels in storage order.
    pub fn run_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for record in &self.records {
            if !labels.contains(&record.run_label.as_str()) {
                labels.push(&record.run_label);
            }
        }
        labels
    }

    pub fn records_for<'a>(&'a self, run_label: &'a str) -> impl Iterator<Item = &'a StoredRecord> {
        self.records.iter().filter(move |r| r.run_label == run_label)
    }

    pub fn column_index(&self, kind: StatKind, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(k, f)| *k == kind && f == field)
    }

    pub fn value(&self, run_label: &str, region: &str, kind: StatKind, field: &str) -> Option<f64> {
        let idx = self.column_index(kind, field)?;
        self.records_for(run_label)
            .find(|r| r.region == region)
            .and_then(|r| r.values.get(idx).copied())
    }

    /// Rebuild the aggregate saved under `run_label`.
    pub fn to_aggregate(&self, run_label: &str) -> Option<AggregateResult> {
        let mut fields: Vec<&str> = Vec::new();
        for (_, field) in &self.columns {
            if !fields.contains(&field.as_str()) {
                fields.push(field);
            }
        }

        let mut period = None;
        let mut regions = Vec::new();
        for record in self.records_for(run_label) {
            period.get_or_insert_with(|| record.period.clone());

            let summaries = fields
                .iter()
                .map(|&field| {
                    let mut stats = DescriptiveStats::default();
                    for kind in StatKind::ALL {
                        if let Some(idx) = self.column_index(kind, field) {
                            let value = record.values.get(idx).copied().unwrap_or(f64::NAN);
                            stats.set(kind, value);
                        }
                    }
                    FieldSummary {
                        field: field.to_string(),
                        stats,
                    }
                })
                .collect();
            regions.push(RegionSummary {
                region: record.region.clone(),
                fields: summaries,
            });
        }

        period.map(|period| AggregateResult { period, regions })
    }
}

/// Local timestamp with microseconds, e.g. `2020-04-01 18:30:12.123456`.
pub fn default_run_label() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Append-only store of aggregate results in a single CSV file.
///
/// One writer per destination is assumed; there is no locking.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    location: ResultsLocation,
}

impl ResultsStore {
    pub fn new(location: ResultsLocation) -> Self {
        Self { location }
    }

    pub fn from_config(config: StoreConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.resolve()?))
    }

    pub fn location(&self) -> &ResultsLocation {
        &self.location
    }

    /// Append `aggregate` under `run_label` (a timestamp when omitted) and
    /// return the label used.
    ///
    /// Every check runs before the file is touched; a rejected call writes
    /// nothing.
    pub fn save(
        &self,
        aggregate: &AggregateResult,
        run_label: Option<&str>,
    ) -> Result<String, StoreError> {
        let label = run_label.map_or_else(default_run_label, str::to_string);
        if label.is_empty() {
            return Err(StoreError::EmptyRunLabel);
        }
        if label == RUN_LABEL_HEADER {
            return Err(StoreError::DuplicateRunLabel(label));
        }

        let path = self.location.file_path();
        let columns = Self::column_keys(aggregate);
        let header = Self::header_rows(&columns);
        let exists = path.is_file();

        if exists {
            let rows = read_rows(&path)?;
            if rows.len() < HEADER_ROWS || rows[..2] != header[..2] {
                return Err(StoreError::HeaderMismatch { path });
            }
            if rows[HEADER_ROWS..]
                .iter()
                .any(|row| row.first() == Some(&label))
            {
                warn!(run_label = %label, path = %path.display(), "duplicate run label rejected");
                return Err(StoreError::DuplicateRunLabel(label));
            }
        }

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        if !exists {
            for row in &header {
                writer.write_record(row)?;
            }
        }
        for row in Self::data_rows(aggregate, &label, &columns) {
            writer.write_record(&row)?;
        }
        let batch = writer
            .into_inner()
            .map_err(|e| io_error(&path, e.into_error()))?;

        let mut file = if exists {
            OpenOptions::new().append(true).open(&path)
        } else {
            OpenOptions::new().write(true).create_new(true).open(&path)
        }
        .map_err(|e| io_error(&path, e))?;
        file.write_all(&batch).map_err(|e| io_error(&path, e))?;
        file.flush().map_err(|e| io_error(&path, e))?;

        info!(
            run_label = %label,
            regions = aggregate.regions.len(),
            path = %path.display(),
            "saved results"
        );
        Ok(label)
    }

    /// Read the whole results file back.
    pub fn load(&self) -> Result<ResultsTable, StoreError> {
        let path = self.location.file_path();
        let rows = read_rows(&path)?;
        let malformed = |reason: String| StoreError::Malformed {
            path: path.clone(),
            reason,
        };

        if rows.len() < HEADER_ROWS {
            return Err(malformed(format!("expected {HEADER_ROWS} header rows")));
        }
        let width = rows[0].len();
        if width < INDEX_WIDTH || rows[1].len() != width {
            return Err(malformed("inconsistent header width".to_string()));
        }

        let mut columns = Vec::with_capacity(width - INDEX_WIDTH);
        for (label, field) in rows[0][INDEX_WIDTH..].iter().zip(&rows[1][INDEX_WIDTH..]) {
            let kind = StatKind::from_label(label)
                .ok_or_else(|| malformed(format!("unknown statistic {label:?}")))?;
            columns.push((kind, field.clone()));
        }

        let mut records = Vec::with_capacity(rows.len() - HEADER_ROWS);
        for (offset, row) in rows[HEADER_ROWS..].iter().enumerate() {
            if row.len() != width {
                return Err(malformed(format!(
                    "row {} has {} cells, expected {width}",
                    offset + HEADER_ROWS + 1,
                    row.len()
                )));
            }
            let values = row[INDEX_WIDTH..]
                .iter()
                .map(|cell| parse_value(cell))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| malformed(format!("non-numeric value in row {}", offset + HEADER_ROWS + 1)))?;
            records.push(StoredRecord {
                run_label: row[0].clone(),
                period: row[1].clone(),
                region: row[2].clone(),
                values,
            });
        }

        Ok(ResultsTable { columns, records })
    }

    /// Kind-major column order: every field's max, then min, mean, std.
    fn column_keys(aggregate: &AggregateResult) -> Vec<ColumnKey> {
        let fields = aggregate.field_names();
        StatKind::ALL
            .into_iter()
            .flat_map(|kind| fields.iter().map(move |field| (kind, field.clone())))
            .collect()
    }

    fn header_rows(columns: &[ColumnKey]) -> [Vec<String>; HEADER_ROWS] {
        let blank_index = || vec![String::new(); INDEX_WIDTH];

        let mut kinds = blank_index();
        kinds.extend(columns.iter().map(|(kind, _)| kind.label().to_string()));

        let mut fields = blank_index();
        fields.extend(columns.iter().map(|(_, field)| field.clone()));

        let mut names = vec![
            RUN_LABEL_HEADER.to_string(),
            PERIOD_HEADER.to_string(),
            REGION_HEADER.to_string(),
        ];
        names.extend(columns.iter().map(|_| String::new()));

        [kinds, fields, names]
    }

    fn data_rows(aggregate: &AggregateResult, label: &str, columns: &[ColumnKey]) -> Vec<Vec<String>> {
        aggregate
            .regions
            .iter()
            .map(|region| {
                let mut row = vec![
                    label.to_string(),
                    aggregate.period.clone(),
                    region.region.clone(),
                ];
                row.extend(columns.iter().map(|(kind, field)| {
                    region
                        .field(field)
                        .map(|stats| format_value(stats.get(*kind)))
                        .unwrap_or_default()
                }));
                row
            })
            .collect()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
    let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// NaN is stored as an empty cell.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_value(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        Some(f64::NAN)
    } else {
        cell.parse().ok()
    }
}
