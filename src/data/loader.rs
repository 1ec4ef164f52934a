//! CSV Data Loader Module
//! Reads the regional COVID-19 dataset and normalizes it using Polars.

use super::table::*;
use crate::util::{capitalize, with_csv_extension};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// File name Kaggle gives the regional dataset.
pub const DEFAULT_DATASET_NAME: &str = "covid19_italy_region.csv";

/// Number of columns in the raw file: sno, data, stato, codice_regione,
/// denominazione_regione, lat, long and the ten counts.
const RAW_COLUMN_COUNT: usize = 17;
const RAW_DATE_IDX: usize = 1;
const RAW_REGION_IDX: usize = 4;
const RAW_FIRST_COUNT_IDX: usize = 7;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Expected {expected} columns, found {found}")]
    UnexpectedColumns { expected: usize, found: usize },
    #[error("Invalid date {value:?} at row {row}")]
    InvalidDate { row: usize, value: String },
}

/// Loads the regional dataset into an [`ObservationTable`].
pub struct DataLoader;

impl DataLoader {
    /// Load the dataset from `dir/name`.
    ///
    /// `dir` defaults to the working directory and `name` to the file name
    /// Kaggle assigns; a name without the `.csv` extension gets one.
    pub fn read_covid_dataset(
        dir: Option<&Path>,
        name: Option<&str>,
    ) -> Result<ObservationTable, LoaderError> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().map_err(|source| LoaderError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let name = name
            .map(with_csv_extension)
            .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string());

        Self::load_csv(dir.join(name))
    }

    /// Load and normalize a CSV file.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<ObservationTable, LoaderError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse_csv(&bytes)?;
        info!(
            path = %path.display(),
            rows = table.height(),
            "loaded covid dataset"
        );
        Ok(table)
    }

    /// Normalize CSV content already in memory.
    ///
    /// The header row is discarded and columns are taken by position. Unused
    /// columns are dropped, missing test counts become 0, region names are
    /// capitalized and the daily variation of total positives is derived.
    pub fn parse_csv(bytes: &[u8]) -> Result<ObservationTable, LoaderError> {
        let options = CsvReadOptions::default()
            .with_has_header(true)
            .with_dtype_overwrite(Some(Arc::new(Self::raw_dtypes())));
        let raw = options
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        if raw.width() != RAW_COLUMN_COUNT {
            return Err(LoaderError::UnexpectedColumns {
                expected: RAW_COLUMN_COUNT,
                found: raw.width(),
            });
        }
        let columns = raw.get_columns();

        let days = Self::parse_dates(columns[RAW_DATE_IDX].str()?)?;
        let regions: Vec<String> = columns[RAW_REGION_IDX]
            .str()?
            .into_iter()
            .map(|v| capitalize(v.unwrap_or_default()))
            .collect();

        let mut out = Vec::with_capacity(COUNT_FIELDS.len() + 3);
        out.push(Column::new(DATE.into(), days).cast(&DataType::Date)?);
        out.push(Column::new(REGION.into(), regions.clone()));

        let mut total_positive: Vec<Option<i64>> = Vec::new();
        for (offset, &field) in COUNT_FIELDS.iter().enumerate() {
            let values = columns[RAW_FIRST_COUNT_IDX + offset].cast(&DataType::Float64)?;
            let counts: Vec<Option<i64>> = values
                .f64()?
                .into_iter()
                .map(|v| match v {
                    None if field == TESTS_PERFORMED => Some(0),
                    v => v.map(|x| x.round() as i64),
                })
                .collect();
            if field == TOTAL_POSITIVE {
                total_positive = counts.clone();
            }
            out.push(Column::new(field.into(), counts));
        }

        let variation = Self::total_positive_variation(&regions, &total_positive);
        out.push(Column::new(TOTAL_POSITIVE_VARIATION.into(), variation));

        let df = DataFrame::new(out)?;
        debug!(rows = df.height(), "normalized dataset");
        Ok(ObservationTable::from_dataframe(df))
    }

    /// Positional dtypes for the raw file. Counts are read as floats because
    /// exports with gaps write them as `123.0`.
    fn raw_dtypes() -> Vec<DataType> {
        let mut dtypes = vec![
            DataType::Int64,   // sno
            DataType::String,  // data
            DataType::String,  // stato
            DataType::Int64,   // codice_regione
            DataType::String,  // denominazione_regione
            DataType::Float64, // lat
            DataType::Float64, // long
        ];
        dtypes.extend(std::iter::repeat(DataType::Float64).take(COUNT_FIELDS.len()));
        dtypes
    }

    fn parse_dates(raw: &StringChunked) -> Result<Vec<i32>, LoaderError> {
        raw.into_iter()
            .enumerate()
            .map(|(row, value)| {
                let value = value.unwrap_or_default().trim();
                Self::parse_date(value)
                    .map(date_to_days)
                    .ok_or_else(|| LoaderError::InvalidDate {
                        row,
                        value: value.to_string(),
                    })
            })
            .collect()
    }

    fn parse_date(value: &str) -> Option<NaiveDate> {
        DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|dt| dt.date())
            .or_else(|| NaiveDate::parse_from_str(value, DATE_FORMAT).ok())
    }

    /// Day-over-day change of total positives within each region; a region's
    /// first row has no predecessor and gets 0.
    fn total_positive_variation(regions: &[String], totals: &[Option<i64>]) -> Vec<Option<i64>> {
        let mut previous: HashMap<&str, Option<i64>> = HashMap::new();
        regions
            .iter()
            .zip(totals)
            .map(|(region, &total)| match previous.insert(region.as_str(), total) {
                None => Some(0),
                Some(prev) => total.zip(prev).map(|(cur, prev)| cur - prev),
            })
            .collect()
    }
}
