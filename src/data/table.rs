//! Observation Table Module
//! The normalized regional time series, one row per (date, region).

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

pub const DATE: &str = "data";
pub const REGION: &str = "denominazione_regione";
pub const HOSPITALIZED_WITH_SYMPTOMS: &str = "ricoverati_con_sintomi";
pub const INTENSIVE_CARE: &str = "terapia_intensiva";
pub const TOTAL_HOSPITALIZED: &str = "totale_ospedalizzati";
pub const HOME_ISOLATION: &str = "isolamento_domiciliare";
pub const TOTAL_POSITIVE: &str = "totale_positivi";
pub const NEW_POSITIVE: &str = "nuovi_positivi";
pub const RECOVERED: &str = "dimessi_guariti";
pub const DECEASED: &str = "deceduti";
pub const TOTAL_CASES: &str = "totale_casi";
pub const TESTS_PERFORMED: &str = "casi_testati";
pub const TOTAL_POSITIVE_VARIATION: &str = "variazione_totale_positivi";

/// Reported count fields, in dataset order. These are the fields summarized
/// by the aggregator; the derived variation column is not among them.
pub const COUNT_FIELDS: [&str; 10] = [
    HOSPITALIZED_WITH_SYMPTOMS,
    INTENSIVE_CARE,
    TOTAL_HOSPITALIZED,
    HOME_ISOLATION,
    TOTAL_POSITIVE,
    NEW_POSITIVE,
    RECOVERED,
    DECEASED,
    TOTAL_CASES,
    TESTS_PERFORMED,
];

// 1970-01-01 expressed as days from 0001-01-01 (CE).
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Polars stores `Date` as days since the Unix epoch.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

/// Normalized observation table backed by a Polars DataFrame.
///
/// Tables are never mutated in place: every filter returns a new table.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    df: DataFrame,
}

impl ObservationTable {
    pub(crate) fn from_dataframe(df: DataFrame) -> Self {
        Self { df }
    }

    /// Get a reference to the underlying DataFrame.
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get list of column names.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Row-aligned dates.
    pub fn dates(&self) -> PolarsResult<Vec<NaiveDate>> {
        let days = self.df.column(DATE)?.cast(&DataType::Int32)?;
        days.i32()?
            .into_iter()
            .map(|v| {
                v.and_then(days_to_date)
                    .ok_or_else(|| PolarsError::ComputeError("null or invalid date".into()))
            })
            .collect()
    }

    /// Earliest and latest date, `None` for an empty table.
    pub fn date_span(&self) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.dates()?;
        let min = dates.iter().min().copied();
        let max = dates.iter().max().copied();
        Ok(min.zip(max))
    }

    /// Row-aligned region names.
    pub fn region_column(&self) -> PolarsResult<Vec<String>> {
        Ok(self
            .df
            .column(REGION)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }

    /// Distinct region names in order of first appearance.
    pub fn regions(&self) -> PolarsResult<Vec<String>> {
        let mut regions: Vec<String> = Vec::new();
        for region in self.region_column()? {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        Ok(regions)
    }

    /// Row-aligned values of a numeric column as f64; nulls stay `None`.
    pub fn numeric(&self, column: &str) -> PolarsResult<Vec<Option<f64>>> {
        let values = self.df.column(column)?.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    }

    /// Keep the rows whose mask entry is `true`.
    pub(crate) fn filter_rows(&self, mask: &[bool]) -> PolarsResult<Self> {
        let mask = BooleanChunked::from_slice("mask".into(), mask);
        Ok(Self::from_dataframe(self.df.filter(&mask)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_conversion_round_trips() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap();
        assert_eq!(date_to_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_to_date(date_to_days(date)), Some(date));
    }
}
