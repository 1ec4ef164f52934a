//! Statistics Calculator Module
//! Groups the observation table by region and summarizes every count field.

use crate::data::table::{ObservationTable, COUNT_FIELDS, REGION};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Cannot aggregate an empty table")]
    EmptyTable,
}

/// The four statistics computed for every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Max,
    Min,
    Mean,
    Std,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [StatKind::Max, StatKind::Min, StatKind::Mean, StatKind::Std];

    /// Label used in the results file header.
    pub fn label(self) -> &'static str {
        match self {
            StatKind::Max => "valori massimi",
            StatKind::Min => "valori minimi",
            StatKind::Mean => "valori medi",
            StatKind::Std => "deviazione standard",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Descriptive statistics of one field within one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN with fewer than two values.
    pub std: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            max: f64::NAN,
            min: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
        }
    }
}

impl DescriptiveStats {
    pub fn get(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::Max => self.max,
            StatKind::Min => self.min,
            StatKind::Mean => self.mean,
            StatKind::Std => self.std,
        }
    }

    pub fn set(&mut self, kind: StatKind, value: f64) {
        match kind {
            StatKind::Max => self.max = value,
            StatKind::Min => self.min = value,
            StatKind::Mean => self.mean = value,
            StatKind::Std => self.std = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub field: String,
    pub stats: DescriptiveStats,
}

/// Statistics for a single region, one entry per field in dataset order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: String,
    pub fields: Vec<FieldSummary>,
}

impl RegionSummary {
    pub fn field(&self, field: &str) -> Option<&DescriptiveStats> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| &f.stats)
    }
}

/// Result of [`StatsCalculator::analyze`]: the period label plus one summary
/// per region, regions in order of first appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub period: String,
    pub regions: Vec<RegionSummary>,
}

impl AggregateResult {
    pub fn region(&self, region: &str) -> Option<&RegionSummary> {
        self.regions.iter().find(|r| r.region == region)
    }

    pub fn value(&self, region: &str, kind: StatKind, field: &str) -> Option<f64> {
        self.region(region)?.field(field).map(|s| s.get(kind))
    }

    /// Field names of the first region; every region carries the same fields.
    pub fn field_names(&self) -> Vec<String> {
        self.regions
            .first()
            .map(|r| r.fields.iter().map(|f| f.field.clone()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "periodo: {}", self.period)?;
        for region in &self.regions {
            writeln!(f, "{}", region.region)?;
            for kind in StatKind::ALL {
                writeln!(f, "  {kind}")?;
                for field in &region.fields {
                    writeln!(f, "    {:<28} {:.3}", field.field, field.stats.get(kind))?;
                }
            }
        }
        Ok(())
    }
}

/// Handles per-region statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        if values.is_empty() {
            return DescriptiveStats::default();
        }

        DescriptiveStats {
            max: Statistics::max(values),
            min: Statistics::min(values),
            mean: Statistics::mean(values),
            std: Statistics::std_dev(values),
        }
    }

    /// Label of the table's date span, latest date first: `"dd/mm/yyyy - dd/mm/yyyy"`.
    pub fn period_label(table: &ObservationTable) -> Result<String, StatsError> {
        let (min, max) = table.date_span()?.ok_or(StatsError::EmptyTable)?;
        Ok(format!(
            "{} - {}",
            max.format("%d/%m/%Y"),
            min.format("%d/%m/%Y")
        ))
    }

    /// Get the rows belonging to a single region.
    fn rows_for_region(table: &ObservationTable, region: &str) -> Result<DataFrame, StatsError> {
        Ok(table
            .dataframe()
            .clone()
            .lazy()
            .filter(col(REGION).eq(lit(region)))
            .collect()?)
    }

    /// Summarize every count field of every region in `table`.
    pub fn analyze(table: &ObservationTable) -> Result<AggregateResult, StatsError> {
        let period = Self::period_label(table)?;

        let mut regions = Vec::new();
        for region in table.regions()? {
            let rows = ObservationTable::from_dataframe(Self::rows_for_region(table, &region)?);

            let mut fields = Vec::with_capacity(COUNT_FIELDS.len());
            for &field in COUNT_FIELDS.iter() {
                let values: Vec<f64> = rows.numeric(field)?.into_iter().flatten().collect();
                fields.push(FieldSummary {
                    field: field.to_string(),
                    stats: Self::compute_descriptive_stats(&values),
                });
            }
            debug!(region = %region, rows = rows.height(), "summarized region");

            regions.push(RegionSummary { region, fields });
        }

        Ok(AggregateResult { period, regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_table;
    use crate::data::table::{DECEASED, TESTS_PERFORMED};

    #[test]
    fn descriptive_stats_use_sample_deviation() {
        let stats =
            StatsCalculator::compute_descriptive_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.min, 2.0);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_value_has_undefined_deviation() {
        let stats = StatsCalculator::compute_descriptive_stats(&[3.0]);
        assert_eq!(stats.mean, 3.0);
        assert!(stats.std.is_nan());
    }

    #[test]
    fn analyze_labels_period_latest_first() {
        let table = sample_table(&["Lombardia", "Veneto", "Piemonte"], "2020-02-24", 4);
        let result = StatsCalculator::analyze(&table).unwrap();

        assert_eq!(result.period, "27/02/2020 - 24/02/2020");
        let names: Vec<&str> = result.regions.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(names, vec!["Lombardia", "Veneto", "Piemonte"]);
        for region in &result.regions {
            assert_eq!(region.fields.len(), COUNT_FIELDS.len());
        }
    }

    #[test]
    fn analyze_summarizes_each_region_separately() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 4);
        let result = StatsCalculator::analyze(&table).unwrap();

        // Veneto deceased (k = 7): 2007, 2017, 2027, 2037
        assert_eq!(result.value("Veneto", StatKind::Max, DECEASED), Some(2037.0));
        assert_eq!(result.value("Veneto", StatKind::Min, DECEASED), Some(2007.0));
        assert_eq!(result.value("Veneto", StatKind::Mean, DECEASED), Some(2022.0));
        let std = result.value("Veneto", StatKind::Std, DECEASED).unwrap();
        assert!((std - (500.0f64 / 3.0).sqrt()).abs() < 1e-9);

        assert_eq!(result.value("Lombardia", StatKind::Max, TESTS_PERFORMED), Some(1039.0));
    }

    #[test]
    fn analyze_is_deterministic() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 5);
        let first = StatsCalculator::analyze(&table).unwrap();
        let second = StatsCalculator::analyze(&table).unwrap();

        for (a, b) in first.regions.iter().zip(&second.regions) {
            for (fa, fb) in a.fields.iter().zip(&b.fields) {
                for kind in StatKind::ALL {
                    assert_eq!(fa.stats.get(kind).to_bits(), fb.stats.get(kind).to_bits());
                }
            }
        }
    }

    #[test]
    fn empty_table_cannot_be_analyzed() {
        let table = sample_table(&["Lombardia"], "2020-02-24", 0);
        assert!(matches!(
            StatsCalculator::analyze(&table),
            Err(StatsError::EmptyTable)
        ));
    }

    #[test]
    fn stat_kind_labels_round_trip() {
        for kind in StatKind::ALL {
            assert_eq!(StatKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(StatKind::from_label("mediana"), None);
    }
}
