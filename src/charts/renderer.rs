//! Chart Renderer Module
//! Builds the fixed set of figures drawn from the observation table.

use super::figure::{Figure, Plot, Series};
use super::series::{daily_sums, latest_snapshot, monthly_totals, RegionSnapshot};
use crate::data::table::*;
use crate::data::ObservationTable;
use plotters::drawing::DrawingAreaErrorKind;
use polars::prelude::PolarsError;
use thiserror::Error;
use tracing::debug;

/// Regions shown by the pie renderers.
const MOST_AFFECTED: usize = 3;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Not enough regions in the table: found {found}, need at least {required}")]
    InsufficientRegions { found: usize, required: usize },
    #[error("Cannot chart an empty table")]
    EmptyTable,
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Drawing error: {0}")]
    Drawing(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Drawing(err.to_string())
    }
}

/// The available renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Barh,
    Line,
    NewPositives,
    PositiveVariation,
    Pie,
    NestedPie,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::Bar,
        ChartKind::Barh,
        ChartKind::Line,
        ChartKind::NewPositives,
        ChartKind::PositiveVariation,
        ChartKind::Pie,
        ChartKind::NestedPie,
    ];
}

/// Renders the observation table as figures.
pub struct ChartRenderer;

impl ChartRenderer {
    /// Render `kind` from `table`.
    pub fn render(kind: ChartKind, table: &ObservationTable) -> Result<Figure, ChartError> {
        match kind {
            ChartKind::Bar => Self::bar(table),
            ChartKind::Barh => Self::barh(table),
            ChartKind::Line => Self::line(table),
            ChartKind::NewPositives => Self::line_new_positives(table),
            ChartKind::PositiveVariation => Self::line_total_positive_variation(table),
            ChartKind::Pie => Self::pie_three_most_affected_regions(table),
            ChartKind::NestedPie => Self::nested_pie_three_most_affected_regions(table),
        }
    }

    fn ensure_rows(table: &ObservationTable) -> Result<(), ChartError> {
        if table.is_empty() {
            return Err(ChartError::EmptyTable);
        }
        Ok(())
    }

    /// Deceased and total cases per month, as grouped bars.
    pub fn bar(table: &ObservationTable) -> Result<Figure, ChartError> {
        Self::ensure_rows(table)?;
        let months = monthly_totals(table)?;
        debug!(months = months.len(), "rendering monthly bars");

        Ok(Figure::new(
            "Deceduti e totale dei casi suddivisi per mese",
            Plot::GroupedBars {
                categories: months.iter().map(|m| m.label()).collect(),
                x_desc: "Mesi".to_string(),
                series: vec![
                    Series::new("Deceduti", months.iter().map(|m| m.deceased).collect()),
                    Series::new("Totale casi", months.iter().map(|m| m.total_cases).collect()),
                ],
            },
        ))
    }

    /// Latest total positive, recovered and deceased per region, stacked.
    pub fn barh(table: &ObservationTable) -> Result<Figure, ChartError> {
        Self::ensure_rows(table)?;
        let snapshot = latest_snapshot(table)?;

        Ok(Figure::new(
            "Situazione per regione",
            Plot::StackedBars {
                categories: snapshot.iter().map(|s| s.region.clone()).collect(),
                series: Self::component_series(&snapshot),
            },
        ))
    }

    /// Daily recovered, deceased and total positive over all regions.
    pub fn line(table: &ObservationTable) -> Result<Figure, ChartError> {
        Self::line_of(
            table,
            "Andamento giornaliero",
            &[RECOVERED, DECEASED, TOTAL_POSITIVE],
            false,
        )
    }

    pub fn line_new_positives(table: &ObservationTable) -> Result<Figure, ChartError> {
        Self::line_of(table, "Nuovi positivi", &[NEW_POSITIVE], false)
    }

    /// Daily variation of total positives, on a dark background.
    pub fn line_total_positive_variation(table: &ObservationTable) -> Result<Figure, ChartError> {
        Self::line_of(
            table,
            "Variazione totale positivi",
            &[TOTAL_POSITIVE_VARIATION],
            true,
        )
    }

    /// One pie per region among the three with the most cases.
    pub fn pie_three_most_affected_regions(table: &ObservationTable) -> Result<Figure, ChartError> {
        let top = Self::most_affected(table)?;

        let pies = top
            .iter()
            .map(|s| {
                Series::new(
                    s.region.clone(),
                    vec![s.total_positive, s.recovered, s.deceased],
                )
            })
            .collect();
        Ok(Figure::new(
            "Le tre regioni più colpite",
            Plot::Pies {
                slices: Self::component_labels(),
                pies,
            },
        ))
    }

    /// Total cases of the three most affected regions around their components.
    pub fn nested_pie_three_most_affected_regions(
        table: &ObservationTable,
    ) -> Result<Figure, ChartError> {
        let top = Self::most_affected(table)?;

        let inner = top
            .iter()
            .flat_map(|s| [s.total_positive, s.recovered, s.deceased])
            .collect();
        Ok(Figure::new(
            "Le tre regioni più colpite",
            Plot::NestedPie {
                outer: Series::new(TOTAL_CASES, top.iter().map(|s| s.total_cases).collect()),
                outer_labels: top.iter().map(|s| s.region.clone()).collect(),
                inner_labels: Self::component_labels(),
                inner,
            },
        ))
    }

    fn line_of(
        table: &ObservationTable,
        title: &str,
        columns: &[&str],
        dark: bool,
    ) -> Result<Figure, ChartError> {
        Self::ensure_rows(table)?;
        let sums = daily_sums(table, columns)?;

        Ok(Figure::new(
            title,
            Plot::Lines {
                dates: sums.dates,
                series: sums
                    .columns
                    .into_iter()
                    .map(|(name, values)| Series::new(name, values))
                    .collect(),
                dark,
            },
        ))
    }

    /// Latest snapshot of the top regions by total cases.
    fn most_affected(table: &ObservationTable) -> Result<Vec<RegionSnapshot>, ChartError> {
        Self::ensure_rows(table)?;
        let found = table.regions()?.len();
        if found < MOST_AFFECTED {
            return Err(ChartError::InsufficientRegions {
                found,
                required: MOST_AFFECTED,
            });
        }

        let mut snapshot = latest_snapshot(table)?;
        snapshot.truncate(MOST_AFFECTED);
        Ok(snapshot)
    }

    fn component_labels() -> Vec<String> {
        [TOTAL_POSITIVE, RECOVERED, DECEASED]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn component_series(snapshot: &[RegionSnapshot]) -> Vec<Series> {
        vec![
            Series::new(
                TOTAL_POSITIVE,
                snapshot.iter().map(|s| s.total_positive).collect(),
            ),
            Series::new(RECOVERED, snapshot.iter().map(|s| s.recovered).collect()),
            Series::new(DECEASED, snapshot.iter().map(|s| s.deceased).collect()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_table;

    const THREE: [&str; 3] = ["Lombardia", "Veneto", "Piemonte"];

    #[test]
    fn pie_needs_three_regions() {
        let table = sample_table(&THREE, "2020-02-24", 4);
        let figure = ChartRenderer::pie_three_most_affected_regions(&table).unwrap();

        match figure.plot {
            Plot::Pies { slices, pies } => {
                assert_eq!(slices.len(), 3);
                let names: Vec<&str> = pies.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["Piemonte", "Veneto", "Lombardia"]);
            }
            other => panic!("unexpected plot: {other:?}"),
        }
    }

    #[test]
    fn pies_fail_with_two_regions() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 4);

        for result in [
            ChartRenderer::pie_three_most_affected_regions(&table),
            ChartRenderer::nested_pie_three_most_affected_regions(&table),
        ] {
            assert!(matches!(
                result,
                Err(ChartError::InsufficientRegions {
                    found: 2,
                    required: 3
                })
            ));
        }
    }

    #[test]
    fn nested_pie_splits_each_region_in_three() {
        let table = sample_table(&THREE, "2020-02-24", 2);
        let figure = ChartRenderer::nested_pie_three_most_affected_regions(&table).unwrap();

        match figure.plot {
            Plot::NestedPie {
                outer,
                outer_labels,
                inner_labels,
                inner,
            } => {
                assert_eq!(outer.values.len(), 3);
                assert_eq!(outer_labels[0], "Piemonte");
                assert_eq!(inner_labels.len(), 3);
                assert_eq!(inner.len(), 9);
                // Piemonte on day 1: totale_positivi k = 4
                assert_eq!(inner[0], 3014.0);
            }
            other => panic!("unexpected plot: {other:?}"),
        }
    }

    #[test]
    fn every_renderer_rejects_an_empty_table() {
        let table = sample_table(&THREE, "2020-02-24", 0);
        for kind in ChartKind::ALL {
            assert!(matches!(
                ChartRenderer::render(kind, &table),
                Err(ChartError::EmptyTable)
            ));
        }
    }

    #[test]
    fn line_variation_is_dark() {
        let table = sample_table(&THREE, "2020-02-24", 3);
        let figure = ChartRenderer::line_total_positive_variation(&table).unwrap();

        match figure.plot {
            Plot::Lines {
                dates,
                series,
                dark,
            } => {
                assert!(dark);
                assert_eq!(dates.len(), 3);
                assert_eq!(series[0].name, TOTAL_POSITIVE_VARIATION);
                // first day of every region has no previous value
                assert_eq!(series[0].values[0], 0.0);
                assert_eq!(series[0].values[1], 30.0);
            }
            other => panic!("unexpected plot: {other:?}"),
        }
    }

    #[test]
    fn bar_groups_by_month() {
        let table = sample_table(&THREE, "2020-02-27", 5);
        let figure = ChartRenderer::bar(&table).unwrap();

        match figure.plot {
            Plot::GroupedBars {
                categories, series, ..
            } => {
                assert_eq!(categories, vec!["02/2020", "03/2020"]);
                assert_eq!(series.len(), 2);
                assert_eq!(series[0].name, "Deceduti");
            }
            other => panic!("unexpected plot: {other:?}"),
        }
    }
}
