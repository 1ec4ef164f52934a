//! Subsetting Filters
//! Pure filters over the observation table by region, month and period.

use super::table::{ObservationTable, REGION};
use crate::util::capitalize;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Italian month names, January first.
pub const ITALIAN_MONTHS: [&str; 12] = [
    "Gennaio",
    "Febbraio",
    "Marzo",
    "Aprile",
    "Maggio",
    "Giugno",
    "Luglio",
    "Agosto",
    "Settembre",
    "Ottobre",
    "Novembre",
    "Dicembre",
];

/// Format of period bounds, e.g. `25/02/2020`.
pub const PERIOD_FORMAT: &str = "%d/%m/%Y";

#[derive(Error, Debug)]
pub enum SubsetError {
    #[error("Unknown region {region:?}; valid names are: {}", .available.join(", "))]
    UnknownRegion {
        region: String,
        available: Vec<String>,
    },
    #[error("Unknown month {0:?}; use the Italian month names")]
    UnknownMonth(String),
    #[error("Invalid date {0:?}; expected dd/mm/yyyy")]
    InvalidDate(String),
    #[error("Period out of range; choose dates between {} and {}", .min.format(PERIOD_FORMAT), .max.format(PERIOD_FORMAT))]
    OutOfRangePeriod { min: NaiveDate, max: NaiveDate },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Keep the rows of the given regions. Names are capitalized before lookup.
pub fn subset_by_region<S: AsRef<str>>(
    table: &ObservationTable,
    regions: &[S],
) -> Result<ObservationTable, SubsetError> {
    let requested: Vec<String> = regions.iter().map(|r| capitalize(r.as_ref())).collect();
    let available = table.regions()?;

    if let Some(missing) = requested.iter().find(|r| !available.contains(r)) {
        return Err(SubsetError::UnknownRegion {
            region: missing.clone(),
            available,
        });
    }

    let predicate = requested
        .iter()
        .fold(lit(false), |acc, region| {
            acc.or(col(REGION).eq(lit(region.as_str())))
        });
    let df = table.dataframe().clone().lazy().filter(predicate).collect()?;
    debug!(regions = ?requested, rows = df.height(), "subset by region");

    Ok(ObservationTable::from_dataframe(df))
}

/// Keep the rows whose date falls in one of the given months (any year).
pub fn subset_by_month<S: AsRef<str>>(
    table: &ObservationTable,
    months: &[S],
) -> Result<ObservationTable, SubsetError> {
    let mut wanted = [false; 12];
    for month in months {
        let name = capitalize(month.as_ref());
        let idx = ITALIAN_MONTHS
            .iter()
            .position(|m| *m == name)
            .ok_or(SubsetError::UnknownMonth(name))?;
        wanted[idx] = true;
    }

    let mask: Vec<bool> = table
        .dates()?
        .iter()
        .map(|d| wanted[d.month0() as usize])
        .collect();
    let subset = table.filter_rows(&mask)?;
    debug!(rows = subset.height(), "subset by month");

    Ok(subset)
}

/// Keep the rows between `start` and `end` inclusive, both `dd/mm/yyyy`.
///
/// The bounds must lie inside the table's own date span.
pub fn subset_by_period(
    table: &ObservationTable,
    start: &str,
    end: &str,
) -> Result<ObservationTable, SubsetError> {
    let start = parse_period_date(start)?;
    let end = parse_period_date(end)?;

    let dates = table.dates()?;
    let (Some(&min), Some(&max)) = (dates.iter().min(), dates.iter().max()) else {
        return Ok(table.clone());
    };
    if start < min || end > max {
        return Err(SubsetError::OutOfRangePeriod { min, max });
    }

    let mask: Vec<bool> = dates.iter().map(|d| (start..=end).contains(d)).collect();
    let subset = table.filter_rows(&mask)?;
    debug!(%start, %end, rows = subset.height(), "subset by period");

    Ok(subset)
}

fn parse_period_date(value: &str) -> Result<NaiveDate, SubsetError> {
    NaiveDate::parse_from_str(value.trim(), PERIOD_FORMAT)
        .map_err(|_| SubsetError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_table;
    use rstest::rstest;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn region_filter_is_case_insensitive() {
        let table = sample_table(&["Lombardia", "Veneto", "Piemonte"], "2020-02-24", 4);
        let subset = subset_by_region(&table, &["veneto", "PIEMONTE"]).unwrap();

        assert_eq!(subset.height(), 8);
        assert_eq!(subset.regions().unwrap(), vec!["Veneto", "Piemonte"]);
    }

    #[test]
    fn unknown_region_lists_valid_names() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 1);
        let err = subset_by_region(&table, &["Veneto", "Atlantide"]).unwrap_err();

        match err {
            SubsetError::UnknownRegion { region, available } => {
                assert_eq!(region, "Atlantide");
                assert_eq!(available, vec!["Lombardia", "Veneto"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn month_filter_uses_italian_names() {
        let table = sample_table(&["Lombardia"], "2020-02-27", 5);
        let march = subset_by_month(&table, &["marzo"]).unwrap();
        assert_eq!(march.height(), 2);
        assert!(march.dates().unwrap().iter().all(|d| d.month() == 3));

        let both = subset_by_month(&table, &["Febbraio", "MARZO"]).unwrap();
        assert_eq!(both.height(), 5);
    }

    #[rstest]
    #[case("March")]
    #[case("Marz")]
    #[case("")]
    fn unknown_month_is_rejected(#[case] month: &str) {
        let table = sample_table(&["Lombardia"], "2020-02-27", 2);
        let err = subset_by_month(&table, &[month]).unwrap_err();
        assert!(matches!(err, SubsetError::UnknownMonth(_)));
    }

    #[test]
    fn period_filter_is_inclusive() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 4);
        let subset = subset_by_period(&table, "25/02/2020", "26/02/2020").unwrap();

        assert_eq!(subset.height(), 4);
        assert_eq!(
            subset.date_span().unwrap(),
            Some((date(25, 2, 2020), date(26, 2, 2020)))
        );
    }

    #[rstest]
    #[case("23/02/2020", "26/02/2020")]
    #[case("24/02/2020", "28/02/2020")]
    fn period_outside_span_is_rejected(#[case] start: &str, #[case] end: &str) {
        let table = sample_table(&["Lombardia"], "2020-02-24", 4);
        let err = subset_by_period(&table, start, end).unwrap_err();

        match err {
            SubsetError::OutOfRangePeriod { min, max } => {
                assert_eq!(min, date(24, 2, 2020));
                assert_eq!(max, date(27, 2, 2020));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_period_date_is_rejected() {
        let table = sample_table(&["Lombardia"], "2020-02-24", 2);
        let err = subset_by_period(&table, "2020-02-24", "25/02/2020").unwrap_err();
        assert!(matches!(err, SubsetError::InvalidDate(_)));
    }

    #[test]
    fn filters_leave_the_source_table_untouched() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 3);
        let _ = subset_by_region(&table, &["Veneto"]).unwrap();
        let _ = subset_by_period(&table, "24/02/2020", "24/02/2020").unwrap();
        assert_eq!(table.height(), 6);
    }
}
