//! Chart series preparation: reshapes the observation table into the small
//! summaries the renderers plot.

use crate::data::table::*;
use crate::data::ObservationTable;
use chrono::{Datelike, NaiveDate};
use polars::prelude::PolarsResult;
use std::collections::{BTreeMap, HashMap};

/// Deceased and total cases that occurred within one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotals {
    pub year: i32,
    pub month: u32,
    pub deceased: f64,
    pub total_cases: f64,
}

impl MonthlyTotals {
    pub fn label(&self) -> String {
        format!("{:02}/{}", self.month, self.year)
    }
}

/// Cumulative counts of one region on the latest date.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSnapshot {
    pub region: String,
    pub total_positive: f64,
    pub recovered: f64,
    pub deceased: f64,
    pub total_cases: f64,
}

/// Per-date sums over all regions of a set of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySums {
    pub dates: Vec<NaiveDate>,
    /// One (column, values) pair per requested column, values aligned with `dates`.
    pub columns: Vec<(String, Vec<f64>)>,
}

fn values(table: &ObservationTable, column: &str) -> PolarsResult<Vec<f64>> {
    Ok(table
        .numeric(column)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect())
}

/// Month-by-month deceased and total cases.
///
/// Both columns are cumulative, so each region contributes its monthly
/// maximum, regions are summed, and every month after the first is reduced
/// by the previous month's total.
pub fn monthly_totals(table: &ObservationTable) -> PolarsResult<Vec<MonthlyTotals>> {
    let dates = table.dates()?;
    let regions = table.region_column()?;
    let deceased = values(table, DECEASED)?;
    let total_cases = values(table, TOTAL_CASES)?;

    let mut per_month: BTreeMap<(i32, u32), HashMap<&str, (f64, f64)>> = BTreeMap::new();
    for i in 0..dates.len() {
        let entry = per_month
            .entry((dates[i].year(), dates[i].month()))
            .or_default()
            .entry(regions[i].as_str())
            .or_insert((f64::MIN, f64::MIN));
        entry.0 = entry.0.max(deceased[i]);
        entry.1 = entry.1.max(total_cases[i]);
    }

    let mut previous: Option<(f64, f64)> = None;
    Ok(per_month
        .into_iter()
        .map(|((year, month), by_region)| {
            let cumulative = by_region
                .values()
                .fold((0.0, 0.0), |acc, v| (acc.0 + v.0, acc.1 + v.1));
            let (deceased, total_cases) = match previous {
                Some(prev) => (cumulative.0 - prev.0, cumulative.1 - prev.1),
                None => cumulative,
            };
            previous = Some(cumulative);
            MonthlyTotals {
                year,
                month,
                deceased,
                total_cases,
            }
        })
        .collect())
}

/// Rows of the latest date, ordered by total cases, highest first.
pub fn latest_snapshot(table: &ObservationTable) -> PolarsResult<Vec<RegionSnapshot>> {
    let dates = table.dates()?;
    let Some(&latest) = dates.iter().max() else {
        return Ok(Vec::new());
    };
    let regions = table.region_column()?;
    let total_positive = values(table, TOTAL_POSITIVE)?;
    let recovered = values(table, RECOVERED)?;
    let deceased = values(table, DECEASED)?;
    let total_cases = values(table, TOTAL_CASES)?;

    let mut snapshot: Vec<RegionSnapshot> = (0..dates.len())
        .filter(|&i| dates[i] == latest)
        .map(|i| RegionSnapshot {
            region: regions[i].clone(),
            total_positive: total_positive[i],
            recovered: recovered[i],
            deceased: deceased[i],
            total_cases: total_cases[i],
        })
        .collect();
    snapshot.sort_by(|a, b| b.total_cases.total_cmp(&a.total_cases));
    Ok(snapshot)
}

/// Sum `columns` over all regions for each date, dates ascending.
pub fn daily_sums(table: &ObservationTable, columns: &[&str]) -> PolarsResult<DailySums> {
    let dates = table.dates()?;
    let series = columns
        .iter()
        .map(|c| values(table, c))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut sums: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (i, date) in dates.iter().enumerate() {
        let row = sums
            .entry(*date)
            .or_insert_with(|| vec![0.0; columns.len()]);
        for (sum, values) in row.iter_mut().zip(&series) {
            *sum += values[i];
        }
    }

    let dates: Vec<NaiveDate> = sums.keys().copied().collect();
    let columns = columns
        .iter()
        .enumerate()
        .map(|(j, name)| (name.to_string(), sums.values().map(|row| row[j]).collect()))
        .collect();
    Ok(DailySums { dates, columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_table;

    #[test]
    fn monthly_totals_are_differenced() {
        // 27/02 .. 02/03: February days d = 0..=2, March days d = 3..=4.
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-27", 5);
        let months = monthly_totals(&table).unwrap();

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].label(), "02/2020");
        // deceased k = 7: Lombardia 1027 + Veneto 2027 at d = 2
        assert_eq!(months[0].deceased, 3054.0);
        // March cumulative at d = 4: 1047 + 2047 = 3094
        assert_eq!(months[1].deceased, 40.0);
        assert_eq!(months[1].total_cases, 40.0);
    }

    #[test]
    fn snapshot_uses_latest_date_sorted_by_cases() {
        let table = sample_table(&["Lombardia", "Veneto", "Piemonte"], "2020-02-24", 3);
        let snapshot = latest_snapshot(&table).unwrap();

        let names: Vec<&str> = snapshot.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(names, vec!["Piemonte", "Veneto", "Lombardia"]);
        // Piemonte r = 2, d = 2, totale_casi k = 8
        assert_eq!(snapshot[0].total_cases, 3028.0);
    }

    #[test]
    fn daily_sums_add_regions_together() {
        let table = sample_table(&["Lombardia", "Veneto"], "2020-02-24", 2);
        let sums = daily_sums(&table, &[NEW_POSITIVE]).unwrap();

        assert_eq!(sums.dates.len(), 2);
        // nuovi_positivi k = 5: day 0 -> 1005 + 2005, day 1 -> 1015 + 2015
        assert_eq!(sums.columns[0].1, vec![3010.0, 3030.0]);
    }
}
