//! Data module - dataset download, loading and subsetting

mod download;
mod loader;
mod subset;
pub mod table;

pub use download::{download_covid_dataset, extract_region_csv, DownloadError, KaggleCredentials};
pub use loader::{DataLoader, LoaderError, DEFAULT_DATASET_NAME};
pub use subset::{
    subset_by_month, subset_by_period, subset_by_region, SubsetError, ITALIAN_MONTHS,
};
pub use table::{ObservationTable, COUNT_FIELDS};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{DataLoader, ObservationTable};
    use chrono::{Duration, NaiveDate};

    pub const HEADER: &str = "sno,data,stato,codice_regione,denominazione_regione,lat,long,\
ricoverati_con_sintomi,terapia_intensiva,totale_ospedalizzati,isolamento_domiciliare,\
totale_positivi,nuovi_positivi,dimessi_guariti,deceduti,totale_casi,casi_testati";

    /// `days` consecutive dates from `start` (yyyy-mm-dd), every region on
    /// every date. Count field `k` of region `r` on day `d` is
    /// `(r + 1) * 1000 + d * 10 + k`.
    pub fn sample_csv(regions: &[&str], start: &str, days: usize) -> String {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        let mut csv = String::from(HEADER);
        let mut sno = 0;
        for d in 0..days {
            let date = start + Duration::days(d as i64);
            for (r, region) in regions.iter().enumerate() {
                let counts: Vec<String> = (0..10)
                    .map(|k| ((r + 1) * 1000 + d * 10 + k).to_string())
                    .collect();
                csv.push_str(&format!(
                    "\n{sno},{}T18:00:00,ITA,{r},{region},45.0,9.0,{}",
                    date.format("%Y-%m-%d"),
                    counts.join(",")
                ));
                sno += 1;
            }
        }
        csv.push('\n');
        csv
    }

    pub fn sample_table(regions: &[&str], start: &str, days: usize) -> ObservationTable {
        DataLoader::parse_csv(sample_csv(regions, start, days).as_bytes()).unwrap()
    }
}
