use itacovid::charts::{ChartKind, ChartRenderer, Plot};
use itacovid::data::{subset_by_month, subset_by_period, subset_by_region, DataLoader, SubsetError};
use itacovid::results::{ResultsLocation, ResultsStore, StoreError};
use itacovid::stats::{StatKind, StatsCalculator};
use itacovid::ChartError;
use rstest::rstest;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "sno,data,stato,codice_regione,denominazione_regione,lat,long,\
ricoverati_con_sintomi,terapia_intensiva,totale_ospedalizzati,isolamento_domiciliare,\
totale_positivi,nuovi_positivi,dimessi_guariti,deceduti,totale_casi,casi_testati";

/// Four days from 24/02/2020 for each region; region `r` on day `d` has
/// every count equal to `(r + 1) * 100 + d`. Region names are lower-case
/// the way some exports write them.
fn write_dataset(dir: &Path, regions: &[&str]) {
    let mut csv = String::from(HEADER);
    let mut sno = 0;
    for d in 0..4 {
        for (r, region) in regions.iter().enumerate() {
            let value = (r + 1) * 100 + d;
            let counts = vec![value.to_string(); 10].join(",");
            csv.push_str(&format!(
                "\n{sno},2020-02-{}T18:00:00,ITA,{r},{},45.46,9.19,{counts}",
                24 + d,
                region.to_lowercase()
            ));
            sno += 1;
        }
    }
    csv.push('\n');
    std::fs::write(dir.join("covid19_italy_region.csv"), csv).unwrap();
}

#[test]
fn three_region_dataset_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &["Lombardia", "Veneto", "Piemonte"]);

    let table = DataLoader::read_covid_dataset(Some(dir.path()), None).unwrap();
    assert_eq!(table.height(), 12);
    assert_eq!(
        table.regions().unwrap(),
        vec!["Lombardia", "Veneto", "Piemonte"]
    );

    let aggregate = StatsCalculator::analyze(&table).unwrap();
    assert_eq!(aggregate.period, "27/02/2020 - 24/02/2020");
    assert_eq!(
        aggregate.value("Veneto", StatKind::Mean, "deceduti"),
        Some(201.5)
    );

    assert!(ChartRenderer::pie_three_most_affected_regions(&table).is_ok());
    let two = subset_by_region(&table, &["lombardia", "VENETO"]).unwrap();
    assert!(matches!(
        ChartRenderer::render(ChartKind::Pie, &two),
        Err(ChartError::InsufficientRegions { found: 2, .. })
    ));
}

#[test]
fn saved_runs_round_trip_and_reject_duplicates() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &["Lombardia", "Veneto"]);
    let table = DataLoader::read_covid_dataset(Some(dir.path()), None).unwrap();
    let aggregate = StatsCalculator::analyze(&table).unwrap();

    let store = ResultsStore::new(ResultsLocation::new(dir.path(), "risultati"));
    assert_eq!(store.save(&aggregate, Some("prima")).unwrap(), "prima");

    let before = std::fs::read(store.location().file_path()).unwrap();
    assert!(matches!(
        store.save(&aggregate, Some("prima")),
        Err(StoreError::DuplicateRunLabel(label)) if label == "prima"
    ));
    assert_eq!(std::fs::read(store.location().file_path()).unwrap(), before);

    let february = subset_by_period(&table, "25/02/2020", "26/02/2020").unwrap();
    let second = StatsCalculator::analyze(&february).unwrap();
    store.save(&second, Some("seconda")).unwrap();

    let results = store.load().unwrap();
    assert_eq!(results.run_labels(), vec!["prima", "seconda"]);
    assert_eq!(results.len(), 4);

    let restored = results.to_aggregate("seconda").unwrap();
    assert_eq!(restored.period, "26/02/2020 - 25/02/2020");
    for region in &second.regions {
        for field in &region.fields {
            for kind in StatKind::ALL {
                let stored = restored.value(&region.region, kind, &field.field).unwrap();
                let expected = field.stats.get(kind);
                assert!((stored - expected).abs() < 1e-9);
            }
        }
    }
}

#[rstest]
#[case("25/02/2020", "26/02/2020", 4)]
#[case("24/02/2020", "27/02/2020", 8)]
#[case("26/02/2020", "26/02/2020", 2)]
fn period_subset_is_inclusive(#[case] start: &str, #[case] end: &str, #[case] rows: usize) {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &["Lombardia", "Veneto"]);
    let table = DataLoader::read_covid_dataset(Some(dir.path()), None).unwrap();

    assert_eq!(subset_by_period(&table, start, end).unwrap().height(), rows);
}

#[test]
fn subsets_validate_their_arguments() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &["Lombardia", "Veneto"]);
    let table = DataLoader::read_covid_dataset(Some(dir.path()), None).unwrap();

    assert!(matches!(
        subset_by_region(&table, &["Atlantide"]),
        Err(SubsetError::UnknownRegion { .. })
    ));
    assert!(matches!(
        subset_by_period(&table, "01/01/2020", "26/02/2020"),
        Err(SubsetError::OutOfRangePeriod { .. })
    ));
    assert!(matches!(
        subset_by_month(&table, &["Brumaio"]),
        Err(SubsetError::UnknownMonth(_))
    ));
    assert_eq!(subset_by_month(&table, &["febbraio"]).unwrap().height(), 8);
    assert!(subset_by_month(&table, &["Marzo"]).unwrap().is_empty());
}

#[test]
fn charts_cover_every_kind() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &["Lombardia", "Veneto", "Piemonte"]);
    let table = DataLoader::read_covid_dataset(Some(dir.path()), None).unwrap();

    let barh = ChartRenderer::barh(&table).unwrap();
    match barh.plot {
        Plot::StackedBars { categories, series } => {
            assert_eq!(categories, vec!["Piemonte", "Veneto", "Lombardia"]);
            assert_eq!(series.len(), 3);
        }
        other => panic!("unexpected plot: {other:?}"),
    }

    let line = ChartRenderer::line(&table).unwrap();
    match line.plot {
        Plot::Lines { dates, series, dark } => {
            assert!(!dark);
            assert_eq!(dates.len(), 4);
            // dimessi_guariti on day 0: 100 + 200 + 300
            assert_eq!(series[0].values[0], 600.0);
        }
        other => panic!("unexpected plot: {other:?}"),
    }
}
