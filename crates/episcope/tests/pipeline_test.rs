//! End-to-end pipeline test: synthetic daily data plus two indicator
//! folders in, a rendered SVG gallery out.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use episcope::{
    all_metrics, calc_all_metrics, load_all_indicators, render_gallery, AnalysisConfig,
    ChartOptions, CorrelationFactor, CorrelationGallery, WorldEpiData,
};

const EPI_HEADER: &str = "dateRep,day,month,year,cases,deaths,countriesAndTerritories,geoId,countryterritoryCode,popData2019,continentExp\n";

fn write_epi_csv(dir: &Path) -> PathBuf {
    let path = dir.join("epi.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(EPI_HEADER.as_bytes()).unwrap();

    // Ten days for four countries, with case loads roughly tracking the
    // indicator values written below so the correlations are informative
    let countries = [
        ("Kenya", "KE", "KEN", 52_000_000i64, "Africa", 40i64),
        ("Angola", "AO", "AGO", 31_000_000, "Africa", 25),
        ("France", "FR", "FRA", 67_000_000, "Europe", 90),
        ("Chile", "CL", "CHL", 19_000_000, "America", 60),
    ];
    for day in 1..=10u32 {
        for (name, geo, code, population, continent, daily_cases) in &countries {
            let cases = daily_cases + day as i64;
            let deaths = cases / 10;
            writeln!(
                file,
                "{:02}/03/2020,{},3,2020,{},{},{},{},{},{},{}",
                day, day, cases, deaths, name, geo, code, population, continent
            )
            .unwrap();
        }
    }
    path
}

fn write_indicator(root: &Path, code: &str, name: &str, values: &[(&str, f64)]) {
    let dir = root.join(format!("API_{}_DS2_en_csv_v2_1", code));
    std::fs::create_dir_all(&dir).unwrap();

    let meta = format!(
        "\u{feff}\"INDICATOR_CODE\",\"INDICATOR_NAME\",\"SOURCE_NOTE\",\"SOURCE_ORGANIZATION\",\n\
         \"{}\",\"{}\",\"note\",\"org\",\n",
        code, name
    );
    std::fs::write(dir.join("Metadata_Indicator_API.csv"), meta).unwrap();

    let mut data = String::from(
        "\u{feff}\"Data Source\",\"World Development Indicators\",\n\
         \n\
         \"Last Updated Date\",\"2020-06-01\",\n\
         \n\
         \"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2019\",\n",
    );
    for (region, value) in values {
        data.push_str(&format!(
            "\"{}\",\"{}\",\"{}\",\"{}\",{},\n",
            region, region, name, code, value
        ));
    }
    std::fs::write(dir.join(format!("API_{}_DS2_en_csv_v2_1.csv", code)), data).unwrap();
}

#[test]
fn test_full_pipeline_renders_gallery() {
    let tmp = TempDir::new().unwrap();
    let epi_csv = write_epi_csv(tmp.path());

    let ref_dir = tmp.path().join("ref_data");
    std::fs::create_dir_all(&ref_dir).unwrap();
    write_indicator(
        &ref_dir,
        "SP.DYN.LE00.IN",
        "Life expectancy at birth, total (years)",
        &[("KEN", 66.5), ("AGO", 60.7), ("FRA", 82.5), ("CHL", 80.0)],
    );
    write_indicator(
        &ref_dir,
        "SP.POP.65UP.TO.ZS",
        "Population ages 65 and above (% of total)",
        &[("KEN", 2.3), ("AGO", 2.2), ("FRA", 20.4), ("CHL", 11.9)],
    );

    let mut world = WorldEpiData::load(&epi_csv).unwrap();
    world.filter_min_population(1_000_000.0);
    assert_eq!(world.countries().len(), 4);
    calc_all_metrics(&mut world);

    let indicators = load_all_indicators(&ref_dir).unwrap();
    assert_eq!(indicators.len(), 2);

    let metrics = all_metrics();
    let max_population = world.max_population().unwrap();

    let mut gallery = CorrelationGallery::new();
    for indicator in &indicators {
        gallery
            .add_factor_x(CorrelationFactor::new(indicator.id(), indicator.name()))
            .unwrap();
    }
    for metric in &metrics {
        gallery
            .add_factor_y(CorrelationFactor::new(metric.id(), metric.description()))
            .unwrap();
    }
    for country in world.countries() {
        let size_fraction = country.population().map_or(0.0, |p| p / max_population);
        gallery
            .add_data_point(country.code(), country.name(), size_fraction, country.continent())
            .unwrap();
        for indicator in &indicators {
            gallery
                .set_value_x(country.code(), indicator.id(), indicator.region_value(country.code()))
                .unwrap();
        }
        for metric in &metrics {
            gallery
                .set_value_y(country.code(), metric.id(), country.metric(metric.id()))
                .unwrap();
        }
    }

    gallery.compute_correlations().unwrap();
    gallery.sort_factors_x_by_significance("TotCasesFrac").unwrap();

    // Every cell has a correlation over the four complete countries
    for ix in 0..gallery.factors_x().len() {
        for iy in 0..gallery.factors_y().len() {
            let corr = gallery.correlation(ix, iy).unwrap();
            assert!(!corr.is_degenerate(), "cell ({}, {}) degenerate", ix, iy);
            assert!(corr.r().abs() <= 1.0);
        }
    }

    let output = tmp.path().join("gallery.svg");
    render_gallery(&gallery, &output, &ChartOptions::default()).unwrap();

    let svg = std::fs::read_to_string(&output).unwrap();
    assert!(svg.contains("<svg"));
    // Axis labels for both grids of factors made it into the figure
    assert!(svg.contains("Life expectancy"));
    assert!(svg.contains("Total cases"));

    // The run manifest lands next to the figure and round-trips
    let config = AnalysisConfig {
        epi_csv,
        ref_data_dir: ref_dir,
        output,
        min_population: Some(1_000_000.0),
        ..Default::default()
    };
    config.save(&config.manifest_path()).unwrap();
    let loaded = AnalysisConfig::load(&config.manifest_path()).unwrap();
    assert_eq!(loaded.min_population, Some(1_000_000.0));
}

#[test]
fn test_pipeline_with_missing_indicator_values() {
    let tmp = TempDir::new().unwrap();
    let epi_csv = write_epi_csv(tmp.path());

    let ref_dir = tmp.path().join("ref_data");
    std::fs::create_dir_all(&ref_dir).unwrap();
    // Only two of the four countries have a value for this indicator
    write_indicator(
        &ref_dir,
        "SH.MED.BEDS.ZS",
        "Hospital beds (per 1,000 people)",
        &[("KEN", 1.4), ("FRA", 5.9)],
    );

    let mut world = WorldEpiData::load(&epi_csv).unwrap();
    calc_all_metrics(&mut world);
    let indicators = load_all_indicators(&ref_dir).unwrap();

    let mut gallery = CorrelationGallery::new();
    let indicator = &indicators[0];
    gallery
        .add_factor_x(CorrelationFactor::new(indicator.id(), indicator.name()))
        .unwrap();
    gallery
        .add_factor_y(CorrelationFactor::new("TotCasesFrac", "Total cases (population %, log10)"))
        .unwrap();

    let max_population = world.max_population().unwrap();
    for country in world.countries() {
        let size_fraction = country.population().map_or(0.0, |p| p / max_population);
        gallery
            .add_data_point(country.code(), country.name(), size_fraction, country.continent())
            .unwrap();
        gallery
            .set_value_x(country.code(), indicator.id(), indicator.region_value(country.code()))
            .unwrap();
        gallery
            .set_value_y(country.code(), "TotCasesFrac", country.metric("TotCasesFrac"))
            .unwrap();
    }

    gallery.compute_correlations().unwrap();
    // Two complete pairs: the correlation exists but its p-value is 1
    let corr = gallery.correlation(0, 0).unwrap();
    assert!(!corr.is_degenerate());
    assert_eq!(corr.p(), 1.0);

    let output = tmp.path().join("gallery.svg");
    render_gallery(&gallery, &output, &ChartOptions::default()).unwrap();
    assert!(output.exists());
}
