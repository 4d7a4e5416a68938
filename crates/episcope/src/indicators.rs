//! World Bank per-country indicator loading.
//!
//! Each indicator is one folder as downloaded from data.worldbank.org: a
//! data CSV (name starts with `API`) and an indicator metadata CSV (name
//! starts with `Metadata_Indicator`). The loader picks the most recent year
//! with the widest coverage and exposes one scalar per region code.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn};

/// Number of preamble lines before the header row in the data CSV.
const DATA_PREAMBLE_LINES: usize = 4;

/// First data-year column in the data CSV (after name, code, indicator
/// name and indicator code).
const FIRST_YEAR_COLUMN: usize = 4;

/// One loaded indicator: identifier, display name, chosen reference year
/// and one optional value per region code.
#[derive(Debug, Clone)]
pub struct RegionIndicator {
    code: String,
    name: String,
    year: String,
    region_count: usize,
    values: HashMap<String, Option<f64>>,
}

impl RegionIndicator {
    /// Loads one indicator folder.
    pub fn load(dir: &Path) -> Result<Self> {
        let (data_file, metadata_file) = find_indicator_files(dir)?;

        let indicator_code;
        let mut indicator_name;
        {
            // Metadata: a single record with the indicator code and name
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .from_path(&metadata_file)
                .with_context(|| format!("Failed to open {}", metadata_file.display()))?;

            let headers = reader.headers()?.clone();
            let code_col = find_column(&headers, "INDICATOR_CODE")
                .with_context(|| format!("No INDICATOR_CODE column in {}", metadata_file.display()))?;
            let name_col = find_column(&headers, "INDICATOR_NAME")
                .with_context(|| format!("No INDICATOR_NAME column in {}", metadata_file.display()))?;

            let records: Vec<csv::StringRecord> =
                reader.records().collect::<std::result::Result<_, _>>()?;
            if records.len() != 1 {
                bail!(
                    "Expected exactly one metadata record in {}, found {}",
                    metadata_file.display(),
                    records.len()
                );
            }
            indicator_code = records[0]
                .get(code_col)
                .unwrap_or_default()
                .trim()
                .to_string();
            indicator_name = records[0]
                .get(name_col)
                .unwrap_or_default()
                .trim()
                .to_string();
        }
        indicator_name = transform_title(&indicator_code, indicator_name);

        // Data: skip the download preamble, then header + one row per region
        let raw = std::fs::read_to_string(&data_file)
            .with_context(|| format!("Failed to read {}", data_file.display()))?;
        let body: String = raw
            .lines()
            .skip(DATA_PREAMBLE_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());
        let headers = reader.headers()?.clone();
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>()?;

        // Choose the most recent year with the widest region coverage
        // (the trailing column is the download format's empty filler)
        let last_year_col = headers.len().saturating_sub(1);
        let mut best_count = 0usize;
        let mut best_col = None;
        for col in FIRST_YEAR_COLUMN..last_year_col {
            let count = rows
                .iter()
                .filter(|row| !row.get(col).unwrap_or_default().trim().is_empty())
                .count();
            if count >= best_count {
                best_count = count;
                best_col = Some(col);
            }
        }
        let Some(best_col) = best_col else {
            bail!("No data-year columns in {}", data_file.display());
        };
        if best_count == 0 {
            bail!("No populated data year in {}", data_file.display());
        }
        let year = headers.get(best_col).unwrap_or_default().to_string();

        let mut values = HashMap::new();
        for row in &rows {
            let region_code = row.get(1).unwrap_or_default().trim().to_string();
            if region_code.is_empty() {
                continue;
            }
            let cell = row.get(best_col).unwrap_or_default().trim();
            let value = if cell.is_empty() {
                None
            } else {
                let raw: f64 = cell.parse().with_context(|| {
                    format!("Bad value '{}' for {} in {}", cell, region_code, data_file.display())
                })?;
                transform_value(&indicator_code, raw)
            };
            values.insert(region_code, value);
        }

        let indicator = Self {
            code: indicator_code,
            name: format!("{} ({})", indicator_name, year),
            year,
            region_count: values.len(),
            values,
        };
        info!(
            "indicator {}: year={} regions={} populated={}",
            indicator.code, indicator.year, indicator.region_count, best_count
        );
        Ok(indicator)
    }

    pub fn id(&self) -> &str {
        &self.code
    }

    /// Display name, including the chosen reference year.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn region_count(&self) -> usize {
        self.region_count
    }

    /// The indicator value for a region; unknown regions and empty cells
    /// both read as missing.
    pub fn region_value(&self, region_code: &str) -> Option<f64> {
        self.values.get(region_code).copied().flatten()
    }
}

/// Loads every `API*` indicator folder under the reference data directory,
/// in lexical order so the factor order is reproducible.
pub fn load_all_indicators(ref_data_dir: &Path) -> Result<Vec<RegionIndicator>> {
    let mut dirs = Vec::new();
    let entries = std::fs::read_dir(ref_data_dir)
        .with_context(|| format!("Failed to list {}", ref_data_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && name.starts_with("API") {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut indicators = Vec::with_capacity(dirs.len());
    for dir in dirs {
        indicators.push(RegionIndicator::load(&dir)?);
    }
    Ok(indicators)
}

/// Locates the data and metadata CSVs inside an indicator folder.
fn find_indicator_files(dir: &Path) -> Result<(std::path::PathBuf, std::path::PathBuf)> {
    let mut data_file = None;
    let mut metadata_file = None;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list indicator folder {}", dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("API") {
            data_file = Some(entry.path());
        } else if name.starts_with("Metadata_Indicator") {
            metadata_file = Some(entry.path());
        }
    }
    match (data_file, metadata_file) {
        (Some(d), Some(m)) => Ok((d, m)),
        (None, _) => bail!("No API* data file in {}", dir.display()),
        (_, None) => bail!("No Metadata_Indicator* file in {}", dir.display()),
    }
}

/// Finds a column by header name, tolerating the BOM and stray quotes the
/// download format carries on the first header cell.
fn find_column(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    headers.iter().position(|h| {
        h.trim().trim_start_matches('\u{feff}').trim_matches('"') == wanted
    })
}

/// Per-indicator value tweak: a handful of skewed indicators are analyzed
/// on a log scale.
fn transform_value(code: &str, value: f64) -> Option<f64> {
    match code {
        "NY.GDP.PCAP.CD" | "EN.POP.DNST" => (value > 0.0).then(|| value.log10()),
        _ => Some(value),
    }
}

/// Per-indicator title tweak, mirroring `transform_value` plus one title
/// that is too long for an axis label.
fn transform_title(code: &str, title: String) -> String {
    match code {
        "NY.GDP.PCAP.CD" | "EN.POP.DNST" => format!("log10 {}", title),
        "EN.ATM.PM25.MC.M3" => "PM2.5 air poll., mean ann. exp. (micrograms per m3)".to_string(),
        _ => title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes one indicator folder in the World Bank download layout.
    pub(crate) fn write_indicator_fixture(
        root: &Path,
        code: &str,
        name: &str,
        rows: &[(&str, &str, &str, &str)], // (region name, code, 2018, 2019)
    ) -> PathBuf {
        let dir = root.join(format!("API_{}_DS2_en_csv_v2_12345", code));
        std::fs::create_dir_all(&dir).unwrap();

        let meta = format!(
            "\u{feff}\"INDICATOR_CODE\",\"INDICATOR_NAME\",\"SOURCE_NOTE\",\"SOURCE_ORGANIZATION\",\n\
             \"{}\",\"{}\",\"note\",\"org\",\n",
            code, name
        );
        std::fs::write(dir.join(format!("Metadata_Indicator_API_{}.csv", code)), meta).unwrap();

        let mut data = String::from(
            "\u{feff}\"Data Source\",\"World Development Indicators\",\n\
             \n\
             \"Last Updated Date\",\"2020-06-01\",\n\
             \n",
        );
        data.push_str("\"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2018\",\"2019\",\n");
        for (region, rcode, v2018, v2019) in rows {
            data.push_str(&format!(
                "\"{}\",\"{}\",\"{}\",\"{}\",{},{},\n",
                region, rcode, name, code, v2018, v2019
            ));
        }
        std::fs::write(dir.join(format!("API_{}_DS2_en_csv_v2_12345.csv", code)), data).unwrap();
        dir
    }

    #[test]
    fn test_load_picks_best_year() {
        let tmp = TempDir::new().unwrap();
        // 2019 has as many values as 2018, so the later year wins the tie
        let dir = write_indicator_fixture(
            tmp.path(),
            "SP.DYN.LE00.IN",
            "Life expectancy at birth, total (years)",
            &[
                ("Kenya", "KEN", "66.0", "66.5"),
                ("Angola", "AGO", "60.0", "60.7"),
                ("Aruba", "ABW", "76.0", ""),
            ],
        );

        let indicator = RegionIndicator::load(&dir).unwrap();
        assert_eq!(indicator.id(), "SP.DYN.LE00.IN");
        assert_eq!(indicator.year(), "2018");
        assert_eq!(indicator.region_count(), 3);
        assert_eq!(indicator.region_value("KEN"), Some(66.0));
        assert_eq!(indicator.region_value("ABW"), Some(76.0));
        assert_eq!(indicator.region_value("XXX"), None);
        // The display name carries the chosen year as a wrappable suffix
        assert!(indicator.name().ends_with(" (2018)"));
    }

    #[test]
    fn test_later_year_wins_tie() {
        let tmp = TempDir::new().unwrap();
        let dir = write_indicator_fixture(
            tmp.path(),
            "SH.MED.BEDS.ZS",
            "Hospital beds (per 1,000 people)",
            &[("Kenya", "KEN", "1.4", "1.5"), ("Angola", "AGO", "0.8", "0.9")],
        );

        let indicator = RegionIndicator::load(&dir).unwrap();
        assert_eq!(indicator.year(), "2019");
        assert_eq!(indicator.region_value("KEN"), Some(1.5));
    }

    #[test]
    fn test_log_transform_and_title_prefix() {
        let tmp = TempDir::new().unwrap();
        let dir = write_indicator_fixture(
            tmp.path(),
            "NY.GDP.PCAP.CD",
            "GDP per capita (current US$)",
            &[("Kenya", "KEN", "", "1000.0"), ("Angola", "AGO", "", "0.0")],
        );

        let indicator = RegionIndicator::load(&dir).unwrap();
        assert!(indicator.name().starts_with("log10 GDP per capita"));
        assert_eq!(indicator.region_value("KEN"), Some(3.0));
        // log10 of a non-positive value is missing, not an error
        assert_eq!(indicator.region_value("AGO"), None);
    }

    #[test]
    fn test_missing_metadata_file_fails() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("API_X_DS2");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("API_X_DS2.csv"), "x").unwrap();
        assert!(RegionIndicator::load(&dir).is_err());
    }

    #[test]
    fn test_load_all_in_lexical_order() {
        let tmp = TempDir::new().unwrap();
        write_indicator_fixture(tmp.path(), "ZZZ", "Z indicator", &[("K", "KEN", "1", "2")]);
        write_indicator_fixture(tmp.path(), "AAA", "A indicator", &[("K", "KEN", "3", "4")]);
        // Non-indicator folders are ignored
        std::fs::create_dir_all(tmp.path().join("notes")).unwrap();

        let indicators = load_all_indicators(tmp.path()).unwrap();
        assert_eq!(indicators.len(), 2);
        assert_eq!(indicators[0].id(), "AAA");
        assert_eq!(indicators[1].id(), "ZZZ");
    }
}
