//! Configuration structures for the analysis pipeline

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rendering options for the correlation gallery figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartOptions {
    /// Annotate each scatter point with the data point's display name
    pub show_point_labels: bool,

    /// Shade cell backgrounds along the significance heat ramp
    pub color_cells_by_significance: bool,

    /// Figure width (px)
    pub width: u32,

    /// Figure height (px)
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            show_point_labels: false,
            color_cells_by_significance: true,
            width: 1600,
            height: 1000,
        }
    }
}

/// Main analysis configuration: input locations, country filters, factor
/// ordering and chart options. Saved next to the rendered figure as a run
/// manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Worldwide daily cases/deaths CSV (ECDC download format)
    pub epi_csv: PathBuf,

    /// Directory holding World Bank indicator folders (one `API*` folder
    /// per indicator, as downloaded from data.worldbank.org)
    pub ref_data_dir: PathBuf,

    /// Output SVG path
    pub output: PathBuf,

    /// Keep only countries on this continent
    pub continent: Option<String>,

    /// Drop countries below this population size
    pub min_population: Option<f64>,

    /// Drop countries below this total case count
    pub min_total_cases: Option<i64>,

    /// Metric id used to order indicator columns by significance;
    /// `None` keeps insertion order
    pub sort_by_metric: Option<String>,

    /// Chart rendering options
    pub chart: ChartOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epi_csv: PathBuf::from("data/COVID-19_cases_worldwide.csv"),
            ref_data_dir: PathBuf::from("data/ref_data"),
            output: PathBuf::from("correlation_gallery.svg"),
            continent: None,
            min_population: None,
            min_total_cases: None,
            sort_by_metric: Some("TotCasesFrac".to_string()),
            chart: ChartOptions::default(),
        }
    }
}

impl AnalysisConfig {
    /// Save the resolved config to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Manifest path for a given output figure: `<output>.config.json`.
    pub fn manifest_path(&self) -> PathBuf {
        let mut name = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gallery".to_string());
        name.push_str(".config.json");
        self.output.with_file_name(name)
    }
}
