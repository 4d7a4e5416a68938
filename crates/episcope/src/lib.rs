//! Episcope: correlation galleries between regional indicators and
//! epidemic outcomes.
//!
//! Loads worldwide daily case/death data (ECDC download format) plus a set
//! of World Bank per-country indicators, condenses each country's time
//! series into summary metrics, computes the Spearman correlation of every
//! (indicator, metric) pair, and renders the whole matrix as an annotated
//! SVG scatter grid.
//!
//! # CLI Contract
//!
//! ```bash
//! episcope analyze --epi-csv data/COVID-19_cases_worldwide.csv \
//!     --ref-data data/ref_data --output gallery.svg \
//!     [--continent Africa] [--min-population 100000] \
//!     [--min-total-cases 1000] [--sort-by TotCasesFrac]
//! ```

pub mod config;
pub mod epidata;
pub mod error;
pub mod figures;
pub mod gallery;
pub mod indicators;
pub mod metrics;
pub mod stats;

// Re-exports
pub use config::{AnalysisConfig, ChartOptions};
pub use epidata::{CountryEpiData, EpiSeries, WorldEpiData};
pub use error::EpiscopeError;
pub use figures::render_gallery;
pub use gallery::{
    ColorCategoryManager, CorrelationDataPoint, CorrelationFactor, CorrelationGallery,
    CorrelationValue,
};
pub use indicators::{load_all_indicators, RegionIndicator};
pub use metrics::{all_metrics, calc_all_metrics, EpiMetric};
pub use stats::spearman;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
