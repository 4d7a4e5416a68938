//! Episcope CLI entry point.
//!
//! One command runs the full analysis:
//! ```
//! episcope analyze --epi-csv data/COVID-19_cases_worldwide.csv \
//!     --ref-data data/ref_data --output gallery.svg \
//!     [--continent Africa] [--min-population 100000] \
//!     [--min-total-cases 1000] [--sort-by TotCasesFrac]
//! ```
//!
//! Pipeline flow:
//! 1. Load the worldwide daily series and apply country filters
//! 2. Condense each country into summary metrics
//! 3. Load the World Bank indicator folders
//! 4. Correlate every (indicator, metric) pair and render the gallery

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use episcope::{
    all_metrics, calc_all_metrics, load_all_indicators, render_gallery, AnalysisConfig,
    CorrelationFactor, CorrelationGallery, WorldEpiData,
};

#[derive(Parser, Debug)]
#[command(name = "episcope")]
#[command(version)]
#[command(about = "Indicator/outcome correlation galleries for epidemic data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis and render the correlation gallery
    Analyze(AnalyzeArgs),

    /// List the available summary metrics
    Metrics,

    /// Show version info
    Version,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Load all settings from a previous run's manifest; explicit flags
    /// below still override the loaded values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worldwide daily cases/deaths CSV (ECDC download format)
    #[arg(long)]
    epi_csv: Option<PathBuf>,

    /// Directory of World Bank indicator folders (one API* folder each)
    #[arg(long)]
    ref_data: Option<PathBuf>,

    /// Output SVG path
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Keep only countries on this continent
    #[arg(long)]
    continent: Option<String>,

    /// Drop countries below this population size
    #[arg(long)]
    min_population: Option<f64>,

    /// Drop countries below this total case count
    #[arg(long)]
    min_total_cases: Option<i64>,

    /// Metric id used to order indicator columns by significance
    #[arg(long)]
    sort_by: Option<String>,

    /// Keep indicator columns in load order instead of sorting
    #[arg(long)]
    no_sort: bool,

    /// Annotate each scatter point with the country name
    #[arg(long)]
    show_point_labels: bool,

    /// Leave cell backgrounds unshaded
    #[arg(long)]
    no_cell_shading: bool,

    /// Figure width (px)
    #[arg(long)]
    width: Option<u32>,

    /// Figure height (px)
    #[arg(long)]
    height: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analysis(args),
        Commands::Metrics => list_metrics(),
        Commands::Version => show_version(),
    }
}

/// Resolves the effective configuration: manifest file if given, defaults
/// otherwise, with explicit flags overriding either.
fn resolve_config(args: AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    if let Some(epi_csv) = args.epi_csv {
        config.epi_csv = epi_csv;
    }
    if let Some(ref_data) = args.ref_data {
        config.ref_data_dir = ref_data;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if args.continent.is_some() {
        config.continent = args.continent;
    }
    if args.min_population.is_some() {
        config.min_population = args.min_population;
    }
    if args.min_total_cases.is_some() {
        config.min_total_cases = args.min_total_cases;
    }
    if args.no_sort {
        config.sort_by_metric = None;
    } else if args.sort_by.is_some() {
        config.sort_by_metric = args.sort_by;
    }
    if args.show_point_labels {
        config.chart.show_point_labels = true;
    }
    if args.no_cell_shading {
        config.chart.color_cells_by_significance = false;
    }
    if let Some(width) = args.width {
        config.chart.width = width;
    }
    if let Some(height) = args.height {
        config.chart.height = height;
    }
    Ok(config)
}

fn run_analysis(args: AnalyzeArgs) -> Result<()> {
    let config = resolve_config(args)?;

    let mut world = WorldEpiData::load(&config.epi_csv)?;
    if let Some(continent) = &config.continent {
        world.filter_continent(continent);
    }
    if let Some(min_population) = config.min_population {
        world.filter_min_population(min_population);
    }
    if let Some(min_total_cases) = config.min_total_cases {
        world.filter_min_total_cases(min_total_cases);
    }
    if world.countries().is_empty() {
        bail!("No countries left after filtering");
    }

    calc_all_metrics(&mut world);

    let indicators = load_all_indicators(&config.ref_data_dir)?;
    if indicators.is_empty() {
        bail!(
            "No indicator folders found in {}",
            config.ref_data_dir.display()
        );
    }
    info!(
        "correlating {} indicators x {} metrics over {} countries",
        indicators.len(),
        all_metrics().len(),
        world.countries().len()
    );

    let mut gallery = build_gallery(&world, &indicators)?;
    gallery.compute_correlations()?;
    if let Some(metric_id) = &config.sort_by_metric {
        gallery.sort_factors_x_by_significance(metric_id)?;
    }

    render_gallery(&gallery, &config.output, &config.chart)?;
    info!("wrote {}", config.output.display());

    config.save(&config.manifest_path())?;
    info!("wrote {}", config.manifest_path().display());
    Ok(())
}

/// Assembles the gallery: indicators on X, metrics on Y, one data point per
/// country sized by relative population and colored by continent.
fn build_gallery(
    world: &WorldEpiData,
    indicators: &[episcope::RegionIndicator],
) -> Result<CorrelationGallery> {
    let metrics = all_metrics();
    let max_population = world
        .max_population()
        .context("No country has a known population")?;

    let mut gallery = CorrelationGallery::new();
    for indicator in indicators {
        gallery.add_factor_x(CorrelationFactor::new(indicator.id(), indicator.name()))?;
    }
    for metric in &metrics {
        gallery.add_factor_y(CorrelationFactor::new(metric.id(), metric.description()))?;
    }

    for country in world.countries() {
        let size_fraction = country.population().map_or(0.0, |p| p / max_population);
        gallery.add_data_point(country.code(), country.name(), size_fraction, country.continent())?;
        for indicator in indicators {
            gallery.set_value_x(
                country.code(),
                indicator.id(),
                indicator.region_value(country.code()),
            )?;
        }
        for metric in &metrics {
            gallery.set_value_y(country.code(), metric.id(), country.metric(metric.id()))?;
        }
    }
    Ok(gallery)
}

fn list_metrics() -> Result<()> {
    for metric in all_metrics() {
        println!("{:20} {}", metric.id(), metric.description());
    }
    Ok(())
}

fn show_version() -> Result<()> {
    println!("episcope {}", episcope::VERSION);
    Ok(())
}
