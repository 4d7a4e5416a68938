//! Worldwide daily cases/deaths ingestion (ECDC download format).
//!
//! Rows are grouped into one series per country, date-sorted, and augmented
//! with per-capita fractions when the population is known. Filters drop
//! whole countries and log what they removed.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn};

/// One row of the source CSV.
#[derive(Debug, Deserialize)]
struct EpiRow {
    day: u32,
    month: u32,
    year: i32,
    cases: i64,
    deaths: i64,
    #[serde(rename = "countriesAndTerritories")]
    country_name: String,
    #[serde(rename = "countryterritoryCode")]
    country_code: String,
    #[serde(rename = "popData2019")]
    population: Option<f64>,
    #[serde(rename = "continentExp")]
    continent: String,
}

/// A single day in a country's epidemic series.
#[derive(Debug, Clone)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub cases: i64,
    pub deaths: i64,
    /// Daily cases as a fraction of the population, if the population is known
    pub cases_frac: Option<f64>,
    pub deaths_frac: Option<f64>,
}

/// A country's full daily time series.
#[derive(Debug, Clone, Default)]
pub struct EpiSeries {
    points: Vec<DailyCount>,
    total_cases: i64,
}

impl EpiSeries {
    pub(crate) fn push(&mut self, date: NaiveDate, cases: i64, deaths: i64) {
        self.points.push(DailyCount {
            date,
            cases,
            deaths,
            cases_frac: None,
            deaths_frac: None,
        });
    }

    /// Sorts by date, fills per-capita fractions and the total case count.
    pub(crate) fn finalise(&mut self, population: Option<f64>) {
        self.points.sort_by_key(|pt| pt.date);
        if let Some(pop) = population.filter(|&p| p > 0.0) {
            for pt in &mut self.points {
                pt.cases_frac = Some(pt.cases as f64 / pop);
                pt.deaths_frac = Some(pt.deaths as f64 / pop);
            }
        }
        self.total_cases = self.points.iter().map(|pt| pt.cases).sum();
    }

    pub fn points(&self) -> &[DailyCount] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_cases(&self) -> i64 {
        self.total_cases
    }

    /// Daily cases fraction as a (date, value) series.
    pub fn cases_fractions(&self) -> Vec<(NaiveDate, Option<f64>)> {
        self.points.iter().map(|pt| (pt.date, pt.cases_frac)).collect()
    }

    pub fn deaths_fractions(&self) -> Vec<(NaiveDate, Option<f64>)> {
        self.points.iter().map(|pt| (pt.date, pt.deaths_frac)).collect()
    }
}

/// Epidemic data and display metadata for one country.
#[derive(Debug, Clone)]
pub struct CountryEpiData {
    code: String,
    name: String,
    continent: String,
    population: Option<f64>,
    series: EpiSeries,
    metrics: HashMap<String, Option<f64>>,
}

impl CountryEpiData {
    fn new(code: String, name: String, continent: String, population: Option<f64>) -> Self {
        if population.is_none() {
            warn!("{} does not have a population size", name);
        }
        Self {
            code,
            name,
            continent,
            population,
            series: EpiSeries::default(),
            metrics: HashMap::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn continent(&self) -> &str {
        &self.continent
    }

    pub fn population(&self) -> Option<f64> {
        self.population
    }

    pub fn has_population(&self) -> bool {
        self.population.map(|p| p > 0.0).unwrap_or(false)
    }

    pub fn series(&self) -> &EpiSeries {
        &self.series
    }

    /// Stores a computed metric value (which may itself be missing).
    pub fn set_metric(&mut self, id: &str, value: Option<f64>) {
        self.metrics.insert(id.to_string(), value);
    }

    /// A computed metric value; never-computed and computed-as-missing both
    /// read as `None`.
    pub fn metric(&self, id: &str) -> Option<f64> {
        self.metrics.get(id).copied().flatten()
    }
}

/// Epidemic data for all countries in the source file.
#[derive(Debug, Default)]
pub struct WorldEpiData {
    countries: Vec<CountryEpiData>,
    index: HashMap<String, usize>,
}

impl WorldEpiData {
    /// Loads the ECDC worldwide CSV. Countries appear in first-seen order;
    /// rows without a country code are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("Failed to open epi data {}", path.display()))?;

        let mut world = WorldEpiData::default();
        let mut skipped = 0usize;
        for (row_nr, result) in reader.deserialize::<EpiRow>().enumerate() {
            let row = result.with_context(|| format!("Bad epi data row {}", row_nr + 2))?;
            if row.country_code.is_empty() {
                skipped += 1;
                continue;
            }

            let date = NaiveDate::from_ymd_opt(row.year, row.month, row.day)
                .with_context(|| {
                    format!(
                        "Invalid date {}-{}-{} on row {}",
                        row.year,
                        row.month,
                        row.day,
                        row_nr + 2
                    )
                })?;

            let idx = match world.index.get(&row.country_code) {
                Some(&idx) => idx,
                None => {
                    let idx = world.countries.len();
                    world.index.insert(row.country_code.clone(), idx);
                    world.countries.push(CountryEpiData::new(
                        row.country_code,
                        row.country_name,
                        row.continent,
                        row.population,
                    ));
                    idx
                }
            };
            world.countries[idx].series.push(date, row.cases, row.deaths);
        }

        if skipped > 0 {
            warn!("skipped {} rows without a country code", skipped);
        }

        for country in &mut world.countries {
            let population = country.population;
            country.series.finalise(population);
        }
        info!(
            "loaded epi data for {} countries from {}",
            world.countries.len(),
            path.display()
        );
        Ok(world)
    }

    pub fn countries(&self) -> &[CountryEpiData] {
        &self.countries
    }

    pub fn countries_mut(&mut self) -> &mut [CountryEpiData] {
        &mut self.countries
    }

    pub fn country(&self, code: &str) -> Option<&CountryEpiData> {
        self.index.get(code).map(|&idx| &self.countries[idx])
    }

    /// Largest known population among the remaining countries.
    pub fn max_population(&self) -> Option<f64> {
        self.countries
            .iter()
            .filter_map(|c| c.population)
            .fold(None, |acc, p| Some(acc.map_or(p, |m: f64| m.max(p))))
    }

    fn apply_filter<F>(&mut self, reason: &str, keep: F)
    where
        F: Fn(&CountryEpiData) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for country in self.countries.drain(..) {
            if keep(&country) {
                kept.push(country);
            } else {
                removed.push(country.name.clone());
            }
        }
        self.countries = kept;
        self.index = self
            .countries
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.code.clone(), idx))
            .collect();
        info!("country filter: {}; removed {:?}", reason, removed);
    }

    /// Keeps only countries on the given continent.
    pub fn filter_continent(&mut self, continent: &str) {
        self.apply_filter(&format!("restrict to continent {}", continent), |c| {
            c.continent == continent
        });
    }

    /// Drops countries with an unknown or too-small population.
    pub fn filter_min_population(&mut self, min_size: f64) {
        self.apply_filter(&format!("minimum population {}", min_size), |c| {
            c.has_population() && c.population.unwrap_or(0.0) >= min_size
        });
    }

    /// Drops countries below the given total case count.
    pub fn filter_min_total_cases(&mut self, min_total: i64) {
        self.apply_filter(&format!("minimum total cases {}", min_total), |c| {
            c.series.total_cases() >= min_total
        });
    }
}

/// Symmetric moving average over a date window: each output value is the
/// mean of all known samples within `half_window_days` of its date. Works
/// on non-consecutive series; windows with no known samples yield `None`.
pub fn moving_window_average(
    series: &[(NaiveDate, Option<f64>)],
    half_window_days: i64,
) -> Vec<(NaiveDate, Option<f64>)> {
    // Quadratic in series length, but series are short (daily data) and not
    // guaranteed consecutive, so index-based windows would be wrong.
    series
        .iter()
        .map(|&(date, _)| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for &(other_date, value) in series {
                let Some(v) = value else { continue };
                if (date - other_date).num_days().abs() <= half_window_days {
                    sum += v;
                    count += 1;
                }
            }
            let avg = if count > 0 { Some(sum / count as f64) } else { None };
            (date, avg)
        })
        .collect()
}
