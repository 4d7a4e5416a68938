//! Per-country summary metrics derived from the daily epidemic series.
//!
//! Each metric collapses a country's time series into one scalar; metrics
//! whose log or ratio is undefined for a country report `None` and the
//! country simply contributes no value for that factor.

use chrono::NaiveDate;

use crate::epidata::{moving_window_average, EpiSeries, WorldEpiData};

/// Half-width (days) of the smoothing window used by the rate metrics.
const RATE_HALF_WINDOW_DAYS: i64 = 7;

/// One summary metric over a country's epidemic series.
pub trait EpiMetric {
    /// Stable identifier, used as the factor id.
    fn id(&self) -> &'static str;

    /// Human-readable description, used as the factor display name.
    fn description(&self) -> &'static str;

    /// The metric value for one country, `None` when undefined.
    fn calc(&self, series: &EpiSeries) -> Option<f64>;
}

/// All metrics, in the fixed order they appear on the Y axis.
pub fn all_metrics() -> Vec<Box<dyn EpiMetric>> {
    vec![
        Box::new(DeathsToCasesFrac),
        Box::new(MaxDeathsRate),
        Box::new(TotDeathsFrac),
        Box::new(MaxCasesRate),
        Box::new(TotCasesFrac),
    ]
}

/// Computes every metric for every country and stores the results.
pub fn calc_all_metrics(world: &mut WorldEpiData) {
    let metrics = all_metrics();
    for country in world.countries_mut() {
        for metric in &metrics {
            let value = metric.calc(country.series());
            country.set_metric(metric.id(), value);
        }
    }
}

fn sum_known(series: &[(NaiveDate, Option<f64>)]) -> f64 {
    series.iter().filter_map(|&(_, v)| v).sum()
}

/// Peak of the date-window-smoothed series, `None` if nothing is known.
fn smoothed_max(series: &[(NaiveDate, Option<f64>)]) -> Option<f64> {
    moving_window_average(series, RATE_HALF_WINDOW_DAYS)
        .into_iter()
        .filter_map(|(_, v)| v)
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

fn log10_positive(value: f64) -> Option<f64> {
    (value > 0.0).then(|| value.log10())
}

/// Total cases as a population percentage, log10.
pub struct TotCasesFrac;

impl EpiMetric for TotCasesFrac {
    fn id(&self) -> &'static str {
        "TotCasesFrac"
    }

    fn description(&self) -> &'static str {
        "Total cases (population %, log10)"
    }

    fn calc(&self, series: &EpiSeries) -> Option<f64> {
        log10_positive(100.0 * sum_known(&series.cases_fractions()))
    }
}

/// Total deaths as a population percentage, log10.
pub struct TotDeathsFrac;

impl EpiMetric for TotDeathsFrac {
    fn id(&self) -> &'static str {
        "TotDeathsFrac"
    }

    fn description(&self) -> &'static str {
        "Total deaths (population %, log10)"
    }

    fn calc(&self, series: &EpiSeries) -> Option<f64> {
        log10_positive(100.0 * sum_known(&series.deaths_fractions()))
    }
}

/// Deaths as a percentage of cases.
pub struct DeathsToCasesFrac;

impl EpiMetric for DeathsToCasesFrac {
    fn id(&self) -> &'static str {
        "DeathsToCasesFrac"
    }

    fn description(&self) -> &'static str {
        "Deaths to Cases (%)"
    }

    fn calc(&self, series: &EpiSeries) -> Option<f64> {
        let total_cases = sum_known(&series.cases_fractions());
        if total_cases <= 0.0 {
            return None;
        }
        Some(100.0 * sum_known(&series.deaths_fractions()) / total_cases)
    }
}

/// Peak smoothed daily case rate, log10.
pub struct MaxCasesRate;

impl EpiMetric for MaxCasesRate {
    fn id(&self) -> &'static str {
        "MaxCasesRate"
    }

    fn description(&self) -> &'static str {
        "Max cases rate (14-days window, log10)"
    }

    fn calc(&self, series: &EpiSeries) -> Option<f64> {
        smoothed_max(&series.cases_fractions()).and_then(log10_positive)
    }
}

/// Peak smoothed daily death rate, log10.
pub struct MaxDeathsRate;

impl EpiMetric for MaxDeathsRate {
    fn id(&self) -> &'static str {
        "MaxDeathsRate"
    }

    fn description(&self) -> &'static str {
        "Max deaths rate (14-days window, log10)"
    }

    fn calc(&self, series: &EpiSeries) -> Option<f64> {
        smoothed_max(&series.deaths_fractions()).and_then(log10_positive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    /// 4 days of data over a population of 1000.
    fn series(daily: &[(i64, i64)]) -> EpiSeries {
        let mut s = EpiSeries::default();
        for (i, &(cases, deaths)) in daily.iter().enumerate() {
            s.push(date(i as u32 + 1), cases, deaths);
        }
        s.finalise(Some(1000.0));
        s
    }

    #[test]
    fn test_metric_ids_unique_and_ordered() {
        let metrics = all_metrics();
        let ids: Vec<&str> = metrics.iter().map(|m| m.id()).collect();
        assert_eq!(
            ids,
            vec![
                "DeathsToCasesFrac",
                "MaxDeathsRate",
                "TotDeathsFrac",
                "MaxCasesRate",
                "TotCasesFrac"
            ]
        );
    }

    #[test]
    fn test_total_cases_frac() {
        let s = series(&[(10, 0), (20, 0), (10, 0)]);
        // 40 cases / 1000 people = 4% -> log10(4)
        let value = TotCasesFrac.calc(&s).unwrap();
        assert!((value - 4.0f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_total_deaths_frac_zero_is_missing() {
        let s = series(&[(10, 0), (20, 0)]);
        assert_eq!(TotDeathsFrac.calc(&s), None);

        let s = series(&[(10, 5), (20, 5)]);
        // 10 deaths / 1000 = 1% -> log10(1) = 0
        assert_eq!(TotDeathsFrac.calc(&s), Some(0.0));
    }

    #[test]
    fn test_deaths_to_cases() {
        let s = series(&[(30, 3), (70, 7)]);
        let value = DeathsToCasesFrac.calc(&s).unwrap();
        assert!((value - 10.0).abs() < 1e-9);

        let no_cases = series(&[(0, 0)]);
        assert_eq!(DeathsToCasesFrac.calc(&no_cases), None);
    }

    #[test]
    fn test_max_cases_rate_uses_smoothing() {
        // Constant 10/day: the smoothed peak equals the daily fraction
        let s = series(&[(10, 0), (10, 0), (10, 0), (10, 0)]);
        let value = MaxCasesRate.calc(&s).unwrap();
        assert!((value - 0.01f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_rate_metrics_without_population() {
        let mut s = EpiSeries::default();
        s.push(date(1), 10, 1);
        s.finalise(None);
        // No population means no fractions, so every metric is undefined
        assert_eq!(MaxCasesRate.calc(&s), None);
        assert_eq!(MaxDeathsRate.calc(&s), None);
        assert_eq!(TotCasesFrac.calc(&s), None);
        assert_eq!(DeathsToCasesFrac.calc(&s), None);
    }

    #[test]
    fn test_max_deaths_rate_all_zero_is_missing() {
        let s = series(&[(10, 0), (10, 0)]);
        assert_eq!(MaxDeathsRate.calc(&s), None);
    }
}
