//! Pure per-series transforms behind every derived view.

use std::collections::BTreeMap;

use epitrack_core::{DateKey, EpiError, EpiResult, TimeSeries};

/// Decimal digits of a `proportion` value.
pub const PROPORTION_DIGITS: usize = 5;
/// Decimal digits of a `proportion-daily` value.
pub const PROPORTION_DAILY_DIGITS: usize = 10;

/// First difference in date order, the first date measured against zero.
///
/// Upstream corrections can make a cumulative series shrink, so deltas may
/// be negative.
pub fn daily(history: &TimeSeries) -> BTreeMap<DateKey, i64> {
    let mut prev = 0i64;
    history
        .iter()
        .map(|(date, count)| {
            let count = count as i64;
            let delta = count - prev;
            prev = count;
            (date, delta)
        })
        .collect()
}

/// `count / population * 100` per date, formatted with five decimals.
pub fn proportion(history: &TimeSeries, population: f64) -> EpiResult<BTreeMap<DateKey, String>> {
    check_population(population)?;
    Ok(history
        .iter()
        .map(|(date, count)| (date, percent(count as f64, population, PROPORTION_DIGITS)))
        .collect())
}

/// Daily delta as a percentage of `population`, formatted with ten decimals.
pub fn proportion_daily(
    history: &TimeSeries,
    population: f64,
) -> EpiResult<BTreeMap<DateKey, String>> {
    check_population(population)?;
    Ok(daily(history)
        .into_iter()
        .map(|(date, delta)| (date, percent(delta as f64, population, PROPORTION_DAILY_DIGITS)))
        .collect())
}

fn percent(value: f64, population: f64, digits: usize) -> String {
    format!("{:.*}", digits, value / population * 100.0)
}

fn check_population(population: f64) -> EpiResult<()> {
    if population.is_finite() && population > 0.0 {
        Ok(())
    } else {
        Err(EpiError::derivation(format!(
            "population {} cannot be used as a divisor",
            population
        )))
    }
}
