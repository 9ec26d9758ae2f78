//! Series Builder: raw tables to canonical, identity-resolved cumulative series.
//!
//! Malformed counts fail the whole table instead of being coerced, so a bad
//! upstream cell can never silently corrupt a cumulative total.

use std::collections::btree_map::Entry;

use epitrack_core::{
    CountrySeriesSet, DateKey, EntitySeries, IngestError, RegionSeries, RegionSeriesSet,
    TimeSeries,
};

use crate::resolver::IdentityResolver;
use crate::schema::ColumnSchema;
use crate::table::RawTable;

/// Build one merged series per canonical country.
///
/// Rows resolving to the same canonical name are summed date-wise, so
/// sub-national rows roll up into the national total.
pub fn build_country_series(
    table: &RawTable,
    schema: &ColumnSchema,
    resolver: &IdentityResolver,
) -> Result<CountrySeriesSet, IngestError> {
    let label_idx = table.column_index(schema.label_column)?;
    let dates = schema.date_columns(table)?;
    let mut set = CountrySeriesSet::new();

    for (row_no, row) in table.rows.iter().enumerate() {
        let label = RawTable::cell(row, label_idx).trim();
        if label.is_empty() {
            tracing::debug!(dataset = %table.dataset, row = row_no + 1, "Skipping row without country label");
            continue;
        }
        let identity = resolver.resolve(label);
        let history = row_history(table, row_no, row, &dates)?;

        match set.get_mut(&identity.name) {
            Some(existing) => existing.history.accumulate(&history),
            None => set.insert(EntitySeries { identity, history }),
        }
    }

    for entity in set.iter_mut() {
        resolver.augment(&mut entity.identity);
    }

    tracing::debug!(
        dataset = %table.dataset,
        rows = table.rows.len(),
        countries = set.len(),
        dates = dates.len(),
        "Built country series"
    );
    Ok(set)
}

/// Build subregion histories grouped by canonical country.
///
/// Rows without a subregion label are skipped. With `is_us`, rows sharing a
/// subregion label (counties of one state) are summed; otherwise a repeated
/// label replaces the earlier row.
pub fn build_region_series(
    table: &RawTable,
    schema: &ColumnSchema,
    resolver: &IdentityResolver,
    is_us: bool,
) -> Result<RegionSeriesSet, IngestError> {
    let label_idx = table.column_index(schema.label_column)?;
    let region_idx = table.column_index(schema.region_column)?;
    let dates = schema.date_columns(table)?;
    let mut set = RegionSeriesSet::new();

    for (row_no, row) in table.rows.iter().enumerate() {
        let region = RawTable::cell(row, region_idx).trim();
        let label = RawTable::cell(row, label_idx).trim();
        if region.is_empty() || label.is_empty() {
            continue;
        }
        let identity = resolver.resolve(label);
        let history = row_history(table, row_no, row, &dates)?;

        if set.get(&identity.name).is_none() {
            set.insert(RegionSeries {
                identity: identity.clone(),
                regions: Default::default(),
            });
        }
        let Some(country) = set.get_mut(&identity.name) else {
            continue;
        };

        match country.regions.entry(region.to_string()) {
            Entry::Occupied(mut slot) if is_us => slot.get_mut().accumulate(&history),
            Entry::Occupied(mut slot) => {
                slot.insert(history);
            }
            Entry::Vacant(slot) => {
                slot.insert(history);
            }
        }
    }

    for country in set.iter_mut() {
        resolver.augment(&mut country.identity);
    }

    tracing::debug!(
        dataset = %table.dataset,
        is_us,
        countries = set.len(),
        "Built region series"
    );
    Ok(set)
}

/// Parse every date cell of one row into a history.
fn row_history(
    table: &RawTable,
    row_no: usize,
    row: &[String],
    dates: &[(usize, DateKey)],
) -> Result<TimeSeries, IngestError> {
    let mut history = TimeSeries::new();
    for (index, key) in dates {
        let raw = RawTable::cell(row, *index);
        let count = parse_count(raw).ok_or_else(|| IngestError::MalformedValue {
            dataset: table.dataset.clone(),
            row: row_no + 1,
            column: table.headers[*index].clone(),
            value: raw.to_string(),
        })?;
        history.insert(*key, count);
    }
    Ok(history)
}

/// A non-negative integer count. Blank, signed, fractional and textual cells are rejected.
fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        return None;
    }
    trimmed.parse::<u64>().ok()
}
