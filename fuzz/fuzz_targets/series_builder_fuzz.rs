//! Fuzz test for building series from upstream CSV
//!
//! Feeds arbitrary bytes through CSV decoding and both column schemas.
//! Malformed input must come back as an error, never a panic, and any table
//! that builds must keep the world total equal to the per-entity sums.
//!
//! Run with: cargo +nightly fuzz run series_builder_fuzz -- -max_total_time=60

#![no_main]

use epitrack_ingest::{
    build_country_series, build_region_series, ColumnSchema, IdentityResolver, IsoTable, RawTable,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(table) = RawTable::from_csv("fuzz", data) else {
        return;
    };
    let resolver = IdentityResolver::new(IsoTable::from_entries([
        ("France", "FR", "FRA"),
        ("United States", "US", "USA"),
    ]));

    for schema in [&ColumnSchema::GLOBAL, &ColumnSchema::US] {
        if let Ok(countries) = build_country_series(&table, schema, &resolver) {
            let world = countries.world_total();
            for (date, total) in world.iter() {
                let summed = countries
                    .iter()
                    .filter_map(|entity| entity.history.get(&date))
                    .fold(0u64, u64::saturating_add);
                assert_eq!(summed, total, "world total diverged on {}", date);
            }
        }
        let _ = build_region_series(&table, schema, &resolver, false);
        let _ = build_region_series(&table, schema, &resolver, true);
    }
});
