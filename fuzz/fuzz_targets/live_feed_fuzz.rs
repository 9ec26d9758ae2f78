//! Fuzz test for the live snapshot feed
//!
//! Arbitrary JSON-ish bytes must either parse into rows or fail cleanly, and
//! reconciling parsed rows against empty histories must never panic.
//!
//! Run with: cargo +nightly fuzz run live_feed_fuzz -- -max_total_time=60

#![no_main]

use std::collections::BTreeMap;

use epitrack_ingest::{ascii_fold, parse_live_feed, reconcile_live, IdentityResolver, IsoTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        assert!(ascii_fold(text).is_ascii());
    }

    let Ok(rows) = parse_live_feed(data) else {
        return;
    };
    let count = rows.len();
    let resolver = IdentityResolver::new(IsoTable::from_entries([("France", "FR", "FRA")]));
    let live = reconcile_live(rows, &resolver, &BTreeMap::new(), 0);
    assert_eq!(live.len(), count);
});
