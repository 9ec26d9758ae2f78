//! Refresh job behavior against scripted upstream documents.

use std::sync::Arc;
use std::time::Duration;

use epitrack_core::DataType;
use epitrack_derive::{CachedDerivation, DerivationEngine, Selection, ViewKind};
use epitrack_ingest::{IngestionPass, SourceConfig};
use epitrack_service::jobs::{refresh_once, refresh_task, RefreshConfig, RefreshMetrics};
use epitrack_storage::{CacheConfig, SnapshotPersistence, SnapshotStore};
use epitrack_test_utils::{fixtures, ScriptedFetcher};
use tokio::sync::watch;

struct Harness {
    fetcher: ScriptedFetcher,
    pass: Arc<IngestionPass<ScriptedFetcher>>,
    store: Arc<SnapshotStore>,
    persistence: SnapshotPersistence,
    cache: Arc<CachedDerivation>,
    metrics: RefreshMetrics,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::with_fixture_documents();
    let store = Arc::new(SnapshotStore::default());
    let engine = DerivationEngine::new(Arc::clone(&store), fixtures::population_table());
    Harness {
        pass: Arc::new(IngestionPass::new(
            fetcher.clone(),
            SourceConfig::default(),
            fixtures::resolver(),
        )),
        fetcher,
        store,
        persistence: SnapshotPersistence::new(dir.path()),
        cache: Arc::new(CachedDerivation::new(Arc::new(engine), CacheConfig::default())),
        metrics: RefreshMetrics::new(),
        _dir: dir,
    }
}

impl Harness {
    async fn refresh(&self) -> epitrack_core::EpiResult<u64> {
        refresh_once(
            &self.pass,
            &self.store,
            &self.persistence,
            &self.cache,
            &self.metrics,
        )
        .await
    }

    fn world_history(&self) -> Arc<epitrack_derive::Derived> {
        self.cache
            .derive(ViewKind::History, DataType::Confirmed, Selection::World)
            .unwrap()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_refresh_publishes_and_persists() {
    let h = harness();
    assert!(h.store.load().is_empty());

    assert_eq!(h.refresh().await.unwrap(), 1);

    let published = h.store.load();
    let world = published
        .dataset(DataType::Confirmed)
        .unwrap()
        .countries
        .world_total();
    assert_eq!(world.latest(), Some((fixtures::key("1/24/20"), 88)));

    let restored = h.persistence.restore().unwrap().unwrap();
    assert_eq!(restored.built_at().timestamp(), published.built_at().timestamp());
    assert_eq!(restored.live().len(), published.live().len());

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.failures, 0);
    assert_eq!(metrics.last_version, 1);
    assert!(metrics.last_success > 0);
}

#[tokio::test]
async fn test_failed_pass_keeps_previous_snapshot() {
    let h = harness();
    h.refresh().await.unwrap();
    let published = h.store.load();
    let cached = h.world_history();

    h.fetcher.set_failing(true);
    let err = h.refresh().await.unwrap_err();
    assert_eq!(err.kind(), "IngestionFailed");

    assert_eq!(h.store.version(), 1);
    assert!(Arc::ptr_eq(&h.store.load(), &published));
    // Nothing was published, so cached results stay valid.
    assert!(Arc::ptr_eq(&h.world_history(), &cached));

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.passes, 2);
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.last_version, 1);
}

#[tokio::test]
async fn test_missing_document_aborts_whole_pass() {
    let h = harness();
    h.fetcher
        .set_document("deaths_us", "UID,iso2\n1,US\n".as_bytes().to_vec());

    let err = h.refresh().await.unwrap_err();
    assert_eq!(err.kind(), "IngestionFailed");
    assert_eq!(h.store.version(), 0);
    assert!(h.persistence.restore().unwrap().is_none());
}

#[tokio::test]
async fn test_publish_clears_result_cache() {
    let h = harness();
    h.refresh().await.unwrap();

    let first = h.world_history();
    assert!(Arc::ptr_eq(&h.world_history(), &first));

    h.refresh().await.unwrap();
    let second = h.world_history();
    assert!(!Arc::ptr_eq(&second, &first));
    assert_eq!(*second, *first);
}

#[tokio::test]
async fn test_persist_failure_still_publishes() {
    let h = harness();
    let not_a_dir = tempfile::NamedTempFile::new().unwrap();
    let persistence = SnapshotPersistence::new(not_a_dir.path());

    let version = refresh_once(&h.pass, &h.store, &persistence, &h.cache, &h.metrics)
        .await
        .unwrap();
    assert_eq!(version, 1);
    assert!(!h.store.load().is_empty());

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.persist_failures, 1);
    assert_eq!(metrics.failures, 0);
}

#[tokio::test]
async fn test_task_runs_first_pass_then_stops_on_shutdown() {
    let h = harness();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = RefreshConfig {
        interval: Duration::from_secs(3600),
    };

    let handle = tokio::spawn(refresh_task(
        Arc::clone(&h.pass),
        Arc::clone(&h.store),
        h.persistence.clone(),
        Arc::clone(&h.cache),
        config,
        shutdown_rx,
    ));

    let store = Arc::clone(&h.store);
    wait_until(|| store.version() == 1).await;

    shutdown_tx.send(true).unwrap();
    let metrics = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .snapshot();
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.failures, 0);
    assert_eq!(metrics.last_version, 1);
}

#[tokio::test]
async fn test_task_counts_failures_and_stops_when_sender_dropped() {
    let h = harness();
    h.fetcher.set_failing(true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(refresh_task(
        Arc::clone(&h.pass),
        Arc::clone(&h.store),
        h.persistence.clone(),
        Arc::clone(&h.cache),
        RefreshConfig {
            interval: Duration::from_secs(3600),
        },
        shutdown_rx,
    ));

    let fetcher = h.fetcher.clone();
    wait_until(|| fetcher.fetch_count() >= 1).await;

    drop(shutdown_tx);
    let metrics = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .snapshot();
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.failures, 1);
    assert_eq!(h.store.version(), 0);
}
