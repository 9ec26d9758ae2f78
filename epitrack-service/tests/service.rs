//! Service assembly: restore on startup, reference documents, refresh wiring.

use std::path::Path;
use std::time::Duration;

use epitrack_core::DataType;
use epitrack_derive::{Selection, ViewKind};
use epitrack_service::{Service, ServiceConfig};
use epitrack_storage::{PopulationTable, SnapshotPersistence};
use epitrack_test_utils::{fixtures, ScriptedFetcher};
use tokio::sync::watch;

fn config_in(dir: &Path) -> ServiceConfig {
    ServiceConfig {
        data_dir: dir.to_path_buf(),
        iso_table_path: dir.join("iso-3166.json"),
        population_path: dir.join("populations.csv"),
        refresh_interval: Duration::from_secs(3600),
        ..ServiceConfig::default()
    }
}

fn assemble(config: &ServiceConfig, fetcher: ScriptedFetcher) -> Service<ScriptedFetcher> {
    Service::assemble(
        config,
        fetcher,
        fixtures::resolver(),
        PopulationTable::new(fixtures::population_source()),
    )
}

#[test]
fn test_assemble_restores_persisted_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    SnapshotPersistence::new(dir.path())
        .save(&fixtures::snapshot())
        .unwrap();

    let service = assemble(&config_in(dir.path()), ScriptedFetcher::new());
    assert_eq!(service.store().version(), 1);
    assert_eq!(service.store().load().built_at(), fixtures::built_at());

    let france = service
        .derivation()
        .derive(
            ViewKind::History,
            DataType::Confirmed,
            Selection::Country("fr".to_string()),
        )
        .unwrap();
    assert_eq!(france.series().unwrap().name.as_deref(), Some("France"));
}

#[test]
fn test_assemble_without_persisted_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let service = assemble(&config_in(dir.path()), ScriptedFetcher::new());
    assert_eq!(service.store().version(), 0);
    assert!(service.store().load().is_empty());
}

#[test]
fn test_assemble_ignores_corrupt_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = SnapshotPersistence::new(dir.path());
    persistence.save(&fixtures::snapshot()).unwrap();
    let build = std::fs::read_dir(dir.path().join("builds"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    std::fs::write(
        build.join(SnapshotPersistence::countries_document(DataType::Deaths)),
        "{ not json",
    )
    .unwrap();

    let service = assemble(&config_in(dir.path()), ScriptedFetcher::new());
    assert_eq!(service.store().version(), 0);
}

#[test]
fn test_from_config_loads_reference_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("iso-3166.json"), fixtures::ISO_TABLE_JSON).unwrap();
    std::fs::write(dir.path().join("populations.csv"), fixtures::POPULATIONS_CSV).unwrap();

    let service = Service::from_config(&config_in(dir.path())).unwrap();
    let population = service.derivation().engine().population();
    assert_eq!(population.population_of("fra").unwrap(), 65_273_511.0);
}

#[test]
fn test_from_config_requires_iso_table() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Service::from_config(&config_in(dir.path())).is_err());
}

#[tokio::test]
async fn test_spawned_refresh_replaces_restored_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    SnapshotPersistence::new(dir.path())
        .save(&fixtures::snapshot())
        .unwrap();

    let service = assemble(
        &config_in(dir.path()),
        ScriptedFetcher::with_fixture_documents(),
    );
    assert_eq!(service.store().version(), 1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = service.spawn_refresh(shutdown_rx);

    for _ in 0..500 {
        if service.store().version() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(service.store().version(), 2);
    assert_ne!(service.store().load().built_at(), fixtures::built_at());

    shutdown_tx.send(true).unwrap();
    let metrics = handle.await.unwrap().snapshot();
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.last_version, 2);
}
