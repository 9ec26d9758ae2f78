//! Snapshot persistence as a directory of JSON documents.
//!
//! Each save stages a complete build under `builds/<build>/`: per dataset
//! `<dt>` it holds `csv_<dt>.json` (countries), `csv_<dt>_region.json`
//! (global subregions) and, where upstream has one, `csv_<dt>_us_region.json`.
//! The live rows go to `data.json`.
//!
//! A build only becomes visible when the `snapshot.json` marker naming it is
//! renamed into place. A save that fails before that leaves the previous
//! marker pointing at the previous, untouched build.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

use epitrack_core::{
    CountrySeriesSet, DataType, Dataset, EpiResult, LiveCountry, RegionSeriesSet, Snapshot,
    StorageError,
};

const LIVE_DOCUMENT: &str = "data.json";
const MARKER_DOCUMENT: &str = "snapshot.json";
const BUILDS_DIR: &str = "builds";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMarker {
    built_at: DateTime<Utc>,
    /// Directory name under `builds/` holding this snapshot's documents.
    build: String,
    datasets: Vec<DataType>,
}

/// Reads and writes snapshots under one data directory.
#[derive(Debug, Clone)]
pub struct SnapshotPersistence {
    dir: PathBuf,
}

impl SnapshotPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn countries_document(data_type: DataType) -> String {
        format!("csv_{}.json", data_type)
    }

    pub fn regions_document(data_type: DataType) -> String {
        format!("csv_{}_region.json", data_type)
    }

    pub fn us_regions_document(data_type: DataType) -> String {
        format!("csv_{}_us_region.json", data_type)
    }

    /// Write every document of `snapshot` into a new build, then commit it.
    pub fn save(&self, snapshot: &Snapshot) -> EpiResult<()> {
        let marker = self.stage(snapshot)?;
        self.commit(&marker)?;
        self.prune(&marker.build);

        tracing::info!(
            dir = %self.dir.display(),
            build = %marker.build,
            built_at = %snapshot.built_at(),
            "Persisted snapshot"
        );
        Ok(())
    }

    /// Load the last committed snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been committed yet. A marker whose
    /// documents are missing or unreadable is an error.
    pub fn restore(&self) -> EpiResult<Option<Snapshot>> {
        let Some(marker) = read_optional::<SnapshotMarker>(&self.dir, MARKER_DOCUMENT)? else {
            tracing::debug!(dir = %self.dir.display(), "No persisted snapshot");
            return Ok(None);
        };
        let build_dir = self.build_dir(&marker.build)?;

        let mut datasets = BTreeMap::new();
        for data_type in marker.datasets {
            let countries: CountrySeriesSet =
                read_required(&build_dir, &Self::countries_document(data_type))?;
            let regions: RegionSeriesSet =
                read_required(&build_dir, &Self::regions_document(data_type))?;
            let us_regions = if data_type.has_us_source() {
                Some(read_required(&build_dir, &Self::us_regions_document(data_type))?)
            } else {
                None
            };
            datasets.insert(
                data_type,
                Dataset {
                    countries,
                    regions,
                    us_regions,
                },
            );
        }
        let live: Vec<LiveCountry> = read_required(&build_dir, LIVE_DOCUMENT)?;

        tracing::info!(
            dir = %self.dir.display(),
            build = %marker.build,
            built_at = %marker.built_at,
            datasets = datasets.len(),
            "Restored persisted snapshot"
        );
        Ok(Some(Snapshot::new(datasets, live, marker.built_at)))
    }

    /// Write all documents into a fresh build directory. Nothing is visible
    /// to [`SnapshotPersistence::restore`] until the returned marker is committed.
    fn stage(&self, snapshot: &Snapshot) -> EpiResult<SnapshotMarker> {
        let builds = self.dir.join(BUILDS_DIR);
        fs::create_dir_all(&builds).map_err(|e| write_error(&builds, e))?;
        let (build, build_dir) = create_build_dir(&builds, snapshot.built_at())?;

        let written = write_build(&build_dir, snapshot);
        match written {
            Ok(datasets) => Ok(SnapshotMarker {
                built_at: snapshot.built_at(),
                build,
                datasets,
            }),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&build_dir) {
                    tracing::warn!(build = %build, error = %cleanup, "Failed to remove partial build");
                }
                Err(e)
            }
        }
    }

    fn commit(&self, marker: &SnapshotMarker) -> EpiResult<()> {
        write_document(&self.dir, MARKER_DOCUMENT, marker)
    }

    /// Remove every build except `keep`. Failures only cost disk space.
    fn prune(&self, keep: &str) {
        let builds = self.dir.join(BUILDS_DIR);
        let entries = match fs::read_dir(&builds) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %builds.display(), error = %e, "Cannot list builds");
                return;
            }
        };
        for entry in entries.flatten() {
            if entry.file_name() == keep {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to prune build");
            }
        }
    }

    fn build_dir(&self, build: &str) -> EpiResult<PathBuf> {
        let mut components = Path::new(build).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(BUILDS_DIR).join(build)),
            _ => Err(StorageError::Decode {
                document: MARKER_DOCUMENT.to_string(),
                reason: format!("invalid build name '{}'", build),
            }
            .into()),
        }
    }
}

/// Create `build-<millis>[-n]`, never reusing an existing directory.
fn create_build_dir(builds: &Path, built_at: DateTime<Utc>) -> EpiResult<(String, PathBuf)> {
    let stem = format!("build-{}", built_at.timestamp_millis());
    for attempt in 0u32.. {
        let name = if attempt == 0 {
            stem.clone()
        } else {
            format!("{}-{}", stem, attempt)
        };
        let path = builds.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok((name, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(write_error(&path, e).into()),
        }
    }
    Err(StorageError::Write {
        path: builds.display().to_string(),
        reason: "no free build directory name".to_string(),
    }
    .into())
}

fn write_build(build_dir: &Path, snapshot: &Snapshot) -> EpiResult<Vec<DataType>> {
    let mut written = Vec::new();
    for (data_type, dataset) in snapshot.datasets() {
        write_document(
            build_dir,
            &SnapshotPersistence::countries_document(data_type),
            &dataset.countries,
        )?;
        write_document(
            build_dir,
            &SnapshotPersistence::regions_document(data_type),
            &dataset.regions,
        )?;
        if let Some(us) = &dataset.us_regions {
            write_document(
                build_dir,
                &SnapshotPersistence::us_regions_document(data_type),
                us,
            )?;
        }
        written.push(data_type);
    }
    write_document(build_dir, LIVE_DOCUMENT, snapshot.live())?;
    Ok(written)
}

fn write_document<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> EpiResult<()> {
    let path = dir.join(name);
    let body = serde_json::to_vec(value).map_err(|e| StorageError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_error(&path, e))?;
    tmp.write_all(&body)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| write_error(&path, e))?;
    tmp.persist(&path).map_err(|e| write_error(&path, e.error))?;

    tracing::trace!(document = name, bytes = body.len(), "Wrote document");
    Ok(())
}

fn read_optional<T: DeserializeOwned>(dir: &Path, name: &str) -> EpiResult<Option<T>> {
    let decode_error = |reason: String| StorageError::Decode {
        document: name.to_string(),
        reason,
    };
    let body = match fs::read(dir.join(name)) {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(decode_error(e.to_string()).into()),
    };
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| decode_error(e.to_string()).into())
}

fn read_required<T: DeserializeOwned>(dir: &Path, name: &str) -> EpiResult<T> {
    read_optional(dir, name)?.ok_or_else(|| {
        StorageError::DocumentMissing {
            document: name.to_string(),
        }
        .into()
    })
}

fn write_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
