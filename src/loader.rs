//! Dataset loading: snapshot first, then the two remote sources.
//!
//! A load walks `ReadingCache -> (CacheHit | CacheMiss -> FetchingRemote ->
//! Parsing) -> Joining -> Ready`, or ends in `Failed`. Only one load may be
//! in flight per loader.

use crate::cache::{CacheBackend, CacheLookup, PersistOutcome, SnapshotCache};
use crate::error::LoadError;
use crate::join::JoinReport;
use crate::normalize::{load_and_clean, IngestReport};
use crate::remote::{RemoteSource, Resource};
use crate::types::{Dataset, FeatureCollection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    Idle,
    ReadingCache,
    CacheHit,
    CacheMiss,
    FetchingRemote,
    Parsing,
    Joining,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataOrigin {
    Cache(CacheBackend),
    Remote,
}

#[derive(Debug)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub origin: DataOrigin,
    pub join: JoinReport,
    /// Present only when the tabular source was parsed in this load.
    pub ingest: Option<IngestReport>,
    /// Present only when a snapshot write was attempted.
    pub persisted: Option<PersistOutcome>,
}

pub struct DatasetLoader {
    source: Arc<dyn RemoteSource>,
    cache: Option<SnapshotCache>,
    state: Mutex<LoadState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the load ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DatasetLoader {
    pub fn new(source: Arc<dyn RemoteSource>, cache: Option<SnapshotCache>) -> Self {
        Self {
            source,
            cache,
            state: Mutex::new(LoadState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LoadState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: LoadState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
        tracing::debug!(state = ?next, "load state");
    }

    pub fn cache(&self) -> Option<&SnapshotCache> {
        self.cache.as_ref()
    }

    pub async fn load(&self) -> Result<LoadedDataset, LoadError> {
        self.load_at(Utc::now()).await
    }

    /// Load with an explicit clock, used for snapshot freshness and stamping.
    pub async fn load_at(&self, now: DateTime<Utc>) -> Result<LoadedDataset, LoadError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("load requested while another is running");
            return Err(LoadError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        let span = info_span!("load_dataset", cached = self.cache.is_some());
        let result = self.run(now.timestamp_millis()).instrument(span).await;
        match &result {
            Ok(loaded) => {
                self.set_state(LoadState::Ready);
                info!(
                    origin = ?loaded.origin,
                    features = loaded.dataset.features.len(),
                    records = loaded.dataset.records.len(),
                    "dataset ready"
                );
            }
            Err(err) => {
                self.set_state(LoadState::Failed);
                warn!(error = %err, "dataset load failed");
            }
        }
        result
    }

    async fn run(&self, now_ms: i64) -> Result<LoadedDataset, LoadError> {
        if let Some(cache) = &self.cache {
            self.set_state(LoadState::ReadingCache);
            match cache.read(now_ms).await {
                CacheLookup::Hit {
                    mut dataset,
                    backend,
                    timestamp_ms,
                } => {
                    self.set_state(LoadState::CacheHit);
                    info!(?backend, age_ms = now_ms - timestamp_ms, "using cached snapshot");
                    self.set_state(LoadState::Joining);
                    let join = dataset.join();
                    return Ok(LoadedDataset {
                        dataset,
                        origin: DataOrigin::Cache(backend),
                        join,
                        ingest: None,
                        persisted: None,
                    });
                }
                CacheLookup::Miss { primary, secondary } => {
                    self.set_state(LoadState::CacheMiss);
                    info!(?primary, ?secondary, "no usable snapshot");
                }
            }
        }

        self.set_state(LoadState::FetchingRemote);
        let (geo, table) = tokio::try_join!(
            self.source.fetch(Resource::Geo),
            self.source.fetch(Resource::Table)
        )?;

        self.set_state(LoadState::Parsing);
        let collection: FeatureCollection =
            serde_json::from_slice(&geo).map_err(|err| LoadError::Parse {
                source_name: Resource::Geo.name(),
                message: err.to_string(),
            })?;
        let text = String::from_utf8_lossy(&table);
        if text.trim().is_empty() {
            return Err(LoadError::Parse {
                source_name: Resource::Table.name(),
                message: "no header row".to_string(),
            });
        }
        let (records, ingest) = load_and_clean(&text);
        info!(
            features = collection.features.len(),
            accepted = ingest.accepted,
            rejected = ingest.rejected_codes,
            short = ingest.short_rows,
            "sources parsed"
        );

        let mut dataset = Dataset {
            features: collection.features,
            records,
        };
        let persisted = match &self.cache {
            Some(cache) => Some(cache.write(&dataset, now_ms).await),
            None => None,
        };

        self.set_state(LoadState::Joining);
        let join = dataset.join();
        Ok(LoadedDataset {
            dataset,
            origin: DataOrigin::Remote,
            join,
            ingest: Some(ingest),
            persisted,
        })
    }
}
