//! Snapshot persistence across runs, over two backends of different size.
//!
//! The primary backend keeps the encoded blob and its timestamp under two
//! keys. The secondary backend keeps a single JSON envelope. A snapshot is
//! fresh while it is younger than the TTL; anything else is a miss.

use crate::codec;
use crate::store::BlobStore;
use crate::types::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DATA_KEY: &str = "paDigitale2026Data";
pub const TIMESTAMP_KEY: &str = "paDigitale2026Timestamp";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheBackend {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    Absent,
    Stale { age_ms: i64 },
    Corrupt,
}

#[derive(Debug)]
pub enum CacheLookup {
    Hit {
        dataset: Dataset,
        backend: CacheBackend,
        timestamp_ms: i64,
    },
    Miss {
        primary: MissReason,
        secondary: MissReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PersistOutcome {
    Stored(CacheBackend),
    Skipped,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    data: String,
    timestamp: i64,
}

/// Fresh iff `now - timestamp < ttl`.
pub fn is_fresh(timestamp_ms: i64, now_ms: i64, ttl: Duration) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(timestamp_ms) < ttl_ms
}

#[derive(Clone)]
pub struct SnapshotCache {
    primary: Arc<dyn BlobStore>,
    secondary: Arc<dyn BlobStore>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(primary: Arc<dyn BlobStore>, secondary: Arc<dyn BlobStore>, ttl: Duration) -> Self {
        Self {
            primary,
            secondary,
            ttl,
        }
    }

    /// Try the primary backend, then the secondary.
    pub async fn read(&self, now_ms: i64) -> CacheLookup {
        let primary = match self.read_primary(now_ms).await {
            Ok((dataset, timestamp_ms)) => {
                return CacheLookup::Hit {
                    dataset,
                    backend: CacheBackend::Primary,
                    timestamp_ms,
                }
            }
            Err(reason) => reason,
        };
        debug!(?primary, "primary snapshot miss");

        let secondary = match self.read_secondary(now_ms).await {
            Ok((dataset, timestamp_ms)) => {
                return CacheLookup::Hit {
                    dataset,
                    backend: CacheBackend::Secondary,
                    timestamp_ms,
                }
            }
            Err(reason) => reason,
        };
        debug!(?secondary, "secondary snapshot miss");

        CacheLookup::Miss { primary, secondary }
    }

    async fn read_primary(&self, now_ms: i64) -> Result<(Dataset, i64), MissReason> {
        let data = self.get_logged(&*self.primary, DATA_KEY).await?;
        let stamp = self.get_logged(&*self.primary, TIMESTAMP_KEY).await?;
        let timestamp_ms = std::str::from_utf8(&stamp)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or(MissReason::Corrupt)?;
        self.check_and_decode(&data, timestamp_ms, now_ms)
            .map(|dataset| (dataset, timestamp_ms))
    }

    async fn read_secondary(&self, now_ms: i64) -> Result<(Dataset, i64), MissReason> {
        let raw = self.get_logged(&*self.secondary, DATA_KEY).await?;
        let envelope: Envelope = serde_json::from_slice(&raw).map_err(|err| {
            warn!(error = %err, "secondary snapshot envelope unreadable");
            MissReason::Corrupt
        })?;
        self.check_and_decode(envelope.data.as_bytes(), envelope.timestamp, now_ms)
            .map(|dataset| (dataset, envelope.timestamp))
    }

    async fn get_logged(&self, store: &dyn BlobStore, key: &str) -> Result<Vec<u8>, MissReason> {
        match store.get(key).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(MissReason::Absent),
            Err(err) => {
                warn!(key, error = %err, "snapshot read failed");
                Err(MissReason::Absent)
            }
        }
    }

    fn check_and_decode(
        &self,
        blob: &[u8],
        timestamp_ms: i64,
        now_ms: i64,
    ) -> Result<Dataset, MissReason> {
        if !is_fresh(timestamp_ms, now_ms, self.ttl) {
            return Err(MissReason::Stale {
                age_ms: now_ms.saturating_sub(timestamp_ms),
            });
        }
        codec::decode(blob).map_err(|err| {
            warn!(error = %err, "snapshot decode failed");
            MissReason::Corrupt
        })
    }

    /// Persist a snapshot, falling back to the secondary backend when the
    /// primary refuses it. Failure of both is logged and otherwise ignored.
    pub async fn write(&self, dataset: &Dataset, now_ms: i64) -> PersistOutcome {
        let blob = match codec::encode(dataset) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(error = %err, "snapshot encode failed, caching skipped");
                return PersistOutcome::Skipped;
            }
        };

        match self.write_primary(&blob, now_ms).await {
            Ok(()) => {
                info!(bytes = blob.len(), "snapshot saved to primary backend");
                return PersistOutcome::Stored(CacheBackend::Primary);
            }
            Err(err) => {
                warn!(error = %err, "primary backend refused snapshot, trying secondary");
                let _ = self.primary.remove(DATA_KEY).await;
                let _ = self.primary.remove(TIMESTAMP_KEY).await;
            }
        }

        let envelope = Envelope {
            key: DATA_KEY.to_string(),
            data: String::from_utf8_lossy(&blob).into_owned(),
            timestamp: now_ms,
        };
        let stored = match serde_json::to_vec(&envelope) {
            Ok(bytes) => self.secondary.put(DATA_KEY, &bytes).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match stored {
            Ok(()) => {
                info!(bytes = blob.len(), "snapshot saved to secondary backend");
                PersistOutcome::Stored(CacheBackend::Secondary)
            }
            Err(err) => {
                warn!(error = %err, "unable to cache snapshot");
                PersistOutcome::Skipped
            }
        }
    }

    async fn write_primary(&self, blob: &[u8], now_ms: i64) -> Result<(), crate::error::StoreError> {
        self.primary.put(DATA_KEY, blob).await?;
        self.primary
            .put(TIMESTAMP_KEY, now_ms.to_string().as_bytes())
            .await
    }

    /// Drop snapshots from both backends.
    pub async fn clear(&self) -> Result<(), crate::error::StoreError> {
        self.primary.remove(DATA_KEY).await?;
        self.primary.remove(TIMESTAMP_KEY).await?;
        self.secondary.remove(DATA_KEY).await?;
        info!("snapshot cache cleared");
        Ok(())
    }
}
