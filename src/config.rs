use crate::app::ViewConfig;
use crate::cache::{SnapshotCache, DEFAULT_TTL};
use crate::present::CurrencyStyle;
use crate::remote::{SourceConfig, DEFAULT_CSV_URL, DEFAULT_GEO_URL};
use crate::store::DirStore;
use crate::view::{DEFAULT_PAGE_SIZE, DEFAULT_TOP_MUNICIPALITIES};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PRIMARY_QUOTA: u64 = 5 * 1024 * 1024;
pub const DEFAULT_SECONDARY_QUOTA: u64 = 256 * 1024 * 1024;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Always fetch, never persist.
    Disabled,
    /// Read and write snapshots under `cache_dir`.
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub geo_url: String,
    pub csv_url: String,
    pub cache_dir: PathBuf,
    pub cache: CacheStrategy,
    pub cache_ttl: Duration,
    pub primary_quota: u64,
    pub secondary_quota: u64,
    pub http_timeout_secs: u64,
    pub top_municipalities: usize,
    pub currency: CurrencyStyle,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values take defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            geo_url: var("PA_DIGITALE_GEO_URL").unwrap_or_else(|| DEFAULT_GEO_URL.to_string()),
            csv_url: var("PA_DIGITALE_CSV_URL").unwrap_or_else(|| DEFAULT_CSV_URL.to_string()),
            cache_dir: var("PA_DIGITALE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.pa_digitale_cache")),
            cache: match var("PA_DIGITALE_CACHE").as_deref().map(str::trim) {
                Some("0" | "off" | "false" | "OFF" | "FALSE") => CacheStrategy::Disabled,
                _ => CacheStrategy::Snapshot,
            },
            cache_ttl: number("PA_DIGITALE_CACHE_TTL_HOURS")
                .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
                .unwrap_or(DEFAULT_TTL),
            primary_quota: number("PA_DIGITALE_PRIMARY_QUOTA").unwrap_or(DEFAULT_PRIMARY_QUOTA),
            secondary_quota: number("PA_DIGITALE_SECONDARY_QUOTA")
                .unwrap_or(DEFAULT_SECONDARY_QUOTA),
            http_timeout_secs: number("PA_DIGITALE_HTTP_TIMEOUT_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            top_municipalities: number("PA_DIGITALE_TOP_MUNICIPALITIES")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_TOP_MUNICIPALITIES),
            currency: var("PA_DIGITALE_CURRENCY")
                .and_then(|v| CurrencyStyle::parse(&v))
                .unwrap_or_default(),
            page_size: number("PA_DIGITALE_PAGE_SIZE")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            geo_location: self.geo_url.clone(),
            csv_location: self.csv_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(concat!("pa-digitale/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }

    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            top_municipalities: self.top_municipalities,
            currency: self.currency,
            page_size: self.page_size,
        }
    }

    /// Directory-backed snapshot cache, or `None` when caching is off.
    pub fn build_cache(&self) -> Option<SnapshotCache> {
        match self.cache {
            CacheStrategy::Disabled => None,
            CacheStrategy::Snapshot => Some(SnapshotCache::new(
                Arc::new(DirStore::new(self.cache_dir.join("primary"), self.primary_quota)),
                Arc::new(DirStore::new(
                    self.cache_dir.join("secondary"),
                    self.secondary_quota,
                )),
                self.cache_ttl,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.geo_url, DEFAULT_GEO_URL);
        assert_eq!(cfg.cache, CacheStrategy::Snapshot);
        assert_eq!(cfg.cache_ttl, DEFAULT_TTL);
        assert_eq!(cfg.primary_quota, 5_242_880);
        assert_eq!(cfg.top_municipalities, 50);
        assert_eq!(cfg.currency, CurrencyStyle::Abbreviated);
        assert!(cfg.build_cache().is_some());
    }

    #[test]
    fn overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PA_DIGITALE_CACHE", "off"),
            ("PA_DIGITALE_CACHE_TTL_HOURS", "2"),
            ("PA_DIGITALE_TOP_MUNICIPALITIES", "20"),
            ("PA_DIGITALE_CURRENCY", "locale"),
            ("PA_DIGITALE_PAGE_SIZE", "zero"),
            ("PA_DIGITALE_HTTP_TIMEOUT_SECS", "0"),
        ]);
        let cfg = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.cache, CacheStrategy::Disabled);
        assert!(cfg.build_cache().is_none());
        assert_eq!(cfg.cache_ttl, Duration::from_secs(7200));
        assert_eq!(cfg.view_config().top_municipalities, 20);
        assert_eq!(cfg.view_config().currency, CurrencyStyle::Locale);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn absurd_ttl_saturates() {
        let cfg = AppConfig::from_lookup(|k| {
            (k == "PA_DIGITALE_CACHE_TTL_HOURS").then(|| u64::MAX.to_string())
        });
        assert_eq!(cfg.cache_ttl, Duration::from_secs(u64::MAX));
    }
}
