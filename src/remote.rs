//! Retrieval of the geographic and tabular sources.

use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

pub const DEFAULT_GEO_URL: &str =
    "https://palermohub.github.io/Pa-Digitale-2026/pmtiles/comuni_italiani_2025_2.json";
pub const DEFAULT_CSV_URL: &str = "https://query.data.world/s/yxkuwlvmx4oxyngoeera3kf4awaje3?dws=00000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Municipality feature collection (GeoJSON).
    Geo,
    /// Candidature CSV.
    Table,
}

impl Resource {
    pub fn name(self) -> &'static str {
        match self {
            Resource::Geo => "geographic",
            Resource::Table => "tabular",
        }
    }
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub geo_location: String,
    pub csv_location: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

/// Fetches over HTTP(S); any location that is not an http URL is read from
/// the local filesystem instead, which keeps offline runs possible.
#[derive(Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    config: SourceConfig,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().gzip(true).connect_timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client, config })
    }

    fn location(&self, resource: Resource) -> &str {
        match resource {
            Resource::Geo => &self.config.geo_location,
            Resource::Table => &self.config.csv_location,
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: resp.url().to_string(),
                });
            }
            let body = resp.bytes().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            Ok(body.to_vec())
        };

        // Bounds the whole exchange, headers and body included.
        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: self.config.timeout.as_secs(),
            }),
        }
    }

    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let path = path.strip_prefix("file://").unwrap_or(path);
        tokio::fs::read(path).await.map_err(|source| FetchError::File {
            path: path.to_string(),
            source,
        })
    }
}

fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let location = self.location(resource).to_string();
        let span = info_span!("fetch_source", source = resource.name(), location = %location);
        async {
            let body = if is_http(&location) {
                self.fetch_url(&location).await?
            } else {
                self.fetch_file(&location).await?
            };
            debug!(bytes = body.len(), "source retrieved");
            Ok(body)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::loader::{DatasetLoader, LoadState};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    fn config(geo: String, csv: String) -> SourceConfig {
        SourceConfig {
            geo_location: geo,
            csv_location: csv,
            timeout: Duration::from_secs(5),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn local_paths_are_read_from_disk() {
        let dir = tempdir().expect("tempdir");
        let geo = dir.path().join("geo.json");
        std::fs::write(&geo, br#"{"features": []}"#).expect("write");
        let source = HttpSource::new(config(
            format!("file://{}", geo.display()),
            dir.path().join("missing.csv").display().to_string(),
        ))
        .expect("client");

        let body = source.fetch(Resource::Geo).await.expect("geo");
        assert_eq!(body, br#"{"features": []}"#);
        let err = source.fetch(Resource::Table).await.expect_err("missing file");
        assert!(matches!(err, FetchError::File { .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out_and_fails_the_load() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let mut cfg = config(
            format!("http://{addr}/geo.json"),
            format!("http://{addr}/data.csv"),
        );
        cfg.timeout = Duration::from_millis(100);
        let source = HttpSource::new(cfg).expect("client");

        let err = source.fetch(Resource::Geo).await.expect_err("no reply");
        assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");

        let loader = DatasetLoader::new(Arc::new(source), None);
        let err = loader.load().await.expect_err("no reply");
        assert!(
            matches!(err, LoadError::Fetch(FetchError::Timeout { .. })),
            "{err:?}"
        );
        assert_eq!(loader.state(), LoadState::Failed);
    }

    #[test]
    fn http_detection() {
        assert!(is_http("https://example.org/a.csv"));
        assert!(!is_http("/tmp/a.csv"));
        assert!(!is_http("file:///tmp/a.csv"));
    }
}
