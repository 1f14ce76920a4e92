use thiserror::Error;

/// Failure while retrieving one of the two remote sources.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("no response from {url} within {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("reading {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a key-value blob backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("quota exceeded: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded { needed: u64, capacity: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("a load is already in progress")]
    Busy,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parsing {source_name} source: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no rows to export")]
    NoRows,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
