//! Data core of the PA Digitale 2026 funding dashboard: ingestion of the
//! candidature feed and municipality boundaries, snapshot caching, the
//! feature join, cascading filters and the chart/table projections.

pub mod app;
pub mod cache;
pub mod codec;
pub mod config;
pub mod csv_parse;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod join;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod present;
pub mod remote;
pub mod store;
pub mod types;
pub mod util;
pub mod view;

pub use app::{Dashboard, DashboardView, FilterChange, ViewConfig};
pub use config::AppConfig;
pub use error::{CodecError, ExportError, FetchError, LoadError, StoreError};
pub use filter::{Dimension, FilterOptions, FilterState};
pub use loader::{DataOrigin, DatasetLoader, LoadState, LoadedDataset};
pub use types::{ApplicationRecord, Dataset, MunicipalityAggregate, MunicipalityFeature};
pub use view::{ChartMode, SortColumn, SortDirection};
