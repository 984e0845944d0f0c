//! # Pointsboard - Sales incentive data distribution
//!
//! Pointsboard ingests sales-incentive ("points") spreadsheets uploaded by an
//! administrator, gates them behind an explicit publish action, and serves
//! per-store, per-cluster and per-region views to the field.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│ Row Parser  │────▶│ Data Store  │────▶│   Queries   │
//! │  (upload)   │     │ (9 columns) │     │ (publish    │     │ (store /    │
//! └─────────────┘     └─────────────┘     │  gate)      │     │  cluster /  │
//!                                         └─────────────┘     │  region)    │
//!                                                             └─────────────┘
//! ```
//!
//! Uploads replace the dataset wholesale and reset the publish flag; nothing
//! reaches non-admin views until the administrator publishes again. The store
//! persists its state to a local directory and broadcasts change events to
//! subscribers (served over SSE by the HTTP API).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pointsboard::{parse_upload, DataStore};
//!
//! let records = parse_upload("sales.csv", &bytes)?;
//! let store = DataStore::new();
//! store.replace_records(records);
//! store.publish();
//! assert!(!store.public_records().is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Domain models (StoreRecord, summaries, SchemeDocument)
//! - [`parser`] - CSV/XLSX row parsing and the template export
//! - [`store`] - Shared data store with publish gating and persistence
//! - [`query`] - Cluster and region derivations
//! - [`access`] - Shared-secret admin gate
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Shared state
pub mod store;

// Read-side queries
pub mod query;

// Access gate
pub mod access;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ParseError, ParseResult, ServerError, ServerResult, StoreError, StoreResult};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ClusterSummary, RegionSummary, SchemeDocument, StoreRecord};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_encoding, detect_format, parse_csv_bytes, parse_upload, parse_workbook_bytes,
    template_csv, UploadFormat, TEMPLATE_HEADER,
};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{DataStore, StoreEvent, DEFAULT_STATE_DIR};

// =============================================================================
// Re-exports - Queries
// =============================================================================

pub use query::{
    achievement_rate, cluster_names, cluster_records, cluster_summary, region_summaries,
};

// =============================================================================
// Re-exports - Access
// =============================================================================

pub use access::{PasscodeGate, DEFAULT_PASSCODE};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, RecordsResponse, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
