//! Domain models for the points dashboard.
//!
//! - [`StoreRecord`] - One store's target/achievement/points row for a
//!   publication cycle. Field order mirrors the published upload template.
//! - [`SchemeDocument`] - Supplementary binary artifact (e.g. the incentive
//!   rules PDF) attached to a dataset, independent of publication.
//! - [`RegionSummary`] / [`ClusterSummary`] - Read-side rollup figures.
//!
//! Records serialize in camelCase so the persisted state files and the REST
//! responses share one shape.

use serde::{Deserialize, Serialize};

// =============================================================================
// Store Record
// =============================================================================

/// One store's row for the current publication cycle.
///
/// Parser invariant: `store_code` and `store_name` are non-empty for every
/// admitted record. Numeric fields default to 0 when the source cell is
/// missing or unparsable; `qualified` comes straight from the upload (it is
/// never recomputed here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    /// Short unique store identifier (uniqueness is not enforced; lookups
    /// take the first match).
    pub store_code: String,
    /// Display name of the store.
    pub store_name: String,
    pub city: String,
    pub region: String,
    /// Administrator-defined grouping, orthogonal to region. Empty string
    /// means the store belongs to no cluster.
    #[serde(default)]
    pub cluster_name: String,
    /// Sales target in currency units.
    #[serde(default)]
    pub total_target: u64,
    /// Achieved sales in currency units.
    #[serde(default)]
    pub total_achievement: u64,
    /// Whether the store qualified for the incentive this cycle.
    #[serde(default)]
    pub qualified: bool,
    /// Points earned; meaningful by convention only when `qualified` is true.
    #[serde(default)]
    pub total_points_earned: u64,
}

// =============================================================================
// Scheme Document
// =============================================================================

/// Supplementary binary document attached to the dataset (e.g. a rules PDF).
///
/// Settable and readable at any time, regardless of the publish flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeDocument {
    /// Original filename, used for the download Content-Disposition.
    pub filename: String,
    /// MIME type as declared at upload time.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// =============================================================================
// Rollup Summaries
// =============================================================================

/// Aggregated figures for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub region: String,
    pub store_count: usize,
    pub total_target: u64,
    pub total_achievement: u64,
    /// Number of stores with `qualified == true`.
    pub total_qualified: usize,
    pub total_points: u64,
    /// `total_achievement / total_target * 100`, rounded to the nearest
    /// integer percent; 0 when the target is 0.
    pub achievement_rate: u64,
}

/// Aggregated figures for one cluster's stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub store_count: usize,
    pub total_target: u64,
    pub total_achievement: u64,
    pub total_qualified: usize,
    pub total_points: u64,
    pub achievement_rate: u64,
}

// =============================================================================
// Tests
// =============================================================================
