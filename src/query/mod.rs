//! Read-side derivations over the shared data store.
//!
//! Pure functions, no independent state: cluster grouping and regional
//! rollups are recomputed from the record sequence on every call. Gated
//! helpers read through [`DataStore::public_records`], so nothing here leaks
//! unpublished data to non-admin consumers.

use std::collections::BTreeMap;

use crate::models::{ClusterSummary, RegionSummary, StoreRecord};
use crate::store::DataStore;

/// Achievement rate as an integer percent, rounded to nearest.
///
/// Defined as 0 when the target is 0 so a region of target-less stores never
/// divides by zero.
pub fn achievement_rate(total_target: u64, total_achievement: u64) -> u64 {
    if total_target == 0 {
        return 0;
    }
    ((total_achievement as f64 / total_target as f64) * 100.0).round() as u64
}

/// Distinct non-empty cluster names from the published set, sorted and
/// de-duplicated. Empty before publish.
pub fn cluster_names(store: &DataStore) -> Vec<String> {
    let mut names: Vec<String> = store
        .public_records()
        .into_iter()
        .map(|r| r.cluster_name)
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Published records belonging to the given cluster, in file order.
/// Unknown cluster names yield an empty result, not an error.
pub fn cluster_records(store: &DataStore, cluster: &str) -> Vec<StoreRecord> {
    store
        .public_records()
        .into_iter()
        .filter(|r| r.cluster_name == cluster)
        .collect()
}

/// Rollup figures for one cluster's stores.
pub fn cluster_summary(records: &[StoreRecord]) -> ClusterSummary {
    let total_target: u64 = records.iter().map(|r| r.total_target).sum();
    let total_achievement: u64 = records.iter().map(|r| r.total_achievement).sum();

    ClusterSummary {
        store_count: records.len(),
        total_target,
        total_achievement,
        total_qualified: records.iter().filter(|r| r.qualified).count(),
        total_points: records.iter().map(|r| r.total_points_earned).sum(),
        achievement_rate: achievement_rate(total_target, total_achievement),
    }
}

/// Group records by region and compute per-region rollups, sorted by region
/// name for a deterministic output order.
pub fn region_summaries(records: &[StoreRecord]) -> Vec<RegionSummary> {
    let mut regions: BTreeMap<&str, Vec<&StoreRecord>> = BTreeMap::new();
    for record in records {
        regions.entry(record.region.as_str()).or_default().push(record);
    }

    regions
        .into_iter()
        .map(|(region, stores)| {
            let total_target: u64 = stores.iter().map(|r| r.total_target).sum();
            let total_achievement: u64 = stores.iter().map(|r| r.total_achievement).sum();
            RegionSummary {
                region: region.to_string(),
                store_count: stores.len(),
                total_target,
                total_achievement,
                total_qualified: stores.iter().filter(|r| r.qualified).count(),
                total_points: stores.iter().map(|r| r.total_points_earned).sum(),
                achievement_rate: achievement_rate(total_target, total_achievement),
            }
        })
        .collect()
}
