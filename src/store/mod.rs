//! Shared data store: the single source of truth for the current dataset.
//!
//! [`DataStore`] owns the record sequence, the publication flag, the
//! last-update timestamp and the optional scheme document. Every view reads
//! through it; non-admin views must use the gated [`DataStore::public_records`]
//! path, which returns nothing until [`DataStore::publish`] has been called.
//!
//! Change notification uses a `tokio::sync::broadcast` channel of
//! [`StoreEvent`]s. The contract is initialize-then-subscribe: a receiver only
//! sees events sent after [`DataStore::subscribe`], so consumers read current
//! state first and then watch for changes.
//!
//! Every mutating operation persists the dataset to the state directory so it
//! survives a restart. Persistence failures are logged and swallowed - the
//! in-memory state stays authoritative for the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::StoreResult;
use crate::models::{SchemeDocument, StoreRecord};

/// Directory where state is persisted (relative to current dir).
pub const DEFAULT_STATE_DIR: &str = ".pointsboard/state";

/// Persisted state layout: three independent entries.
const RECORDS_FILE: &str = "records.json";
const PUBLISHED_FILE: &str = "published.json";
const LAST_UPDATE_FILE: &str = "last_update.json";

/// Broadcast channel capacity; a lagging subscriber re-reads current state
/// anyway, so dropped events are recoverable.
const EVENT_CAPACITY: usize = 64;

// =============================================================================
// Events
// =============================================================================

/// A change notification from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreEvent {
    /// The full record sequence was swapped out (publish flag reset).
    RecordsReplaced,
    /// The current dataset became visible to non-admin views.
    Published,
    /// The scheme document was set or replaced.
    SchemeUpdated,
}

// =============================================================================
// Dataset State
// =============================================================================

#[derive(Debug, Default)]
struct DatasetState {
    /// Insertion order = file order of the last successful upload.
    records: Vec<StoreRecord>,
    published: bool,
    last_update: Option<DateTime<Utc>>,
    /// In memory only - not part of the persisted layout.
    scheme: Option<SchemeDocument>,
}

// =============================================================================
// Data Store
// =============================================================================

/// Central authority for the current dataset.
///
/// Explicitly constructed and shareable via `Arc`; the interior mutex gives
/// single-writer discipline under the multi-threaded runtime. All operations
/// are synchronous and atomic from the caller's perspective.
pub struct DataStore {
    state_dir: PathBuf,
    inner: Mutex<DatasetState>,
    events: broadcast::Sender<StoreEvent>,
}

impl DataStore {
    /// Create a store backed by the default state directory.
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_STATE_DIR)
    }

    /// Create a store backed by a custom state directory, rehydrating any
    /// previously persisted dataset. Falls back to an empty, unpublished
    /// dataset on any read or deserialization failure.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let state_dir = dir.as_ref().to_path_buf();
        let state = match load_state(&state_dir) {
            Ok(state) => state,
            Err(e) => {
                eprintln!(
                    "DataStore: failed to load persisted state, resetting to empty: {}",
                    e
                );
                DatasetState::default()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state_dir,
            inner: Mutex::new(state),
            events,
        }
    }

    /// Atomically swap the full record sequence.
    ///
    /// Stamps the current time as last-update and resets the publish flag:
    /// fresh data always requires an explicit re-publish before non-admin
    /// views can see it.
    pub fn replace_records(&self, records: Vec<StoreRecord>) {
        let mut state = self.state();
        state.records = records;
        state.published = false;
        state.last_update = Some(Utc::now());
        self.persist(&state);
        drop(state);
        self.notify(StoreEvent::RecordsReplaced);
    }

    /// Make the current dataset visible to non-admin views.
    ///
    /// Idempotent: publishing an already-published dataset changes nothing
    /// and emits no duplicate event.
    pub fn publish(&self) {
        let mut state = self.state();
        if state.published {
            return;
        }
        state.published = true;
        self.persist(&state);
        drop(state);
        self.notify(StoreEvent::Published);
    }

    /// Records for ordinary views: the full sequence once published, an empty
    /// sequence before that. This is the only read path non-admin consumers
    /// may use.
    pub fn public_records(&self) -> Vec<StoreRecord> {
        let state = self.state();
        if state.published {
            state.records.clone()
        } else {
            Vec::new()
        }
    }

    /// Records regardless of the publish flag; reserved for the admin view.
    pub fn all_records(&self) -> Vec<StoreRecord> {
        self.state().records.clone()
    }

    /// Look up a store by code, gated by publication.
    ///
    /// Duplicate codes are not rejected at ingest; the first match in file
    /// order wins.
    pub fn find_by_store_code(&self, code: &str) -> Option<StoreRecord> {
        let state = self.state();
        if !state.published {
            return None;
        }
        state.records.iter().find(|r| r.store_code == code).cloned()
    }

    /// Attach or replace the scheme document. Independent of the publish
    /// gate; readable immediately.
    pub fn set_scheme_document(&self, document: SchemeDocument) {
        let mut state = self.state();
        state.scheme = Some(document);
        self.persist(&state);
        drop(state);
        self.notify(StoreEvent::SchemeUpdated);
    }

    /// The scheme document, if one has been uploaded this session.
    pub fn scheme_document(&self) -> Option<SchemeDocument> {
        self.state().scheme.clone()
    }

    pub fn is_published(&self) -> bool {
        self.state().published
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state().last_update
    }

    /// Whether any dataset has been loaded (publish precondition).
    pub fn has_records(&self) -> bool {
        !self.state().records.is_empty()
    }

    /// Register for change notifications. Events from before this call are
    /// not replayed; read current state first.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine - the admin CLI mutates without listeners.
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, DatasetState> {
        // A poisoned lock only means some holder panicked; the dataset
        // itself is still consistent, so recover the guard.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &DatasetState) {
        if let Err(e) = write_state(&self.state_dir, state) {
            eprintln!("DataStore: failed to persist state: {}", e);
        }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Persistence
// =============================================================================

fn load_state(dir: &Path) -> StoreResult<DatasetState> {
    let records_path = dir.join(RECORDS_FILE);
    if !records_path.exists() {
        // Fresh start, nothing persisted yet.
        return Ok(DatasetState::default());
    }

    let records: Vec<StoreRecord> = serde_json::from_str(&fs::read_to_string(&records_path)?)?;

    let published = match fs::read_to_string(dir.join(PUBLISHED_FILE)) {
        Ok(content) => serde_json::from_str(&content)?,
        Err(_) => false,
    };

    let last_update = match fs::read_to_string(dir.join(LAST_UPDATE_FILE)) {
        Ok(content) => {
            let iso: String = serde_json::from_str(&content)?;
            let parsed = DateTime::parse_from_rfc3339(&iso)
                .map_err(|e| crate::error::StoreError::InvalidTimestamp(e.to_string()))?;
            Some(parsed.with_timezone(&Utc))
        }
        Err(_) => None,
    };

    println!(
        "DataStore: loaded persisted dataset: {} records, published: {}",
        records.len(),
        published
    );

    Ok(DatasetState {
        records,
        published,
        last_update,
        scheme: None,
    })
}

fn write_state(dir: &Path, state: &DatasetState) -> StoreResult<()> {
    fs::create_dir_all(dir)?;

    fs::write(
        dir.join(RECORDS_FILE),
        serde_json::to_string_pretty(&state.records)?,
    )?;
    fs::write(
        dir.join(PUBLISHED_FILE),
        serde_json::to_string(&state.published)?,
    )?;

    match &state.last_update {
        Some(ts) => fs::write(
            dir.join(LAST_UPDATE_FILE),
            serde_json::to_string(&ts.to_rfc3339())?,
        )?,
        None => {
            let _ = fs::remove_file(dir.join(LAST_UPDATE_FILE));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(code: &str, name: &str) -> StoreRecord {
        StoreRecord {
            store_code: code.into(),
            store_name: name.into(),
            city: "City".into(),
            region: "North".into(),
            cluster_name: String::new(),
            total_target: 1000,
            total_achievement: 1200,
            qualified: true,
            total_points_earned: 50,
        }
    }

    #[test]
    fn test_public_records_gated_by_publish() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());

        store.replace_records(vec![record("ST001", "A"), record("ST002", "B")]);
        assert!(store.public_records().is_empty());
        assert_eq!(store.all_records().len(), 2);

        store.publish();
        assert_eq!(store.public_records().len(), 2);
    }

    #[test]
    fn test_replace_preserves_order_and_resets_publish() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());

        store.replace_records(vec![record("ST001", "A")]);
        store.publish();
        assert!(store.is_published());

        // New data is invisible until explicitly re-published.
        store.replace_records(vec![record("ST003", "C"), record("ST002", "B")]);
        assert!(!store.is_published());
        assert!(store.public_records().is_empty());

        let all = store.all_records();
        assert_eq!(all[0].store_code, "ST003");
        assert_eq!(all[1].store_code, "ST002");
    }

    #[test]
    fn test_find_by_store_code_first_match_and_gated() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());

        let mut duplicate = record("ST001", "Later Duplicate");
        duplicate.total_points_earned = 999;
        store.replace_records(vec![record("ST001", "A"), duplicate]);

        assert!(store.find_by_store_code("ST001").is_none()); // unpublished

        store.publish();
        let found = store.find_by_store_code("ST001").unwrap();
        assert_eq!(found.store_name, "A"); // first match wins
        assert!(store.find_by_store_code("UNKNOWN").is_none());
    }

    #[test]
    fn test_publish_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());
        store.replace_records(vec![record("ST001", "A")]);

        let mut rx = store.subscribe();
        store.publish();
        store.publish();

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Published);
        assert!(rx.try_recv().is_err()); // no duplicate event
    }

    #[test]
    fn test_event_ordering_replace_then_publish() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());
        let mut rx = store.subscribe();

        store.replace_records(vec![record("ST001", "A")]);
        store.publish();

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::RecordsReplaced);
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Published);
    }

    #[test]
    fn test_late_subscriber_sees_no_history() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());

        store.replace_records(vec![record("ST001", "A")]);
        let mut rx = store.subscribe();
        assert!(rx.try_recv().is_err());
        // Current state is still readable.
        assert_eq!(store.all_records().len(), 1);
    }

    #[test]
    fn test_scheme_document_independent_of_publish() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());
        let mut rx = store.subscribe();

        assert!(store.scheme_document().is_none());
        store.set_scheme_document(SchemeDocument {
            filename: "rules.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![1, 2, 3],
        });

        let doc = store.scheme_document().unwrap();
        assert_eq!(doc.filename, "rules.pdf");
        assert!(!store.is_published());
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::SchemeUpdated);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        {
            let store = DataStore::with_dir(dir.path());
            store.replace_records(vec![record("ST001", "A"), record("ST002", "B")]);
            store.publish();
        }

        let reloaded = DataStore::with_dir(dir.path());
        assert!(reloaded.is_published());
        assert!(reloaded.last_update().is_some());
        let records = reloaded.all_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].store_code, "ST001");
        assert_eq!(records[1].store_code, "ST002");
    }

    #[test]
    fn test_last_update_persisted_as_rfc3339() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());
        assert!(store.last_update().is_none());

        store.replace_records(vec![record("ST001", "A")]);
        assert!(store.last_update().is_some());

        let raw = fs::read_to_string(dir.path().join(LAST_UPDATE_FILE)).unwrap();
        let iso: String = serde_json::from_str(&raw).unwrap();
        assert!(DateTime::parse_from_rfc3339(&iso).is_ok());
    }

    #[test]
    fn test_corrupt_state_resets_to_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(RECORDS_FILE), "not json at all").unwrap();
        fs::write(dir.path().join(PUBLISHED_FILE), "true").unwrap();

        let store = DataStore::with_dir(dir.path());
        assert!(store.all_records().is_empty());
        assert!(!store.is_published());
    }

    #[test]
    fn test_corrupt_timestamp_resets_to_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(RECORDS_FILE), "[]").unwrap();
        fs::write(dir.path().join(LAST_UPDATE_FILE), "\"yesterday-ish\"").unwrap();

        let store = DataStore::with_dir(dir.path());
        assert!(store.last_update().is_none());
        assert!(!store.is_published());
    }

    #[test]
    fn test_has_records() {
        let dir = tempdir().unwrap();
        let store = DataStore::with_dir(dir.path());
        assert!(!store.has_records());
        store.replace_records(vec![record("ST001", "A")]);
        assert!(store.has_records());
    }
}
