//! REST API types for frontend integration.
//!
//! Responses use camelCase throughout so the browser consumes record and
//! summary shapes identical to the persisted state files. Timestamps are
//! RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{ClusterSummary, RegionSummary, StoreRecord};

/// Response after a successful dataset upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique identifier for this upload.
    pub upload_id: String,

    /// Status: "ok" (errors use [`error_response`]).
    pub status: String,

    /// Number of admitted records.
    pub record_count: usize,

    /// Always false right after an upload: replacing the dataset resets the
    /// publish flag and the admin must publish explicitly.
    pub published: bool,

    /// RFC 3339 last-update stamp.
    pub last_update: Option<String>,
}

/// Record listing, for both the gated and the admin read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub records: Vec<StoreRecord>,
    pub published: bool,
    pub last_update: Option<String>,
}

/// Result of a publish action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub status: String,
    pub record_count: usize,
}

/// Distinct cluster names available to cluster managers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersResponse {
    pub clusters: Vec<String>,
}

/// One cluster's stores plus its rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResponse {
    pub cluster: String,
    pub records: Vec<StoreRecord>,
    pub summary: ClusterSummary,
}

/// Regional rollup over the admin record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionsResponse {
    pub regions: Vec<RegionSummary>,
}

/// Passcode submitted for validation or as the new secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasscodeRequest {
    pub passcode: String,
}

/// Validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
}

/// Format an RFC 3339 stamp for responses.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

/// Create an error response body.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_camel_case() {
        let response = UploadResponse {
            upload_id: "u-1".into(),
            status: "ok".into(),
            record_count: 2,
            published: false,
            last_update: Some("2025-01-01T00:00:00+00:00".into()),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"uploadId\""));
        assert!(json.contains("\"recordCount\":2"));
        assert!(json.contains("\"lastUpdate\""));
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No valid data found in file");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No valid data found in file");
    }

    #[test]
    fn test_format_timestamp() {
        assert!(format_timestamp(None).is_none());
        let stamp = format_timestamp(Some(Utc::now())).unwrap();
        assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
