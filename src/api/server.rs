//! HTTP server for the points dashboard API.
//!
//! The admin portal uploads and publishes through this surface; store and
//! cluster views read through the gated endpoints. UI concerns (rendering,
//! routing, toasts) live entirely in the browser.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                               |
//! |--------|--------------------------|-------------------------------------------|
//! | GET    | `/health`                | Health check                              |
//! | POST   | `/api/upload`            | Upload CSV/XLSX dataset (replaces all)    |
//! | POST   | `/api/publish`           | Make the dataset visible to users         |
//! | GET    | `/api/records`           | Admin view, ignores the publish gate      |
//! | GET    | `/api/public/records`    | Gated record listing                      |
//! | GET    | `/api/stores/{code}`     | Gated per-store lookup                    |
//! | GET    | `/api/clusters`          | Distinct cluster names (gated)            |
//! | GET    | `/api/clusters/{name}`   | Cluster records + rollup (gated)          |
//! | GET    | `/api/regions`           | Regional rollup over the admin set        |
//! | GET    | `/api/template`          | CSV template download                     |
//! | POST   | `/api/scheme`            | Upload the scheme PDF                     |
//! | GET    | `/api/scheme`            | Download the scheme PDF                   |
//! | POST   | `/api/passcode/validate` | Check the admin secret                    |
//! | POST   | `/api/passcode/change`   | Replace the admin secret                  |
//! | GET    | `/api/events`            | SSE stream of store change events         |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::types::{
    error_response, format_timestamp, ClusterResponse, ClustersResponse, PasscodeRequest,
    PublishResponse, RecordsResponse, RegionsResponse, UploadResponse, ValidateResponse,
};
use crate::access::PasscodeGate;
use crate::error::{ParseError, ServerError};
use crate::models::SchemeDocument;
use crate::parser::{parse_upload, template_csv};
use crate::query::{cluster_names, cluster_records, cluster_summary, region_summaries};
use crate::store::DataStore;

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state: the store, the access gate, and the upload guard.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DataStore>,
    pub gate: Arc<PasscodeGate>,
    /// Rejects a second upload while one is still being ingested
    /// (last-writer-wins races are not worth supporting).
    upload_busy: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(store: Arc<DataStore>, gate: Arc<PasscodeGate>) -> Self {
        Self {
            store,
            gate,
            upload_busy: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Start the HTTP server
pub async fn start_server(port: u16, state_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(DataStore::with_dir(&state_dir));
    let gate = Arc::new(PasscodeGate::with_dir(&state_dir));
    let state = AppState::new(store, gate);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Pointsboard server running on http://localhost:{}", port);
    println!("   POST /api/upload   - Upload sales data (CSV/XLSX)");
    println!("   POST /api/publish  - Release data to user views");
    println!("   GET  /api/template - Download the upload template");
    println!("   GET  /api/events   - SSE change notifications");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router (exposed separately for tests).
pub fn router(state: AppState) -> Router {
    // Permissive CORS: the dashboard frontend is served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_data))
        .route("/api/publish", post(publish_data))
        .route("/api/records", get(admin_records))
        .route("/api/public/records", get(public_records))
        .route("/api/stores/{code}", get(store_lookup))
        .route("/api/clusters", get(list_clusters))
        .route("/api/clusters/{name}", get(cluster_detail))
        .route("/api/regions", get(regional_rollup))
        .route("/api/template", get(download_template))
        .route("/api/scheme", post(upload_scheme).get(download_scheme))
        .route("/api/passcode/validate", post(validate_passcode))
        .route("/api/passcode/change", post(change_passcode))
        .route("/api/events", get(sse_events))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pointsboard",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "publish": "POST /api/publish",
            "events": "GET /api/events (SSE)"
        }
    }))
}

// =============================================================================
// Upload & Publish
// =============================================================================

/// Exclusive hold on the upload busy flag for the life of one ingestion.
///
/// Released in `Drop` rather than after the await, so the flag clears even
/// when the handler future is dropped mid-transfer (client disconnect).
struct UploadSlot(Arc<AtomicBool>);

impl UploadSlot {
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        if busy.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(Arc::clone(busy)))
        }
    }
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Upload dataset endpoint. The whole file is parsed before anything is
/// stored: a rejected upload leaves the previous dataset untouched.
async fn upload_data(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let _slot = UploadSlot::acquire(&state.upload_busy).ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(error_response(&ServerError::UploadInProgress.to_string())),
        )
    })?;

    ingest_upload(&state, &mut multipart).await
}

async fn ingest_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (file_name, _, bytes) = read_file_field(multipart).await?;

    println!("📄 NEW UPLOAD: {} ({} bytes)", file_name, bytes.len());

    let records = parse_upload(&file_name, &bytes).map_err(|e| {
        eprintln!("❌ Upload rejected: {}", e);
        (parse_error_status(&e), Json(error_response(&e.to_string())))
    })?;

    let record_count = records.len();
    state.store.replace_records(records);
    println!("   Loaded {} records (awaiting publish)", record_count);

    Ok(Json(UploadResponse {
        upload_id: Uuid::new_v4().to_string(),
        status: "ok".into(),
        record_count,
        published: state.store.is_published(),
        last_update: format_timestamp(state.store.last_update()),
    }))
}

fn parse_error_status(error: &ParseError) -> StatusCode {
    match error {
        ParseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Publish endpoint: flips the visibility gate for the current dataset.
async fn publish_data(
    State(state): State<AppState>,
) -> Result<Json<PublishResponse>, ApiError> {
    if !state.store.has_records() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(error_response(&ServerError::NoRecords.to_string())),
        ));
    }

    state.store.publish();
    let record_count = state.store.all_records().len();
    println!("📢 Published dataset: {} records now visible", record_count);

    Ok(Json(PublishResponse {
        status: "published".into(),
        record_count,
    }))
}

// =============================================================================
// Record Reads
// =============================================================================

/// Admin record listing, ignoring the publish gate.
async fn admin_records(State(state): State<AppState>) -> Json<RecordsResponse> {
    Json(RecordsResponse {
        records: state.store.all_records(),
        published: state.store.is_published(),
        last_update: format_timestamp(state.store.last_update()),
    })
}

/// Gated record listing: empty until the dataset is published.
async fn public_records(State(state): State<AppState>) -> Json<RecordsResponse> {
    Json(RecordsResponse {
        records: state.store.public_records(),
        published: state.store.is_published(),
        last_update: format_timestamp(state.store.last_update()),
    })
}

/// Per-store lookup, gated by publication. A miss and an unpublished dataset
/// look identical to the caller.
async fn store_lookup(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.store.find_by_store_code(&code) {
        Some(record) => Ok(Json(json!({ "record": record }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(error_response("Store not found or data not published")),
        )),
    }
}

// =============================================================================
// Cluster & Region Queries
// =============================================================================

async fn list_clusters(State(state): State<AppState>) -> Json<ClustersResponse> {
    Json(ClustersResponse {
        clusters: cluster_names(&state.store),
    })
}

/// Cluster detail: records plus rollup. An unknown cluster yields an empty
/// listing with a zeroed summary, not an error.
async fn cluster_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<ClusterResponse> {
    let records = cluster_records(&state.store, &name);
    let summary = cluster_summary(&records);
    Json(ClusterResponse {
        cluster: name,
        records,
        summary,
    })
}

/// Regional rollup over the admin set (the analytics tab reads this before
/// publishing).
async fn regional_rollup(State(state): State<AppState>) -> Json<RegionsResponse> {
    Json(RegionsResponse {
        regions: region_summaries(&state.store.all_records()),
    })
}

// =============================================================================
// Template & Scheme Document
// =============================================================================

/// CSV template download: fixed header plus one sample row.
async fn download_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"points_template.csv\"".to_string(),
            ),
        ],
        template_csv(),
    )
}

/// Upload the scheme document. Only PDFs are accepted, matching the admin
/// portal's picker.
async fn upload_scheme(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (file_name, content_type, bytes) = read_file_field(&mut multipart).await?;

    let is_pdf = content_type.as_deref() == Some("application/pdf")
        || file_name.to_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(error_response("Please upload a PDF file.")),
        ));
    }

    println!("📎 Scheme document uploaded: {} ({} bytes)", file_name, bytes.len());
    state.store.set_scheme_document(SchemeDocument {
        filename: file_name.clone(),
        content_type: content_type.unwrap_or_else(|| "application/pdf".to_string()),
        bytes,
    });

    Ok(Json(json!({ "status": "ok", "filename": file_name })))
}

/// Download the scheme document by its original filename.
async fn download_scheme(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state.store.scheme_document().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(error_response("Scheme document not available")),
        )
    })?;

    // Quotes in the stored filename would break the header value.
    let filename = doc.filename.replace(['"', '\r', '\n'], "_");
    Ok((
        [
            (header::CONTENT_TYPE, doc.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        doc.bytes,
    ))
}

// =============================================================================
// Access Gate
// =============================================================================

async fn validate_passcode(
    State(state): State<AppState>,
    Json(request): Json<PasscodeRequest>,
) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: state.gate.validate(&request.passcode),
    })
}

async fn change_passcode(
    State(state): State<AppState>,
    Json(request): Json<PasscodeRequest>,
) -> Json<Value> {
    state.gate.change(request.passcode);
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Events (SSE)
// =============================================================================

/// SSE endpoint streaming store change events to connected views.
///
/// Clients read current state first, then subscribe here for changes -
/// events from before the connection are not replayed.
async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.store.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Multipart Helpers
// =============================================================================

/// Pull the "file" field out of a multipart body.
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<(String, Option<String>, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(error_response(&format!("Multipart error: {}", e))),
        )
    })? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(error_response(&format!("Read error: {}", e))),
                    )
                })?
                .to_vec();
            return Ok((file_name, content_type, bytes));
        }
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(error_response("No file provided")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoreRecord;
    use tempfile::tempdir;

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState::new(
            Arc::new(DataStore::with_dir(dir)),
            Arc::new(PasscodeGate::with_dir(dir)),
        )
    }

    async fn multipart_from_body(body: axum::body::Body) -> Multipart {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUND")
            .body(body)
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn csv_multipart(csv: &str) -> Multipart {
        let body = format!(
            "--BOUND\r\nContent-Disposition: form-data; name=\"file\"; filename=\"data.csv\"\r\n\r\n{}\r\n--BOUND--\r\n",
            csv
        );
        multipart_from_body(axum::body::Body::from(body)).await
    }

    fn record(code: &str, region: &str) -> StoreRecord {
        StoreRecord {
            store_code: code.into(),
            store_name: format!("Store {}", code),
            city: "City".into(),
            region: region.into(),
            cluster_name: "Alpha".into(),
            total_target: 1000,
            total_achievement: 1200,
            qualified: true,
            total_points_earned: 50,
        }
    }

    #[tokio::test]
    async fn test_second_upload_rejected_while_first_in_flight() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());

        let slot = UploadSlot::acquire(&state.upload_busy);
        assert!(slot.is_some());

        // One is already in flight: the second gets a conflict.
        let err = upload_data(State(state.clone()), csv_multipart("h\r\nST001,A,,,,,,,").await)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        drop(slot);
        let response = upload_data(State(state), csv_multipart("h\r\nST001,A,,,,,,,").await)
            .await
            .unwrap();
        assert_eq!(response.0.record_count, 1);
    }

    #[tokio::test]
    async fn test_busy_flag_released_when_upload_dropped_mid_transfer() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());

        // Body that sends the part headers and then stalls forever, like a
        // client that disconnected mid-transfer.
        let part_headers = futures::stream::iter(vec![Ok::<_, std::io::Error>(
            axum::body::Bytes::from_static(
                b"--BOUND\r\nContent-Disposition: form-data; name=\"file\"; filename=\"data.csv\"\r\n\r\n",
            ),
        )]);
        let stalled = futures::StreamExt::chain(part_headers, futures::stream::pending());

        let multipart = multipart_from_body(axum::body::Body::from_stream(stalled)).await;
        let task = tokio::spawn(upload_data(State(state.clone()), multipart));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.upload_busy.load(Ordering::SeqCst));

        // Dropping the handler future must release the flag.
        task.abort();
        let _ = task.await;
        assert!(!state.upload_busy.load(Ordering::SeqCst));

        let response = upload_data(State(state), csv_multipart("h\r\nST001,A,,,,,,,").await)
            .await
            .unwrap();
        assert_eq!(response.0.record_count, 1);
    }

    #[tokio::test]
    async fn test_publish_without_data_rejected() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());

        let err = publish_data(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_publish_flow_through_handlers() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.store.replace_records(vec![record("ST001", "North")]);

        let gated = public_records(State(state.clone())).await;
        assert!(gated.0.records.is_empty());
        assert_eq!(admin_records(State(state.clone())).await.0.records.len(), 1);

        let published = publish_data(State(state.clone())).await.unwrap();
        assert_eq!(published.0.record_count, 1);

        let gated = public_records(State(state)).await;
        assert_eq!(gated.0.records.len(), 1);
    }

    #[tokio::test]
    async fn test_store_lookup_miss_is_404() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.store.replace_records(vec![record("ST001", "North")]);
        state.store.publish();

        assert!(store_lookup(State(state.clone()), Path("ST001".into()))
            .await
            .is_ok());
        let err = store_lookup(State(state), Path("NOPE".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cluster_detail_unknown_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.store.replace_records(vec![record("ST001", "North")]);
        state.store.publish();

        let response = cluster_detail(State(state), Path("Nowhere".into())).await;
        assert!(response.0.records.is_empty());
        assert_eq!(response.0.summary.store_count, 0);
        assert_eq!(response.0.summary.achievement_rate, 0);
    }

    #[tokio::test]
    async fn test_passcode_handlers() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());

        let ok = validate_passcode(
            State(state.clone()),
            Json(PasscodeRequest {
                passcode: "Admin".into(),
            }),
        )
        .await;
        assert!(ok.0.valid);

        change_passcode(
            State(state.clone()),
            Json(PasscodeRequest {
                passcode: "s3cret".into(),
            }),
        )
        .await;

        let stale = validate_passcode(
            State(state),
            Json(PasscodeRequest {
                passcode: "Admin".into(),
            }),
        )
        .await;
        assert!(!stale.0.valid);
    }

    #[tokio::test]
    async fn test_regional_rollup_uses_admin_set() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.store.replace_records(vec![record("ST001", "North")]);

        // Unpublished, but the admin analytics still see it.
        let response = regional_rollup(State(state)).await;
        assert_eq!(response.0.regions.len(), 1);
        assert_eq!(response.0.regions[0].region, "North");
    }
}
