//! HTTP routes: submit, poll, history, retrieve, health and the operator
//! views under `/api/admin`.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use smeta::config::ServerConfig;
use smeta::export::{history_csv, HISTORY_CSV_NAME};
use smeta::store::{StoredArtifact, DEFAULT_PAGE_LIMIT};
use smeta::{RequestQuery, Submission, UploadedFile};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks/process", post(process))
        .route("/api/tasks/status/:request_id", get(status))
        .route("/api/tasks/history", get(history))
        .route("/api/tasks/download/:artifact_id", get(download))
        .route("/api/tasks/files/:file_name", get(download_by_name))
        .route("/api/admin/requests", get(admin_requests))
        .route("/api/admin/requests/:request_id", get(admin_request_detail))
        .route("/api/admin/export-csv", get(admin_export_csv))
        .route("/api/admin/stats", get(admin_stats))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors_layer(&server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Runs store and intake calls off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "smeta" }))
}

async fn process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let submission = read_submission(multipart).await?;
    let intake = state.intake.clone();

    let accepted = blocking(move || Ok(intake.submit(submission)?)).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let lookup_id = request_id.clone();

    let view = blocking(move || Ok(store.status(&lookup_id)?)).await?;
    view.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Request '{request_id}' not found")))
}

async fn history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let limit = state.history_limit;

    let entries = blocking(move || Ok(store.history(limit)?)).await?;
    Ok(Json(json!({ "history": entries })))
}

async fn download(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let lookup_id = artifact_id.clone();

    let artifact = blocking(move || Ok(store.artifact(&lookup_id)?)).await?;
    let artifact =
        artifact.ok_or_else(|| ApiError::NotFound(format!("Artifact '{artifact_id}' not found")))?;
    send_artifact(&state, artifact).await
}

async fn download_by_name(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let lookup_name = file_name.clone();

    let artifact = blocking(move || Ok(store.artifact_by_name(&lookup_name)?)).await?;
    let artifact =
        artifact.ok_or_else(|| ApiError::NotFound(format!("File '{file_name}' not found")))?;
    send_artifact(&state, artifact).await
}

async fn send_artifact(state: &AppState, artifact: StoredArtifact) -> Result<Response, ApiError> {
    let results = state.results.clone();
    let path = artifact.path.clone();

    let bytes = blocking(move || Ok(results.read(&path)?)).await?;
    let Some(bytes) = bytes else {
        tracing::warn!(artifact_id = %artifact.id, "Artifact blob is missing");
        return Err(ApiError::NotFound(format!(
            "File '{}' not found",
            artifact.file_name
        )));
    };

    let content_type = mime_guess::from_path(&artifact.file_name)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&artifact.file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ─── Admin ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    skip: Option<usize>,
    limit: Option<usize>,
    date_from: Option<String>,
    date_to: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<RequestQuery, ApiError> {
        Ok(RequestQuery {
            skip: self.skip.unwrap_or(0),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            date_from: parse_date("date_from", self.date_from.as_deref())?,
            date_to: parse_date("date_to", self.date_to.as_deref())?,
        })
    }
}

/// Blank means no bound.
fn parse_date(param: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{param} must be a YYYY-MM-DD date, got '{v}'"))),
    }
}

async fn admin_requests(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_query()?;
    let store = state.store.clone();

    let page = blocking(move || Ok(store.list_requests(&query)?)).await?;
    Ok(Json(page))
}

async fn admin_request_detail(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let lookup_id = request_id.clone();

    let detail = blocking(move || Ok(store.detail(&lookup_id)?)).await?;
    detail
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Request '{request_id}' not found")))
}

async fn admin_export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store.clone();

    let csv = blocking(move || Ok(history_csv(&store.all_requests()?))).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(HISTORY_CSV_NAME),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn admin_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();

    let stats = blocking(move || Ok(store.stats()?)).await?;
    Ok(Json(stats))
}

// ─── Multipart ──────────────────────────────────────────────────────────────

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission {
        input_type: String::new(),
        files: Vec::new(),
        requested_outputs: String::new(),
        annotation: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                submission.files.push(UploadedFile {
                    name: file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "input_type" => submission.input_type = read_text(field).await?,
            "requested_outputs" => submission.requested_outputs = read_text(field).await?,
            "user_comment" => submission.annotation = Some(read_text(field).await?),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(submission)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

// ─── Content-Disposition ────────────────────────────────────────────────────

/// `attachment` header with an ASCII fallback name and the RFC 5987
/// `filename*` form carrying the real UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        encode_rfc5987(file_name)
    )
}

fn encode_rfc5987(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if keep {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use smeta::config::{CatalogConfig, TokenBudgets};
    use smeta::generation::{GenerationClient, GenerationError};
    use smeta::store::NewRequest;
    use smeta::{
        ArtifactKind, Database, FileStorage, Intake, Pipeline, PipelineConfig, RequestStore,
        ScratchSpace, Stage, WorkerPool,
    };

    use super::*;

    const BOUNDARY: &str = "smeta-test-boundary";
    const LIST_RESPONSE: &str =
        r#"[{"type": "Работа", "name": "Монтаж кабеля", "unit": "м", "quantity": 12}]"#;

    struct Canned {
        responses: Mutex<Vec<String>>,
    }

    impl GenerationClient for Canned {
        fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, GenerationError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or(GenerationError::EmptyResponse)
        }
    }

    struct TestApp {
        _dir: TempDir,
        state: AppState,
        pool: WorkerPool,
        server: ServerConfig,
    }

    impl TestApp {
        fn new(responses: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            let store = RequestStore::new(Database::open_in_memory().unwrap());
            let config = Arc::new(PipelineConfig {
                results_directory: dir.path().join("results"),
                budgets: TokenBudgets::default(),
                catalogs: CatalogConfig::default(),
                document_excerpt_chars: 2000,
                comparison_excerpt_chars: 2000,
                vat_rate: 0.22,
            });
            let client = Canned {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            };
            let pipeline = Arc::new(Pipeline::from_config(config, Arc::new(client), store.clone()));
            let pool = WorkerPool::new(pipeline, 1).unwrap();

            let state = AppState {
                intake: Intake::new(
                    store.clone(),
                    ScratchSpace::new(dir.path().join("scratch")),
                    pool.queue(),
                ),
                store,
                results: FileStorage::new(dir.path().join("results")),
                history_limit: 50,
            };

            Self {
                _dir: dir,
                state,
                pool,
                server: ServerConfig::default(),
            }
        }

        fn app(&self) -> Router {
            router(self.state.clone(), &self.server)
        }

        async fn get(&self, uri: &str) -> Response {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            self.app().oneshot(req).await.unwrap()
        }

        async fn submit(&self, parts: &[Part<'_>]) -> Response {
            let req = Request::builder()
                .method("POST")
                .uri("/api/tasks/process")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap();
            self.app().oneshot(req).await.unwrap()
        }

        async fn wait_for_result(&self) -> smeta::JobResult {
            let results = self.pool.results();
            tokio::task::spawn_blocking(move || results.recv().unwrap())
                .await
                .unwrap()
        }
    }

    enum Part<'a> {
        File(&'a str, &'a str),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match part {
                Part::File(name, content) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                         Content-Type: text/plain\r\n\r\n{content}\r\n"
                    ));
                }
                Part::Text(name, value) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    ));
                }
            }
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body.into_bytes()
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // ── Health ──

    #[tokio::test]
    async fn health_reports_service() {
        let app = TestApp::new(&[]);
        let response = app.get("/api/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "smeta");
    }

    // ── Submit ──

    #[tokio::test]
    async fn submit_then_poll_and_download() {
        let app = TestApp::new(&[LIST_RESPONSE]);

        let response = app
            .submit(&[
                Part::File("проект.txt", "Проектная документация: кабельные линии"),
                Part::Text("input_type", "project"),
                Part::Text("requested_outputs", r#"["list"]"#),
                Part::Text("user_comment", "Первый этаж"),
            ])
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let accepted = response_json(response).await;
        assert_eq!(accepted["status"], "pending");
        let request_id = accepted["request_id"].as_str().unwrap().to_string();

        let result = app.wait_for_result().await;
        assert!(result.success, "run failed: {:?}", result.error);

        let response = app.get(&format!("/api/tasks/status/{request_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let view = response_json(response).await;
        assert_eq!(view["status"], "success");
        assert_eq!(view["annotation"], "Первый этаж");
        assert_eq!(view["outputs"]["list"]["kind"], "workbook");
        let artifact_id = view["outputs"]["list"]["artifact_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app.get(&format!("/api/tasks/download/{artifact_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains("filename*=UTF-8''%D0%9F"));
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn submit_without_files_is_rejected() {
        let app = TestApp::new(&[]);

        let response = app
            .submit(&[
                Part::Text("input_type", "project"),
                Part::Text("requested_outputs", r#"["list"]"#),
            ])
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn submit_with_unknown_output_creates_nothing() {
        let app = TestApp::new(&[]);

        let response = app
            .submit(&[
                Part::File("смета.txt", "x"),
                Part::Text("input_type", "estimate"),
                Part::Text("requested_outputs", r#"["list", "invoice"]"#),
            ])
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let history = response_json(app.get("/api/tasks/history").await).await;
        assert_eq!(history["history"].as_array().unwrap().len(), 0);
    }

    // ── Poll / History ──

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let app = TestApp::new(&[]);
        let response = app.get("/api/tasks/status/missing").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn history_lists_newest_first() {
        let app = TestApp::new(&[]);
        for input_type in ["first", "second"] {
            app.state
                .store
                .create_pending(&NewRequest {
                    input_type: input_type.to_string(),
                    inputs: vec![],
                    outputs: BTreeSet::from([Stage::List]),
                    annotation: None,
                })
                .unwrap();
        }

        let json = response_json(app.get("/api/tasks/history").await).await;
        let history = json["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["input_type"], "second");
        assert_eq!(history[0]["status"], "pending");
    }

    // ── Retrieve ──

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let app = TestApp::new(&[]);
        let request_id = app
            .state
            .store
            .create_pending(&NewRequest {
                input_type: "project".to_string(),
                inputs: vec![],
                outputs: BTreeSet::from([Stage::List]),
                annotation: None,
            })
            .unwrap();
        let gone = app.state.results.root().join("gone.xlsx");
        let artifact = app
            .state
            .store
            .add_artifact(&request_id, Stage::List, ArtifactKind::Workbook, &gone, 10)
            .unwrap();

        let by_id = app
            .get(&format!("/api/tasks/download/{}", artifact.artifact_id))
            .await;
        assert_eq!(by_id.status(), StatusCode::NOT_FOUND);

        let by_name = app.get("/api/tasks/files/gone.xlsx").await;
        assert_eq!(by_name.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_artifact_is_not_found() {
        let app = TestApp::new(&[]);
        let response = app.get("/api/tasks/download/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ── Admin ──

    fn seed(app: &TestApp, input_type: &str) -> String {
        app.state
            .store
            .create_pending(&NewRequest {
                input_type: input_type.to_string(),
                inputs: vec![],
                outputs: BTreeSet::from([Stage::List]),
                annotation: None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn admin_list_pages_and_filters_by_date() {
        let app = TestApp::new(&[]);
        for input_type in ["a", "b", "c"] {
            seed(&app, input_type);
        }

        let json = response_json(app.get("/api/admin/requests?skip=1&limit=1").await).await;
        assert_eq!(json["total"], 3);
        assert_eq!(json["skip"], 1);
        assert_eq!(json["limit"], 1);
        let requests = json["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["input_type"], "b");

        let json = response_json(
            app.get("/api/admin/requests?date_from=2000-01-01&date_to=2000-12-31")
                .await,
        )
        .await;
        assert_eq!(json["total"], 0);

        let json = response_json(app.get("/api/admin/requests?date_from=&date_to=").await).await;
        assert_eq!(json["total"], 3);
        assert_eq!(json["limit"], 50);
    }

    #[tokio::test]
    async fn admin_list_rejects_malformed_date() {
        let app = TestApp::new(&[]);
        let response = app.get("/api/admin/requests?date_from=01.03.2026").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("date_from"));
    }

    #[tokio::test]
    async fn admin_detail_includes_transcript() {
        let app = TestApp::new(&[]);
        let request_id = seed(&app, "project");
        app.state
            .store
            .record_transcript(&request_id, "Составь перечень работ", "[]")
            .unwrap();

        let response = app.get(&format!("/api/admin/requests/{request_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["request_id"], request_id.as_str());
        assert_eq!(json["last_prompt"], "Составь перечень работ");
        assert_eq!(json["last_response"], "[]");

        // The poll view stays without transcripts.
        let view = response_json(app.get(&format!("/api/tasks/status/{request_id}")).await).await;
        assert!(view.get("last_prompt").is_none());

        let missing = app.get("/api/admin/requests/missing").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_export_is_csv_attachment() {
        let app = TestApp::new(&[]);
        let request_id = seed(&app, "project");

        let response = app.get("/api/admin/export-csv").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("filename=\"history.csv\""));

        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID,Дата,Тип ввода,Файлы,Результаты,Статус,Ошибка");
        assert!(lines[1].starts_with(&format!("{request_id},")));
        assert!(lines[1].ends_with(",project,,list,pending,"));
    }

    #[tokio::test]
    async fn admin_stats_counts_requests() {
        let app = TestApp::new(&[]);
        let done = seed(&app, "project");
        seed(&app, "estimate");
        app.state.store.begin_processing(&done).unwrap();
        app.state.store.complete_success(&done).unwrap();

        let json = response_json(app.get("/api/admin/stats").await).await;
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["successful"], 1);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["pending"], 1);
        assert_eq!(json["success_rate"], 50.0);
        assert_eq!(json["input_types_distribution"]["estimate"], 1);
    }

    // ── Content-Disposition ──

    #[test]
    fn disposition_encodes_utf8_names() {
        let header = content_disposition("Смета 1.xlsx");
        assert_eq!(
            header,
            "attachment; filename=\"_____ 1.xlsx\"; \
             filename*=UTF-8''%D0%A1%D0%BC%D0%B5%D1%82%D0%B0%201.xlsx"
        );
    }

    #[test]
    fn disposition_keeps_ascii_names() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }
}
