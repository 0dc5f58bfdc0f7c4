use axum::{
    async_trait,
    extract::{
        rejection::{PathRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docsearch_core::listing::{ListFilter, ListOrdering};
use docsearch_core::pagination::Pagination;
use docsearch_core::search::{DocumentSearchHit, QueryEcho};
use docsearch_core::snippet::Snippet;
use docsearch_core::stats::StatisticsSummary;
use docsearch_core::{
    DocumentId, DocumentView, ExtractionMethod, Gateway, GatewayError, Scope, SearchRequest, UserId,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Header carrying the identity established by the upstream authentication service.
pub const USER_HEADER: &str = "x-user-id";

const HIGHLIGHT_OPEN: &str = "<em>";
const HIGHLIGHT_CLOSE: &str = "</em>";

lazy_static! {
    static ref USER_ID_RE: Regex = Regex::new(r"^[\w.@+-]{1,150}$").expect("valid regex");
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

pub fn build_app(gateway: Arc<Gateway>) -> Router {
    // Multipart framing needs some room beyond the file itself; the gateway enforces the
    // exact limit so oversized files get a proper error body.
    let body_limit = usize::try_from(gateway.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/documents", get(list_handler).post(upload_handler))
        .route("/documents/:id", get(doc_handler).delete(delete_handler))
        .route("/statistics", get(statistics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { gateway })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// --- Errors ---

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Validation(docsearch_core::ValidationError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "storage unavailable");
            }
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "code": self.code, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// --- Extractors ---

/// [`Query`] whose rejection is reported as a JSON [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// [`Path`] whose rejection is reported as a JSON [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// --- Identity ---

/// Requesting user, taken from [`USER_HEADER`].
pub struct Requester(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if raw.is_empty() {
            return Err(ApiError::unauthorized("missing X-User-Id header"));
        }
        if !USER_ID_RE.is_match(raw) {
            return Err(ApiError::unauthorized("malformed X-User-Id header"));
        }
        Ok(Requester(UserId::new(raw)))
    }
}

// --- Search ---

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub scope: Scope,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub highlight: bool,
}

#[derive(Serialize)]
pub struct HitView {
    #[serde(flatten)]
    pub hit: DocumentSearchHit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub took_s: f64,
    pub hits: Vec<HitView>,
    pub pagination: Pagination,
    pub query: QueryEcho,
}

fn highlight(snippet: &Snippet) -> String {
    snippet.highlighted(HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let request = SearchRequest {
        term: params.q,
        scope: params.scope,
        page: params.page,
        page_size: params.page_size,
    };
    let page = state.gateway.search(&request, &user)?;
    let hits = page
        .hits
        .into_iter()
        .map(|hit| HitView {
            highlighted: params.highlight.then(|| highlight(&hit.snippet)),
            hit,
        })
        .collect();
    Ok(Json(SearchResponse {
        took_s: start.elapsed().as_secs_f64(),
        hits,
        pagination: page.pagination,
        query: page.query,
    }))
}

// --- Documents ---

#[derive(Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub method: Option<ExtractionMethod>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    pub name: Option<String>,
    pub ordering: Option<String>,
}

pub async fn list_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let ordering = match params.ordering.as_deref() {
        Some(raw) => raw.parse::<ListOrdering>().map_err(ApiError::bad_request)?,
        None => ListOrdering::default(),
    };
    let filter = ListFilter {
        method: params.method,
        processed_from: params.from,
        processed_to: params.to,
        name_contains: params.name,
        ordering,
    };
    let page = state.gateway.list_documents(&user, &filter, params.page, params.page_size)?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct DocParams {
    #[serde(default)]
    pub scope: Scope,
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
    ApiPath(doc_id): ApiPath<DocumentId>,
    ApiQuery(params): ApiQuery<DocParams>,
) -> Result<Json<DocumentView>, ApiError> {
    Ok(Json(state.gateway.get_document(doc_id, &user, params.scope)?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
    ApiPath(doc_id): ApiPath<DocumentId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.gateway.delete_document(doc_id, &user)?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": deleted.id,
        "file_name": deleted.file_name,
    })))
}

pub async fn upload_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentView>), ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "VALIDATION_ERROR", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), "VALIDATION_ERROR", e.body_text()))?;
        upload = Some((file_name, data.to_vec()));
        break;
    }
    let Some((file_name, bytes)) = upload else {
        return Err(ApiError::bad_request("multipart field `file` is required"));
    };

    tracing::info!(%user, file_name = %file_name, size = bytes.len(), "upload received");
    let gateway = Arc::clone(&state.gateway);
    // Extraction may shell out to slow external tools.
    let view = tokio::task::spawn_blocking(move || gateway.ingest(&file_name, &bytes, &user))
        .await
        .map_err(|e| ApiError::internal(format!("extraction task failed: {e}")))??;
    Ok((StatusCode::CREATED, Json(view)))
}

// --- Statistics ---

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub user: UserId,
    #[serde(flatten)]
    pub statistics: StatisticsSummary,
}

pub async fn statistics_handler(
    State(state): State<AppState>,
    Requester(user): Requester,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let statistics = state.gateway.statistics(&user)?;
    Ok(Json(StatisticsResponse { user, statistics }))
}
