use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::handlers::{Analysis, EstimateTarget, Outcome, Pipeline, PipelineSession, SessionSnapshot};
use crate::models::{FoodItem, ImageInput, NutritionReport, QuantityWarning, RecommendedFood};
use crate::services::PipelineError;

/// Phone photos routinely exceed axum's 2 MB default.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    sessions: Mutex<HashMap<u64, PipelineSession>>,
    next_session_id: AtomicU64,
    /// Sessions untouched for longer than this are dropped on the next sweep.
    session_ttl: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, session_ttl: Duration) -> Self {
        Self {
            pipeline,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            session_ttl,
        }
    }

    /// Drops idle sessions and returns how many were removed.
    async fn evict_idle(&self) -> usize {
        let now = Utc::now();
        let ttl = self.session_ttl;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            now.signed_duration_since(session.updated_at())
                .to_std()
                .map_or(true, |idle| idle < ttl)
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            log::info!("🧹 Evicted {} idle session(s), {} remaining", evicted, sessions.len());
        }
        evicted
    }

    async fn with_session<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut PipelineSession) -> T,
    ) -> Result<T, ApiError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
        Ok(f(session))
    }
}

pub enum ApiError {
    Pipeline(PipelineError),
    SessionNotFound(u64),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "session_not_found",
                    message: format!("no session with id {}", id),
                    retryable: false,
                },
            ),
            ApiError::Pipeline(e) => {
                let status = match e {
                    PipelineError::Input(_) => StatusCode::BAD_REQUEST,
                    PipelineError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                    PipelineError::Upstream(_)
                    | PipelineError::SchemaViolation { .. }
                    | PipelineError::Aggregation(_) => StatusCode::BAD_GATEWAY,
                };
                if status == StatusCode::BAD_REQUEST {
                    log::warn!("⚠️ Rejected request: {}", e);
                } else {
                    log::error!("❌ Request failed: {}", e);
                }
                (
                    status,
                    ErrorBody {
                        error: e.kind(),
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// An image either as a browser data URL or as raw base64 plus media type.
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub image: Option<String>,
    pub image_base64: Option<String>,
    pub media_type: Option<String>,
}

impl ImagePayload {
    fn into_image(self) -> Result<ImageInput, PipelineError> {
        match (self.image, self.image_base64) {
            (Some(url), _) => ImageInput::from_data_url(&url),
            (None, Some(payload)) => {
                ImageInput::from_base64(&payload, self.media_type.as_deref().unwrap_or_default())
            }
            (None, None) => Err(PipelineError::Input(
                "either 'image' or 'image_base64' is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<FoodItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsRequest {
    pub nutrient_theme: String,
    #[serde(default)]
    pub food_themes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionEstimateRequest {
    pub index: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyResponse {
    food_items: Vec<String>,
}

#[derive(Serialize)]
struct EstimateResponse {
    quantity: String,
}

#[derive(Serialize)]
struct BatchEstimateResponse {
    items: Vec<FoodItem>,
    warnings: Vec<QuantityWarning>,
}

#[derive(Serialize)]
struct AggregateResponse {
    report: NutritionReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsResponse {
    recommended_foods: Vec<RecommendedFood>,
}

#[derive(Serialize)]
struct SessionResponse {
    id: u64,
    /// True when the stage result arrived after the session had moved on.
    discarded: bool,
    session: SessionSnapshot,
}

pub fn create_router(pipeline: Arc<Pipeline>, session_ttl: Duration) -> Router {
    let state = Arc::new(AppState::new(pipeline, session_ttl));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/fields", get(nutrition_fields))
        .route("/api/identify", post(identify))
        .route("/api/estimate", post(estimate))
        .route("/api/estimate/batch", post(estimate_batch))
        .route("/api/aggregate", post(aggregate))
        .route("/api/analyze", post(analyze))
        .route("/api/recommendations", post(recommendations))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/image", post(session_image))
        .route("/api/sessions/:id/identify", post(session_identify))
        .route(
            "/api/sessions/:id/items",
            put(session_set_items).post(session_add_item),
        )
        .route(
            "/api/sessions/:id/items/:index",
            put(session_update_item).delete(session_remove_item),
        )
        .route("/api/sessions/:id/estimate", post(session_estimate))
        .route("/api/sessions/:id/aggregate", post(session_aggregate))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Nutrition Lens API - POST an image to /api/analyze or drive a session under /api/sessions"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn nutrition_fields(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.pipeline.nutrition_fields().to_vec())
}

async fn identify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let image = payload.into_image()?;
    let food_items = state.pipeline.identify(&image).await?;
    Ok(Json(IdentifyResponse { food_items }))
}

async fn estimate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let quantity = state.pipeline.estimate_quantity(&request.name).await?;
    Ok(Json(EstimateResponse { quantity }))
}

async fn estimate_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ItemsRequest>,
) -> Json<BatchEstimateResponse> {
    let (items, warnings) = state.pipeline.estimate_quantities(request.items).await;
    Json(BatchEstimateResponse { items, warnings })
}

async fn aggregate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<AggregateResponse>, ApiError> {
    let report = state.pipeline.aggregate(&request.items).await?;
    Ok(Json(AggregateResponse { report }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<Analysis>, ApiError> {
    let image = payload.into_image()?;
    Ok(Json(state.pipeline.analyze(image).await?))
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecommendationsRequest>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let recommended_foods = state
        .pipeline
        .recommend(&request.nutrient_theme, &request.food_themes)
        .await?;
    Ok(Json(RecommendationsResponse { recommended_foods }))
}

fn session_response<T>(id: u64, outcome: &Outcome<T>, session: &PipelineSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        id,
        discarded: matches!(outcome, Outcome::Discarded),
        session: session.snapshot(),
    })
}

async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionResponse>) {
    state.evict_idle().await;

    let id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let session = PipelineSession::new();
    let response = SessionResponse {
        id,
        discarded: false,
        session: session.snapshot(),
    };
    state.sessions.lock().await.insert(id, session);
    log::info!("🆕 Session {} created", id);
    (StatusCode::CREATED, Json(response))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<SessionResponse>, ApiError> {
    state
        .with_session(id, |session| session_response(id, &Outcome::Applied(()), session))
        .await
}

async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .lock()
        .await
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ApiError::SessionNotFound(id))
}

async fn session_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<SessionResponse>, ApiError> {
    let image = payload.into_image()?;
    state
        .with_session(id, |session| {
            session.capture_image(image);
            session_response(id, &Outcome::Applied(()), session)
        })
        .await
}

/// Runs stage work on its own task so that a dropped request cannot cancel
/// it between `begin_*` and `finish_*`; the session always leaves the
/// in-flight stage even when the client is gone.
async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    tokio::spawn(work).await.map_err(|e| {
        log::error!("❌ Session stage task failed: {}", e);
        ApiError::Pipeline(PipelineError::Upstream(format!("stage task failed: {}", e)))
    })?
}

// The session lock is not held while the model call runs, so the user can
// capture a new image or edit items meanwhile; finish_* drops stale results.
async fn session_identify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<SessionResponse>, ApiError> {
    detached(async move {
        let ticket = state.with_session(id, |s| s.begin_identify()).await??;
        let result = state.pipeline.identify(&ticket.image).await;

        let response = state
            .with_session(id, |session| {
                session
                    .finish_identify(ticket, result)
                    .map(|outcome| session_response(id, &outcome, session))
            })
            .await??;
        Ok(response)
    })
    .await
}

async fn session_set_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    state
        .with_session(id, |session| {
            session.set_items(request.items);
            session_response(id, &Outcome::Applied(()), session)
        })
        .await
}

async fn session_add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(item): Json<FoodItem>,
) -> Result<Json<SessionResponse>, ApiError> {
    state
        .with_session(id, |session| {
            session.add_item(item);
            session_response(id, &Outcome::Applied(()), session)
        })
        .await
}

async fn session_update_item(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(u64, usize)>,
    Json(item): Json<FoodItem>,
) -> Result<Json<SessionResponse>, ApiError> {
    let response = state
        .with_session(id, |session| {
            session
                .update_item(index, item)
                .map(|_| session_response(id, &Outcome::Applied(()), session))
        })
        .await??;
    Ok(response)
}

async fn session_remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(u64, usize)>,
) -> Result<Json<SessionResponse>, ApiError> {
    let response = state
        .with_session(id, |session| {
            session
                .remove_item(index)
                .map(|_| session_response(id, &Outcome::Applied(()), session))
        })
        .await??;
    Ok(response)
}

async fn session_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    request: Option<Json<SessionEstimateRequest>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let target = match request.and_then(|Json(r)| r.index) {
        Some(index) => EstimateTarget::Item(index),
        None => EstimateTarget::Missing,
    };

    detached(async move {
        let ticket = state.with_session(id, |s| s.begin_estimate(target)).await??;
        let results = state.pipeline.execute_estimate(&ticket).await;

        state
            .with_session(id, |session| {
                let outcome = session.finish_estimate(ticket, results);
                session_response(id, &outcome, session)
            })
            .await
    })
    .await
}

async fn session_aggregate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<SessionResponse>, ApiError> {
    detached(async move {
        let ticket = state.with_session(id, |s| s.begin_aggregate()).await??;
        let result = state.pipeline.aggregate(&ticket.items).await;

        let response = state
            .with_session(id, |session| {
                session
                    .finish_aggregate(ticket, result)
                    .map(|outcome| session_response(id, &outcome, session))
            })
            .await??;
        Ok(response)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_png, DEFAULT_NUTRITION_FIELDS};
    use crate::services::mock::ScriptedBackend;
    use crate::services::{templates, InferenceGateway};
    use axum::body::Body;
    use axum::http::Request;
    use base64::{engine::general_purpose, Engine};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const HOUR: Duration = Duration::from_secs(3600);

    fn router(backend: ScriptedBackend, credential: Option<&str>) -> Router {
        router_with_ttl(backend, credential, HOUR)
    }

    fn router_with_ttl(backend: ScriptedBackend, credential: Option<&str>, session_ttl: Duration) -> Router {
        let gateway = InferenceGateway::new(
            Arc::new(backend),
            credential.map(String::from),
            Duration::from_millis(200),
            800,
        );
        let fields = DEFAULT_NUTRITION_FIELDS.iter().map(|f| f.to_string()).collect();
        create_router(Arc::new(Pipeline::new(Arc::new(gateway), fields)), session_ttl)
    }

    async fn new_session(router: &Router) -> String {
        let (_, body) = call(router, "POST", "/api/sessions", None).await;
        format!("/api/sessions/{}", body["id"].as_u64().unwrap())
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn data_url() -> String {
        format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(sample_png()))
    }

    #[tokio::test]
    async fn test_aggregate_empty_list_is_bad_request() {
        let router = router(ScriptedBackend::new(), Some("key"));

        let (status, body) = call(&router, "POST", "/api/aggregate", Some(json!({ "items": [] }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "input_error");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_missing_credential_is_service_unavailable() {
        let router = router(ScriptedBackend::new(), None);

        let (status, body) = call(&router, "POST", "/api/estimate", Some(json!({ "name": "Rice" }))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "configuration_error");
    }

    #[tokio::test]
    async fn test_identify_with_data_url() {
        let backend = ScriptedBackend::new().reply(templates::IDENTIFY_FOOD, r#"{"foodItems": ["Salad"]}"#);
        let router = router(backend, Some("key"));

        let (status, body) = call(&router, "POST", "/api/identify", Some(json!({ "image": data_url() }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "foodItems": ["Salad"] }));
    }

    #[tokio::test]
    async fn test_aggregation_failure_is_bad_gateway() {
        let backend = ScriptedBackend::new().reply(templates::NUTRITION_SUMMARY, r#"{"summary": "tasty"}"#);
        let router = router(backend, Some("key"));

        let (status, body) = call(
            &router,
            "POST",
            "/api/aggregate",
            Some(json!({ "items": [{ "name": "Rice", "quantity": "1 cup" }] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "aggregation_error");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_session_flow() {
        let backend = ScriptedBackend::new()
            .reply(templates::IDENTIFY_FOOD, r#"{"foodItems": ["Chicken Breast", "Rice"]}"#)
            .reply_when(templates::ESTIMATE_QUANTITY, "Food Item Name: Rice", r#"{"estimatedWeight": "1 cup"}"#)
            .fail(templates::ESTIMATE_QUANTITY, "timed out")
            .reply(templates::NUTRITION_SUMMARY, r#"{"nutrition": {"calories": "600 kcal", "overall": "Filling"}}"#);
        let router = router(backend, Some("key"));

        let (status, body) = call(&router, "POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["session"]["stage"], "idle");
        let id = body["id"].as_u64().unwrap();
        let base = format!("/api/sessions/{}", id);

        let (status, body) = call(&router, "POST", &format!("{}/image", base), Some(json!({ "image": data_url() }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["stage"], "image_captured");

        let (_, body) = call(&router, "POST", &format!("{}/identify", base), None).await;
        assert_eq!(body["session"]["stage"], "items_ready");
        assert_eq!(body["session"]["items"][0], json!({ "name": "Chicken Breast", "quantity": "" }));

        let (_, body) = call(&router, "POST", &format!("{}/estimate", base), None).await;
        assert_eq!(body["session"]["stage"], "items_with_quantities");
        assert_eq!(body["session"]["items"][0]["quantity"], "");
        assert_eq!(body["session"]["items"][1]["quantity"], "1 cup");
        assert_eq!(body["session"]["warnings"][0]["name"], "Chicken Breast");

        let (_, body) = call(
            &router,
            "PUT",
            &format!("{}/items/0", base),
            Some(json!({ "name": "Chicken Breast", "quantity": "150g" })),
        )
        .await;
        assert_eq!(body["session"]["warnings"], json!([]));

        let (status, body) = call(&router, "POST", &format!("{}/aggregate", base), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["discarded"], false);
        assert_eq!(body["session"]["stage"], "report_ready");
        assert_eq!(body["session"]["report"]["calories"], "600 kcal");
        assert_eq!(body["session"]["report"]["iron"], "unknown");

        let (status, _) = call(&router, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&router, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "session_not_found");
    }

    #[tokio::test]
    async fn test_identify_without_image_is_bad_request() {
        let router = router(ScriptedBackend::new(), Some("key"));
        let (_, body) = call(&router, "POST", "/api/sessions", None).await;
        let id = body["id"].as_u64().unwrap();

        let (status, body) = call(&router, "POST", &format!("/api/sessions/{}/identify", id), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "input_error");
    }

    #[tokio::test]
    async fn test_dropped_estimate_request_still_settles_session() {
        let backend = ScriptedBackend::new()
            .reply(templates::IDENTIFY_FOOD, r#"{"foodItems": ["Rice"]}"#)
            .hang(templates::ESTIMATE_QUANTITY)
            .reply(templates::NUTRITION_SUMMARY, r#"{"nutrition": {"calories": "200 kcal"}}"#);
        let router = router(backend, Some("key"));
        let base = new_session(&router).await;
        call(&router, "POST", &format!("{}/image", base), Some(json!({ "image": data_url() }))).await;
        call(&router, "POST", &format!("{}/identify", base), None).await;

        // Client gives up long before the 200ms gateway timeout.
        let dropped = tokio::time::timeout(
            Duration::from_millis(20),
            call(&router, "POST", &format!("{}/estimate", base), None),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;

        let (_, body) = call(&router, "GET", &base, None).await;
        assert_eq!(body["session"]["stage"], "items_with_quantities");
        assert_eq!(body["session"]["warnings"][0]["name"], "Rice");

        let (status, body) = call(&router, "POST", &format!("{}/aggregate", base), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["stage"], "report_ready");
        assert_eq!(body["session"]["report"]["calories"], "200 kcal");
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let router = router_with_ttl(ScriptedBackend::new(), Some("key"), Duration::ZERO);
        let first = new_session(&router).await;
        let second = new_session(&router).await;

        let (status, _) = call(&router, "GET", &first, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&router, "GET", &second, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_active_sessions_survive_sweep() {
        let router = router(ScriptedBackend::new(), Some("key"));
        let first = new_session(&router).await;
        new_session(&router).await;

        let (status, _) = call(&router, "GET", &first, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_item_enables_manual_entry() {
        let backend = ScriptedBackend::new().reply(templates::NUTRITION_SUMMARY, r#"{"nutrition": {"calories": "90 kcal"}}"#);
        let router = router(backend, Some("key"));
        let base = new_session(&router).await;

        let (status, body) = call(
            &router,
            "POST",
            &format!("{}/items", base),
            Some(json!({ "name": "Apple", "quantity": "1 medium" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["stage"], "items_ready");
        assert_eq!(body["session"]["items"], json!([{ "name": "Apple", "quantity": "1 medium" }]));

        let (_, body) = call(&router, "POST", &format!("{}/items", base), Some(json!({ "name": "Yogurt" }))).await;
        assert_eq!(body["session"]["items"][1], json!({ "name": "Yogurt", "quantity": "" }));

        let (status, body) = call(&router, "POST", &format!("{}/aggregate", base), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["report"]["calories"], "90 kcal");
    }
}
