//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/answer`           — Answer a question
//! - `POST   /v1/feedback`         — Like or dislike a served answer
//! - `GET    /v1/stats`            — Learning and knowledge statistics
//! - `GET    /v1/sessions/{id}`    — Per-session counters
//! - `GET    /v1/knowledge`        — List records (`?category=`)
//! - `POST   /v1/knowledge`        — Add or replace a record
//! - `GET    /v1/knowledge/{id}`   — Get one record
//! - `DELETE /v1/knowledge/{id}`   — Delete one record

use axum::{
    Router,
    extract::{FromRequest, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use answerdesk_core::answer::AnswerResult;
use answerdesk_core::error::{Error, IndexError};
use answerdesk_core::feedback::{FeedbackEvent, Rating};
use answerdesk_core::knowledge::{IndexStats, KnowledgeRecord};
use answerdesk_pipeline::{FeedbackOutcome, LearningStats, SessionStats};

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/answer", post(answer_handler))
        .route("/feedback", post(feedback_handler))
        .route("/stats", get(stats_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/knowledge", get(list_knowledge_handler).post(create_knowledge_handler))
        .route(
            "/knowledge/{id}",
            get(get_knowledge_handler).delete(delete_knowledge_handler),
        )
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

/// Error body returned by every v1 endpoint: `{error, message}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// A domain error mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn not_found(what: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: "not_found".into(),
                message: format!("{what} '{id}' not found"),
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Index(IndexError::DuplicateId(_)) => StatusCode::CONFLICT,
            Error::Index(IndexError::UnknownId(_)) => StatusCode::NOT_FOUND,
            Error::Index(IndexError::InvalidRecord(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        }
        Self {
            status,
            body: ErrorBody {
                error: err.kind().into(),
                message: err.to_string(),
            },
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        Error::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            body: ErrorBody {
                error: "invalid_request".into(),
                message: rejection.body_text(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// `Json` whose rejections use the `{error, message}` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

// ── Answer ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AnswerRequest {
    query: String,
    /// Client session to attribute the answer to.
    #[serde(default)]
    session_id: Option<String>,
}

async fn answer_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<AnswerRequest>,
) -> Result<Json<AnswerResult>, ApiError> {
    let result = state.selector.answer(&req.query).await?;

    if let Some(session_id) = req.session_id.as_deref() {
        state.sessions.record_answer(session_id, result.method).await;
    }

    Ok(Json(result))
}

// ── Feedback ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeedbackRequest {
    #[serde(default)]
    question: String,
    answer: String,
    rating: Rating,
    #[serde(default)]
    source_record_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct FeedbackResponse {
    ack: bool,
    #[serde(flatten)]
    outcome: FeedbackOutcome,
}

async fn feedback_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    let mut event = FeedbackEvent::new(req.question, req.answer, req.rating);
    if let Some(source) = req.source_record_id {
        event = event.with_source(source);
    }

    if let Some(session_id) = req.session_id.as_deref() {
        state.sessions.record_feedback(session_id, req.rating).await;
    }

    let outcome = state.feedback.record(event).await;
    Json(FeedbackResponse { ack: true, outcome })
}

// ── Stats & sessions ──────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct StatsResponse {
    learning: LearningStats,
    knowledge: IndexStats,
    active_sessions: usize,
    offline: bool,
    uptime_secs: u64,
}

async fn stats_handler(State(state): State<SharedState>) -> Json<StatsResponse> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    Json(StatsResponse {
        learning: state.feedback.stats().await,
        knowledge: state.selector.index().stats().await,
        active_sessions: state.sessions.count().await,
        offline: state.selector.is_offline(),
        uptime_secs: uptime,
    })
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
    state
        .sessions
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Session", &id))
}

// ── Knowledge admin ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListKnowledgeQuery {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct KnowledgeListResponse {
    records: Vec<KnowledgeRecord>,
    count: usize,
}

async fn list_knowledge_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListKnowledgeQuery>,
) -> Json<KnowledgeListResponse> {
    let records = state.selector.index().list(query.category.as_deref()).await;
    let count = records.len();
    Json(KnowledgeListResponse { records, count })
}

#[derive(Deserialize)]
struct CreateRecordRequest {
    /// Omit to derive an id from the question and answer.
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "question", alias = "topic")]
    question_or_topic: String,
    #[serde(alias = "answer")]
    answer_text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    weight: Option<f32>,
    #[serde(default)]
    variations: Vec<String>,
    #[serde(default)]
    overwrite: bool,
}

impl CreateRecordRequest {
    fn into_record(self) -> KnowledgeRecord {
        let category = self.category.unwrap_or_else(|| "general".into());
        let mut record = KnowledgeRecord::new(self.question_or_topic, self.answer_text, category)
            .with_variations(self.variations);
        if let Some(id) = self.id.filter(|id| !id.trim().is_empty()) {
            record = record.with_id(id);
        }
        if let Some(weight) = self.weight {
            record.weight = weight;
        }
        record.source = Some("api".into());
        record
    }
}

async fn create_knowledge_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateRecordRequest>,
) -> Result<(StatusCode, Json<KnowledgeRecord>), ApiError> {
    let overwrite = req.overwrite;
    let record = req.into_record();
    let id = record.id.clone();

    let index = state.selector.index();
    index.upsert(record.clone(), overwrite).await?;
    info!(record_id = %id, overwrite, "Knowledge record stored via API");

    let stored = index.get(&id).await.unwrap_or(record);
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_knowledge_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<KnowledgeRecord>, ApiError> {
    state
        .selector
        .index()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| IndexError::UnknownId(id).into())
}

#[derive(Serialize, Deserialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_knowledge_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.selector.index().delete(&id).await? {
        info!(record_id = %id, "Knowledge record deleted via API");
        Ok(Json(DeleteResponse { deleted: true }))
    } else {
        Err(IndexError::UnknownId(id).into())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use answerdesk_config::AppConfig;
    use answerdesk_core::error::ModelError;
    use answerdesk_core::knowledge::KnowledgeIndex;
    use answerdesk_core::message::Message;
    use answerdesk_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
    use answerdesk_knowledge::InMemoryIndex;
    use answerdesk_pipeline::{AnswerSelector, ConfidenceScorer, FeedbackRecorder, Generator};

    const ADMISSION_ANSWER: &str = "Submit transcripts and SAT scores.";

    /// Lightweight mock provider for gateway tests.
    struct MockProvider {
        response_text: String,
    }

    impl MockProvider {
        fn new(text: &str) -> Self {
            Self {
                response_text: text.to_string(),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ModelError> {
            Ok(ProviderResponse {
                message: Message::assistant(&self.response_text),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock-model".into(),
                metadata: serde_json::Map::new(),
            })
        }
    }

    async fn test_state(online: bool) -> SharedState {
        let index: Arc<dyn KnowledgeIndex> = Arc::new(InMemoryIndex::new());
        index
            .upsert(
                KnowledgeRecord::new(
                    "What are admission requirements?",
                    ADMISSION_ANSWER,
                    "admission",
                )
                .with_id("adm-1"),
                false,
            )
            .await
            .unwrap();
        index
            .upsert(
                KnowledgeRecord::new(
                    "library opening hours weekend holiday exam",
                    "The library is open 8am to 10pm.",
                    "facilities",
                )
                .with_id("lib-1"),
                false,
            )
            .await
            .unwrap();

        let generator = online.then(|| {
            let provider = Arc::new(MockProvider::new("Mock response from model"));
            Generator::new(provider, "mock-model")
        });
        let selector = Arc::new(AnswerSelector::new(
            index.clone(),
            ConfidenceScorer::default(),
            generator,
        ));
        let feedback = Arc::new(FeedbackRecorder::new(index, ConfidenceScorer::default(), 0.05));
        Arc::new(AppState::new(AppConfig::default(), selector, feedback))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn answer_request(query: &str) -> Request<Body> {
        json_request("POST", "/answer", serde_json::json!({ "query": query }))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn answer_direct_lookup() {
        let app = v1_router(test_state(true).await);

        let response = app
            .oneshot(answer_request("admission requirements"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["text"], ADMISSION_ANSWER);
        assert_eq!(json["method"], "direct_lookup");
        assert_eq!(json["source_record_id"], "adm-1");
        assert!(json["confidence"].as_f64().unwrap() >= 0.75);
        assert!(json["processing_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn answer_generative_fallback() {
        let app = v1_router(test_state(true).await);

        let response = app
            .oneshot(answer_request("tell me a joke"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["text"], "Mock response from model");
        assert_eq!(json["method"], "generative_fallback");
        assert!(json.get("source_record_id").is_none_or(|v| v.is_null()));
    }

    #[tokio::test]
    async fn blank_query_is_bad_request() {
        let app = v1_router(test_state(true).await);

        let response = app
            .oneshot(answer_request("   "))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_query");
    }

    #[tokio::test]
    async fn offline_without_match_is_unavailable() {
        let app = v1_router(test_state(false).await);

        let response = app
            .oneshot(answer_request("quantum entanglement"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "service_unavailable");
    }

    #[tokio::test]
    async fn feedback_adjusts_weight() {
        let state = test_state(true).await;
        let app = v1_router(state.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/feedback",
                serde_json::json!({
                    "question": "admission requirements",
                    "answer": ADMISSION_ANSWER,
                    "rating": "like",
                    "source_record_id": "adm-1",
                    "session_id": "s1"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ack"], true);
        assert_eq!(json["resolved_record_id"], "adm-1");
        assert!((json["new_weight"].as_f64().unwrap() - 1.05).abs() < 1e-5);

        let record = state.selector.index().get("adm-1").await.unwrap();
        assert!((record.weight - 1.05).abs() < 1e-6);
        assert_eq!(state.sessions.get("s1").await.unwrap().likes, 1);
    }

    #[tokio::test]
    async fn unresolvable_feedback_is_acknowledged() {
        let app = v1_router(test_state(true).await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/feedback",
                serde_json::json!({
                    "question": "hello",
                    "answer": "Hi there!",
                    "rating": "dislike"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ack"], true);
        assert!(json.get("resolved_record_id").is_none());
    }

    #[tokio::test]
    async fn sessions_track_answers() {
        let state = test_state(true).await;

        let response = v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                "/answer",
                serde_json::json!({"query": "admission requirements", "session_id": "alice"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = v1_router(state.clone())
            .oneshot(get_request("/sessions/alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["answers"], 1);
        assert_eq!(json["direct_lookup"], 1);

        let response = v1_router(state).oneshot(get_request("/sessions/bob")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_cap_comes_from_config() {
        let base = test_state(true).await;
        let mut config = AppConfig::default();
        config.gateway.max_sessions = 1;
        let state = Arc::new(AppState::new(
            config,
            base.selector.clone(),
            base.feedback.clone(),
        ));

        for session_id in ["s1", "s2"] {
            let response = v1_router(state.clone())
                .oneshot(json_request(
                    "POST",
                    "/answer",
                    serde_json::json!({
                        "query": "admission requirements",
                        "session_id": session_id
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(state.sessions.count().await, 1);
        assert!(state.sessions.get("s1").await.is_none());
        assert!(state.sessions.get("s2").await.is_some());
    }

    #[tokio::test]
    async fn stats_report_learning_and_knowledge() {
        let state = test_state(true).await;
        state
            .feedback
            .record(FeedbackEvent::new("q", ADMISSION_ANSWER, Rating::Positive))
            .await;

        let response = v1_router(state).oneshot(get_request("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let stats: StatsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats.learning.total, 1);
        assert_eq!(stats.learning.positive, 1);
        assert_eq!(stats.knowledge.total_records, 2);
        assert_eq!(stats.knowledge.categories.get("facilities"), Some(&1));
        assert!(!stats.offline);
    }

    #[tokio::test]
    async fn knowledge_create_get_delete() {
        let state = test_state(true).await;
        let create = serde_json::json!({
            "id": "fees-1",
            "question": "How much is tuition?",
            "answer": "Tuition is $500 per credit.",
            "category": "fees"
        });

        let response = v1_router(state.clone())
            .oneshot(json_request("POST", "/knowledge", create.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let record: KnowledgeRecord = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(record.id, "fees-1");
        assert_eq!(record.source.as_deref(), Some("api"));

        let response = v1_router(state.clone())
            .oneshot(json_request("POST", "/knowledge", create))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "duplicate_id");

        let response = v1_router(state.clone())
            .oneshot(get_request("/knowledge/fees-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .method("DELETE")
            .uri("/knowledge/fees-1")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["deleted"], true);

        let response = v1_router(state)
            .oneshot(get_request("/knowledge/fees-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn knowledge_overwrite_replaces_answer() {
        let state = test_state(true).await;
        let replace = serde_json::json!({
            "id": "adm-1",
            "question": "What are admission requirements?",
            "answer": "Submit transcripts only.",
            "overwrite": true
        });

        let response = v1_router(state.clone())
            .oneshot(json_request("POST", "/knowledge", replace))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let record = state.selector.index().get("adm-1").await.unwrap();
        assert_eq!(record.answer_text, "Submit transcripts only.");
        assert_eq!(state.selector.index().count().await, 2);
    }

    #[tokio::test]
    async fn knowledge_rejects_blank_answer() {
        let app = v1_router(test_state(true).await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/knowledge",
                serde_json::json!({"question": "Where is the gym?", "answer": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "invalid_record");
    }

    #[tokio::test]
    async fn knowledge_list_filters_by_category() {
        let state = test_state(true).await;

        let response = v1_router(state.clone())
            .oneshot(get_request("/knowledge?category=facilities"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let list: KnowledgeListResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.records[0].id, "lib-1");

        let response = v1_router(state).oneshot(get_request("/knowledge")).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let list: KnowledgeListResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 2);
    }

    #[tokio::test]
    async fn delete_unknown_record_is_not_found() {
        let req = Request::builder()
            .method("DELETE")
            .uri("/knowledge/missing")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(test_state(true).await).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "unknown_id");
    }

    #[tokio::test]
    async fn unknown_rating_gets_json_error_body() {
        let response = v1_router(test_state(true).await)
            .oneshot(json_request(
                "POST",
                "/feedback",
                serde_json::json!({"answer": "x", "rating": "meh"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers()["content-type"], "application/json");
        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
        assert!(json["message"].as_str().unwrap().contains("rating"));
    }

    #[tokio::test]
    async fn malformed_requests_get_json_error_bodies() {
        let state = test_state(true).await;

        let req = Request::builder()
            .method("POST")
            .uri("/answer")
            .header("content-type", "application/json")
            .body(Body::from("{\"query\": "))
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_request");

        let response = v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                "/answer",
                serde_json::json!({"session_id": "s1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "invalid_request");

        let req = Request::builder()
            .method("POST")
            .uri("/knowledge")
            .body(Body::from("{}"))
            .unwrap();
        let response = v1_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["error"], "invalid_request");
    }
}
