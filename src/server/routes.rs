//! HTTP route handlers for the council API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::conversations::store::ConversationStore;
use crate::conversations::types::{ConversationListSnapshot, ConversationSession};
use crate::core::errors::CouncilError;
use crate::core::ids::{ConversationId, ModelId};
use crate::council::ranking::{AggregateRanking, PeerRanking, RankingParser, label_to_model};
use crate::council::roster::CouncilRoster;
use crate::progress::stages::CouncilStage;
use crate::progress::tracker::ProgressSnapshot;

use super::state::AppState;

/// Handler error: status code plus message.
type ApiError = (StatusCode, String);

fn api_error(err: &CouncilError) -> ApiError {
    let status = match err {
        CouncilError::NotFound { .. } => StatusCode::NOT_FOUND,
        CouncilError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/conversations",
            get(list_conversations)
                .post(create_conversation)
                .delete(delete_all_conversations),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/conversations/{id}/select", post(select_conversation))
        .route("/api/conversations/{id}/messages", post(record_message))
        .route("/api/conversations/{id}/title", put(rename_conversation))
        .route("/api/progress", get(progress_snapshot))
        .route("/api/progress/stage", post(start_stage))
        .route("/api/progress/council-stage", post(start_council_stage))
        .route("/api/progress/completions", post(record_completions))
        .route("/api/progress/finish", post(finish_stage))
        .route("/api/council/roster", get(council_roster))
        .route("/api/council/rankings", post(aggregate_rankings))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sheldon-council",
        "version": env!("CARGO_PKG_VERSION"),
        "persistent": state.is_persistent(),
    }))
}

// ===== Conversations ========================================================

async fn list_conversations(State(state): State<Arc<AppState>>) -> Json<ConversationListSnapshot> {
    Json(state.conversations.read().await.snapshot())
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ConversationSession>), ApiError> {
    let mut store = state.conversations.write().await;
    let session = store.prepare_create();

    state
        .persist_session(session.clone())
        .await
        .map_err(|e| api_error(&e))?;
    store
        .commit_create(session.clone())
        .map_err(|e| api_error(&e))?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationSession>, ApiError> {
    state
        .conversations
        .read()
        .await
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(&CouncilError::conversation_not_found(id)))
}

async fn select_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConversationId>,
) -> Result<StatusCode, ApiError> {
    state
        .conversations
        .write()
        .await
        .select(id)
        .map_err(|e| api_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConversationId>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.conversations.write().await;
    if store.get(id).is_none() {
        return Err(api_error(&CouncilError::conversation_not_found(id)));
    }

    state.persist_delete(id).await.map_err(|e| api_error(&e))?;
    store.delete(id).map_err(|e| api_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk delete response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    /// Number of conversations removed.
    pub removed: usize,
}

async fn delete_all_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let mut store = state.conversations.write().await;
    state.persist_delete_all().await.map_err(|e| api_error(&e))?;
    let removed = store.delete_all();
    Ok(Json(DeleteAllResponse { removed }))
}

async fn record_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationSession>, ApiError> {
    let mut store = state.conversations.write().await;
    let session = store.prepare_message(id).map_err(|e| api_error(&e))?;
    commit_session(&state, &mut store, session).await.map(Json)
}

/// Persist an updated session, then apply it to the held store.
async fn commit_session(
    state: &AppState,
    store: &mut ConversationStore,
    session: ConversationSession,
) -> Result<ConversationSession, ApiError> {
    state
        .persist_session(session.clone())
        .await
        .map_err(|e| api_error(&e))?;
    store
        .commit_update(session)
        .cloned()
        .map_err(|e| api_error(&e))
}

/// Rename request.
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// New title; cleaned before storing.
    pub title: String,
}

async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConversationId>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<ConversationSession>, ApiError> {
    let mut store = state.conversations.write().await;
    let session = store
        .prepare_rename(id, &request.title)
        .map_err(|e| api_error(&e))?;
    commit_session(&state, &mut store, session).await.map(Json)
}

// ===== Progress =============================================================

async fn progress_snapshot(State(state): State<Arc<AppState>>) -> Json<ProgressSnapshot> {
    Json(state.progress.read().await.snapshot())
}

/// Stage start request.
#[derive(Debug, Deserialize)]
pub struct StageRequest {
    /// Stage label.
    pub name: String,
    /// Agents expected.
    pub total: i64,
}

async fn start_stage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StageRequest>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let mut tracker = state.progress.write().await;
    tracker
        .set_stage(request.name, request.total)
        .map_err(|e| api_error(&e))?;
    Ok(Json(tracker.snapshot()))
}

/// Council stage start request.
#[derive(Debug, Deserialize)]
pub struct CouncilStageRequest {
    /// Stage to start.
    pub stage: CouncilStage,
}

async fn start_council_stage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CouncilStageRequest>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let mut tracker = state.progress.write().await;
    tracker
        .begin_council_stage(request.stage, &state.config.roster)
        .map_err(|e| api_error(&e))?;
    Ok(Json(tracker.snapshot()))
}

/// Completion event.
#[derive(Debug, Default, Deserialize)]
pub struct CompletionRequest {
    /// Completions to add; defaults to one.
    pub count: Option<i64>,
}

async fn record_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let mut tracker = state.progress.write().await;
    tracker
        .record_completion(request.count.unwrap_or(1))
        .map_err(|e| api_error(&e))?;
    Ok(Json(tracker.snapshot()))
}

async fn finish_stage(State(state): State<Arc<AppState>>) -> Json<ProgressSnapshot> {
    let mut tracker = state.progress.write().await;
    tracker.finish();
    Json(tracker.snapshot())
}

// ===== Council ==============================================================

async fn council_roster(State(state): State<Arc<AppState>>) -> Json<CouncilRoster> {
    Json(state.config.roster.clone())
}

/// Peer evaluations collected during the ranking stage.
#[derive(Debug, Deserialize)]
pub struct RankingsRequest {
    /// One evaluation per member.
    pub rankings: Vec<PeerRanking>,
}

/// Ranking metadata for the final council response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankingsResponse {
    /// Anonymous label of each roster seat.
    pub label_to_model: BTreeMap<String, ModelId>,
    /// Models ordered by average position, best first.
    pub aggregate_rankings: Vec<AggregateRanking>,
}

async fn aggregate_rankings(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RankingsRequest>,
) -> Result<Json<RankingsResponse>, ApiError> {
    let parser = RankingParser::new().map_err(|e| api_error(&e))?;
    let labels = label_to_model(&state.config.roster.members);
    let aggregate_rankings = parser.aggregate(&request.rankings, &labels);
    tracing::debug!(
        "Aggregated {} peer rankings into {} entries",
        request.rankings.len(),
        aggregate_rankings.len()
    );
    Ok(Json(RankingsResponse {
        label_to_model: labels,
        aggregate_rankings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use crate::conversations::repository::{
        ConversationRepository, SqliteConversationRepository, StoreFuture,
    };
    use crate::core::config::CouncilConfig;
    use crate::core::errors::CouncilResult;

    /// Repository whose writes always fail; reads return `sessions`.
    struct BrokenRepository {
        sessions: Vec<ConversationSession>,
    }

    fn disk_full() -> CouncilError {
        CouncilError::Io(std::io::Error::other("disk full"))
    }

    impl ConversationRepository for BrokenRepository {
        fn load_all(&self) -> StoreFuture<'_, CouncilResult<Vec<ConversationSession>>> {
            Box::pin(async move { Ok(self.sessions.clone()) })
        }

        fn upsert(&self, _session: ConversationSession) -> StoreFuture<'_, CouncilResult<()>> {
            Box::pin(async { Err(disk_full()) })
        }

        fn delete(&self, _id: ConversationId) -> StoreFuture<'_, CouncilResult<()>> {
            Box::pin(async { Err(disk_full()) })
        }

        fn delete_all(&self) -> StoreFuture<'_, CouncilResult<()>> {
            Box::pin(async { Err(disk_full()) })
        }
    }

    fn ids_of(list: &serde_json::Value) -> Vec<String> {
        list["conversations"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| c["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap_or_else(|e| panic!("request: {e}"));

        let response = app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| panic!("oneshot: {e}"));
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn app() -> Router {
        create_router(AppState::new(CouncilConfig::default()))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["persistent"], false);
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let app = app();

        let (status, first) = send(&app, Method::POST, "/api/conversations", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, second) = send(&app, Method::POST, "/api/conversations", None).await;
        let (_, third) = send(&app, Method::POST, "/api/conversations", None).await;

        let second_id = second["id"].as_str().unwrap_or_default().to_string();
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/conversations/{second_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, list) = send(&app, Method::GET, "/api/conversations", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = list["conversations"]
            .as_array()
            .map(|items| items.iter().filter_map(|c| c["id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(
            ids,
            vec![
                first["id"].as_str().unwrap_or_default(),
                third["id"].as_str().unwrap_or_default()
            ]
        );
        assert_eq!(list["current_conversation_id"], third["id"]);

        let (status, body) = send(&app, Method::DELETE, "/api/conversations", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 2);

        let (_, list) = send(&app, Method::GET, "/api/conversations", None).await;
        assert_eq!(list["conversations"].as_array().map(Vec::len), Some(0));
        assert!(list["current_conversation_id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_404() {
        let app = app();
        let missing = ConversationId::new();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/conversations/{missing}/select"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/conversations/{missing}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_messages_and_title() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/api/conversations", None).await;
        let id = created["id"].as_str().unwrap_or_default().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/conversations/{id}/messages"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message_count"], 1);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/conversations/{id}/title"),
            Some(r#"{"title":"'String Theory Debate'"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "String Theory Debate");
    }

    #[tokio::test]
    async fn test_progress_endpoints() {
        let app = app();

        let (_, idle) = send(&app, Method::GET, "/api/progress", None).await;
        assert_eq!(idle["phase"], "idle");
        assert_eq!(idle["percentage"], 0);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/progress/stage",
            Some(r#"{"name":"Voting","total":-1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/progress/stage",
            Some(r#"{"name":"Voting","total":3}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], 0);

        send(&app, Method::POST, "/api/progress/completions", Some("{}")).await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/progress/completions",
            Some(r#"{"count":1}"#),
        )
        .await;
        assert_eq!(body["completed"], 2);
        assert_eq!(body["percentage"], 67);

        let (_, body) = send(&app, Method::POST, "/api/progress/finish", None).await;
        assert_eq!(body["phase"], "idle");
    }

    #[tokio::test]
    async fn test_council_stage_endpoint() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/progress/council-stage",
            Some(r#"{"stage":"ranking"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage_name"], CouncilStage::Ranking.label());
        assert_eq!(body["total"], 5);

        let (_, roster) = send(&app, Method::GET, "/api/council/roster", None).await;
        assert_eq!(roster["members"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() -> Result<(), CouncilError> {
        let repository: Arc<dyn ConversationRepository> =
            Arc::new(SqliteConversationRepository::in_memory().await?);
        let state = AppState::with_repository(CouncilConfig::default(), repository.clone()).await?;
        let app = create_router(state);

        let (_, first) = send(&app, Method::POST, "/api/conversations", None).await;
        let (_, second) = send(&app, Method::POST, "/api/conversations", None).await;
        let first_id = first["id"].as_str().unwrap_or_default().to_string();
        send(
            &app,
            Method::POST,
            &format!("/api/conversations/{first_id}/messages"),
            None,
        )
        .await;
        send(
            &app,
            Method::DELETE,
            &format!("/api/conversations/{}", second["id"].as_str().unwrap_or_default()),
            None,
        )
        .await;

        let stored = repository.load_all().await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.to_string(), first_id);
        assert_eq!(stored[0].message_count, 1);

        let restored = AppState::with_repository(CouncilConfig::default(), repository).await?;
        assert_eq!(restored.conversations.read().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_keeps_order_after_deletes() -> Result<(), CouncilError> {
        let repository: Arc<dyn ConversationRepository> =
            Arc::new(SqliteConversationRepository::in_memory().await?);
        let state = AppState::with_repository(CouncilConfig::default(), repository.clone()).await?;
        let app = create_router(state);

        let (_, a) = send(&app, Method::POST, "/api/conversations", None).await;
        let (_, b) = send(&app, Method::POST, "/api/conversations", None).await;
        let (_, c) = send(&app, Method::POST, "/api/conversations", None).await;
        for gone in [&a, &b] {
            let uri = format!("/api/conversations/{}", gone["id"].as_str().unwrap_or_default());
            send(&app, Method::DELETE, &uri, None).await;
        }
        send(&app, Method::POST, "/api/conversations", None).await;
        let uri = format!(
            "/api/conversations/{}/messages",
            c["id"].as_str().unwrap_or_default()
        );
        send(&app, Method::POST, &uri, None).await;

        let (_, live) = send(&app, Method::GET, "/api/conversations", None).await;
        let live_ids = ids_of(&live);
        assert_eq!(live_ids.len(), 2);

        let restarted = create_router(
            AppState::with_repository(CouncilConfig::default(), repository).await?,
        );
        let (_, restored) = send(&restarted, Method::GET, "/api/conversations", None).await;
        assert_eq!(ids_of(&restored), live_ids);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_store_unchanged() -> Result<(), CouncilError> {
        let existing = ConversationSession::new(ConversationId::new(), 1);
        let repository = Arc::new(BrokenRepository {
            sessions: vec![existing.clone()],
        });
        let state = AppState::with_repository(CouncilConfig::default(), repository).await?;
        let app = create_router(state.clone());
        let before = state.conversations.read().await.snapshot();
        let mut events = state.conversations.read().await.subscribe();

        let id = existing.id;
        let attempts = [
            (Method::POST, "/api/conversations".to_string(), None),
            (Method::DELETE, format!("/api/conversations/{id}"), None),
            (Method::DELETE, "/api/conversations".to_string(), None),
            (Method::POST, format!("/api/conversations/{id}/messages"), None),
            (
                Method::PUT,
                format!("/api/conversations/{id}/title"),
                Some(r#"{"title":"Lost"}"#),
            ),
        ];
        for (method, uri, body) in attempts {
            let (status, _) = send(&app, method, &uri, body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        }

        assert_eq!(state.conversations.read().await.snapshot(), before);
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_rankings_endpoint_aggregates_peer_rankings() {
        let app = app();
        let roster = CouncilRoster::default();
        let body = serde_json::json!({
            "rankings": [
                {
                    "model": roster.members[0].model,
                    "sheldon_name": roster.members[0].sheldon_name,
                    "ranking": "FINAL RANKING:\n1. Response B\n2. Response A"
                },
                {
                    "model": roster.members[1].model,
                    "sheldon_name": roster.members[1].sheldon_name,
                    "ranking": "FINAL RANKING:\n1. Response B\n2. Response C\n3. Response A"
                }
            ]
        })
        .to_string();

        let (status, response) =
            send(&app, Method::POST, "/api/council/rankings", Some(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response["label_to_model"]["Response A"],
            roster.members[0].model.as_str()
        );
        let ranked = &response["aggregate_rankings"];
        assert_eq!(ranked[0]["model"], roster.members[1].model.as_str());
        assert_eq!(ranked[0]["average_rank"], 1.0);
        assert_eq!(ranked[0]["rankings_count"], 2);
        assert_eq!(ranked[1]["model"], roster.members[2].model.as_str());
        assert_eq!(ranked[2]["model"], roster.members[0].model.as_str());
        assert_eq!(ranked[2]["average_rank"], 2.5);
    }
}
