use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use devconnect_realtime::{Notifier, PresenceRegistry};
use devconnect_shared::constants::MIN_PASSWORD_LEN;
use devconnect_shared::credential::hash_password;
use devconnect_shared::protocol::ChatMessage;
use devconnect_shared::types::{ConversationId, UserId};
use devconnect_store::{Database, NewUser, User};

use crate::analytics::{self, NetworkAnalytics};
use crate::auth::CurrentUser;
use crate::config::ServerConfig;
use crate::conversations::{self, ConversationSummary};
use crate::error::ServerError;
use crate::profiles::ConnectionProfile;
use crate::recommendations::{self, SearchParams, SearchResult, Suggestion};
use crate::relationships::{self, BulkRequestBody, BulkRequestResponse};
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub presence: PresenceRegistry,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Production wiring: events go out through the presence registry.
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let presence = PresenceRegistry::new(config.event_buffer);
        Self {
            db: Arc::new(Mutex::new(db)),
            notifier: Arc::new(presence.clone()),
            presence,
            config: Arc::new(config),
        }
    }

    /// Same as [`AppState::new`] but with events routed to `notifier`.
    #[cfg(test)]
    pub fn with_notifier(db: Database, config: ServerConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            presence: PresenceRegistry::new(config.event_buffer),
            notifier,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/users/me", get(current_profile))
        .route("/connections/request/:id", post(send_request))
        .route("/connections/accept/:id", post(accept_request))
        .route("/connections/reject/:id", post(reject_request))
        .route("/connections/suggestions", get(suggestions))
        .route("/connections/my-connections", get(my_connections))
        .route("/connections/pending", get(pending_requests))
        .route("/connections/analytics", get(network_analytics))
        .route("/connections/search", get(search))
        .route("/connections/bulk-request", post(bulk_request))
        .route("/connections/export", get(export))
        .route("/connections/:id", delete(remove_connection))
        .route("/messages", post(send_message))
        .route("/messages/conversations", get(list_conversations))
        .route("/messages/connections", get(messaging_connections))
        .route("/messages/:conversation_id", get(list_messages))
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    bio: String,
    skills: Vec<String>,
    profile_picture: String,
    github: String,
    linkedin: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[serde(default)]
    receiver_id: String,
    #[serde(default)]
    content: String,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServerError::Validation(rejection.body_text()))
}

fn path_user_id(raw: &str) -> Result<UserId, ServerError> {
    UserId::parse(raw).map_err(|_| ServerError::Validation("Invalid user ID format".into()))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    let req = json_body(payload)?;

    if req.name.trim().is_empty() {
        return Err(ServerError::Validation("Name is required".into()));
    }
    if !req.email.contains('@') || req.email.trim().len() < 3 {
        return Err(ServerError::Validation("A valid email is required".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServerError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // argon2 hashing is CPU-bound.
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServerError::Unavailable(format!("Hashing task failed: {e}")))??;

    let user = state.db.lock().await.create_user(NewUser {
        name: req.name,
        email: req.email,
        password_hash,
        bio: req.bio,
        skills: req.skills,
        profile_picture: req.profile_picture,
        github: req.github,
        linkedin: req.linkedin,
    })?;

    info!(user = %user.id, "Registered new user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn current_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<User>, ServerError> {
    let user = state.db.lock().await.get_user(&user_id)?;
    Ok(Json(user))
}

// ─── Connections ───

async fn send_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    let target = path_user_id(&id)?;
    relationships::send_request(&state, user_id, target).await?;
    Ok(Json(MessageResponse {
        message: "Connection request sent successfully",
    }))
}

async fn accept_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    let requester = path_user_id(&id)?;
    relationships::accept_request(&state, user_id, requester).await?;
    Ok(Json(MessageResponse {
        message: "Connection request accepted successfully",
    }))
}

async fn reject_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    let requester = path_user_id(&id)?;
    relationships::reject_request(&state, user_id, requester).await?;
    Ok(Json(MessageResponse {
        message: "Connection request rejected successfully",
    }))
}

async fn remove_connection(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    let other = path_user_id(&id)?;
    relationships::remove_connection(&state, user_id, other).await?;
    Ok(Json(MessageResponse {
        message: "Connection removed successfully",
    }))
}

async fn suggestions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Suggestion>>, ServerError> {
    Ok(Json(recommendations::suggestions(&state, user_id).await?))
}

async fn my_connections(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConnectionProfile>>, ServerError> {
    Ok(Json(relationships::my_connections(&state, user_id).await?))
}

async fn pending_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConnectionProfile>>, ServerError> {
    Ok(Json(relationships::pending_requests(&state, user_id).await?))
}

async fn network_analytics(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<NetworkAnalytics>, ServerError> {
    Ok(Json(analytics::analytics(&state, user_id).await?))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ServerError> {
    Ok(Json(recommendations::search(&state, user_id, &params).await?))
}

async fn bulk_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<BulkRequestBody>, JsonRejection>,
) -> Result<Json<BulkRequestResponse>, ServerError> {
    let body = json_body(payload)?;
    let results = relationships::bulk_request(&state, user_id, &body.user_ids).await?;
    Ok(Json(BulkRequestResponse { results }))
}

async fn export(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, ServerError> {
    let snapshot = relationships::export(&state, user_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        relationships::export_filename(Utc::now())
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(snapshot)))
}

// ─── Messages ───

async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    Ok(Json(conversations::list_conversations(&state, user_id).await?))
}

async fn messaging_connections(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConnectionProfile>>, ServerError> {
    Ok(Json(conversations::messaging_connections(&state, user_id).await?))
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    let conversation = ConversationId::parse(&conversation_id)?;
    Ok(Json(
        conversations::list_messages(&state, &conversation, user_id).await?,
    ))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ChatMessage>, ServerError> {
    let req = json_body(payload)?;
    if req.receiver_id.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ServerError::Validation(
            "Receiver ID and content are required".into(),
        ));
    }
    let receiver = UserId::parse(&req.receiver_id)?;

    Ok(Json(
        conversations::send_message(&state, user_id, receiver, &req.content).await?,
    ))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
