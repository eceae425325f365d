use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use validator::Validate;

use application::{
    AuthenticateUserRequest, CreateGroupRequest, CreateMessageRequest, GroupDto, MessagePageDto,
    RegisterUserRequest,
};
use domain::{GroupId, PageRequest};

use crate::{
    auth::{AuthResponse, AuthUser},
    error::{ApiError, ApiPath, ValidatedJson},
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize, Validate)]
struct RegisterPayload {
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    username: String,
    #[validate(contains(pattern = "@", message = "email must contain '@'"))]
    email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    password: String,
}

#[derive(Debug, Deserialize, Validate)]
struct LoginPayload {
    #[validate(length(min = 1, message = "email is required"))]
    email: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateGroupPayload {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct SendMessagePayload {
    group_id: Option<GroupId>,
    #[validate(length(max = 5000, message = "content is too long"))]
    content: Option<String>,
    is_anonymous: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
struct AnonymousModePayload {
    is_anonymous: Option<bool>,
}

/// 分页参数按原始字符串接收，非数字时回落到默认值
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/profile", get(profile))
        .route("/chat/groups", post(create_group).get(list_groups))
        .route("/chat/groups/{group_id}/join", post(join_group))
        .route("/chat/groups/{group_id}/messages", get(list_messages))
        .route("/chat/messages", post(send_message))
        .route("/chat/anonymous-mode", put(set_anonymous_mode))
}

/// `*` 放行任意来源；否则放行配置的来源以及任意 localhost / 127.0.0.1 来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }

    let allowed = origins.to_vec();
    base.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &Parts| {
            origin
                .to_str()
                .map(|origin| allowed.iter().any(|item| item == origin) || is_local_origin(origin))
                .unwrap_or(false)
        },
    ))
}

fn is_local_origin(origin: &str) -> bool {
    ["http://localhost", "https://localhost", "http://127.0.0.1", "https://127.0.0.1"]
        .iter()
        .filter_map(|prefix| origin.strip_prefix(prefix))
        .any(|rest| rest.is_empty() || rest.starts_with(':'))
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "groupchat",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.hub.stats();
    Json(json!({
        "status": "ok",
        "connections": stats.connections,
        "groups": stats.groups,
    }))
}

async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterPayload>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let token = state.jwt_service.generate_token(&user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let token = state.jwt_service.generate_token(&user)?;

    Ok(Json(AuthResponse { token, user }))
}

async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user = state.user_service.profile(user_id).await?;
    Ok(Json(json!({ "user": user })))
}

async fn create_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateGroupPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let group: GroupDto = state
        .group_service
        .create_group(CreateGroupRequest {
            creator_id: user_id,
            name: payload.name,
            description: payload.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Group created successfully", "group": group })),
    ))
}

async fn list_groups(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let groups = state.group_service.list_groups(user_id).await?;
    Ok(Json(json!({ "groups": groups })))
}

async fn join_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<Json<Value>, ApiError> {
    state.group_service.join_group(user_id, group_id).await?;
    Ok(Json(json!({ "message": "Successfully joined group" })))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(payload): ValidatedJson<SendMessagePayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let message = state
        .message_service
        .send_message(CreateMessageRequest {
            sender_id: user_id,
            group_id: payload.group_id,
            content: payload.content,
            is_anonymous: payload.is_anonymous,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Message sent successfully", "data": message })),
    ))
}

async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(group_id): ApiPath<GroupId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagePageDto>, ApiError> {
    let page = PageRequest::from_raw(query.page.as_deref(), query.limit.as_deref());
    let history = state
        .message_service
        .list_messages(user_id, group_id, page)
        .await?;
    Ok(Json(history))
}

async fn set_anonymous_mode(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(payload): ValidatedJson<AnonymousModePayload>,
) -> Result<Json<Value>, ApiError> {
    let requested = payload
        .is_anonymous
        .ok_or_else(|| ApiError::bad_request("is_anonymous flag is required"))?;
    let is_anonymous = state
        .user_service
        .set_anonymous_mode(user_id, requested)
        .await?;

    let message = if is_anonymous {
        "Anonymous mode enabled"
    } else {
        "Anonymous mode disabled"
    };
    Ok(Json(json!({ "message": message, "is_anonymous": is_anonymous })))
}

/// 带 token 时必须有效；不带 token 的连接不关联用户
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = match query.token.as_deref() {
        Some(token) => Some(state.jwt_service.verify_token(token)?.user_id),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, user_id).run()))
}
