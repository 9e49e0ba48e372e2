use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::analytics::AnalyticsService;
use crate::app::auth::{AuthSession, NewAccount, TokenPair};
use crate::app::items::{ItemChanges, ItemService, NewItem};
use crate::app::matching::{MatchError, MatchService};
use crate::app::messaging::{MessagingService, OutgoingMessage, SendError};
use crate::app::moderation::{ModerationError, ModerationService};
use crate::domain::analytics::Analytics;
use crate::domain::item::{Category, Item, ItemKind, ItemReport};
use crate::domain::matching::{MatchCandidate, MatchId};
use crate::domain::message::{ConversationSummary, Message};
use crate::domain::moderation::{ReportStatus, UserReport};
use crate::domain::user::{is_campus_email, Role, User};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::infra::db::{self, UNIQUE_VIOLATION};
use crate::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_LOCATION_LEN: usize = 200;
const MAX_IMAGE_URL_LEN: usize = 2048;
const MAX_MESSAGE_LEN: usize = 2000;
const MAX_REASON_LEN: usize = 1000;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: &'static str,
    cache: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(30);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    Ok(limit)
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

/// Trims a page fetched with `limit + 1` rows and points the cursor at the
/// last row kept.
fn paginate<T>(
    mut rows: Vec<T>,
    limit: i64,
    key: impl Fn(&T) -> (OffsetDateTime, Uuid),
) -> ListResponse<T> {
    let limit = limit as usize;
    let next_cursor = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(&key)
    } else {
        None
    };

    ListResponse {
        items: rows,
        next_cursor: encode_cursor(next_cursor),
    }
}

fn require_text(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    if len > max_len {
        return Err(AppError::bad_request(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

fn validate_image_url(value: &str) -> Result<(), AppError> {
    if value.len() > MAX_IMAGE_URL_LEN {
        return Err(AppError::bad_request(format!(
            "image_url must be at most {} characters",
            MAX_IMAGE_URL_LEN
        )));
    }
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::bad_request("image_url must be an http(s) URL")),
    }
}

fn parse_category(value: &str) -> Result<Category, AppError> {
    Category::parse(value).ok_or_else(|| {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        AppError::bad_request(format!("category must be one of: {}", names.join(", ")))
    })
}

/// Picks the date field that belongs to `kind` and rejects the other one.
fn occurred_at_for(
    kind: ItemKind,
    date_lost: Option<OffsetDateTime>,
    date_found: Option<OffsetDateTime>,
) -> Result<Option<OffsetDateTime>, AppError> {
    match kind {
        ItemKind::Lost if date_found.is_some() => {
            Err(AppError::bad_request("date_found does not apply to lost items"))
        }
        ItemKind::Found if date_lost.is_some() => {
            Err(AppError::bad_request("date_lost does not apply to found items"))
        }
        ItemKind::Lost => Ok(date_lost),
        ItemKind::Found => Ok(date_found),
    }
}

fn parse_match_id(value: &str) -> Result<MatchId, AppError> {
    MatchId::parse(value).ok_or_else(|| AppError::bad_request("invalid match id"))
}

fn moderation_error(err: ModerationError, context: &'static str) -> AppError {
    match err {
        ModerationError::UserNotFound => AppError::not_found("user not found"),
        ModerationError::MessageNotFound => AppError::not_found("message not found"),
        ModerationError::AlreadyResolved => AppError::conflict("report already resolved"),
        ModerationError::Storage(err) => {
            tracing::error!(error = ?err, "{}", context);
            AppError::internal(context)
        }
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    if !db {
        tracing::warn!("health check: database unreachable");
    }
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database: if db { "connected" } else { "disconnected" },
        cache: if redis { "connected" } else { "disconnected" },
    })
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<TokenPair> for AuthTokenResponse {
    fn from(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokenResponse,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    require_text("name", &payload.name, MAX_NAME_LEN)?;
    require_text("email", &payload.email, MAX_EMAIL_LEN)?;
    if !payload.email.contains('@') {
        return Err(AppError::bad_request("email is invalid"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let role = match payload.role.as_deref().map(str::trim) {
        None | Some("") => Role::Student,
        Some(value) => Role::from_db(&value.to_ascii_lowercase())
            .ok_or_else(|| AppError::bad_request("role must be student or admin"))?,
    };
    if role.is_admin() && !caller.as_ref().is_some_and(AuthUser::is_admin) {
        return Err(AppError::forbidden("only admins can create admin accounts"));
    }

    let campus_verified = is_campus_email(&payload.email, &state.campus_email_domain);
    if !role.is_admin() && !campus_verified {
        return Err(AppError::bad_request(format!(
            "email must be a @{} address",
            state.campus_email_domain
        )));
    }

    let (user, tokens) = state
        .auth_service()
        .register(NewAccount {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role,
            campus_verified,
        })
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if db::error_code(sqlx_err).as_deref() == Some(UNIQUE_VIOLATION) {
                    return AppError::conflict("email already registered");
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    tracing::info!(user_id = %user.id, role = role.as_db(), "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            tokens: tokens.into(),
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let result = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match result {
        Some((user, tokens)) => Ok(Json(AuthResponse {
            user,
            tokens: tokens.into(),
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = state
        .auth_service()
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    state
        .auth_service()
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = state
        .auth_service()
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    user.map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_lost: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_found: Option<OffsetDateTime>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_lost_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    create_item(ItemKind::Lost, auth, state, payload).await
}

pub async fn create_found_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    create_item(ItemKind::Found, auth, state, payload).await
}

async fn create_item(
    kind: ItemKind,
    auth: AuthUser,
    state: AppState,
    payload: CreateItemRequest,
) -> Result<(StatusCode, Json<Item>), AppError> {
    require_text("title", &payload.title, MAX_TITLE_LEN)?;
    require_text("description", &payload.description, MAX_DESCRIPTION_LEN)?;
    require_text("location", &payload.location, MAX_LOCATION_LEN)?;
    let category = parse_category(&payload.category)?;
    let image_url = payload
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    if let Some(url) = &image_url {
        validate_image_url(url)?;
    }
    let occurred_at = occurred_at_for(kind, payload.date_lost, payload.date_found)?
        .unwrap_or_else(OffsetDateTime::now_utc);

    let item = ItemService::new(state.db.clone())
        .create(
            auth.user_id,
            NewItem {
                report: ItemReport::new(kind, occurred_at),
                title: payload.title,
                description: payload.description,
                category,
                location: payload.location,
                image_url,
                tags: payload.tags,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create item");
            AppError::internal("failed to create item")
        })?;

    tracing::info!(item_id = %item.id, kind = kind.as_db(), "item reported");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_lost_items(
    Query(query): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Item>>, AppError> {
    list_items(ItemKind::Lost, query, state).await
}

pub async fn list_found_items(
    Query(query): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Item>>, AppError> {
    list_items(ItemKind::Found, query, state).await
}

async fn list_items(
    kind: ItemKind,
    query: PaginationQuery,
    state: AppState,
) -> Result<Json<ListResponse<Item>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let items = ItemService::new(state.db.clone())
        .list(kind, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, kind = kind.as_db(), "failed to list items");
            AppError::internal("failed to list items")
        })?;

    Ok(Json(paginate(items, limit, |item| (item.created_at, item.id))))
}

pub async fn get_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Item>, AppError> {
    let item = ItemService::new(state.db.clone())
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, item_id = %id, "failed to fetch item");
            AppError::internal("failed to fetch item")
        })?;

    item.map(Json)
        .ok_or_else(|| AppError::not_found("item not found"))
}

/// Loads an item the caller may modify: 404 when absent, 403 otherwise.
async fn load_managed_item(
    service: &ItemService,
    item_id: Uuid,
    auth: &AuthUser,
) -> Result<Item, AppError> {
    let item = service
        .get(item_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, item_id = %item_id, "failed to fetch item");
            AppError::internal("failed to fetch item")
        })?
        .ok_or_else(|| AppError::not_found("item not found"))?;

    if !auth.can_manage(item.user_id) {
        return Err(AppError::forbidden("not the owner of this item"));
    }
    Ok(item)
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_lost: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_found: Option<OffsetDateTime>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_resolved: Option<bool>,
}

pub async fn update_item(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<Item>, AppError> {
    if let Some(title) = &payload.title {
        require_text("title", title, MAX_TITLE_LEN)?;
    }
    if let Some(description) = &payload.description {
        require_text("description", description, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(location) = &payload.location {
        require_text("location", location, MAX_LOCATION_LEN)?;
    }
    let image_url = payload
        .image_url
        .as_deref()
        .map(str::trim)
        .map(|url| -> Result<Option<String>, AppError> {
            // An empty string removes the image.
            if url.is_empty() {
                return Ok(None);
            }
            validate_image_url(url)?;
            Ok(Some(url.to_string()))
        })
        .transpose()?;
    let category = payload.category.as_deref().map(parse_category).transpose()?;

    let service = ItemService::new(state.db.clone());
    let current = load_managed_item(&service, id, &auth).await?;
    let occurred_at = occurred_at_for(current.kind(), payload.date_lost, payload.date_found)?;

    let updated = service
        .update(
            id,
            ItemChanges {
                title: payload.title,
                description: payload.description,
                category,
                location: payload.location,
                occurred_at,
                image_url,
                tags: payload.tags,
                is_resolved: payload.is_resolved,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, item_id = %id, "failed to update item");
            AppError::internal("failed to update item")
        })?;

    updated
        .map(Json)
        .ok_or_else(|| AppError::not_found("item not found"))
}

pub async fn delete_item(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = ItemService::new(state.db.clone());
    load_managed_item(&service, id, &auth).await?;

    let deleted = service.delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, item_id = %id, "failed to delete item");
        AppError::internal("failed to delete item")
    })?;

    if deleted {
        tracing::info!(item_id = %id, user_id = %auth.user_id, "item deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("item not found"))
    }
}

#[derive(Deserialize)]
pub struct MatchQuery {
    pub min_score: Option<u8>,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub item_id: Uuid,
    pub matches: Vec<MatchCandidate>,
}

pub async fn match_item(
    Path(item_id): Path<Uuid>,
    Query(query): Query<MatchQuery>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MatchResponse>, AppError> {
    let min_score = query.min_score.unwrap_or(0);
    if min_score > 100 {
        return Err(AppError::bad_request("min_score must be between 0 and 100"));
    }

    let session = AuthSession {
        user_id: auth.user_id,
        role: auth.role,
    };
    let matches = MatchService::new(state.db.clone(), state.oracle.clone())
        .find_matches(item_id, &session)
        .await
        .map_err(|err| match err {
            MatchError::ItemNotFound => AppError::not_found("item not found"),
            MatchError::NotOwner => AppError::forbidden("not the owner of this item"),
            MatchError::Oracle(err) => {
                tracing::error!(error = %err, item_id = %item_id, "matching oracle failed");
                AppError::service_unavailable("matching service failed")
            }
            MatchError::Storage(err) => {
                tracing::error!(error = ?err, item_id = %item_id, "failed to load match candidates");
                AppError::internal("failed to find matches")
            }
        })?;

    Ok(Json(MatchResponse {
        item_id,
        matches: matches
            .into_iter()
            .filter(|candidate| candidate.score >= min_score)
            .collect(),
    }))
}

pub async fn list_conversations(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = MessagingService::new(state.db.clone())
        .conversations(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list conversations");
            AppError::internal("failed to list conversations")
        })?;

    Ok(Json(conversations))
}

pub async fn get_thread(
    Path(match_id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, AppError> {
    let match_id = parse_match_id(&match_id)?;

    let messages = MessagingService::new(state.db.clone())
        .thread(&match_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, match_id = %match_id, "failed to fetch messages");
            AppError::internal("failed to fetch messages")
        })?;

    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub match_id: String,
    pub to_user_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub is_contact_shared: bool,
}

pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let match_id = parse_match_id(&payload.match_id)?;
    require_text("text", &payload.text, MAX_MESSAGE_LEN)?;
    if payload.to_user_id == auth.user_id {
        return Err(AppError::bad_request("cannot message yourself"));
    }

    let message = MessagingService::new(state.db.clone())
        .send(
            auth.user_id,
            OutgoingMessage {
                match_id,
                to_user_id: payload.to_user_id,
                text: payload.text,
                is_contact_shared: payload.is_contact_shared,
            },
        )
        .await
        .map_err(|err| match err {
            SendError::Blocked => AppError::blocked(),
            SendError::RecipientNotFound => AppError::not_found("recipient not found"),
            SendError::Storage(err) => {
                tracing::error!(error = ?err, user_id = %auth.user_id, "failed to send message");
                AppError::internal("failed to send message")
            }
        })?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_message_read(
    Path(message_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let marked = MessagingService::new(state.db.clone())
        .mark_read(message_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, message_id = %message_id, "failed to mark message read");
            AppError::internal("failed to mark message read")
        })?;

    if marked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("message not found"))
    }
}

#[derive(Deserialize)]
pub struct BlockRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct BlockResponse {
    pub blocked: bool,
}

pub async fn block_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BlockRequest>,
) -> Result<Json<BlockResponse>, AppError> {
    if payload.user_id == auth.user_id {
        return Err(AppError::bad_request("cannot block yourself"));
    }

    let blocked = ModerationService::new(state.db.clone())
        .block(auth.user_id, payload.user_id)
        .await
        .map_err(|err| moderation_error(err, "failed to block user"))?;

    Ok(Json(BlockResponse { blocked }))
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub reported_user_id: Uuid,
    pub reason: String,
    pub message_id: Option<Uuid>,
}

pub async fn report_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<(StatusCode, Json<UserReport>), AppError> {
    if payload.reported_user_id == auth.user_id {
        return Err(AppError::bad_request("cannot report yourself"));
    }
    require_text("reason", &payload.reason, MAX_REASON_LEN)?;

    let report = ModerationService::new(state.db.clone())
        .report_user(
            auth.user_id,
            payload.reported_user_id,
            &payload.reason,
            payload.message_id,
        )
        .await
        .map_err(|err| moderation_error(err, "failed to file report"))?;

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn analytics(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Analytics>, AppError> {
    let snapshot = AnalyticsService::new(state.db.clone())
        .snapshot()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, admin_id = %admin.user_id, "failed to compute analytics");
            AppError::internal("failed to compute analytics")
        })?;

    Ok(Json(snapshot))
}

#[derive(Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn list_reports(
    AdminUser(_admin): AdminUser,
    Query(query): Query<ReportListQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<UserReport>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;
    let status = query
        .status
        .as_deref()
        .map(|value| {
            ReportStatus::from_db(value)
                .ok_or_else(|| AppError::bad_request("status must be pending or resolved"))
        })
        .transpose()?;

    let reports = ModerationService::new(state.db.clone())
        .list_reports(status, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list reports");
            AppError::internal("failed to list reports")
        })?;

    Ok(Json(paginate(reports, limit, |report| {
        (report.created_at, report.id)
    })))
}

pub async fn resolve_report(
    Path(report_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<UserReport>, AppError> {
    let report = ModerationService::new(state.db.clone())
        .resolve_report(report_id, admin.user_id)
        .await
        .map_err(|err| moderation_error(err, "failed to resolve report"))?;

    report
        .map(Json)
        .ok_or_else(|| AppError::not_found("report not found"))
}
