use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use application::{resolve_room, ApplicationError, RoomStatistics};
use domain::{Message, MessageId, ModerationNotes, ModerationStatus, Room, Timestamp};

use crate::{error::ApiError, state::AppState, websocket::websocket_upgrade};

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    status: ModerationStatus,
}

#[derive(Debug, Serialize)]
struct RoomDto {
    id: i64,
    name: String,
    created_at: Timestamp,
}

impl From<Room> for RoomDto {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.into(),
            name: room.name,
            created_at: room.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageDto {
    id: i64,
    room_id: i64,
    user_id: i64,
    content: String,
    created_at: Timestamp,
    status: ModerationStatus,
    is_flagged: bool,
    notes: ModerationNotes,
    moderated_at: Option<Timestamp>,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.into(),
            room_id: message.room_id.into(),
            user_id: message.user_id.into(),
            content: message.content,
            created_at: message.created_at,
            status: message.status,
            is_flagged: message.is_flagged,
            notes: message.notes,
            moderated_at: message.moderated_at,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .route("/ws/{room}", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room}/messages", get(room_history))
        .route("/rooms/{room}/statistics", get(room_statistics))
        .route("/messages/{id}/review", post(review_message))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_room(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let room = state.chat_service.get_or_create_room(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let rooms = state.chat_service.list_rooms().await?;
    Ok(Json(rooms.into_iter().map(RoomDto::from).collect()))
}

async fn room_history(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let (_, messages) = state.chat_service.room_history(&room, query.limit).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

async fn room_statistics(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomStatistics>, ApiError> {
    let room = resolve_room(state.session_deps.room_repository.as_ref(), &room)
        .await?
        .ok_or(ApplicationError::RoomNotFound)?;
    let stats = state.stats_service.get_statistics(room.id).await?;
    Ok(Json(stats))
}

async fn review_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewPayload>,
) -> Result<Json<MessageDto>, ApiError> {
    let message = state
        .chat_service
        .review_message(MessageId::new(id), payload.status)
        .await?;
    Ok(Json(message.into()))
}
