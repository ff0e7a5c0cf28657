use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::messaging::{self, MessageView, SendMessage};
use crate::state::AppState;
use crate::users::UserSummary;

/// Messages received by the caller, newest first
#[utoipa::path(
    get,
    path = "/messages/inbox",
    responses((status = 200, description = "Inbox", body = [MessageView])),
    security(("user_id" = [])),
    tag = "messages"
)]
pub async fn inbox(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<MessageView>>, AppError> {
    Ok(Json(messaging::inbox(&state.db, caller.id()).await?))
}

/// Messages sent by the caller, newest first
#[utoipa::path(
    get,
    path = "/messages/outbox",
    responses((status = 200, description = "Outbox", body = [MessageView])),
    security(("user_id" = [])),
    tag = "messages"
)]
pub async fn outbox(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<MessageView>>, AppError> {
    Ok(Json(messaging::outbox(&state.db, caller.id()).await?))
}

/// Users the caller can message
#[utoipa::path(
    get,
    path = "/messages/recipients",
    responses((status = 200, description = "Possible recipients", body = [UserSummary])),
    security(("user_id" = [])),
    tag = "messages"
)]
pub async fn recipients(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(messaging::recipients(&state.db, caller.id()).await?))
}

/// Send a direct message
#[utoipa::path(
    post,
    path = "/messages",
    request_body = SendMessage,
    responses(
        (status = 201, description = "Message sent", body = MessageView),
        (status = 404, description = "Receiver not found"),
        (status = 422, description = "Empty content or self-addressed message")
    ),
    security(("user_id" = [])),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(sender): CurrentUser,
    Json(input): Json<SendMessage>,
) -> Result<(StatusCode, Json<MessageView>), AppError> {
    let sent = messaging::send_message(&state.db, &sender, input).await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

/// Read a message; the receiver's first read marks it read
#[utoipa::path(
    get,
    path = "/messages/{id}",
    params(("id" = Uuid, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message", body = MessageView),
        (status = 403, description = "Caller is neither sender nor receiver"),
        (status = 404, description = "No such message")
    ),
    security(("user_id" = [])),
    tag = "messages"
)]
pub async fn read_message(
    State(state): State<AppState>,
    CurrentUser(reader): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageView>, AppError> {
    Ok(Json(messaging::read_message(&state.db, &reader, id).await?))
}
