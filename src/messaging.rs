//! Direct messages between users.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{message, user, Message, User};
use crate::error::AppError;
use crate::users::UserSummary;

const CONTENT_MAX_LEN: usize = 5_000;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessage {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: message::Model,
    pub sender_name: String,
    pub receiver_name: String,
}

#[tracing::instrument(skip(db, sender, input), fields(sender = %sender.id, receiver = %input.receiver_id))]
pub async fn send_message(
    db: &DatabaseConnection,
    sender: &user::Model,
    input: SendMessage,
) -> Result<MessageView, AppError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidRequest("content cannot be empty".to_string()));
    }
    if content.chars().count() > CONTENT_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "content cannot exceed {} characters",
            CONTENT_MAX_LEN
        )));
    }
    if input.receiver_id == sender.id {
        return Err(AppError::InvalidRequest(
            "cannot send a message to yourself".to_string(),
        ));
    }
    let receiver = User::find_by_id(input.receiver_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("receiver not found".to_string()))?;

    let sent = message::ActiveModel {
        id: Set(Uuid::new_v4()),
        sender_id: Set(sender.id),
        receiver_id: Set(receiver.id),
        content: Set(content.to_string()),
        sent_date: Set(Utc::now()),
        is_read: Set(false),
    }
    .insert(db)
    .await?;

    tracing::info!(message_id = %sent.id, "Message sent");
    Ok(MessageView {
        message: sent,
        sender_name: sender.user_name.clone(),
        receiver_name: receiver.user_name,
    })
}

/// Messages received by `user_id`, newest first.
pub async fn inbox(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<MessageView>, AppError> {
    let messages = Message::find()
        .filter(message::Column::ReceiverId.eq(user_id))
        .order_by_desc(message::Column::SentDate)
        .all(db)
        .await?;
    with_names(db, messages).await
}

/// Messages sent by `user_id`, newest first.
pub async fn outbox(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<MessageView>, AppError> {
    let messages = Message::find()
        .filter(message::Column::SenderId.eq(user_id))
        .order_by_desc(message::Column::SentDate)
        .all(db)
        .await?;
    with_names(db, messages).await
}

/// Everyone the caller can write to.
pub async fn recipients(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Vec<UserSummary>, AppError> {
    let users = User::find()
        .filter(user::Column::Id.ne(user_id))
        .filter(user::Column::IsActive.eq(true))
        .order_by_asc(user::Column::UserName)
        .all(db)
        .await?;
    Ok(users.into_iter().map(UserSummary::from).collect())
}

/// Opens a message. The receiver's first read marks it read; reading it again
/// changes nothing.
#[tracing::instrument(skip(db, reader), fields(reader = %reader.id))]
pub async fn read_message(
    db: &DatabaseConnection,
    reader: &user::Model,
    message_id: Uuid,
) -> Result<MessageView, AppError> {
    let mut found = Message::find_by_id(message_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("message not found".to_string()))?;

    if reader.id != found.sender_id && reader.id != found.receiver_id {
        return Err(AppError::Forbidden(
            "only the sender or receiver can read this message".to_string(),
        ));
    }

    if reader.id == found.receiver_id && !found.is_read {
        let marked = Message::update_many()
            .col_expr(message::Column::IsRead, Expr::value(true))
            .filter(message::Column::Id.eq(found.id))
            .filter(message::Column::IsRead.eq(false))
            .exec(db)
            .await?;
        if marked.rows_affected > 0 {
            tracing::debug!("Message marked as read");
        }
        found.is_read = true;
    }

    let mut views = with_names(db, vec![found]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::InternalError("message vanished while reading".to_string()))
}

async fn with_names(
    db: &DatabaseConnection,
    messages: Vec<message::Model>,
) -> Result<Vec<MessageView>, AppError> {
    let mut ids: Vec<Uuid> = messages
        .iter()
        .flat_map(|m| [m.sender_id, m.receiver_id])
        .collect();
    ids.sort();
    ids.dedup();

    let names: HashMap<Uuid, String> = User::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.user_name))
        .collect();

    Ok(messages
        .into_iter()
        .map(|message| MessageView {
            sender_name: names.get(&message.sender_id).cloned().unwrap_or_default(),
            receiver_name: names.get(&message.receiver_id).cloned().unwrap_or_default(),
            message,
        })
        .collect())
}
