use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::{ChatSummary, Message},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chats", get(list_chats).post(open_chat))
        .route("/chats/:id/messages", get(list_messages).post(send_message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatRequest {
    pub user2_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// A pair is stored smallest id first so it maps to exactly one chat.
fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

async fn ensure_participant(pool: &SqlitePool, chat_id: &str, user_id: &str) -> Result<()> {
    let chat = sqlx::query_as::<_, (String, String)>(
        "SELECT user1_id, user2_id FROM chats WHERE id = ?",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

    if chat.0 != user_id && chat.1 != user_id {
        return Err(AppError::Forbidden(
            "Not a participant in this chat".to_string(),
        ));
    }

    Ok(())
}

async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ChatSummary>>> {
    let chats = sqlx::query_as::<_, ChatSummary>(
        r#"
        SELECT c.id, c.user1_id, u1.username AS user1_username,
               c.user2_id, u2.username AS user2_username, c.created_at
        FROM chats c
        JOIN users u1 ON u1.id = c.user1_id
        JOIN users u2 ON u2.id = c.user2_id
        WHERE c.user1_id = ? OR c.user2_id = ?
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(&user.id)
    .bind(&user.id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(chats))
}

async fn open_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<OpenChatRequest>,
) -> Result<Json<OpenChatResponse>> {
    if body.user2_id == user.id {
        return Err(AppError::Validation(
            "Cannot start a chat with yourself".to_string(),
        ));
    }

    let (user1_id, user2_id) = canonical_pair(&user.id, &body.user2_id);

    let mut tx = state.db.pool.begin().await?;

    let other = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE id = ?")
        .bind(&body.user2_id)
        .fetch_optional(&mut *tx)
        .await?;
    if other.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let inserted = sqlx::query(
        "INSERT INTO chats (id, user1_id, user2_id, created_at) VALUES (?, ?, ?, ?)
         ON CONFLICT (user1_id, user2_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user1_id)
    .bind(user2_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let (chat_id,) = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM chats WHERE user1_id = ? AND user2_id = ?",
    )
    .bind(user1_id)
    .bind(user2_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if inserted > 0 {
        tracing::info!(chat_id = %chat_id, "Chat opened");
    }

    Ok(Json(OpenChatResponse { chat_id }))
}

async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    ensure_participant(&state.db.pool, &chat_id, &user.id).await?;

    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, chat_id, sender_id, content, created_at FROM messages
         WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(&chat_id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    if body.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Message content is required".to_string(),
        ));
    }

    ensure_participant(&state.db.pool, &chat_id, &user.id).await?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id,
        sender_id: user.id,
        content: body.content,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO messages (id, chat_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.chat_id)
    .bind(&message.sender_id)
    .bind(&message.content)
    .bind(&message.created_at)
    .execute(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
