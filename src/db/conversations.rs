//! Conversation queries.
//!
//! A private conversation lists its two users in
//! `direct_conversation_participants`; a group conversation takes its
//! participants from `group_members`.

use chrono::Utc;

use crate::models::{Conversation, ConversationType};
use crate::{Error, Result};

use super::DbPool;

/// Canonical key of the private conversation between two users.
pub fn direct_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{}:{}", user_a, user_b)
    } else {
        format!("{}:{}", user_b, user_a)
    }
}

/// Create the private conversation between two users, or return the one
/// they already share. The unique `direct_key` settles concurrent callers.
pub async fn create_direct_conversation(
    pool: &DbPool,
    id: &str,
    user_a: &str,
    user_b: &str,
) -> Result<Conversation> {
    let key = direct_key(user_a, user_b);
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO conversations (id, type, group_id, direct_key, created_at)
        VALUES (?, ?, NULL, ?, ?)
        "#,
    )
    .bind(id)
    .bind(ConversationType::Private.as_str())
    .bind(&key)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if inserted {
        for user_id in [user_a, user_b] {
            sqlx::query(
                "INSERT INTO direct_conversation_participants (conversation_id, user_id) VALUES (?, ?)",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let conversation =
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE direct_key = ?")
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok(conversation)
}

/// Find the private conversation between two users, if one exists.
pub async fn find_direct_conversation(
    pool: &DbPool,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Conversation>> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE direct_key = ?")
        .bind(direct_key(user_a, user_b))
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &DbPool, id: &str) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Conversation not found: {}", id)))
}

/// Get the conversation bound to a group.
pub async fn get_group_conversation(pool: &DbPool, group_id: &str) -> Result<Option<Conversation>> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE group_id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// User ids taking part in a conversation.
pub async fn list_conversation_participants(
    pool: &DbPool,
    conversation: &Conversation,
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = match (conversation.type_enum(), conversation.group_id.as_deref()) {
        (ConversationType::Group, Some(group_id)) => {
            sqlx::query_as(
                "SELECT user_id FROM group_members WHERE group_id = ? ORDER BY joined_at, rowid",
            )
            .bind(group_id)
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query_as(
                "SELECT user_id FROM direct_conversation_participants WHERE conversation_id = ? ORDER BY rowid",
            )
            .bind(&conversation.id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Whether a user takes part in a conversation.
pub async fn is_conversation_participant(
    pool: &DbPool,
    conversation: &Conversation,
    user_id: &str,
) -> Result<bool> {
    let row = match (conversation.type_enum(), conversation.group_id.as_deref()) {
        (ConversationType::Group, Some(group_id)) => {
            sqlx::query("SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await?
        }
        _ => {
            sqlx::query(
                "SELECT 1 FROM direct_conversation_participants WHERE conversation_id = ? AND user_id = ?",
            )
            .bind(&conversation.id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row.is_some())
}

/// Private and group conversations of a user, newest first.
pub async fn list_user_conversations(pool: &DbPool, user_id: &str) -> Result<Vec<Conversation>> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT c.* FROM conversations c
        WHERE c.id IN (
            SELECT conversation_id FROM direct_conversation_participants WHERE user_id = ?
        )
        OR c.group_id IN (
            SELECT group_id FROM group_members WHERE user_id = ?
        )
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}
