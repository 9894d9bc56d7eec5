//! Message and read-receipt queries.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

use crate::models::Message;
use crate::{Error, Result};

use super::DbPool;

/// Input for storing a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub media_urls: Vec<String>,
}

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.conversation_id, m.sender_id, m.content, m.media_urls,
           m.sent_at, m.edited_at, m.is_deleted, m.deleted_at,
           u.first_name AS sender_first_name, u.last_name AS sender_last_name
    FROM messages m
    LEFT JOIN users u ON u.id = m.sender_id
"#;

/// Store a message and return it with the sender's name.
pub async fn insert_message(pool: &DbPool, input: NewMessage) -> Result<Message> {
    let media_urls = serde_json::to_string(&input.media_urls)?;

    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, content, media_urls, sent_at, is_deleted)
        VALUES (?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&input.id)
    .bind(&input.conversation_id)
    .bind(&input.sender_id)
    .bind(&input.content)
    .bind(&media_urls)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_message(pool, &input.id).await
}

/// Get a message by ID.
pub async fn get_message(pool: &DbPool, id: &str) -> Result<Message> {
    let sql = format!("{} WHERE m.id = ?", MESSAGE_SELECT);
    sqlx::query_as::<_, Message>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Message not found: {}", id)))
}

/// Messages of a conversation, oldest first.
pub async fn list_conversation_messages(pool: &DbPool, conversation_id: &str) -> Result<Vec<Message>> {
    let sql = format!(
        "{} WHERE m.conversation_id = ? ORDER BY m.sent_at, m.rowid",
        MESSAGE_SELECT
    );
    sqlx::query_as::<_, Message>(&sql)
        .bind(conversation_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Replace a message's content and stamp `edited_at`.
pub async fn update_message_content(pool: &DbPool, id: &str, content: &str) -> Result<Message> {
    let result = sqlx::query("UPDATE messages SET content = ?, edited_at = ? WHERE id = ?")
        .bind(content)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Message not found: {}", id)));
    }

    get_message(pool, id).await
}

/// Soft delete a message.
pub async fn soft_delete_message(pool: &DbPool, id: &str) -> Result<Message> {
    let result = sqlx::query("UPDATE messages SET is_deleted = 1, deleted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Message not found: {}", id)));
    }

    get_message(pool, id).await
}

/// Record that a user read a message. Returns false if it was already read.
pub async fn mark_message_read(pool: &DbPool, message_id: &str, user_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO message_read_status (message_id, user_id, read_at) VALUES (?, ?, ?)",
    )
    .bind(message_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Which of `message_ids` the user has read, in one query.
pub async fn read_message_ids(
    pool: &DbPool,
    user_id: &str,
    message_ids: &[String],
) -> Result<HashSet<String>> {
    if message_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT message_id FROM message_read_status WHERE user_id = ");
    builder.push_bind(user_id);
    builder.push(" AND message_id IN (");
    let mut separated = builder.separated(", ");
    for id in message_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows: Vec<(String,)> = builder.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_direct_conversation, create_user, sample_user, test_pool};
    use crate::models::new_id;

    async fn setup() -> (DbPool, String, String, String) {
        let pool = test_pool().await;
        let a = create_user(&pool, sample_user("a@example.com")).await.unwrap();
        let b = create_user(&pool, sample_user("b@example.com")).await.unwrap();
        let conv = create_direct_conversation(&pool, &new_id(), &a.id, &b.id)
            .await
            .unwrap();
        (pool, a.id, b.id, conv.id)
    }

    fn new_message(conversation_id: &str, sender_id: &str, content: &str) -> NewMessage {
        NewMessage {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            media_urls: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_messages() {
        let (pool, a, b, conv) = setup().await;

        let first = insert_message(
            &pool,
            NewMessage {
                media_urls: vec!["https://cdn/x.png".into()],
                ..new_message(&conv, &a, "hi")
            },
        )
        .await
        .unwrap();
        assert_eq!(first.sender_first_name.as_deref(), Some("Master"));
        assert_eq!(first.media_urls_vec(), vec!["https://cdn/x.png".to_string()]);

        insert_message(&pool, new_message(&conv, &b, "hello")).await.unwrap();

        let messages = list_conversation_messages(&pool, &conv).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello"]);
    }

    #[tokio::test]
    async fn test_read_status_is_idempotent_and_batched() {
        let (pool, a, b, conv) = setup().await;
        let m1 = insert_message(&pool, new_message(&conv, &a, "one")).await.unwrap();
        let m2 = insert_message(&pool, new_message(&conv, &a, "two")).await.unwrap();

        assert!(mark_message_read(&pool, &m1.id, &b).await.unwrap());
        assert!(!mark_message_read(&pool, &m1.id, &b).await.unwrap());

        let read = read_message_ids(&pool, &b, &[m1.id.clone(), m2.id.clone()])
            .await
            .unwrap();
        assert!(read.contains(&m1.id));
        assert!(!read.contains(&m2.id));
        assert!(read_message_ids(&pool, &b, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_and_soft_delete() {
        let (pool, a, _, conv) = setup().await;
        let message = insert_message(&pool, new_message(&conv, &a, "draft")).await.unwrap();

        let edited = update_message_content(&pool, &message.id, "final").await.unwrap();
        assert_eq!(edited.content, "final");
        assert!(edited.edited_at.is_some());

        let deleted = soft_delete_message(&pool, &message.id).await.unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());

        assert!(matches!(
            soft_delete_message(&pool, "missing").await,
            Err(Error::NotFound(_))
        ));
    }
}
