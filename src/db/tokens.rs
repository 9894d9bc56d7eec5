//! Email verification token and login session queries.

use chrono::{DateTime, Utc};

use crate::models::{Session, VerificationToken};
use crate::{Error, Result};

use super::DbPool;

// ============================================================================
// Verification Tokens
// ============================================================================

/// Store a verification token, replacing any earlier token for the user.
pub async fn replace_verification_token(
    pool: &DbPool,
    id: &str,
    token: &str,
    user_id: &str,
    expiry_date: DateTime<Utc>,
) -> Result<VerificationToken> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM verification_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let record = sqlx::query_as::<_, VerificationToken>(
        r#"
        INSERT INTO verification_tokens (id, token, user_id, expiry_date)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(token)
    .bind(user_id)
    .bind(expiry_date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record)
}

/// Find a verification token by its value.
pub async fn get_verification_token(pool: &DbPool, token: &str) -> Result<Option<VerificationToken>> {
    sqlx::query_as::<_, VerificationToken>("SELECT * FROM verification_tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Delete a verification token once it has been used.
pub async fn delete_verification_token(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM verification_tokens WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ============================================================================
// Sessions
// ============================================================================

/// Input for creating a login session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub token_prefix: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Create a session.
pub async fn create_session(pool: &DbPool, input: NewSession) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_id, token_prefix, token_hash, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.user_id)
    .bind(&input.token_prefix)
    .bind(&input.token_hash)
    .bind(Utc::now())
    .bind(input.expires_at)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Look up a session by token prefix.
pub async fn get_session_by_prefix(pool: &DbPool, prefix: &str) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_prefix = ?")
        .bind(prefix)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Delete a session.
pub async fn delete_session(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete expired sessions, returning how many were removed.
pub async fn delete_expired_sessions(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
