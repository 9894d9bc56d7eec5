//! Database layer for Stack Mentor.
//!
//! Provides SQLite connection pooling, versioned migrations and query
//! modules for all domain entities.

mod conversations;
mod groups;
mod messages;
mod tokens;
mod user_search;
mod users;

pub use conversations::*;
pub use groups::*;
pub use messages::*;
pub use tokens::*;
pub use user_search::*;
pub use users::*;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

const IN_MEMORY: &str = ":memory:";

/// Initialize the database connection pool.
///
/// Creates parent directories if needed and configures SQLite for
/// concurrent access. An in-memory database is pinned to one connection
/// that is never recycled, otherwise every connection would see its own
/// empty database.
pub async fn init_pool(path: &str, max_connections: u32) -> Result<DbPool> {
    let in_memory = path == IN_MEMORY;

    if !in_memory {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30))
        .foreign_keys(true)
        // Negative = KB
        .pragma("cache_size", "-64000")
        .pragma("temp_store", "memory");

    let mut pool_options = SqlitePoolOptions::new()
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30));

    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Apply pending migrations from `migrations/`.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Health check for the database connection.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Fresh migrated in-memory database.
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let pool = init_pool(IN_MEMORY, 1).await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}

/// A registrable mentor with the given email.
#[cfg(test)]
pub(crate) fn sample_user(email: &str) -> NewUser {
    use crate::models::{new_id, now, PositionType, RoleType};

    NewUser {
        id: new_id(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
        first_name: "Master".to_string(),
        last_name: "Admin".to_string(),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1999, 11, 27).unwrap(),
        city: Some("Columbus".to_string()),
        state: Some("OH".to_string()),
        gender: None,
        age: 24,
        role: RoleType::Mentor,
        position: PositionType::Member,
        years_of_experience: Some(12),
        skills: Some("Java,Spring Boot".to_string()),
        interests: None,
        created_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_in_memory() {
        let pool = init_pool(IN_MEMORY, 10).await.unwrap();
        assert_eq!(pool.options().get_max_connections(), 1);
        health_check(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = test_pool().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        for expected in [
            "conversations",
            "direct_conversation_participants",
            "group_members",
            "groups",
            "message_read_status",
            "messages",
            "sessions",
            "users",
            "verification_tokens",
        ] {
            assert!(names.contains(&expected), "{expected} table missing");
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = test_pool().await;
        migrate(&pool).await.unwrap();
    }
}
