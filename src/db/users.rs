//! User database queries.
//!
//! Handles user creation, lookup, verification state and profile updates.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::{PositionType, RoleType, UpdateProfileRequest, User};
use crate::{Error, Result};

use super::user_search::UserSearch;
use super::DbPool;

/// Input for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub city: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
    pub age: i32,
    pub role: RoleType,
    pub position: PositionType,
    pub years_of_experience: Option<i32>,
    pub skills: Option<String>,
    pub interests: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Map unique-constraint failures to `AlreadyExists`.
fn map_unique(e: sqlx::Error, what: &str) -> Error {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists(what.to_string())
        }
        _ => Error::Database(e),
    }
}

/// Create a new user.
pub async fn create_user(pool: &DbPool, input: NewUser) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            id, email, password_hash, first_name, last_name, date_of_birth,
            city, state, gender, age, role, position, mentor_status, mentee_status,
            years_of_experience, skills, interests, created_at, is_verified
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.email)
    .bind(&input.password_hash)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.date_of_birth)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.gender)
    .bind(input.age)
    .bind(input.role.as_str())
    .bind(input.position.as_str())
    .bind(input.role == RoleType::Mentor)
    .bind(input.role == RoleType::Mentee)
    .bind(input.years_of_experience)
    .bind(&input.skills)
    .bind(&input.interests)
    .bind(input.created_at)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, &format!("User with email {}", input.email)))
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Check whether an email address is already registered.
pub async fn email_exists(pool: &DbPool, email: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM users WHERE email = ? LIMIT 1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Check whether a user exists.
pub async fn user_exists(pool: &DbPool, id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM users WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Mark a user's email as verified.
pub async fn mark_verified(pool: &DbPool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("UPDATE users SET is_verified = 1 WHERE id = ? RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// Apply a partial profile update.
pub async fn update_profile(pool: &DbPool, id: &str, input: UpdateProfileRequest) -> Result<User> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    let mut has_updates = false;

    macro_rules! set_text {
        ($column:literal, $value:expr) => {
            if let Some(value) = $value {
                separated.push(concat!($column, " = "));
                separated.push_bind_unseparated(value);
                has_updates = true;
            }
        };
    }

    set_text!("username", input.username);
    set_text!("phone_number", input.phone_number);
    set_text!("bio", input.bio);
    set_text!("job_title", input.job_title);
    set_text!("industry", input.industry);
    set_text!("profile_picture_url", input.profile_picture_url);
    set_text!("city", input.city);
    set_text!("state", input.state);

    if let Some(years) = input.years_of_experience {
        separated.push("years_of_experience = ");
        separated.push_bind_unseparated(years);
        has_updates = true;
    }

    if !has_updates {
        return get_user(pool, id).await;
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    builder
        .build_query_as::<User>()
        .fetch_optional(pool)
        .await
        .map_err(|e| map_unique(e, "Username or phone number is already taken"))?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// Search users with the given filters.
pub async fn search_users(pool: &DbPool, search: &UserSearch) -> Result<Vec<User>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM users");
    search.push_where(&mut builder);
    builder.push(" ORDER BY last_name, first_name");

    builder
        .build_query_as::<User>()
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{sample_user as new_user, test_pool};

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let pool = test_pool().await;
        let user = create_user(&pool, new_user("a@example.com")).await.unwrap();

        assert_eq!(user.role, "mentor");
        assert!(user.mentor_status);
        assert!(!user.mentee_status);
        assert!(!user.is_verified);

        let fetched = get_user(&pool, &user.id).await.unwrap();
        assert_eq!(fetched.email, "a@example.com");
        assert!(email_exists(&pool, "a@example.com").await.unwrap());
        assert!(!email_exists(&pool, "b@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let pool = test_pool().await;
        create_user(&pool, new_user("dup@example.com")).await.unwrap();
        let err = create_user(&pool, new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_profile_sets_only_given_fields() {
        let pool = test_pool().await;
        let user = create_user(&pool, new_user("p@example.com")).await.unwrap();

        let updated = update_profile(
            &pool,
            &user.id,
            UpdateProfileRequest {
                bio: Some("Rustacean".into()),
                years_of_experience: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("Rustacean"));
        assert_eq!(updated.years_of_experience, Some(3));
        assert_eq!(updated.city.as_deref(), Some("Columbus"));
    }

    #[tokio::test]
    async fn test_mark_verified() {
        let pool = test_pool().await;
        let user = create_user(&pool, new_user("v@example.com")).await.unwrap();
        let user = mark_verified(&pool, &user.id).await.unwrap();
        assert!(user.is_verified);
    }

    #[tokio::test]
    async fn test_name_search_treats_wildcards_literally() {
        let pool = test_pool().await;
        let people = [
            ("am@example.com", "Ann_Marie"),
            ("ab@example.com", "Annbmarie"),
            ("an@example.com", "Anna"),
        ];
        for (email, first) in people {
            let user = create_user(
                &pool,
                NewUser {
                    first_name: first.to_string(),
                    ..new_user(email)
                },
            )
            .await
            .unwrap();
            mark_verified(&pool, &user.id).await.unwrap();
        }

        let underscore = UserSearch::verified().name_contains(Some("Ann_Marie"));
        let found = search_users(&pool, &underscore).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name.as_deref(), Some("Ann_Marie"));

        let percent = UserSearch::verified().name_contains(Some("Ann%"));
        assert!(search_users(&pool, &percent).await.unwrap().is_empty());

        let plain = UserSearch::verified().name_contains(Some("ann"));
        assert_eq!(search_users(&pool, &plain).await.unwrap().len(), 3);
    }
}
