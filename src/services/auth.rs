//! Password hashing and login sessions.
//!
//! Session token format: `sm_{prefix}_{secret}` where:
//! - `{prefix}` is 8 chars used for database lookup (stored as `token_prefix`)
//! - the full token is SHA-256 hashed and stored as `token_hash`
//!
//! The raw token is only ever returned to the client at login.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::db::{self, DbPool, NewSession};
use crate::error::{Error, Result};
use crate::models::{new_id, UserDto};

pub const TOKEN_PREFIX: &str = "sm_";
const LOOKUP_LEN: usize = 8;
const SECRET_LEN: usize = 32;

const TOKEN_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// Authenticated caller, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub session_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserDto,
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hash a session token using SHA-256.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Generate a new token, returning `(token, lookup_prefix)`.
fn generate_token() -> (String, String) {
    let prefix = nanoid::nanoid!(LOOKUP_LEN, &TOKEN_ALPHABET);
    let secret = nanoid::nanoid!(SECRET_LEN, &TOKEN_ALPHABET);
    (format!("{}{}_{}", TOKEN_PREFIX, prefix, secret), prefix)
}

/// Lookup prefix of a well-formed token.
fn token_lookup_prefix(token: &str) -> Option<&str> {
    let body = token.strip_prefix(TOKEN_PREFIX)?;
    let (prefix, secret) = body.split_once('_')?;
    (prefix.len() == LOOKUP_LEN && !secret.is_empty()).then_some(prefix)
}

#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: DbPool, config: AuthConfig) -> Self {
        Self { db, config }
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::seconds(self.config.session_max_age_seconds)
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let user = db::get_user_by_email(&self.db, email.trim())
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(Error::InvalidCredentials);
        }

        if self.config.require_verified_login && !user.is_verified {
            return Err(Error::EmailNotVerified);
        }

        let (token, prefix) = generate_token();
        let expires_at = Utc::now() + self.session_max_age();

        db::create_session(
            &self.db,
            NewSession {
                id: new_id(),
                user_id: user.id.clone(),
                token_prefix: prefix,
                token_hash: hash_token(&token),
                expires_at,
            },
        )
        .await?;

        info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            token,
            expires_at,
            user: user.into(),
        })
    }

    /// Close the session a token belongs to. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let Some(prefix) = token_lookup_prefix(token) else {
            return Ok(());
        };

        if let Some(session) = db::get_session_by_prefix(&self.db, prefix).await? {
            if constant_time_eq(&hash_token(token), &session.token_hash) {
                db::delete_session(&self.db, &session.id).await?;
                info!(user_id = %session.user_id, "User logged out");
            }
        }
        Ok(())
    }

    /// Resolve a token to the user it authenticates.
    pub async fn validate_session(&self, token: &str) -> Result<AuthUser> {
        let prefix = token_lookup_prefix(token).ok_or(Error::InvalidToken)?;

        let session = db::get_session_by_prefix(&self.db, prefix)
            .await?
            .ok_or(Error::InvalidToken)?;

        if !constant_time_eq(&hash_token(token), &session.token_hash) {
            return Err(Error::InvalidToken);
        }

        if session.is_expired() {
            db::delete_session(&self.db, &session.id).await?;
            return Err(Error::TokenExpired);
        }

        let user = db::get_user(&self.db, &session.user_id)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::InvalidToken,
                other => other,
            })?;

        Ok(AuthUser {
            name: user.full_name(),
            user_id: user.id,
            session_id: session.id,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, mark_verified, sample_user, test_pool, NewUser};

    async fn setup(config: AuthConfig, verified: bool) -> (AuthService, NewUser) {
        let pool = test_pool().await;
        let mut user = sample_user("login@example.com");
        user.password_hash = hash_password("MasterAdmin").unwrap();
        let created = create_user(&pool, user.clone()).await.unwrap();
        if verified {
            mark_verified(&pool, &created.id).await.unwrap();
        }
        (AuthService::new(pool, config), user)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_generated_token_shape() {
        let (token, prefix) = generate_token();
        assert!(token.starts_with("sm_"));
        assert_eq!(token.len(), 3 + LOOKUP_LEN + 1 + SECRET_LEN);
        assert_eq!(token_lookup_prefix(&token), Some(prefix.as_str()));
        assert_eq!(token_lookup_prefix("xx_abcdefgh_x"), None);
        assert_eq!(token_lookup_prefix("sm_short_x"), None);
    }

    #[tokio::test]
    async fn test_login_and_validate() {
        let (service, user) = setup(AuthConfig::default(), true).await;

        let login = service.login(&user.email, "MasterAdmin").await.unwrap();
        assert_eq!(login.user.email, user.email);

        let auth = service.validate_session(&login.token).await.unwrap();
        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.name, "Master Admin");

        service.logout(&login.token).await.unwrap();
        assert!(matches!(
            service.validate_session(&login.token).await,
            Err(Error::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let (service, user) = setup(AuthConfig::default(), true).await;
        assert!(matches!(
            service.login(&user.email, "wrong-password").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody@example.com", "MasterAdmin").await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_unverified_login() {
        let (service, user) = setup(AuthConfig::default(), false).await;
        assert!(matches!(
            service.login(&user.email, "MasterAdmin").await,
            Err(Error::EmailNotVerified)
        ));

        let relaxed = AuthConfig {
            require_verified_login: false,
            ..Default::default()
        };
        let (service, user) = setup(relaxed, false).await;
        assert!(service.login(&user.email, "MasterAdmin").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let expired = AuthConfig {
            session_max_age_seconds: -60,
            ..Default::default()
        };
        let (service, user) = setup(expired, true).await;
        let login = service.login(&user.email, "MasterAdmin").await.unwrap();

        assert!(matches!(
            service.validate_session(&login.token).await,
            Err(Error::TokenExpired)
        ));
        assert!(matches!(
            service.validate_session(&login.token).await,
            Err(Error::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_tampered_secret_is_rejected() {
        let (service, user) = setup(AuthConfig::default(), true).await;
        let login = service.login(&user.email, "MasterAdmin").await.unwrap();
        let (head, last) = login.token.split_at(login.token.len() - 1);
        let tampered = format!("{}{}", head, if last == "x" { "y" } else { "x" });
        assert!(matches!(
            service.validate_session(&tampered).await,
            Err(Error::InvalidToken)
        ));
    }
}
