//! User service: registration, email verification, profiles and search.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::{self, DbPool, NewUser, UserSearch};
use crate::error::{Error, Result};
use crate::models::{
    age_on, new_id, now, PositionType, RegisterUserRequest, RoleType, UpdateProfileRequest,
    UserDto,
};
use crate::validation::Validate;

use super::auth::hash_password;
use super::email::EmailService;

/// Search parameters as received from the client.
#[derive(Debug, Clone, Default)]
pub struct UserSearchParams {
    pub search_text: Option<String>,
    pub role: Option<String>,
    pub experience_range: Option<String>,
    pub industries: Vec<String>,
}

/// Parse an experience range: `"N+"` is a lower bound, `"a-b"` is inclusive.
/// Any other non-empty shape sets no bound.
pub fn parse_experience_range(range: Option<&str>) -> Result<(Option<i32>, Option<i32>)> {
    let Some(range) = range.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok((None, None));
    };

    let invalid = || Error::InvalidInput(format!("Invalid experience range format: {}", range));

    if let Some(min) = range.strip_suffix('+') {
        let min = min.trim().parse::<i32>().map_err(|_| invalid())?;
        return Ok((Some(min), None));
    }

    if range.contains('-') {
        // Only the first two parts count: "1-2-3" is 1 to 2.
        let mut parts = range.split('-');
        let min = parts.next().unwrap_or_default();
        let max = parts.next().unwrap_or_default();
        let min = min.trim().parse::<i32>().map_err(|_| invalid())?;
        let max = max.trim().parse::<i32>().map_err(|_| invalid())?;
        return Ok((Some(min), Some(max)));
    }

    Ok((None, None))
}

/// Split a full name into exactly first and last name. The two must be
/// separated by a space; tabs and newlines alone do not count.
fn split_full_name(name: &str) -> Result<(String, String)> {
    let trimmed = name.trim();
    if !trimmed.contains(' ') {
        return Err(Error::InvalidInput(
            "Only include your first and last name, separated by a space".to_string(),
        ));
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() > 2 {
        return Err(Error::InvalidInput(
            "Full name must not include middle names".to_string(),
        ));
    }

    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[derive(Clone)]
pub struct UserService {
    db: DbPool,
    email: EmailService,
    config: AuthConfig,
}

impl UserService {
    pub fn new(db: DbPool, email: EmailService, config: AuthConfig) -> Self {
        Self { db, email, config }
    }

    /// Register a new user and send the verification email.
    pub async fn register_user(&self, request: RegisterUserRequest) -> Result<UserDto> {
        request.validate()?;

        // Validation guarantees these are present.
        let email = request.email.clone().unwrap_or_default();
        let name = request.name.clone().unwrap_or_default();
        let password = request.password.clone().unwrap_or_default();
        let role = request
            .role
            .ok_or_else(|| Error::InvalidInput("Role is required".to_string()))?;
        let date_of_birth = request
            .date_of_birth
            .ok_or_else(|| Error::InvalidInput("Date of birth is required".to_string()))?;

        if db::email_exists(&self.db, &email).await? {
            return Err(Error::Conflict("Email already in use".to_string()));
        }

        let (first_name, last_name) = split_full_name(&name)?;
        let password_hash = hash_password(&password)?;

        let joined = request.skills_or_interests.join(",");
        let (skills, interests) = match role {
            RoleType::Mentor => (Some(joined), None),
            RoleType::Mentee => (None, Some(joined)),
        };

        let user = db::create_user(
            &self.db,
            NewUser {
                id: new_id(),
                email: email.clone(),
                password_hash,
                first_name,
                last_name,
                date_of_birth,
                city: request.city,
                state: request.state,
                gender: request.gender,
                age: age_on(date_of_birth, Utc::now().date_naive()),
                role,
                position: PositionType::Member,
                years_of_experience: request.years_of_experience,
                skills,
                interests,
                created_at: now(),
            },
        )
        .await
        .map_err(|e| match e {
            Error::AlreadyExists(_) => Error::Conflict("Email already in use".to_string()),
            other => other,
        })?;

        let token = self.issue_verification_token(&user.id).await?;
        self.email.dispatch_verification_email(&user.email, &token);

        info!(user_id = %user.id, role = role.as_str(), "Registered user");

        Ok(user.into())
    }

    async fn issue_verification_token(&self, user_id: &str) -> Result<String> {
        let token = new_id();
        let expiry = Utc::now() + Duration::hours(self.config.verification_token_ttl_hours);
        db::replace_verification_token(&self.db, &new_id(), &token, user_id, expiry).await?;
        Ok(token)
    }

    /// Consume a verification token and mark its user verified.
    pub async fn verify_email(&self, token: &str) -> Result<UserDto> {
        let record = db::get_verification_token(&self.db, token)
            .await?
            .ok_or(Error::InvalidToken)?;

        if record.is_expired() {
            db::delete_verification_token(&self.db, &record.id).await?;
            warn!(user_id = %record.user_id, "Verification token expired");
            return Err(Error::TokenExpired);
        }

        let user = db::mark_verified(&self.db, &record.user_id).await?;
        db::delete_verification_token(&self.db, &record.id).await?;

        info!(user_id = %user.id, "Email verified");

        Ok(user.into())
    }

    /// Issue a fresh verification token for an unverified account.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let user = db::get_user_by_email(&self.db, email.trim())
            .await?
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", email.trim())))?;

        if user.is_verified {
            return Err(Error::Conflict("Email is already verified".to_string()));
        }

        let token = self.issue_verification_token(&user.id).await?;
        self.email.dispatch_verification_email(&user.email, &token);

        info!(user_id = %user.id, "Resent verification email");
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<UserDto> {
        db::get_user(&self.db, id).await.map(UserDto::from)
    }

    pub async fn update_profile(&self, id: &str, request: UpdateProfileRequest) -> Result<UserDto> {
        request.validate()?;
        let user = db::update_profile(&self.db, id, request).await?;
        info!(user_id = %user.id, "Updated profile");
        Ok(user.into())
    }

    /// Search verified users, ordered by last then first name.
    pub async fn search_users(&self, params: UserSearchParams) -> Result<Vec<UserDto>> {
        let (min_years, max_years) = parse_experience_range(params.experience_range.as_deref())?;

        let search = UserSearch::verified()
            .name_contains(params.search_text.as_deref())
            .has_role(params.role.as_deref())
            .experience_in_range(min_years, max_years)
            .industry_in(&params.industries);

        let users = db::search_users(&self.db, &search).await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }
}
