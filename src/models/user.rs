//! User, verification and session models.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Whether a user signed up to mentor or to be mentored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    #[serde(alias = "MENTOR")]
    Mentor,
    #[serde(alias = "MENTEE")]
    Mentee,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Mentor => "mentor",
            RoleType::Mentee => "mentee",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mentor" => Some(RoleType::Mentor),
            "mentee" => Some(RoleType::Mentee),
            _ => None,
        }
    }
}

/// Platform-wide position of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "MODERATOR")]
    Moderator,
    #[default]
    #[serde(alias = "MEMBER")]
    Member,
}

impl PositionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Admin => "admin",
            PositionType::Moderator => "moderator",
            PositionType::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(PositionType::Admin),
            "moderator" => Some(PositionType::Moderator),
            "member" => Some(PositionType::Member),
            _ => None,
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub city: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    /// 'mentor' or 'mentee'
    pub role: String,
    /// 'admin', 'moderator' or 'member'
    pub position: String,
    pub mentor_status: bool,
    pub mentee_status: bool,
    pub job_title: Option<String>,
    pub years_of_experience: Option<i32>,
    pub industry: Option<String>,
    /// Comma-separated
    pub skills: Option<String>,
    /// Comma-separated
    pub interests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
}

impl User {
    pub fn role_enum(&self) -> Option<RoleType> {
        RoleType::from_str(&self.role)
    }

    pub fn position_enum(&self) -> PositionType {
        PositionType::from_str(&self.position).unwrap_or_default()
    }

    /// "First Last", skipping missing parts.
    pub fn full_name(&self) -> String {
        full_name(self.first_name.as_deref(), self.last_name.as_deref())
    }

    /// Whole years between the date of birth and `today`.
    pub fn calculate_age(&self, today: NaiveDate) -> i32 {
        age_on(self.date_of_birth, today)
    }
}

/// Whole years elapsed from `birth` to `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

pub(crate) fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    value.map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// One-time email verification token.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub expiry_date: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self) -> bool {
        self.expiry_date < Utc::now()
    }
}

/// Login session; only the hash of the bearer token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_prefix: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// Registration payload. Every field is optional at the wire level so that
/// missing values surface as validation messages instead of parse errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// ISO format "YYYY-MM-DD"
    pub date_of_birth: Option<NaiveDate>,
    pub role: Option<RoleType>,
    pub years_of_experience: Option<i32>,
    #[serde(default)]
    pub skills_or_interests: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
}

/// Partial profile update for the current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub profile_picture_url: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub years_of_experience: Option<i32>,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub city: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    pub role: Option<RoleType>,
    pub job_title: Option<String>,
    pub years_of_experience: Option<i32>,
    pub industry: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub position: PositionType,
    pub is_verified: bool,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        let role = user.role_enum();
        let position = user.position_enum();
        UserDto {
            skills: split_list(user.skills.as_deref()),
            interests: split_list(user.interests.as_deref()),
            user_id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            date_of_birth: user.date_of_birth,
            city: user.city,
            state: user.state,
            gender: user.gender,
            age: user.age,
            profile_picture_url: user.profile_picture_url,
            bio: user.bio,
            role,
            job_title: user.job_title,
            years_of_experience: user.years_of_experience,
            industry: user.industry,
            created_at: user.created_at,
            position,
            is_verified: user.is_verified,
        }
    }
}
