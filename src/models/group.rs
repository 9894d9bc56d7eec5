//! Group and group membership models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::full_name;

/// Role of a user inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupMemberType {
    #[serde(alias = "ADMIN")]
    Admin,
    #[default]
    #[serde(alias = "MEMBER")]
    Member,
}

impl GroupMemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupMemberType::Admin => "admin",
            GroupMemberType::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(GroupMemberType::Admin),
            "member" => Some(GroupMemberType::Member),
            _ => None,
        }
    }
}

/// Group record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub id: String,
    pub group_name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Group membership joined with the member's name.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberDetail {
    pub group_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl GroupMemberDetail {
    pub fn role_enum(&self) -> GroupMemberType {
        GroupMemberType::from_str(&self.role).unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == GroupMemberType::Admin
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub group_name: String,
    pub description: Option<String>,
    /// User ids added as plain members on creation.
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddGroupMemberRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: GroupMemberType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberDto {
    pub user_id: String,
    pub name: String,
    pub role: GroupMemberType,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupMemberDetail> for GroupMemberDto {
    fn from(member: GroupMemberDetail) -> Self {
        GroupMemberDto {
            name: full_name(member.first_name.as_deref(), member.last_name.as_deref()),
            role: member.role_enum(),
            user_id: member.user_id,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDto {
    pub group_id: String,
    pub group_name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub members: Vec<GroupMemberDto>,
}

impl GroupDto {
    pub fn new(
        group: Group,
        conversation_id: Option<String>,
        members: Vec<GroupMemberDetail>,
    ) -> Self {
        GroupDto {
            group_id: group.id,
            group_name: group.group_name,
            description: group.description,
            created_by: group.created_by,
            created_at: group.created_at,
            conversation_id,
            members: members.into_iter().map(GroupMemberDto::from).collect(),
        }
    }
}
