//! Conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::full_name;

/// Kind of conversation: one-to-one or bound to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    #[serde(alias = "PRIVATE")]
    Private,
    #[serde(alias = "GROUP")]
    Group,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Private => "private",
            ConversationType::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "private" => Some(ConversationType::Private),
            "group" => Some(ConversationType::Group),
            _ => None,
        }
    }
}

/// Conversation record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct Conversation {
    pub id: String,
    #[sqlx(rename = "type")]
    pub conversation_type: String,
    /// Set only for group conversations.
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn type_enum(&self) -> ConversationType {
        ConversationType::from_str(&self.conversation_type).unwrap_or(ConversationType::Private)
    }
}

/// Message record joined with the sender's name.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    /// JSON array of URLs
    pub media_urls: String,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
}

impl Message {
    pub fn media_urls_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.media_urls).unwrap_or_default()
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDirectConversationRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub conversation_id: String,
    pub conversation_type: ConversationType,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub participant_ids: Vec<String>,
}

impl ConversationDto {
    pub fn new(conversation: Conversation, participant_ids: Vec<String>) -> Self {
        ConversationDto {
            conversation_type: conversation.type_enum(),
            conversation_id: conversation.id,
            group_id: conversation.group_id,
            created_at: conversation.created_at,
            participant_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    /// Media URLs joined with ", "
    pub media_url: String,
    pub media_urls: Vec<String>,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

impl MessageDto {
    /// Deleted messages keep their metadata but drop content and media.
    pub fn from_message(message: Message, is_read: bool) -> Self {
        let media_urls = if message.is_deleted {
            Vec::new()
        } else {
            message.media_urls_vec()
        };
        let content = if message.is_deleted {
            String::new()
        } else {
            message.content
        };

        MessageDto {
            sender_name: full_name(
                message.sender_first_name.as_deref(),
                message.sender_last_name.as_deref(),
            ),
            media_url: media_urls.join(", "),
            media_urls,
            content,
            message_id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sent_at: message.sent_at,
            edited_at: message.edited_at,
            is_deleted: message.is_deleted,
            deleted_at: message.deleted_at,
            is_read,
        }
    }
}
