//! Conversations and messages.
//!
//! Every state change is published on the [`ChatHub`] to the users it
//! concerns so connected clients see it without polling.

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{self, DbPool, NewMessage};
use crate::error::{Error, Result};
use crate::models::{new_id, Conversation, ConversationDto, Message, MessageDto};

use super::chat_hub::{ChatHub, ReadReceipt, ServerEvent};

#[derive(Clone)]
pub struct MessageService {
    db: DbPool,
    hub: ChatHub,
}

impl MessageService {
    pub fn new(db: DbPool, hub: ChatHub) -> Self {
        Self { db, hub }
    }

    /// Load a conversation the user takes part in.
    async fn participant_conversation(&self, conversation_id: &str, user_id: &str) -> Result<Conversation> {
        let conversation = db::get_conversation(&self.db, conversation_id).await?;
        if !db::is_conversation_participant(&self.db, &conversation, user_id).await? {
            return Err(Error::Forbidden);
        }
        Ok(conversation)
    }

    /// Load a message and its conversation, checking the user takes part.
    async fn participant_message(&self, message_id: &str, user_id: &str) -> Result<(Message, Conversation)> {
        let message = db::get_message(&self.db, message_id).await?;
        let conversation = self
            .participant_conversation(&message.conversation_id, user_id)
            .await?;
        Ok((message, conversation))
    }

    async fn publish_to_participants(&self, conversation: &Conversation, event: ServerEvent) -> Result<()> {
        let recipients = db::list_conversation_participants(&self.db, conversation).await?;
        self.hub.publish(recipients, event);
        Ok(())
    }

    /// Open (or reuse) the private conversation between two users.
    pub async fn start_direct_conversation(&self, user_id: &str, other_id: &str) -> Result<ConversationDto> {
        if user_id == other_id {
            return Err(Error::InvalidInput(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }
        if !db::user_exists(&self.db, other_id).await? {
            return Err(Error::NotFound(format!("User not found: {}", other_id)));
        }

        let conversation = match db::find_direct_conversation(&self.db, user_id, other_id).await? {
            Some(existing) => existing,
            // A concurrent caller may win the insert; then its conversation comes back.
            None => {
                let conversation =
                    db::create_direct_conversation(&self.db, &new_id(), user_id, other_id).await?;
                info!(conversation_id = %conversation.id, "Opened direct conversation");
                conversation
            }
        };

        let participants = db::list_conversation_participants(&self.db, &conversation).await?;
        Ok(ConversationDto::new(conversation, participants))
    }

    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationDto>> {
        let conversations = db::list_user_conversations(&self.db, user_id).await?;
        let mut dtos = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let participants = db::list_conversation_participants(&self.db, &conversation).await?;
            dtos.push(ConversationDto::new(conversation, participants));
        }
        Ok(dtos)
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        media_urls: Vec<String>,
    ) -> Result<MessageDto> {
        let conversation = self.participant_conversation(conversation_id, sender_id).await?;

        let media_urls: Vec<String> = media_urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if content.trim().is_empty() && media_urls.is_empty() {
            return Err(Error::InvalidInput("Message content is required".to_string()));
        }

        let message = db::insert_message(
            &self.db,
            NewMessage {
                id: new_id(),
                conversation_id: conversation.id.clone(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                media_urls,
            },
        )
        .await?;

        debug!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            sender_id = %sender_id,
            "Message sent"
        );

        let dto = MessageDto::from_message(message, true);
        self.publish_to_participants(&conversation, ServerEvent::MessageCreated(dto.clone()))
            .await?;
        Ok(dto)
    }

    /// Messages of a conversation, oldest first, with the viewer's read state.
    pub async fn list_messages(&self, conversation_id: &str, user_id: &str) -> Result<Vec<MessageDto>> {
        self.participant_conversation(conversation_id, user_id).await?;

        let messages = db::list_conversation_messages(&self.db, conversation_id).await?;
        let others: Vec<String> = messages
            .iter()
            .filter(|m| m.sender_id != user_id)
            .map(|m| m.id.clone())
            .collect();
        let read = db::read_message_ids(&self.db, user_id, &others).await?;

        Ok(messages
            .into_iter()
            .map(|m| {
                let is_read = m.sender_id == user_id || read.contains(&m.id);
                MessageDto::from_message(m, is_read)
            })
            .collect())
    }

    /// Record a read receipt. Repeated calls are no-ops.
    pub async fn mark_read(&self, message_id: &str, user_id: &str) -> Result<()> {
        let (message, _) = self.participant_message(message_id, user_id).await?;

        if message.sender_id == user_id {
            return Ok(());
        }

        if db::mark_message_read(&self.db, message_id, user_id).await? {
            self.hub.publish(
                vec![message.sender_id.clone()],
                ServerEvent::MessageRead(ReadReceipt {
                    message_id: message.id,
                    conversation_id: message.conversation_id,
                    user_id: user_id.to_string(),
                    read_at: Utc::now(),
                }),
            );
        }
        Ok(())
    }

    pub async fn edit_message(&self, message_id: &str, user_id: &str, content: &str) -> Result<MessageDto> {
        let (message, conversation) = self.participant_message(message_id, user_id).await?;

        if message.sender_id != user_id {
            return Err(Error::Forbidden);
        }
        if message.is_deleted {
            return Err(Error::Conflict("Cannot edit a deleted message".to_string()));
        }
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("Message content is required".to_string()));
        }

        let updated = db::update_message_content(&self.db, message_id, content).await?;
        info!(message_id = %message_id, "Message edited");

        let dto = MessageDto::from_message(updated, true);
        self.publish_to_participants(&conversation, ServerEvent::MessageUpdated(dto.clone()))
            .await?;
        Ok(dto)
    }

    pub async fn delete_message(&self, message_id: &str, user_id: &str) -> Result<MessageDto> {
        let (message, conversation) = self.participant_message(message_id, user_id).await?;

        if message.sender_id != user_id {
            return Err(Error::Forbidden);
        }
        if message.is_deleted {
            return Ok(MessageDto::from_message(message, true));
        }

        let deleted = db::soft_delete_message(&self.db, message_id).await?;
        info!(message_id = %message_id, "Message deleted");

        let dto = MessageDto::from_message(deleted, true);
        self.publish_to_participants(&conversation, ServerEvent::MessageDeleted(dto.clone()))
            .await?;
        Ok(dto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, sample_user, test_pool};
    use crate::models::CreateGroupRequest;
    use crate::services::GroupService;

    struct Fixture {
        service: MessageService,
        groups: GroupService,
        hub: ChatHub,
        a: String,
        b: String,
        c: String,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let a = create_user(&pool, sample_user("a@example.com")).await.unwrap();
        let b = create_user(&pool, sample_user("b@example.com")).await.unwrap();
        let c = create_user(&pool, sample_user("c@example.com")).await.unwrap();
        let hub = ChatHub::new();
        Fixture {
            service: MessageService::new(pool.clone(), hub.clone()),
            groups: GroupService::new(pool),
            hub,
            a: a.id,
            b: b.id,
            c: c.id,
        }
    }

    #[tokio::test]
    async fn test_direct_conversation_is_reused() {
        let f = fixture().await;
        let first = f.service.start_direct_conversation(&f.a, &f.b).await.unwrap();
        let second = f.service.start_direct_conversation(&f.b, &f.a).await.unwrap();
        assert_eq!(first.conversation_id, second.conversation_id);
        assert_eq!(first.participant_ids.len(), 2);

        assert!(matches!(
            f.service.start_direct_conversation(&f.a, &f.a).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            f.service.start_direct_conversation(&f.a, "ghost").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_starts_share_one_conversation() {
        let f = fixture().await;
        let (left, right) = tokio::join!(
            f.service.start_direct_conversation(&f.a, &f.b),
            f.service.start_direct_conversation(&f.b, &f.a),
        );
        assert_eq!(left.unwrap().conversation_id, right.unwrap().conversation_id);
        assert_eq!(f.service.list_conversations(&f.a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_and_list_with_read_state() {
        let f = fixture().await;
        let conv = f.service.start_direct_conversation(&f.a, &f.b).await.unwrap();
        let id = conv.conversation_id.as_str();

        let mut rx = f.hub.subscribe();
        let sent = f
            .service
            .send_message(id, &f.a, "hello", vec![])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.is_for(&f.a) && event.is_for(&f.b) && !event.is_for(&f.c));
        assert_eq!(event.event.event_type(), "message.created");

        let for_b = f.service.list_messages(id, &f.b).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert!(!for_b[0].is_read);

        let for_a = f.service.list_messages(id, &f.a).await.unwrap();
        assert!(for_a[0].is_read);

        f.service.mark_read(&sent.message_id, &f.b).await.unwrap();
        let receipt = rx.recv().await.unwrap();
        assert_eq!(receipt.recipients, vec![f.a.clone()]);
        assert_eq!(receipt.event.event_type(), "message.read");

        // Second read publishes nothing new.
        f.service.mark_read(&sent.message_id, &f.b).await.unwrap();
        assert!(rx.try_recv().is_err());

        assert!(f.service.list_messages(id, &f.b).await.unwrap()[0].is_read);
    }

    #[tokio::test]
    async fn test_outsiders_are_forbidden() {
        let f = fixture().await;
        let conv = f.service.start_direct_conversation(&f.a, &f.b).await.unwrap();
        let id = conv.conversation_id.as_str();
        let sent = f.service.send_message(id, &f.a, "hi", vec![]).await.unwrap();

        assert!(matches!(
            f.service.send_message(id, &f.c, "intruder", vec![]).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.service.list_messages(id, &f.c).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.service.mark_read(&sent.message_id, &f.c).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.service.send_message("ghost", &f.a, "hi", vec![]).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_message_rejected_unless_media() {
        let f = fixture().await;
        let conv = f.service.start_direct_conversation(&f.a, &f.b).await.unwrap();
        let id = conv.conversation_id.as_str();

        let err = f.service.send_message(id, &f.a, "  ", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Message content is required");

        let media = f
            .service
            .send_message(id, &f.a, "", vec!["https://cdn/a.png".into(), "https://cdn/b.png".into()])
            .await
            .unwrap();
        assert_eq!(media.media_url, "https://cdn/a.png, https://cdn/b.png");
    }

    #[tokio::test]
    async fn test_edit_and_delete_rules() {
        let f = fixture().await;
        let conv = f.service.start_direct_conversation(&f.a, &f.b).await.unwrap();
        let id = conv.conversation_id.as_str();
        let sent = f.service.send_message(id, &f.a, "draft", vec![]).await.unwrap();

        assert!(matches!(
            f.service.edit_message(&sent.message_id, &f.b, "hijack").await,
            Err(Error::Forbidden)
        ));

        let edited = f
            .service
            .edit_message(&sent.message_id, &f.a, "final")
            .await
            .unwrap();
        assert_eq!(edited.content, "final");
        assert!(edited.edited_at.is_some());

        assert!(matches!(
            f.service.delete_message(&sent.message_id, &f.b).await,
            Err(Error::Forbidden)
        ));
        let deleted = f.service.delete_message(&sent.message_id, &f.a).await.unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.content.is_empty());

        assert!(matches!(
            f.service.edit_message(&sent.message_id, &f.a, "again").await,
            Err(Error::Conflict(_))
        ));

        let listed = f.service.list_messages(id, &f.b).await.unwrap();
        assert!(listed[0].is_deleted);
        assert!(listed[0].content.is_empty());
    }

    #[tokio::test]
    async fn test_group_conversation_messaging() {
        let f = fixture().await;
        let group = f
            .groups
            .create_group(
                CreateGroupRequest {
                    group_name: "Mentors".into(),
                    description: None,
                    members: vec![f.b.clone()],
                },
                &f.a,
            )
            .await
            .unwrap();
        let conv_id = group.conversation_id.unwrap();

        let mut rx = f.hub.subscribe();
        f.service.send_message(&conv_id, &f.b, "hi all", vec![]).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(event.is_for(&f.a) && event.is_for(&f.b) && !event.is_for(&f.c));

        assert!(matches!(
            f.service.send_message(&conv_id, &f.c, "let me in", vec![]).await,
            Err(Error::Forbidden)
        ));

        let conversations = f.service.list_conversations(&f.b).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].participant_ids.len(), 2);
    }
}
