//! Application state for Stack Mentor.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::email::mailer_from_config;
use crate::services::{
    AuthService, ChatHub, EmailService, GroupService, Mailer, MessageService, UserService,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Login sessions and password checks.
    pub auth: AuthService,
    /// Registration, verification and profiles.
    pub users: UserService,
    pub groups: GroupService,
    /// Conversations and messages.
    pub messages: MessageService,
    /// Real-time event fan-out for websocket clients.
    pub hub: ChatHub,
}

impl AppState {
    /// Create a new application state from the global configuration:
    /// opens the database, applies migrations and builds the mailer.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let db = crate::db::init_pool(&config.database.path, config.database.max_connections)
            .await?;
        crate::db::migrate(&db).await?;

        let mailer = mailer_from_config(&config.mail)?;

        Ok(Self::from_parts(db, config, mailer))
    }

    /// Assemble state from an already migrated pool and a mailer.
    pub fn from_parts(db: DbPool, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let hub = ChatHub::new();
        let email = EmailService::new(mailer, &config.mail.from, &config.server.public_url);

        let auth = AuthService::new(db.clone(), config.auth.clone());
        let users = UserService::new(db.clone(), email, config.auth.clone());
        let groups = GroupService::new(db.clone());
        let messages = MessageService::new(db.clone(), hub.clone());

        Self {
            db,
            auth,
            users,
            groups,
            messages,
            hub,
        }
    }
}
