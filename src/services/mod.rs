//! Service layer for Stack Mentor.
//!
//! Contains the business logic behind the HTTP routes:
//! - Auth (password hashing, login sessions)
//! - Users (registration, email verification, profiles, search)
//! - Groups (membership and admin rules)
//! - Messages (conversations, messages, read receipts)
//! - Email (outgoing mail through a pluggable transport)
//! - ChatHub (real-time event fan-out to websocket clients)

pub mod auth;
pub mod chat_hub;
pub mod email;
mod groups;
mod messages;
mod users;

pub use auth::{AuthService, AuthUser, LoginRequest, LoginResponse};
pub use chat_hub::{ChatEvent, ChatHub, ReadReceipt, ServerEvent};
pub use email::{EmailService, HttpMailer, LogMailer, MailMessage, Mailer, MemoryMailer};
pub use groups::GroupService;
pub use messages::MessageService;
pub use users::{parse_experience_range, UserSearchParams, UserService};
