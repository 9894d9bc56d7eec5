//! Data models for Stack Mentor.
//!
//! Database records and the request/response DTOs built from them.

mod group;
mod message;
mod user;

pub use group::*;
pub use message::*;
pub use user::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
