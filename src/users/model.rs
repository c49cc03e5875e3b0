use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Access level attached to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            other => anyhow::bail!("unknown role: {}", other),
        }
    }
}

/// Hashed one-time code and its deadline. An account either carries a
/// complete pending challenge or none at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOtp {
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

impl PendingOtp {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// User record in the database.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,                  // unique user ID
    pub email: String,             // stored lowercased
    pub password_hash: String,     // Argon2 hash, never leaves the backend
    pub role: Role,
    pub otp: Option<PendingOtp>,   // pending verification or reset challenge
    pub is_authenticated: bool,    // email ownership proven at least once
    pub created_at: OffsetDateTime,
}

/// Fields needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}
