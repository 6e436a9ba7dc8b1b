//! User model
//!
//! A registered account. `token` holds the single live session: login sets
//! it, logout clears it, and the session guard compares presented bearer
//! tokens against it by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, empty when not given
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Current session token, `None` when logged out
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a session token is currently stored for this user
    pub fn has_active_session(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether `presented` is byte-identical to the stored session token
    pub fn session_matches(&self, presented: &str) -> bool {
        match self.token.as_deref() {
            Some(stored) if !stored.is_empty() => stored == presented,
            _ => false,
        }
    }
}

/// Input for registering a user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: Option<String>,
    /// Plaintext password, hashed during registration
    pub password: String,
}
