use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,                       // normalized, unique
    pub secondary_email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,               // Argon2 PHC string
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// The outstanding reset request, if both halves are present.
    pub fn pending_reset(&self) -> Option<PendingReset> {
        match (&self.password_reset_token_hash, self.password_reset_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(PendingReset {
                token_hash: token_hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }
}

/// Hash and expiry of a reset token; always written and cleared as a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Fields needed to insert a user.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub secondary_email: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
}
