use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PendingReset, User};

const USER_COLUMNS: &str = r#"
    id, name, email, secondary_email, password_hash, role,
    password_reset_token_hash, password_reset_expires_at, created_at, updated_at
"#;

/// Persistence of user credentials and reset state.
///
/// Emails passed in are expected to be normalized already.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user. `None` when the email is already taken.
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>>;

    /// User holding a reset token with this hash that expires strictly after `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;

    /// Overwrite the pending reset of a user. A previous token stops working.
    async fn set_password_reset(&self, id: Uuid, reset: &PendingReset) -> anyhow::Result<()>;

    /// Clear the reset pair if it still holds `token_hash`. `false` when a
    /// newer request has replaced it, which is then left alone.
    async fn clear_password_reset(&self, id: Uuid, token_hash: &str) -> anyhow::Result<bool>;

    /// Store a new password hash and clear the reset pair, but only while the
    /// stored token hash still equals `token_hash`. `None` if it didn't.
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        // ON CONFLICT keeps a racing duplicate signup from surfacing as a 23505
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, secondary_email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.secondary_email)
        .bind(new.password_hash)
        .bind(new.role)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE password_reset_token_hash = $1
              AND password_reset_expires_at > $2
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        Ok(user)
    }

    async fn set_password_reset(&self, id: Uuid, reset: &PendingReset) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_reset_token_hash = $2,
                   password_reset_expires_at = $3,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&reset.token_hash)
        .bind(reset.expires_at)
        .execute(&self.db)
        .await
        .context("update password reset")?;
        Ok(())
    }

    async fn clear_password_reset(&self, id: Uuid, token_hash: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_reset_token_hash = NULL,
                   password_reset_expires_at = NULL,
                   updated_at = now()
             WHERE id = $1
               AND password_reset_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.db)
        .await
        .context("clear password reset")?;
        Ok(res.rows_affected() == 1)
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET password_hash = $3,
                   password_reset_token_hash = NULL,
                   password_reset_expires_at = NULL,
                   updated_at = now()
             WHERE id = $1
               AND password_reset_token_hash = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("complete password reset")?;
        Ok(user)
    }
}
