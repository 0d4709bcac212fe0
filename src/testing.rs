//! In-memory collaborators for unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::UserStore,
        repo_types::{NewUser, PendingReset, User},
        services::AuthService,
    },
    config::JwtConfig,
    mail::{MailError, Mailer},
};

pub const FRONTEND_URL: &str = "https://app.test";

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn get(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.get(email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name.to_string(),
            email: new.email.to_string(),
            secondary_email: new.secondary_email.map(str::to_string),
            password_hash: new.password_hash.to_string(),
            role: new.role,
            password_reset_token_hash: None,
            password_reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.password_reset_token_hash.as_deref() == Some(token_hash)
                    && u.password_reset_expires_at.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn set_password_reset(&self, id: Uuid, reset: &PendingReset) -> anyhow::Result<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.password_reset_token_hash = Some(reset.token_hash.clone());
            user.password_reset_expires_at = Some(reset.expires_at);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn clear_password_reset(&self, id: Uuid, token_hash: &str) -> anyhow::Result<bool> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users
            .iter_mut()
            .find(|u| u.id == id && u.password_reset_token_hash.as_deref() == Some(token_hash))
        else {
            return Ok(false);
        };
        user.password_reset_token_hash = None;
        user.password_reset_expires_at = None;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users
            .iter_mut()
            .find(|u| u.id == id && u.password_reset_token_hash.as_deref() == Some(token_hash))
        else {
            return Ok(None);
        };
        user.password_hash = password_hash.to_string();
        user.password_reset_token_hash = None;
        user.password_reset_expires_at = None;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.into(),
            subject: subject.into(),
            text: text_body.into(),
            html: html_body.into(),
        });
        Ok(())
    }
}

/// Mailer whose relay never answers.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), MailError> {
        Err(MailError::Timeout(Duration::from_secs(10)))
    }
}

/// First send blocks until `release` is notified, then fails. Later sends
/// are delivered to `inner`.
#[derive(Default)]
pub struct GatedMailer {
    pub inner: RecordingMailer,
    pub entered: Notify,
    pub release: Notify,
    gated: AtomicBool,
}

#[async_trait]
impl Mailer for GatedMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        if !self.gated.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
            return Err(MailError::Timeout(Duration::from_secs(10)));
        }
        self.inner.send(to, subject, text_body, html_body).await
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
    }
}

pub fn test_service(users: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>) -> AuthService {
    AuthService::new(
        users,
        Arc::new(JwtKeys::new(&test_jwt_config())),
        mailer,
        FRONTEND_URL,
    )
}

/// Pull the raw token out of a reset email body.
pub fn extract_reset_token(body: &str) -> Option<String> {
    let start = body.find("/reset-password/")? + "/reset-password/".len();
    let token: String = body[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    (!token.is_empty()).then_some(token)
}
