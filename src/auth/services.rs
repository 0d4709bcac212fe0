use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::Principal,
        dto::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest},
        jwt::{TokenIssuer, SESSION_TTL},
        password::{hash_blocking, hash_password, verify_password},
        repo::UserStore,
        repo_types::{NewUser, Role, User},
        reset_token::{generate_reset_token, hash_reset_token},
        templates::{password_reset_email, reset_url},
    },
    error::{ApiError, AppResult},
    mail::Mailer,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DUMMY_HASH: String = hash_blocking("not-a-real-password").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Signup, login and the password reset flow.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenIssuer>,
    mailer: Arc<dyn Mailer>,
    frontend_url: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenIssuer>,
        mailer: Arc<dyn Mailer>,
        frontend_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    fn session_token(&self, user: &User) -> AppResult<String> {
        Ok(self.tokens.sign(Principal::from(user), SESSION_TTL)?)
    }

    /// Create an account and return its first session token.
    pub async fn signup(&self, req: SignupRequest) -> AppResult<String> {
        let name = present(req.name)
            .ok_or_else(|| ApiError::validation("Please provide your name"))?;
        let email = present(req.email)
            .map(|e| normalize_email(&e))
            .ok_or_else(|| ApiError::validation("Please provide your email"))?;
        if !is_valid_email(&email) {
            return Err(ApiError::validation("Please provide a valid email").into());
        }
        let password = req
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::validation("Please provide a password"))?;
        let secondary_email = present(req.secondary_email).map(|e| normalize_email(&e));
        if let Some(secondary) = &secondary_email {
            if !is_valid_email(secondary) {
                return Err(ApiError::validation("Please provide a valid secondary email").into());
            }
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(ApiError::Conflict("This user already exists".into()).into());
        }

        let password_hash = hash_password(&password).await?;
        let created = self
            .users
            .create(NewUser {
                name: name.trim(),
                email: &email,
                secondary_email: secondary_email.as_deref(),
                password_hash: &password_hash,
                role: Role::default(),
            })
            .await?;
        let Some(user) = created else {
            // lost a race with a concurrent signup for the same email
            warn!(%email, "email registered concurrently");
            return Err(ApiError::Conflict("This user already exists".into()).into());
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        self.session_token(&user)
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<String> {
        let (email, password) = match (present(req.email), req.password.filter(|p| !p.is_empty())) {
            (Some(email), Some(password)) => (normalize_email(&email), password),
            _ => return Err(ApiError::validation("Please provide email and password").into()),
        };

        let Some(user) = self.users.find_by_email(&email).await? else {
            let _ = verify_password(&password, &DUMMY_HASH).await;
            warn!(%email, "login unknown email");
            return Err(ApiError::InvalidCredentials.into());
        };

        if !verify_password(&password, &user.password_hash).await? {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(ApiError::InvalidCredentials.into());
        }

        info!(user_id = %user.id, email = %user.email, "user logged in");
        self.session_token(&user)
    }

    /// Email a reset link if the account exists. Callers get the same
    /// `Ok(())` either way; only a failed send for a real account errors.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> AppResult<()> {
        let email = present(req.email)
            .map(|e| normalize_email(&e))
            .ok_or_else(|| ApiError::validation("Please provide your email"))?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            debug!(%email, "password reset requested for unknown email");
            return Ok(());
        };

        let (raw_token, pending) = generate_reset_token(OffsetDateTime::now_utc());
        self.users.set_password_reset(user.id, &pending).await?;

        let mail = password_reset_email(&reset_url(&self.frontend_url, &raw_token));
        let (users, mailer) = (self.users.clone(), self.mailer.clone());
        let (user_id, to, token_hash) = (user.id, user.email, pending.token_hash);

        // Send and rollback run detached: if the request is cancelled mid-send,
        // a failed delivery still clears the pair it wrote.
        let delivery = tokio::spawn(async move {
            let sent = mailer.send(&to, mail.subject, &mail.text, &mail.html).await;
            let Err(e) = sent else {
                return Ok(());
            };
            error!(error = %e, %user_id, "reset email failed, clearing reset token");
            match users.clear_password_reset(user_id, &token_hash).await {
                Ok(true) => {}
                Ok(false) => debug!(%user_id, "newer reset request in place, left as is"),
                Err(e) => error!(error = ?e, %user_id, "failed to clear reset token"),
            }
            Err(e)
        });

        match delivery.await.context("reset email task")? {
            Ok(()) => {
                info!(%user_id, expires_at = %pending.expires_at, "password reset email sent");
                Ok(())
            }
            Err(_) => Err(ApiError::MailDelivery.into()),
        }
    }

    /// Consume a reset token, set the new password and return a fresh session token.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        req: ResetPasswordRequest,
    ) -> AppResult<String> {
        let (password, confirm) = match (
            req.password.filter(|p| !p.is_empty()),
            req.password_confirm.filter(|p| !p.is_empty()),
        ) {
            (Some(p), Some(c)) => (p, c),
            _ => {
                return Err(
                    ApiError::validation("Please provide and confirm your new password.").into(),
                )
            }
        };
        if password != confirm {
            return Err(ApiError::validation("Passwords do not match.").into());
        }

        let token_hash = hash_reset_token(raw_token);
        let Some(user) = self
            .users
            .find_by_reset_token(&token_hash, OffsetDateTime::now_utc())
            .await?
        else {
            warn!("invalid or expired reset token");
            return Err(ApiError::InvalidToken.into());
        };

        let password_hash = hash_password(&password).await?;
        let Some(user) = self
            .users
            .complete_password_reset(user.id, &token_hash, &password_hash)
            .await?
        else {
            warn!(user_id = %user.id, "reset token consumed concurrently");
            return Err(ApiError::InvalidToken.into());
        };

        info!(user_id = %user.id, "password reset");
        self.session_token(&user)
    }

    pub fn verify_session(&self, token: &str) -> Result<Principal, ApiError> {
        self.tokens
            .verify(token)
            .map(|claims| claims.principal())
            .map_err(|e| {
                debug!(error = %e, "session token rejected");
                ApiError::Unauthorized("Invalid or expired token".into())
            })
    }

    pub async fn current_user(&self, id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()).into())
    }
}
