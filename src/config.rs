use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (usually port 587).
    Starttls,
    /// TLS from the first byte (usually port 465).
    Tls,
    /// No encryption. Local relays and mail catchers only.
    None,
}

impl std::str::FromStr for SmtpTls {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::Starttls),
            "tls" => Ok(Self::Tls),
            "none" => Ok(Self::None),
            other => anyhow::bail!("unknown EMAIL_TLS mode: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls: SmtpTls,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    /// Base URL of the web client; reset links are built on top of it.
    pub frontend_url: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authd-users".into()),
        };
        let smtp = SmtpConfig {
            host: std::env::var("EMAIL_HOST").context("EMAIL_HOST must be set")?,
            port: env_or("EMAIL_PORT", 587),
            username: non_empty_var("EMAIL_USER"),
            password: non_empty_var("EMAIL_PASS"),
            from: std::env::var("EMAIL_FROM").context("EMAIL_FROM must be set")?,
            tls: match non_empty_var("EMAIL_TLS") {
                Some(v) => v.parse()?,
                None => SmtpTls::Starttls,
            },
            timeout_secs: env_or("MAIL_TIMEOUT_SECS", 10),
        };
        let frontend_url = std::env::var("FRONTEND_URL")
            .context("FRONTEND_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        let config = Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
            jwt,
            smtp,
            frontend_url,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
        };
        config.validate()?;
        Ok(config)
    }

    /// A forgot-password request waits on the pool, then on SMTP. Both must
    /// give up before the request timeout does, or the mail failure is lost.
    pub fn validate(&self) -> anyhow::Result<()> {
        let inner = self.db_acquire_timeout_secs + self.smtp.timeout_secs;
        anyhow::ensure!(
            inner < self.request_timeout_secs,
            "DB_ACQUIRE_TIMEOUT_SECS + MAIL_TIMEOUT_SECS ({inner}s) must be below REQUEST_TIMEOUT_SECS ({}s)",
            self.request_timeout_secs
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
