use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::auth::repo_types::PendingReset;

/// How long a reset link stays usable.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

const TOKEN_BYTES: usize = 32;

/// Hex SHA-256 of a raw reset token. Only this form is ever stored.
pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Fresh reset token: the raw value for the email link and the pair to persist.
pub fn generate_reset_token(now: OffsetDateTime) -> (String, PendingReset) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let pending = PendingReset {
        token_hash: hash_reset_token(&raw),
        expires_at: now + RESET_TOKEN_TTL,
    };
    (raw, pending)
}
