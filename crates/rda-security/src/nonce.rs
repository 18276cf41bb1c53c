//! ---
//! rda_section: "06-security-access-control"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Capability model, lockout prevention, and request-forgery tokens."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rda_common::config::SecurityConfig;
use rda_common::time::{half_life_tick, wall_now};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Action the lockout check tokens are scoped to.
pub const LOCKOUT_NONCE_ACTION: &str = "rda-lockout-nonce";

const TOKEN_LEN: usize = 10;

/// Errors raised while constructing a [`NonceIssuer`].
#[derive(Debug, Error)]
pub enum NonceError {
    /// The signing secret was empty.
    #[error("nonce secret cannot be empty")]
    EmptySecret,
    /// The MAC rejected the key.
    #[error("invalid nonce key: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),
}

/// How far into its validity window a verified token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    /// Issued during the current tick.
    Fresh,
    /// Issued during the previous tick; still accepted.
    Aging,
}

/// Issues and verifies short-lived tokens bound to an action and an operator.
#[derive(Clone)]
pub struct NonceIssuer {
    mac: HmacSha256,
    lifetime: Duration,
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl NonceIssuer {
    /// Build an issuer from a signing secret and token lifetime.
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Result<Self, NonceError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(NonceError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret)?;
        Ok(Self { mac, lifetime })
    }

    /// Build an issuer from configuration, generating a process-local secret when none is set.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, NonceError> {
        match config.nonce_secret.as_deref() {
            Some(secret) => Self::new(secret.as_bytes(), config.nonce_lifetime),
            None => {
                warn!("no nonce secret configured; tokens will not survive a restart");
                let mut secret = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(secret, config.nonce_lifetime)
            }
        }
    }

    /// Configured token lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for the action and operator at the current time.
    pub fn issue(&self, action: &str, operator_id: &str) -> String {
        self.issue_at(action, operator_id, wall_now())
    }

    /// Issue a token as of `at`.
    pub fn issue_at(&self, action: &str, operator_id: &str, at: DateTime<Utc>) -> String {
        self.sign(half_life_tick(at, self.lifetime), action, operator_id)
    }

    /// Verify a token at the current time.
    pub fn verify(&self, token: &str, action: &str, operator_id: &str) -> Option<NonceAge> {
        self.verify_at(token, action, operator_id, wall_now())
    }

    /// Verify a token as of `at`. Tokens from the current and previous tick are accepted.
    pub fn verify_at(
        &self,
        token: &str,
        action: &str,
        operator_id: &str,
        at: DateTime<Utc>,
    ) -> Option<NonceAge> {
        if token.is_empty() {
            return None;
        }
        let tick = half_life_tick(at, self.lifetime);
        if constant_time_eq(&self.sign(tick, action, operator_id), token) {
            return Some(NonceAge::Fresh);
        }
        if tick > 0 && constant_time_eq(&self.sign(tick - 1, action, operator_id), token) {
            return Some(NonceAge::Aging);
        }
        None
    }

    fn sign(&self, tick: u64, action: &str, operator_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{tick}|{action}|{operator_id}").as_bytes());
        let mut digest = hex::encode(mac.finalize().into_bytes());
        digest.truncate(TOKEN_LEN);
        digest
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issuer() -> NonceIssuer {
        NonceIssuer::new(b"test-secret", Duration::from_secs(86_400)).unwrap()
    }

    #[test]
    fn token_verifies_for_same_action_and_operator() {
        let issuer = issuer();
        let token = issuer.issue(LOCKOUT_NONCE_ACTION, "alice");
        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(
            issuer.verify(&token, LOCKOUT_NONCE_ACTION, "alice"),
            Some(NonceAge::Fresh)
        );
    }

    #[test]
    fn token_is_scoped_to_operator_and_action() {
        let issuer = issuer();
        let token = issuer.issue(LOCKOUT_NONCE_ACTION, "alice");
        assert_eq!(issuer.verify(&token, LOCKOUT_NONCE_ACTION, "bob"), None);
        assert_eq!(issuer.verify(&token, "other-action", "alice"), None);
        assert_eq!(issuer.verify("", LOCKOUT_NONCE_ACTION, "alice"), None);
    }

    #[test]
    fn token_ages_then_expires() {
        let issuer = issuer();
        let issued = Utc.timestamp_opt(1_000_000, 0).unwrap();
        let token = issuer.issue_at(LOCKOUT_NONCE_ACTION, "alice", issued);
        let half_day = chrono::Duration::seconds(43_200);
        assert_eq!(
            issuer.verify_at(&token, LOCKOUT_NONCE_ACTION, "alice", issued + half_day),
            Some(NonceAge::Aging)
        );
        assert_eq!(
            issuer.verify_at(
                &token,
                LOCKOUT_NONCE_ACTION,
                "alice",
                issued + half_day + half_day
            ),
            None
        );
    }

    #[test]
    fn different_secrets_produce_different_tokens() {
        let other = NonceIssuer::new(b"another", Duration::from_secs(86_400)).unwrap();
        let token = issuer().issue(LOCKOUT_NONCE_ACTION, "alice");
        assert_eq!(other.verify(&token, LOCKOUT_NONCE_ACTION, "alice"), None);
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            NonceIssuer::new(b"", Duration::from_secs(60)),
            Err(NonceError::EmptySecret)
        ));
    }
}
