//! Challenge-response authentication.
//!
//! The relay never sees the password: the client sends a random challenge,
//! the server answers with its own, and the login token is an HMAC of the
//! password keyed by both challenges. A fresh client challenge is generated
//! for every authentication attempt, so tokens cannot be replayed across
//! connections.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;

use crate::env::Environment;

type HmacSha256 = Hmac<Sha256>;

/// Key material size of the client challenge (256 bits).
const CHALLENGE_BYTES: usize = 32;

/// Holder of the per-attempt handshake secrets.
///
/// Only this type sees the challenge strings; the engine hands it the
/// password at token time and forwards the resulting strings blindly.
#[derive(Debug, Default)]
pub struct Authenticator {
    client_challenge: Option<String>,
    server_challenge: Option<String>,
}

impl Authenticator {
    /// Empty authenticator; no handshake in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates and stores a fresh client challenge, returning it for
    /// transmission. Any previous challenge is discarded.
    pub fn generate_client_challenge<E: Environment>(&mut self, env: &E) -> String {
        let mut key = [0u8; CHALLENGE_BYTES];
        env.random_bytes(&mut key);
        let challenge = STANDARD_NO_PAD.encode(key);
        self.client_challenge = Some(challenge.clone());
        challenge
    }

    /// Stores the server's challenge, overwriting any previous one.
    pub fn set_server_challenge(&mut self, challenge: impl Into<String>) {
        self.server_challenge = Some(challenge.into());
    }

    /// Derives the login token:
    /// `base64_nopad(HMAC-SHA256(key = server_challenge ∥ client_challenge,
    /// message = password))`.
    ///
    /// Fails closed: if the MAC cannot be keyed, an empty token is returned
    /// (and logged) so the server rejects the login instead of the client
    /// aborting locally.
    pub fn login_token(&self, password: &str) -> String {
        let server = self.server_challenge.as_deref().unwrap_or("");
        let client = self.client_challenge.as_deref().unwrap_or("");
        let key = format!("{server}{client}");

        let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
            error!("login token derivation failed, sending empty token");
            return String::new();
        };
        mac.update(password.as_bytes());
        STANDARD_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Drops both challenges. Called on full disconnect so a stale server
    /// challenge can never leak into the next handshake.
    pub fn reset(&mut self) {
        self.client_challenge = None;
        self.server_challenge = None;
    }
}
