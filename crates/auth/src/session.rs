//! Stateless signed session tokens.
//!
//! A token is `base64url(payload) "." base64url(hmac-sha256(secret, payload))`
//! where the payload is the canonical JSON of a [`Session`]. Nothing is
//! kept server-side, so horizontal scaling only needs a shared secret.
//! Verification recomputes the signature and compares in constant time;
//! any structural anomaly fails identically as `Unauthorized`.

use crate::error::{ErrorKind, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Session lifetime: eight hours.
pub const SESSION_TTL_SECS: i64 = 8 * 60 * 60;
/// A fresh token is attached once less than this much lifetime remains.
pub const ROTATE_THRESHOLD_SECS: i64 = 30 * 60;

/// The verified claims carried by a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Username the token was issued to.
    pub user: String,
    /// Random per-issue identifier; also keys the S3 connection registry.
    pub nonce: Uuid,
    /// Expiry, epoch seconds.
    pub exp: i64,
}

/// Issues, verifies, and rotates session tokens under one shared secret.
pub struct SessionAuthority {
    secret: Vec<u8>,
}

impl SessionAuthority {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a fresh token for a username.
    pub fn issue(&self, username: &str) -> String {
        self.issue_at(username, now())
    }

    fn issue_at(&self, username: &str, now: i64) -> String {
        let session = Session {
            user: username.to_string(),
            nonce: Uuid::new_v4(),
            exp: now + SESSION_TTL_SECS,
        };
        // unwrap is safe: a struct of String/Uuid/i64 always serializes
        let payload = serde_json::to_vec(&session).unwrap();
        let body = base64_simd::URL_SAFE_NO_PAD.encode_to_string(&payload);
        let signature = base64_simd::URL_SAFE_NO_PAD.encode_to_string(self.sign(&payload));
        format!("{body}.{signature}")
    }

    /// Verify a presented token and return its claims.
    ///
    /// Fails closed: bad split, bad base64, bad signature, bad JSON,
    /// missing fields, and expiry all surface as the same `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Session> {
        self.verify_at(token, now())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Session> {
        let Some((body, signature)) = token.split_once('.') else {
            exn::bail!(ErrorKind::Unauthorized);
        };
        let Ok(payload) = base64_simd::URL_SAFE_NO_PAD.decode_to_vec(body) else {
            exn::bail!(ErrorKind::Unauthorized);
        };
        let Ok(presented) = base64_simd::URL_SAFE_NO_PAD.decode_to_vec(signature) else {
            exn::bail!(ErrorKind::Unauthorized);
        };
        let expected = self.sign(&payload);
        if !bool::from(expected.as_slice().ct_eq(&presented)) {
            exn::bail!(ErrorKind::Unauthorized);
        }
        let Ok(session) = serde_json::from_slice::<Session>(&payload) else {
            exn::bail!(ErrorKind::Unauthorized);
        };
        if session.user.is_empty() || session.exp <= now {
            exn::bail!(ErrorKind::Unauthorized);
        }
        Ok(session)
    }

    /// A replacement token when the session is close to expiry.
    ///
    /// The old token stays valid until its natural expiry; the response
    /// simply carries a fresh one alongside.
    pub fn rotate(&self, session: &Session) -> Option<String> {
        self.rotate_at(session, now())
    }

    fn rotate_at(&self, session: &Session, now: i64) -> Option<String> {
        (session.exp - now <= ROTATE_THRESHOLD_SECS).then(|| self.issue_at(&session.user, now))
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        // unwrap is safe: HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret).unwrap();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    fn authority() -> SessionAuthority {
        SessionAuthority::new("test-secret")
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let authority = authority();
        let token = authority.issue_at("alice", T0);
        let session = authority.verify_at(&token, T0 + 60).unwrap();
        assert_eq!(session.user, "alice");
        assert_eq!(session.exp, T0 + SESSION_TTL_SECS);
    }

    #[test]
    fn every_mutated_bit_is_rejected() {
        let authority = authority();
        let token = authority.issue_at("alice", T0);
        // Flip one character at every position; each variant must fail.
        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let Ok(mutated) = String::from_utf8(bytes) else {
                continue;
            };
            if mutated == token {
                continue;
            }
            assert!(
                authority.verify_at(&mutated, T0 + 60).is_err(),
                "mutation at {i} was accepted",
            );
        }
    }

    #[test]
    fn structural_garbage_is_unauthorized() {
        let authority = authority();
        for garbage in ["", "no-dot", "a.b.c", "!!!.???", "YQ.YQ"] {
            let err = authority.verify_at(garbage, T0).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Unauthorized));
        }
    }

    #[test]
    fn tokens_expire_and_secrets_matter() {
        let authority = authority();
        let token = authority.issue_at("alice", T0);
        assert!(authority.verify_at(&token, T0 + SESSION_TTL_SECS).is_err());
        assert!(authority.verify_at(&token, T0 + SESSION_TTL_SECS - 1).is_ok());

        let other = SessionAuthority::new("different-secret");
        assert!(other.verify_at(&token, T0 + 60).is_err());
    }

    #[test]
    fn rotation_happens_only_inside_the_threshold() {
        let authority = authority();
        let token = authority.issue_at("alice", T0);
        let session = authority.verify_at(&token, T0).unwrap();

        // 7h40m in: twenty minutes left of the rotate window.
        let late = T0 + SESSION_TTL_SECS - 20 * 60;
        let fresh = authority.rotate_at(&session, late).expect("should rotate");
        let fresh_session = authority.verify_at(&fresh, late).unwrap();
        assert_eq!(fresh_session.exp, late + SESSION_TTL_SECS);
        // The rotated token outlives the original comfortably.
        assert!(authority.verify_at(&fresh, T0 + SESSION_TTL_SECS + 60).is_ok());

        // Mid-life sessions are left alone.
        assert!(authority.rotate_at(&session, T0 + 60).is_none());
    }

    #[test]
    fn nonces_differ_between_issues() {
        let authority = authority();
        let a = authority.verify_at(&authority.issue_at("alice", T0), T0).unwrap();
        let b = authority.verify_at(&authority.issue_at("alice", T0), T0).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }
}
