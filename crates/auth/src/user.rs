//! User registry model and credential verification.
//!
//! Users are loaded once at startup and immutable until restart. A stored
//! secret is either a plaintext password or an `scrypt$<salt>$<hash>`
//! tuple; both verify in constant time so that a login attempt leaks
//! nothing about which byte went wrong.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use subtle::ConstantTimeEq;

/// What a user is allowed to do. Mutating operations require
/// [`can_write`](Role::can_write); profile administration requires
/// [`is_admin`](Role::is_admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ReadOnly,
    ReadWrite,
    Admin,
}

impl Role {
    pub fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// One registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub role: Role,
    /// Declared virtual root, POSIX form, starting with `/`.
    pub root_path: String,
    /// Realpath of the root after symlink resolution; proven to sit
    /// inside the configured file root at load time.
    pub root_real: PathBuf,
    pub secret: Secret,
}

/// A stored credential.
#[derive(Clone)]
pub enum Secret {
    Plain(String),
    Scrypt { salt: Vec<u8>, hash: Vec<u8> },
}

// Keep secrets out of debug output and logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Secret::Plain(..)"),
            Self::Scrypt { .. } => f.write_str("Secret::Scrypt(..)"),
        }
    }
}

/// Fixed derivation parameters matching the stored tuples:
/// N = 2^14, r = 8, p = 1; the output length follows the stored hash.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

impl Secret {
    /// Parse a stored secret string.
    ///
    /// `scrypt$<base64-salt>$<base64-hash>` becomes [`Secret::Scrypt`];
    /// anything else is a plaintext password.
    pub fn parse(raw: &str, username: &str) -> Result<Self> {
        let Some(rest) = raw.strip_prefix("scrypt$") else {
            return Ok(Self::Plain(raw.to_string()));
        };
        let Some((salt_b64, hash_b64)) = rest.split_once('$') else {
            exn::bail!(ErrorKind::BadStoredSecret(username.to_string()));
        };
        let base64 = base64_simd::STANDARD;
        let (Ok(salt), Ok(hash)) = (base64.decode_to_vec(salt_b64), base64.decode_to_vec(hash_b64))
        else {
            exn::bail!(ErrorKind::BadStoredSecret(username.to_string()));
        };
        if salt.is_empty() || hash.is_empty() {
            exn::bail!(ErrorKind::BadStoredSecret(username.to_string()));
        }
        Ok(Self::Scrypt { salt, hash })
    }

    /// Constant-time check of a presented password against this secret.
    pub fn verify(&self, presented: &str) -> bool {
        match self {
            Self::Plain(expected) => {
                expected.as_bytes().ct_eq(presented.as_bytes()).into()
            }
            Self::Scrypt { salt, hash } => {
                let Ok(params) = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, hash.len())
                else {
                    return false;
                };
                let mut derived = vec![0u8; hash.len()];
                if scrypt::scrypt(presented.as_bytes(), salt, &params, &mut derived).is_err() {
                    return false;
                }
                derived.ct_eq(hash).into()
            }
        }
    }
}

/// Why a login attempt failed. Reaches the audit log only; the wire
/// response collapses both cases into one generic denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    UserNotFound,
    BadPassword,
}

impl LoginFailure {
    pub fn audit_reason(self) -> &'static str {
        match self {
            Self::UserNotFound => "user_not_found",
            Self::BadPassword => "bad_password",
        }
    }
}

/// Look up a user and verify the presented password.
pub fn authenticate<'a>(
    users: &'a [User],
    username: &str,
    password: &str,
) -> std::result::Result<&'a User, LoginFailure> {
    let Some(user) = users.iter().find(|u| u.username == username) else {
        // Burn a comparison so an unknown user costs about the same as a
        // wrong password.
        let _ = Secret::Plain(String::new()).verify(password);
        return Err(LoginFailure::UserNotFound);
    };
    if user.secret.verify(password) {
        Ok(user)
    } else {
        Err(LoginFailure::BadPassword)
    }
}
