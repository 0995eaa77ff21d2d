//! Password policy and hashing.
//!
//! # Hashing scheme
//!
//! Stored hashes are self-contained `salt$digest` strings: a random 32-byte
//! hex salt and a hex SHA-256 digest produced by iterating the hash over
//! `salt || password || salt` for a fixed round count. The same salt always
//! yields the same digest (so verification works), while every fresh hash
//! draws an independent random salt (so identical passwords never share a
//! stored value and precomputed tables are useless). The round count trades
//! verification latency against brute-force cost.
//!
//! Verification recomputes the digest from the embedded salt and compares in
//! constant time via `subtle`; malformed stored values verify as `false`,
//! never as an error.
//!
//! # Strength policy
//!
//! [`PasswordPolicy`] checks minimum length and the four character classes,
//! reporting **every** violated rule so the caller can render the complete
//! list, not just the first failure.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Digest rounds applied over the salted password before the final hash.
const HASH_ROUNDS: usize = 10_000;

/// Salt length in raw bytes (hex-encoded to twice this length).
const SALT_BYTES: usize = 32;

/// Special characters accepted by the strength policy.
pub const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";

// ============================================================================
// Hashing
// ============================================================================

/// Hash a password with a freshly generated random salt.
///
/// Returns the self-contained `salt$digest` storage form.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_BYTES] = rand::rng().random();
    hash_password_with_salt(password, &hex::encode(salt))
}

/// Hash a password with a caller-supplied hex salt.
///
/// Deterministic for a given (password, salt) pair; used by verification.
pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    let mut buf = format!("{salt}{password}{salt}").into_bytes();
    for _ in 0..HASH_ROUNDS {
        buf = Sha256::digest(&buf).to_vec();
    }
    let digest = Sha256::digest(&buf);
    format!("{salt}${}", hex::encode(digest))
}

/// Verify a password against a stored `salt$digest` value.
///
/// Constant-time comparison of the recomputed storage form. Returns `false`
/// for malformed stored values rather than erroring.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, _digest)) = stored.split_once('$') else {
        return false;
    };
    if salt.is_empty() {
        return false;
    }

    let computed = hash_password_with_salt(password, salt);
    // subtle yields false for mismatched lengths without early exit on content.
    computed.as_bytes().ct_eq(stored.as_bytes()).into()
}

// ============================================================================
// Strength policy
// ============================================================================

/// A single violated strength rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordViolation {
    /// Shorter than the minimum length.
    TooShort { min: usize },
    /// No uppercase letter.
    MissingUppercase,
    /// No lowercase letter.
    MissingLowercase,
    /// No digit.
    MissingDigit,
    /// No character from the special set.
    MissingSpecial,
}

impl fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min } => {
                write!(f, "must be at least {} characters", min)
            }
            Self::MissingUppercase => write!(f, "must contain an uppercase letter"),
            Self::MissingLowercase => write!(f, "must contain a lowercase letter"),
            Self::MissingDigit => write!(f, "must contain a digit"),
            Self::MissingSpecial => {
                write!(f, "must contain a special character ({})", SPECIAL_CHARS)
            }
        }
    }
}

/// Password strength policy.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum password length.
    pub min_length: usize,
    /// Require at least one uppercase letter.
    pub require_uppercase: bool,
    /// Require at least one lowercase letter.
    pub require_lowercase: bool,
    /// Require at least one digit.
    pub require_digit: bool,
    /// Require at least one character from [`SPECIAL_CHARS`].
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    /// Minimum 8 characters, all four character classes required.
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Validate a password, returning every violated rule.
    pub fn validate(&self, password: &str) -> Result<(), Vec<PasswordViolation>> {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(PasswordViolation::TooShort {
                min: self.min_length,
            });
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PasswordViolation::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PasswordViolation::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PasswordViolation::MissingDigit);
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            violations.push(PasswordViolation::MissingSpecial);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Generate a temporary password that satisfies the policy by
    /// construction: one character from each required class, padded from the
    /// full alphabet, then shuffled with a CSPRNG.
    pub fn generate_temporary(&self) -> String {
        let mut rng = rand::rng();
        let pick = |set: &str, rng: &mut rand::rngs::ThreadRng| {
            let bytes = set.as_bytes();
            bytes[rng.random_range(0..bytes.len())] as char
        };

        let mut chars: Vec<char> = Vec::with_capacity(self.min_length + 4);
        if self.require_uppercase {
            chars.push(pick(UPPERCASE, &mut rng));
        }
        if self.require_lowercase {
            chars.push(pick(LOWERCASE, &mut rng));
        }
        if self.require_digit {
            chars.push(pick(DIGITS, &mut rng));
        }
        if self.require_special {
            chars.push(pick(SPECIAL_CHARS, &mut rng));
        }

        let alphabet: String = format!("{UPPERCASE}{LOWERCASE}{DIGITS}{SPECIAL_CHARS}");
        while chars.len() < self.min_length + 4 {
            chars.push(pick(&alphabet, &mut rng));
        }

        chars.shuffle(&mut rng);
        chars.into_iter().collect()
    }
}
