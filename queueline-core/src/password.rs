//! Credential secret hashing and legacy-format verification.
//!
//! New secrets are stored as salted Argon2id PHC strings. Two legacy
//! storage formats are still recognized so that old credential files
//! keep working, but neither is ever produced again:
//!
//! - `obf1:<base64>` -- the old reversible obfuscation. It is matched
//!   through the fast verification digest only; the reversible
//!   transform itself is not reimplemented.
//! - anything else -- plaintext from the earliest credential files,
//!   compared directly.
//!
//! Any successful legacy match upgrades the record to the hashed form.

use crate::{Result, TicketingError};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Prefix marking the retired reversible-obfuscation format.
pub const LEGACY_OBFUSCATED_PREFIX: &str = "obf1:";

/// How a stored credential secret is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretFormat {
    /// Current format: salted Argon2id PHC string.
    Hashed,
    /// Retired reversible obfuscation, `obf1:` prefixed.
    LegacyObfuscated,
    /// Earliest format: the password itself.
    LegacyPlaintext,
}

/// Classify a stored secret by its encoding.
pub fn classify(secret: &str) -> SecretFormat {
    if secret.starts_with("$argon2") {
        SecretFormat::Hashed
    } else if secret.starts_with(LEGACY_OBFUSCATED_PREFIX) {
        SecretFormat::LegacyObfuscated
    } else {
        SecretFormat::LegacyPlaintext
    }
}

/// Hash a password into the current storage format.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| TicketingError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
///
/// Returns `false` for malformed hashes as well as mismatches; a
/// stored value that does not parse can never authenticate anyone.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
