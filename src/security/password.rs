use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use once_cell::sync::Lazy;
use thiserror::Error;

static ARGON2: Lazy<Argon2<'static>> =
    Lazy::new(|| Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()));

/// Hash of a random secret nobody knows. Unknown accounts are checked against it
/// so a login costs one argon2 verify whether or not the contact exists.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password(SaltString::generate(&mut OsRng).as_str()).ok());

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("hash error: {0}")]
    Hash(String),
}

/// Salted argon2id PHC string for `plain`.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    ARGON2
        .hash_password(plain.as_bytes(), &salt)
        .map(|p| p.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(ARGON2.verify_password(plain.as_bytes(), &parsed).is_ok())
}

/// Runs a full verify against [`DUMMY_HASH`] and always reports a mismatch.
pub fn verify_unknown_account(plain: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
    false
}
