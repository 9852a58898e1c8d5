use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

/// Raised only for malformed hash input (or an argon2 parameter fault);
/// a wrong-but-well-formed password is a `false` from `verify_password`.
#[derive(Debug, Error)]
#[error("malformed password hash")]
pub struct CredentialFormatError;

/// Salted, slow hash suitable for password storage. Fresh OS salt per call.
pub fn hash_password(plain: &str) -> Result<String, CredentialFormatError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            CredentialFormatError
        })?
        .to_string();
    Ok(hash)
}

/// Timing-safe verification; comparison happens inside argon2 itself.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, CredentialFormatError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        CredentialFormatError
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn hash_is_never_the_plaintext_and_is_salted() {
        let password = "pw123456";
        let a = hash_password(password).expect("hash");
        let b = hash_password(password).expect("hash");
        assert_ne!(a, password);
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }
}
