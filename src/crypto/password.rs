use argon2::Argon2;
use rand::Rng;

use crate::error::AppError;

/// Argon2id digest of a password together with its salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub hash: [u8; 32],
    pub salt: [u8; 32],
}

impl PasswordDigest {
    /// Hash a password under a freshly generated salt.
    pub fn new(password: &str) -> Result<Self, AppError> {
        let salt = generate_salt();
        let hash = hash_password(password, &salt)?;
        Ok(PasswordDigest { hash, salt })
    }

    /// Rebuild a digest from stored columns.
    pub fn from_stored(hash: &[u8], salt: &[u8]) -> Result<Self, AppError> {
        let hash: [u8; 32] = hash
            .try_into()
            .map_err(|_| AppError::Internal("Invalid stored hash".to_string()))?;
        let salt: [u8; 32] = salt
            .try_into()
            .map_err(|_| AppError::Internal("Invalid stored salt".to_string()))?;
        Ok(PasswordDigest { hash, salt })
    }

    pub fn matches(&self, password: &str) -> Result<bool, AppError> {
        let computed = hash_password(password, &self.salt)?;
        Ok(computed == self.hash)
    }
}

fn generate_salt() -> [u8; 32] {
    rand::thread_rng().gen()
}

fn hash_password(password: &str, salt: &[u8]) -> Result<[u8; 32], AppError> {
    let mut hash = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_only_original_password() {
        let digest = PasswordDigest::new("secret123").unwrap();
        assert!(digest.matches("secret123").unwrap());
        assert!(!digest.matches("secret124").unwrap());
    }

    #[test]
    fn test_from_stored_roundtrips_columns() {
        let digest = PasswordDigest::new("hunter22").unwrap();
        let restored = PasswordDigest::from_stored(&digest.hash, &digest.salt).unwrap();
        assert!(restored.matches("hunter22").unwrap());
        assert!(PasswordDigest::from_stored(&[1, 2, 3], &digest.salt).is_err());
    }
}
