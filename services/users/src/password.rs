//! Password hashing and verification
//!
//! New hashes use the configured scheme. Verification picks the algorithm
//! from the stored hash itself, so records written under either scheme keep
//! working after the configuration changes.

use argon2::{
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier, password_hash::SaltString,
};
use std::str::FromStr;
use tracing::error;

use crate::error::{StoreError, StoreResult};

/// Bcrypt cost used when none is configured
pub const DEFAULT_BCRYPT_COST: u32 = 10;

const ARGON2_PREFIX: &str = "$argon2";

/// Hashing scheme for newly stored passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// Bcrypt with the given cost factor (4..=31)
    Bcrypt { cost: u32 },
    /// Argon2id with default parameters
    Argon2,
}

impl Default for HashScheme {
    fn default() -> Self {
        HashScheme::Bcrypt {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl HashScheme {
    /// Build a scheme from its name and a bcrypt cost
    pub fn from_parts(name: &str, cost: u32) -> StoreResult<Self> {
        let scheme = match name.parse::<SchemeName>()? {
            SchemeName::Bcrypt => HashScheme::Bcrypt { cost },
            SchemeName::Argon2 => HashScheme::Argon2,
        };
        scheme.validate()?;
        Ok(scheme)
    }

    fn validate(&self) -> StoreResult<()> {
        match *self {
            HashScheme::Bcrypt { cost } if !(4..=31).contains(&cost) => Err(
                StoreError::Configuration(format!("bcrypt cost must be within 4..=31, got {cost}")),
            ),
            _ => Ok(()),
        }
    }
}

enum SchemeName {
    Bcrypt,
    Argon2,
}

impl FromStr for SchemeName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(SchemeName::Bcrypt),
            "argon2" => Ok(SchemeName::Argon2),
            other => Err(StoreError::Configuration(format!(
                "Unknown password hash scheme: {other}"
            ))),
        }
    }
}

/// Salted one-way password hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher {
    scheme: HashScheme,
}

impl PasswordHasher {
    pub fn new(scheme: HashScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> HashScheme {
        self.scheme
    }

    /// Hash a plaintext password with a fresh salt
    pub fn hash(&self, plain: &str) -> StoreResult<String> {
        match self.scheme {
            HashScheme::Bcrypt { cost } => bcrypt::hash(plain, cost).map_err(|e| {
                error!(error = %e, "bcrypt hash error");
                StoreError::Hashing(format!("Failed to hash password: {e}"))
            }),
            HashScheme::Argon2 => {
                let salt = SaltString::generate(&mut rand::thread_rng());
                let hash = Argon2::default()
                    .hash_password(plain.as_bytes(), &salt)
                    .map_err(|e| {
                        error!(error = %e, "argon2 hash_password error");
                        StoreError::Hashing(format!("Failed to hash password: {e}"))
                    })?
                    .to_string();
                Ok(hash)
            }
        }
    }

    /// Check a plaintext password against a stored hash
    ///
    /// Returns `Ok(false)` on mismatch and an error only when the hash cannot be
    /// parsed at all. A PHC string that parses but carries no usable digest is
    /// a mismatch.
    pub fn verify(&self, plain: &str, hash: &str) -> StoreResult<bool> {
        if hash.starts_with(ARGON2_PREFIX) {
            let parsed = PasswordHash::new(hash).map_err(|e| {
                StoreError::Hashing(format!("Failed to parse password hash: {e}"))
            })?;
            return Ok(Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok());
        }

        bcrypt::verify(plain, hash)
            .map_err(|e| StoreError::Hashing(format!("Failed to parse password hash: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_bcrypt() -> PasswordHasher {
        PasswordHasher::new(HashScheme::Bcrypt { cost: 4 })
    }

    #[test]
    fn default_scheme_is_bcrypt_cost_10() {
        assert_eq!(
            PasswordHasher::default().scheme(),
            HashScheme::Bcrypt { cost: 10 }
        );
    }

    #[test]
    fn bcrypt_hash_and_verify_roundtrip() {
        let hasher = fast_bcrypt();
        let hash = hasher.hash("Secur3P@ssw0rd!").expect("hashing should succeed");

        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "Secur3P@ssw0rd!");
        assert!(hasher.verify("Secur3P@ssw0rd!", &hash).unwrap());
        assert!(!hasher.verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = fast_bcrypt();
        let a = hasher.hash("correct-horse").unwrap();
        let b = hasher.hash("correct-horse").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn argon2_hash_and_verify_roundtrip() {
        let hasher = PasswordHasher::new(HashScheme::Argon2);
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("correct-horse-battery-staple", &hash).unwrap());
        assert!(!hasher.verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn verify_dispatches_on_stored_hash() {
        let argon2_hash = PasswordHasher::new(HashScheme::Argon2)
            .hash("mixed")
            .unwrap();
        let bcrypt_hash = fast_bcrypt().hash("mixed").unwrap();

        let bcrypt_hasher = fast_bcrypt();
        assert!(bcrypt_hasher.verify("mixed", &argon2_hash).unwrap());
        let argon2_hasher = PasswordHasher::new(HashScheme::Argon2);
        assert!(argon2_hasher.verify("mixed", &bcrypt_hash).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = fast_bcrypt()
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(matches!(err, StoreError::Hashing(_)));

        let err = fast_bcrypt()
            .verify("anything", "$argon2id$v=abc$")
            .unwrap_err();
        assert!(matches!(err, StoreError::Hashing(_)));
    }

    #[test]
    fn verify_treats_digestless_phc_string_as_mismatch() {
        // `garbage` parses as the salt, so there is nothing to compare against.
        assert!(!fast_bcrypt().verify("anything", "$argon2id$garbage").unwrap());
    }

    #[test]
    fn scheme_from_parts() {
        assert_eq!(
            HashScheme::from_parts("bcrypt", 12).unwrap(),
            HashScheme::Bcrypt { cost: 12 }
        );
        assert_eq!(
            HashScheme::from_parts("Argon2", 10).unwrap(),
            HashScheme::Argon2
        );
        assert!(HashScheme::from_parts("md5", 10).is_err());
        assert!(HashScheme::from_parts("bcrypt", 3).is_err());
        assert!(HashScheme::from_parts("bcrypt", 32).is_err());
    }
}
