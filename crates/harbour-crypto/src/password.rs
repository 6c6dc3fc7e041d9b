//! Salted one-way hashing for locally stored credentials.
//!
//! Hashes are Argon2id in PHC string form, e.g.
//! `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`. The cost parameters
//! travel with each hash, so raising them only affects new credentials.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

const SALT_LEN: usize = 16;

/// Salt and all-zero digest of [`PasswordHasher::decoy`], base64 without
/// padding as PHC strings require.
const DECOY_SALT: &str = "aGFyYm91ci1kZWNveS0hIQ";
const DECOY_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Hash(e.to_string())
    }
}

/// Argon2id password hasher with configurable cost.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// The `argon2` crate's recommended parameters (19 MiB, 2 passes).
    pub fn new() -> Self {
        Self {
            params: Params::DEFAULT,
        }
    }

    /// A hasher with a custom cost, clamped to what Argon2 accepts.
    pub fn with_cost(memory_kib: u32, passes: u32) -> Self {
        let memory = memory_kib.clamp(Params::MIN_M_COST, Params::MAX_M_COST);
        let passes = passes.clamp(Params::MIN_T_COST, Params::MAX_T_COST);
        Self {
            params: Params::new(memory, passes, 1, None).unwrap_or_default(),
        }
    }

    pub fn memory_kib(&self) -> u32 {
        self.params.m_cost()
    }

    pub fn passes(&self) -> u32 {
        self.params.t_cost()
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt: [u8; SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt)?;
        let hash = self.argon2().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Check `password` against a PHC hash string.
    ///
    /// Returns `false` for a wrong password and for any string it cannot
    /// parse. The comparison is constant time.
    pub fn verify(password: &str, encoded: &str) -> bool {
        match PasswordHash::new(encoded) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// A well-formed hash with this hasher's cost that no password matches.
    ///
    /// Verifying against it costs as much as verifying a real credential.
    pub fn decoy(&self) -> String {
        format!(
            "$argon2id$v=19$m={},t={},p={}${DECOY_SALT}${DECOY_HASH}",
            self.params.m_cost(),
            self.params.t_cost(),
            self.params.p_cost()
        )
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::with_cost(8, 1)
    }

    #[test]
    fn hash_then_verify() {
        let encoded = fast().hash("hunter2").unwrap();
        assert!(PasswordHasher::verify("hunter2", &encoded));
        assert!(!PasswordHasher::verify("hunter3", &encoded));
    }

    #[test]
    fn produces_argon2id_phc_strings() {
        let encoded = fast().hash("hunter2").unwrap();
        assert!(!encoded.contains("hunter2"));
        assert!(encoded.starts_with("$argon2id$v=19$m=8,t=1,p=1$"), "{encoded}");
        let parsed = PasswordHash::new(&encoded).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = fast().hash("same").unwrap();
        let b = fast().hash("same").unwrap();
        assert_ne!(a, b);
        assert!(PasswordHasher::verify("same", &a));
        assert!(PasswordHasher::verify("same", &b));
    }

    #[test]
    fn empty_password_round() {
        let encoded = fast().hash("").unwrap();
        assert!(PasswordHasher::verify("", &encoded));
        assert!(!PasswordHasher::verify(" ", &encoded));
    }

    #[test]
    fn cost_is_read_from_the_hash() {
        let encoded = PasswordHasher::with_cost(16, 2).hash("pw").unwrap();
        assert!(encoded.contains("m=16,t=2,p=1"));
        // Verification does not need the hasher that produced the hash.
        assert!(PasswordHasher::verify("pw", &encoded));
    }

    #[test]
    fn malformed_encodings_fail_closed() {
        assert!(!PasswordHasher::verify("x", ""));
        assert!(!PasswordHasher::verify("x", "x"));
        assert!(!PasswordHasher::verify("x", "blake3$8$00$00"));
        assert!(!PasswordHasher::verify("x", "$argon2id$v=19$m=8,t=1,p=1$!!$!!"));
    }

    #[test]
    fn decoy_parses_and_matches_nothing() {
        let hasher = fast();
        let decoy = hasher.decoy();
        let parsed = PasswordHash::new(&decoy).unwrap();
        assert_eq!(Params::try_from(&parsed).unwrap().m_cost(), 8);
        assert!(!PasswordHasher::verify("", &decoy));
        assert!(!PasswordHasher::verify("hunter2", &decoy));
        assert!(PasswordHash::new(&PasswordHasher::new().decoy()).is_ok());
    }

    #[test]
    fn cost_is_clamped() {
        let tiny = PasswordHasher::with_cost(0, 0);
        assert_eq!(tiny.memory_kib(), Params::MIN_M_COST);
        assert_eq!(tiny.passes(), Params::MIN_T_COST);
        let default = PasswordHasher::default();
        assert_eq!(default.memory_kib(), Params::DEFAULT_M_COST);
        assert_eq!(default.passes(), Params::DEFAULT_T_COST);
    }
}
