//! Password hashing collaborator (argon2id, PHC strings).

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Salt length in bytes.
pub const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashError(pub String);

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "password hashing failed: {}", self.0)
    }
}

impl std::error::Error for HashError {}

pub trait PasswordHasher: Send + Sync {
    /// Hash with a fresh random salt.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Check `password` against a stored hash. Malformed hashes never verify.
    fn verify(&self, password: &str, hash: &str) -> bool;

    /// Do the work of a failed [`verify`](Self::verify) when there is no
    /// stored hash, so unknown accounts cost as much as known ones.
    fn verify_decoy(&self, password: &str);
}

pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    /// Hash of a random secret at the configured costs.
    decoy: String,
}

impl Argon2Hasher {
    /// argon2id with the given memory (KiB) and time costs, one lane.
    ///
    /// # Errors
    ///
    /// Fails when the costs are outside argon2's accepted range.
    pub fn with_costs(memory_kib: u32, time_cost: u32) -> Result<Self, HashError> {
        let params =
            Params::new(memory_kib, time_cost, 1, None).map_err(|e| HashError(e.to_string()))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self, HashError> {
        let mut hasher = Self {
            argon2,
            decoy: String::new(),
        };
        let mut secret = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut secret);
        hasher.decoy = hasher.hash(&URL_SAFE_NO_PAD.encode(secret))?;
        Ok(hasher)
    }

    /// Default memory cost with a configurable time cost.
    ///
    /// # Errors
    ///
    /// Fails when `time_cost` is zero.
    pub fn with_time_cost(time_cost: u32) -> Result<Self, HashError> {
        Self::with_costs(Params::DEFAULT_M_COST, time_cost)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError(e.to_string()))?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| HashError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    fn verify_decoy(&self, password: &str) {
        let _ = self.verify(password, &self.decoy);
    }
}
