//! Business handlers mounted under `/api/`.
//!
//! Every handler has the dispatcher's calling convention plus a reference to
//! the shared [`Services`]; [`crate::registry`] binds them to their paths.

pub mod captcha;
mod editpassword;
mod login;
pub mod password;
mod register;
pub mod store;

pub use captcha::{CaptchaVerifier, DisabledCaptcha, FixedCaptcha};
pub use editpassword::editpassword;
pub use login::{login, logout};
pub use password::{Argon2Hasher, HashError, PasswordHasher};
pub use register::{register, MAX_USERNAME_CHARS, REGISTERED_FORMAT};
pub use store::{MemoryUserStore, StoreError, UserRecord, UserStore};

use crate::config::Config;
use crate::dispatcher::ApiError;
use crate::security::SessionStore;
use std::sync::Arc;
use tracing::warn;

/// argon2 time cost when `auth.hash_cost` is unset.
pub const DEFAULT_HASH_COST: u32 = 2;

/// Collaborators shared by all handlers. Each synchronizes itself.
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub captcha: Arc<dyn CaptchaVerifier>,
    /// `https.captcha == "true"`
    pub captcha_enabled: bool,
}

impl Services {
    /// In-process collaborators configured from `https.captcha` and
    /// `auth.hash_cost`.
    ///
    /// # Errors
    ///
    /// Fails when `auth.hash_cost` is not an accepted argon2 time cost.
    pub fn from_config(config: &Config) -> Result<Self, HashError> {
        let time_cost = config.get_u64_or("auth", "hash_cost", u64::from(DEFAULT_HASH_COST));
        let time_cost = u32::try_from(time_cost).map_err(|e| HashError(e.to_string()))?;
        let captcha_enabled = config.get_bool("https", "captcha");
        if captcha_enabled {
            warn!("CAPTCHA is enabled without a CAPTCHA service; registrations will be refused");
        }
        Ok(Self {
            users: Arc::new(MemoryUserStore::new()),
            sessions: Arc::new(SessionStore::new()),
            hasher: Arc::new(Argon2Hasher::with_time_cost(time_cost)?),
            captcha: Arc::new(DisabledCaptcha),
            captcha_enabled,
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::upstream(e)
    }
}

impl From<HashError> for ApiError {
    fn from(e: HashError) -> Self {
        ApiError::unknown(e)
    }
}
