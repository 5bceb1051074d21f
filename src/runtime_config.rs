//! # Runtime Configuration Module
//!
//! Environment-variable tuning for the `may` coroutine runtime that serves
//! connections.
//!
//! ## Environment Variables
//!
//! ### `FORUMD_STACK_SIZE`
//!
//! Stack size of every connection coroutine. Accepts decimal (`131072`) or
//! hexadecimal (`0x20000`). Default: `0x20000` (128 KB).
//!
//! A connection coroutine runs the TLS handshake, the gzip encoder and the
//! business handler on its own stack, so it needs more room than a bare
//! routing coroutine. Total virtual memory is roughly
//! `stack_size × concurrent_connections`.
//!
//! ```bash
//! export FORUMD_STACK_SIZE=0x40000
//! forumd --config config.json
//! ```

use std::env;

/// Default coroutine stack size (128 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x20000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for connection coroutines in bytes
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_value(env::var("FORUMD_STACK_SIZE").ok().as_deref())
    }

    fn from_value(raw: Option<&str>) -> Self {
        let stack_size = raw
            .and_then(|val| match val.strip_prefix("0x") {
                Some(hex) => usize::from_str_radix(hex, 16).ok(),
                None => val.parse().ok(),
            })
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }

    /// Apply to the global `may` configuration. Must run before the first
    /// coroutine is spawned.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}
