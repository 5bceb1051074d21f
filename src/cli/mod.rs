//! # CLI Module
//!
//! Command-line entry point of the `forumd` binary.
//!
//! ## Commands
//!
//! ### `serve` (default)
//!
//! ```bash
//! forumd serve --config config.json --root . --web-dir web
//! ```
//!
//! Loads the configuration, mounts the API handlers, data files and the
//! frontend bundle, and serves until SIGINT/SIGTERM.
//!
//! ### `routes`
//!
//! Prints the registered `/api/` routes.
//!
//! ### `config`
//!
//! Prints the merged configuration as JSON, secrets redacted.
//!
//! ## Global Options
//!
//! - `--config <FILE>` - custom configuration overlay (env `FORUMD_CONFIG`)
//! - `--log-format <text|json>` - log output format

mod commands;


pub use commands::{run_cli, serve, Cli, Commands, ServeArgs};
