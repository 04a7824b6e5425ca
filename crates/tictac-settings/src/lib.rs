//! # tictac-settings
//!
//! Layered configuration for the tictac room server.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`Settings::default()`]
//! 2. **Settings file**: an optional JSON file, deep-merged over defaults
//! 3. **Environment variables**: `TICTAC_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tictac_settings::load_settings;
//!
//! let settings = load_settings(Some(Path::new("tictac.json"))).unwrap();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_with, validate};
pub use types::*;
