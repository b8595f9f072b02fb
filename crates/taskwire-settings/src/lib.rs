//! # taskwire-settings
//!
//! Settings for the taskwire gateway and client controller.
//!
//! Loading flow:
//! 1. Start with compiled [`TaskwireSettings::default()`]
//! 2. If `~/.taskwire/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TASKWIRE_*` environment overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use types::TaskwireSettings;
