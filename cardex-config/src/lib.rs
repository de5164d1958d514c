//! Shared configuration library for cardex.
//!
//! This crate centralizes config loading and validation: a TOML file plus
//! `CARDEX_*` environment overrides resolve into a typed [`Config`], with
//! guard-rail errors for states no operation could survive (a missing API
//! credential) and warnings for states that merely degrade behavior.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{Config, StoreSettings, TmdbSettings};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
