//! Shared vocabulary for the action hub.
//!
//! Permission tiers, event kinds, the platform role model and the resolver
//! that maps one onto the other, plus configuration loaded from the
//! environment and the settings file.

pub mod config;
pub mod error;
pub mod permission;
pub mod settings;
pub mod types;

pub use config::Config;
pub use error::ConfigError;
pub use permission::resolve_permission;
pub use settings::Settings;
pub use types::*;
