//! Core configuration for sdn-diag
//!
//! # Modules
//!
//! - `config`: environment file loading and typed getters
//! - `settings`: runtime settings (command timeouts, privilege escalation)

pub mod config;
pub mod settings;

pub use settings::Settings;
