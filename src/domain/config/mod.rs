//! Domain configuration value objects
//!
//! Configuration that carries domain invariants lives here; environment
//! parsing lives in `crate::config`.

pub mod league_config;

pub use league_config::{LeagueConfig, LeagueConfigError, LeagueSettings};
