//! Per-league Configuration Value Objects
//!
//! Every supported league has a `LeagueSettings` record; the full set is a
//! typed map keyed by the closed `League` enumeration and validated once at
//! startup. Overrides may be supplied as TOML:
//!
//! ```toml
//! [NBA]
//! base_interval_days = 10
//! performance_threshold = 0.8
//! ```

use crate::domain::league::League;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_BASE_INTERVAL_DAYS: u32 = 14;
pub const DEFAULT_MIN_INTERVAL_DAYS: u32 = 7;
pub const DEFAULT_MAX_INTERVAL_DAYS: u32 = 30;
pub const DEFAULT_PERFORMANCE_THRESHOLD: f64 = 0.85;

#[derive(Debug, Error, PartialEq)]
pub enum LeagueConfigError {
    #[error("Unknown league in config: {0}")]
    UnknownLeague(String),

    #[error("Invalid interval bounds for {league}: min {min} > max {max}")]
    InvalidBounds { league: League, min: u32, max: u32 },

    #[error("Invalid interval for {league}: {field} must be positive")]
    ZeroInterval { league: League, field: String },

    #[error("Invalid performance threshold for {league}: {value}. Must be between 0.0 and 1.0")]
    InvalidThreshold { league: League, value: f64 },

    #[error("Invalid forest parameter for {league}: {field} must be positive")]
    InvalidForest { league: League, field: String },

    #[error("Failed to parse league config TOML: {0}")]
    Parse(String),
}

/// Retraining cadence and model sizing for one league
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueSettings {
    /// Days between scheduled retrains, before clamping
    pub base_interval_days: u32,
    pub min_interval_days: u32,
    pub max_interval_days: u32,
    /// Most recent holdout accuracy below this forces a retrain
    pub performance_threshold: f64,
    pub primary_trees: u16,
    pub primary_max_depth: u16,
    pub ensemble_trees: u16,
    pub ensemble_max_depth: u16,
}

impl Default for LeagueSettings {
    fn default() -> Self {
        Self {
            base_interval_days: DEFAULT_BASE_INTERVAL_DAYS,
            min_interval_days: DEFAULT_MIN_INTERVAL_DAYS,
            max_interval_days: DEFAULT_MAX_INTERVAL_DAYS,
            performance_threshold: DEFAULT_PERFORMANCE_THRESHOLD,
            primary_trees: 50,
            primary_max_depth: 6,
            ensemble_trees: 150,
            ensemble_max_depth: 10,
        }
    }
}

impl LeagueSettings {
    /// Base interval clamped into `[min_interval_days, max_interval_days]`
    pub fn effective_interval_days(&self) -> u32 {
        self.base_interval_days
            .clamp(self.min_interval_days, self.max_interval_days)
    }

    fn validate(&self, league: League) -> Result<(), LeagueConfigError> {
        if self.min_interval_days == 0 {
            return Err(LeagueConfigError::ZeroInterval {
                league,
                field: "min_interval_days".to_string(),
            });
        }
        if self.base_interval_days == 0 {
            return Err(LeagueConfigError::ZeroInterval {
                league,
                field: "base_interval_days".to_string(),
            });
        }
        if self.min_interval_days > self.max_interval_days {
            return Err(LeagueConfigError::InvalidBounds {
                league,
                min: self.min_interval_days,
                max: self.max_interval_days,
            });
        }
        if !(0.0..=1.0).contains(&self.performance_threshold) {
            return Err(LeagueConfigError::InvalidThreshold {
                league,
                value: self.performance_threshold,
            });
        }
        for (field, value) in [
            ("primary_trees", self.primary_trees),
            ("primary_max_depth", self.primary_max_depth),
            ("ensemble_trees", self.ensemble_trees),
            ("ensemble_max_depth", self.ensemble_max_depth),
        ] {
            if value == 0 {
                return Err(LeagueConfigError::InvalidForest {
                    league,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Partial settings as read from TOML; unset fields keep their defaults
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LeagueSettingsOverride {
    base_interval_days: Option<u32>,
    min_interval_days: Option<u32>,
    max_interval_days: Option<u32>,
    performance_threshold: Option<f64>,
    primary_trees: Option<u16>,
    primary_max_depth: Option<u16>,
    ensemble_trees: Option<u16>,
    ensemble_max_depth: Option<u16>,
}

impl LeagueSettingsOverride {
    fn apply(self, base: &mut LeagueSettings) {
        if let Some(v) = self.base_interval_days {
            base.base_interval_days = v;
        }
        if let Some(v) = self.min_interval_days {
            base.min_interval_days = v;
        }
        if let Some(v) = self.max_interval_days {
            base.max_interval_days = v;
        }
        if let Some(v) = self.performance_threshold {
            base.performance_threshold = v;
        }
        if let Some(v) = self.primary_trees {
            base.primary_trees = v;
        }
        if let Some(v) = self.primary_max_depth {
            base.primary_max_depth = v;
        }
        if let Some(v) = self.ensemble_trees {
            base.ensemble_trees = v;
        }
        if let Some(v) = self.ensemble_max_depth {
            base.ensemble_max_depth = v;
        }
    }
}

/// Settings for every league. Always total over `League::ALL`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueConfig {
    settings: HashMap<League, LeagueSettings>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            settings: League::ALL
                .iter()
                .map(|l| (*l, LeagueSettings::default()))
                .collect(),
        }
    }
}

impl LeagueConfig {
    /// Defaults with TOML overrides applied, then validated
    pub fn from_toml_str(content: &str) -> Result<Self, LeagueConfigError> {
        let overrides: BTreeMap<String, LeagueSettingsOverride> =
            toml::from_str(content).map_err(|e| LeagueConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();
        for (key, ovr) in overrides {
            let league = League::from_str(&key)
                .map_err(|_| LeagueConfigError::UnknownLeague(key.clone()))?;
            if let Some(settings) = config.settings.get_mut(&league) {
                ovr.apply(settings);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LeagueConfigError> {
        for league in League::ALL {
            self.get(league).validate(league)?;
        }
        Ok(())
    }

    pub fn get(&self, league: League) -> &LeagueSettings {
        // The map is built from League::ALL so every key is present.
        &self.settings[&league]
    }

    pub fn set(&mut self, league: League, settings: LeagueSettings) {
        self.settings.insert(league, settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_league() {
        let config = LeagueConfig::default();
        for league in League::ALL {
            assert_eq!(config.get(league).base_interval_days, 14);
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_is_clamped() {
        let mut s = LeagueSettings::default();
        s.base_interval_days = 3;
        assert_eq!(s.effective_interval_days(), 7);
        s.base_interval_days = 90;
        assert_eq!(s.effective_interval_days(), 30);
    }

    #[test]
    fn test_toml_overrides() {
        let config = LeagueConfig::from_toml_str(
            r#"
            [NBA]
            base_interval_days = 10
            performance_threshold = 0.8

            [nfl]
            ensemble_trees = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.get(League::Nba).base_interval_days, 10);
        assert!((config.get(League::Nba).performance_threshold - 0.8).abs() < 1e-9);
        assert_eq!(config.get(League::Nfl).ensemble_trees, 40);
        assert_eq!(config.get(League::Mlb).base_interval_days, 14);
    }

    #[test]
    fn test_unknown_league_rejected() {
        let err = LeagueConfig::from_toml_str("[XFL]\nbase_interval_days = 3\n").unwrap_err();
        assert_eq!(err, LeagueConfigError::UnknownLeague("XFL".to_string()));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = LeagueConfig::from_toml_str("[NHL]\nperformance_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, LeagueConfigError::InvalidThreshold { .. }));
    }
}
