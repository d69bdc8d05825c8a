#![allow(dead_code)]

use propcast::config::Config;
use propcast::domain::league::League;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Small forests, no accuracy-triggered retraining, no cooldown
pub fn fast_config() -> Config {
    let mut config = Config::default();
    for league in League::ALL {
        let mut settings = config.leagues.get(league).clone();
        settings.primary_trees = 10;
        settings.primary_max_depth = 5;
        settings.ensemble_trees = 15;
        settings.ensemble_max_depth = 6;
        settings.performance_threshold = 0.0;
        config.leagues.set(league, settings);
    }
    config.resilience.rate_limit_cooldown_ms = 0;
    config
}
