use chrono::{FixedOffset, Local, Offset};
use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;
use std::time::Duration;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Which persistence layer the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/messbuddy".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "messbuddy".to_string())
    }

    pub fn store_backend() -> StoreBackend {
        let backend: String = Self::figment()
            .extract_inner("store_backend")
            .unwrap_or_else(|_| "mongodb".to_string());

        match backend.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            _ => StoreBackend::MongoDb,
        }
    }

    pub fn sweep_interval() -> Duration {
        let secs: u64 = Self::figment()
            .extract_inner("sweep_interval_secs")
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        Duration::from_secs(secs.max(1))
    }

    /// Offset that defines the local day boundary for check-ins.
    pub fn utc_offset() -> FixedOffset {
        let configured: Option<i32> = Self::figment().extract_inner("utc_offset_minutes").ok();

        configured
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn is_development() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "development"
    }
}
