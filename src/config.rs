use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub leaderboard_size: usize,
    pub max_page_size: u32,
    /// Reject votes on entries created outside the active period.
    pub enforce_window: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("CONTEST_PORT", "1111"),
            leaderboard_size: try_load("CONTEST_LEADERBOARD_SIZE", "10"),
            max_page_size: try_load("CONTEST_MAX_PAGE_SIZE", "100"),
            enforce_window: try_load("CONTEST_ENFORCE_WINDOW", "true"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            leaderboard_size: 10,
            max_page_size: 100,
            enforce_window: true,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
