use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::player_cache::STALE_AFTER;

pub const DEFAULT_BASE_URL: &str = "https://www.transfermarkt.com";
pub const DEFAULT_LEAGUE_PATH: &str = "/laliga/startseite/wettbewerb/ES1";
pub const DEFAULT_LEAGUE_NAME: &str = "LaLiga";

const PLAYERS_FILE: &str = "players.json";
const USER_DATA_FILE: &str = "user_data.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub source: SourceKind,
    pub base_url: String,
    pub league_url: String,
    pub league_name: String,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub fetch_parallelism: usize,
    pub request_timeout: Duration,
    pub synthetic_seed: Option<u64>,
    pub synthetic_per_club: usize,
    pub stale_after: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            source: SourceKind::Synthetic,
            base_url: DEFAULT_BASE_URL.to_string(),
            league_url: format!("{DEFAULT_BASE_URL}{DEFAULT_LEAGUE_PATH}"),
            league_name: DEFAULT_LEAGUE_NAME.to_string(),
            delay_min: Duration::from_millis(1000),
            delay_max: Duration::from_millis(3000),
            fetch_parallelism: 1,
            request_timeout: Duration::from_secs(15),
            synthetic_seed: None,
            synthetic_per_club: 25,
            stale_after: STALE_AFTER,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let base_url = opt_env("SCOUT_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let league_url =
            opt_env("SCOUT_LEAGUE_URL").unwrap_or_else(|| format!("{base_url}{DEFAULT_LEAGUE_PATH}"));
        let source = match opt_env("SCOUT_SOURCE").map(|v| v.to_lowercase()).as_deref() {
            Some("live") => SourceKind::Live,
            _ => SourceKind::Synthetic,
        };
        let delay_min = parse_env::<u64>("SCOUT_DELAY_MIN_MS").unwrap_or(1000);
        let delay_max = parse_env::<u64>("SCOUT_DELAY_MAX_MS")
            .unwrap_or(3000)
            .max(delay_min);

        Self {
            data_dir: opt_env("SCOUT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            source,
            base_url,
            league_url,
            league_name: opt_env("SCOUT_LEAGUE_NAME").unwrap_or(defaults.league_name),
            delay_min: Duration::from_millis(delay_min),
            delay_max: Duration::from_millis(delay_max),
            fetch_parallelism: parse_env::<usize>("FETCH_PARALLELISM")
                .unwrap_or(defaults.fetch_parallelism)
                .clamp(1, 8),
            request_timeout: Duration::from_secs(
                parse_env::<u64>("REQUEST_TIMEOUT_SECS")
                    .unwrap_or(15)
                    .clamp(1, 120),
            ),
            synthetic_seed: parse_env::<u64>("SCOUT_SYNTHETIC_SEED"),
            synthetic_per_club: parse_env::<usize>("SCOUT_SYNTHETIC_PER_CLUB")
                .unwrap_or(defaults.synthetic_per_club)
                .clamp(1, 60),
            stale_after: defaults.stale_after,
        }
    }

    pub fn players_path(&self) -> PathBuf {
        self.data_dir.join(PLAYERS_FILE)
    }

    pub fn user_data_path(&self) -> PathBuf {
        self.data_dir.join(USER_DATA_FILE)
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    opt_env(key).and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn club_fetches_are_sequential_by_default() {
        let config = Config::default();
        assert_eq!(config.fetch_parallelism, 1);
        assert!(config.delay_min <= config.delay_max);
    }
}
