use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};

use crate::collector::PlayerSource;
use crate::error::{Result, ScoutError};
use crate::market_value::rank_players;
use crate::state::PlayerRecord;

/// Age at which the ranked snapshot is considered stale.
pub const STALE_AFTER: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Stale,
    Absent,
}

/// On-disk snapshot of the last successful ranked collection.
#[derive(Debug, Clone)]
pub struct PlayerCache {
    path: PathBuf,
    max_age: Duration,
}

impl PlayerCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_max_age(path, STALE_AFTER)
    }

    pub fn with_max_age(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn state_at(&self, now: SystemTime) -> CacheState {
        let Ok(meta) = fs::metadata(&self.path) else {
            return CacheState::Absent;
        };
        let Ok(modified) = meta.modified() else {
            return CacheState::Stale;
        };
        // A timestamp in the future counts as brand new.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < self.max_age {
            CacheState::Fresh
        } else {
            CacheState::Stale
        }
    }

    pub fn get_ranked_players(&self, source: &dyn PlayerSource) -> Vec<PlayerRecord> {
        self.get_ranked_players_at(source, SystemTime::now())
    }

    /// Serves the snapshot while fresh, otherwise collects, ranks and
    /// persists. A failed collection falls back to whatever snapshot exists.
    pub fn get_ranked_players_at(
        &self,
        source: &dyn PlayerSource,
        now: SystemTime,
    ) -> Vec<PlayerRecord> {
        match self.state_at(now) {
            CacheState::Fresh => match self.load() {
                Ok(players) => return players,
                Err(err) => warn!(path = %self.path.display(), %err, "fresh cache unreadable, recollecting"),
            },
            CacheState::Stale => info!(source = source.name(), "player cache stale, recollecting"),
            CacheState::Absent => info!(source = source.name(), "no player cache, collecting"),
        }

        match self.refresh_from(source) {
            Ok(players) => players,
            Err(err) => {
                warn!(%err, "collection failed, falling back to previous snapshot");
                self.load_or_empty()
            }
        }
    }

    /// Drops the snapshot and collects again. Returns the number of
    /// records now being served.
    pub fn force_refresh(&self, source: &dyn PlayerSource) -> Result<usize> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "player cache removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(self.get_ranked_players(source).len())
    }

    pub fn load(&self) -> Result<Vec<PlayerRecord>> {
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str::<Vec<PlayerRecord>>(&raw)
            .map_err(|err| ScoutError::StorageCorrupt(format!("{}: {err}", self.path.display())))
    }

    pub fn save(&self, players: &[PlayerRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(players)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn refresh_from(&self, source: &dyn PlayerSource) -> Result<Vec<PlayerRecord>> {
        let raw = source.collect();
        if raw.is_empty() {
            return Err(ScoutError::SourceUnavailable(format!(
                "{} returned no players",
                source.name()
            )));
        }
        let ranked = rank_players(raw);
        match self.save(&ranked) {
            Ok(()) => info!(players = ranked.len(), path = %self.path.display(), "player cache written"),
            Err(err) => error!(%err, "player cache write failed, serving unsaved snapshot"),
        }
        Ok(ranked)
    }

    fn load_or_empty(&self) -> Vec<PlayerRecord> {
        match self.load() {
            Ok(players) => players,
            Err(ScoutError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                error!("no player cache to fall back to, serving empty list");
                Vec::new()
            }
            Err(err) => {
                error!(%err, "player cache unusable, serving empty list");
                Vec::new()
            }
        }
    }
}
