use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::annotations::{AnnotationBackend, AnnotationStore, JsonFileBackend};
use crate::collector::{PlayerSource, TransfermarktSource};
use crate::config::{Config, SourceKind};
use crate::error::Result;
use crate::fake_feed::SyntheticSource;
use crate::player_cache::PlayerCache;
use crate::state::{AnnotatedPlayer, AnnotationState, Comment, FavoriteList, PlayerFilter, PlayerRecord};

/// Entry point for request handlers: ranked players merged with the
/// user's annotations, plus every annotation command.
pub struct ScoutService<B: AnnotationBackend = JsonFileBackend> {
    cache: PlayerCache,
    annotations: AnnotationStore<B>,
    source: Box<dyn PlayerSource>,
}

impl ScoutService<JsonFileBackend> {
    pub fn from_config(config: &Config) -> Self {
        let source: Box<dyn PlayerSource> = match config.source {
            SourceKind::Live => Box::new(TransfermarktSource::from_config(config)),
            SourceKind::Synthetic => Box::new(SyntheticSource::from_config(config)),
        };
        Self::new(
            PlayerCache::with_max_age(config.players_path(), config.stale_after),
            AnnotationStore::open(config.user_data_path()),
            source,
        )
    }
}

impl<B: AnnotationBackend> ScoutService<B> {
    pub fn new(cache: PlayerCache, annotations: AnnotationStore<B>, source: Box<dyn PlayerSource>) -> Self {
        Self {
            cache,
            annotations,
            source,
        }
    }

    pub fn cache(&self) -> &PlayerCache {
        &self.cache
    }

    pub fn annotations(&self) -> &AnnotationStore<B> {
        &self.annotations
    }

    pub fn get_ranked_players(&self) -> Vec<PlayerRecord> {
        self.cache.get_ranked_players(self.source.as_ref())
    }

    pub fn force_refresh(&self) -> Result<usize> {
        self.cache.force_refresh(self.source.as_ref())
    }

    pub fn annotated_players(&self, filter: &PlayerFilter) -> Result<Vec<AnnotatedPlayer>> {
        self.annotated_players_at(filter, SystemTime::now())
    }

    /// Highest percentile first; ties keep a stable order by name.
    pub fn annotated_players_at(
        &self,
        filter: &PlayerFilter,
        now: SystemTime,
    ) -> Result<Vec<AnnotatedPlayer>> {
        let players = self.cache.get_ranked_players_at(self.source.as_ref(), now);
        let state = self.annotations.load()?;
        let mut rows: Vec<AnnotatedPlayer> = players
            .into_iter()
            .map(|player| merge(player, &state))
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by(|a, b| {
            b.player
                .percentile
                .cmp(&a.player.percentile)
                .then_with(|| a.player.name.cmp(&b.player.name))
        });
        Ok(rows)
    }

    pub fn annotation_state(&self) -> Result<AnnotationState> {
        self.annotations.load()
    }

    pub fn favorite_lists(&self) -> Result<BTreeMap<String, FavoriteList>> {
        self.annotations.lists()
    }

    pub fn toggle_favorite(&self, player_id: &str, list_id: Option<&str>) -> Result<bool> {
        self.annotations.toggle_favorite(player_id, list_id)
    }

    pub fn add_comment(&self, player_id: &str, text: &str) -> Result<Vec<Comment>> {
        self.annotations.add_comment(player_id, text)
    }

    pub fn create_list(&self, name: &str, description: Option<&str>) -> Result<String> {
        self.annotations.create_list(name, description)
    }

    pub fn update_list(
        &self,
        list_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<FavoriteList> {
        self.annotations.update_list(list_id, name, description)
    }

    pub fn delete_list(&self, list_id: &str) -> Result<()> {
        self.annotations.delete_list(list_id)
    }

    pub fn add_player_to_list(&self, list_id: &str, player_id: &str) -> Result<Vec<String>> {
        self.annotations.add_player_to_list(list_id, player_id)
    }

    pub fn remove_player_from_list(&self, list_id: &str, player_id: &str) -> Result<Vec<String>> {
        self.annotations.remove_player_from_list(list_id, player_id)
    }
}

fn merge(player: PlayerRecord, state: &AnnotationState) -> AnnotatedPlayer {
    let favorite = state.is_favorite(&player.id);
    let comments = state.comments.get(&player.id).cloned().unwrap_or_default();
    let lists = state.lists_containing(&player.id);
    AnnotatedPlayer {
        player,
        favorite,
        comments,
        lists,
    }
}
