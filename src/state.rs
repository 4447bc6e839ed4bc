use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIST_ID: &str = "default";
pub const DEFAULT_LIST_NAME: &str = "Favoritos";
pub const DEFAULT_LIST_DESCRIPTION: &str = "Lista de favoritos predeterminada";

/// One collected player. `market_value` is kept exactly as the source
/// displayed it; the numeric form only exists while ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub position: String,
    pub nationality: String,
    pub club: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    pub market_value: String,
    #[serde(default)]
    pub percentile: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteList {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub players: Vec<String>,
}

impl FavoriteList {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            players: Vec::new(),
        }
    }

    pub fn default_list(players: Vec<String>) -> Self {
        Self {
            name: DEFAULT_LIST_NAME.to_string(),
            description: DEFAULT_LIST_DESCRIPTION.to_string(),
            players,
        }
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }

    /// Returns true when the player was not already present.
    pub fn insert(&mut self, player_id: &str) -> bool {
        if self.contains(player_id) {
            return false;
        }
        self.players.push(player_id.to_string());
        true
    }

    /// Returns true when the player was present.
    pub fn remove(&mut self, player_id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p != player_id);
        self.players.len() != before
    }
}

/// Installation-wide user annotations in their current shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationState {
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<Comment>>,
    #[serde(default)]
    pub favorite_lists: BTreeMap<String, FavoriteList>,
}

impl Default for AnnotationState {
    fn default() -> Self {
        let mut favorite_lists = BTreeMap::new();
        favorite_lists.insert(
            DEFAULT_LIST_ID.to_string(),
            FavoriteList::default_list(Vec::new()),
        );
        Self {
            favorites: Vec::new(),
            comments: BTreeMap::new(),
            favorite_lists,
        }
    }
}

impl AnnotationState {
    pub fn is_favorite(&self, player_id: &str) -> bool {
        self.favorites.iter().any(|p| p == player_id)
    }

    pub fn lists_containing(&self, player_id: &str) -> Vec<String> {
        self.favorite_lists
            .iter()
            .filter(|(_, list)| list.contains(player_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Mirrors a default-list membership change into the legacy flat set.
    pub(crate) fn mirror_favorite(&mut self, player_id: &str, member: bool) {
        if member {
            if !self.is_favorite(player_id) {
                self.favorites.push(player_id.to_string());
            }
        } else {
            self.favorites.retain(|p| p != player_id);
        }
    }
}

/// A ranked player merged with the caller-visible annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedPlayer {
    #[serde(flatten)]
    pub player: PlayerRecord,
    pub favorite: bool,
    pub comments: Vec<Comment>,
    pub lists: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    Elite,
    High,
    Medium,
    Low,
}

impl ValueTier {
    pub fn of(percentile: u8) -> Self {
        match percentile {
            90.. => ValueTier::Elite,
            70..=89 => ValueTier::High,
            40..=69 => ValueTier::Medium,
            _ => ValueTier::Low,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "elite" => Some(ValueTier::Elite),
            "high" => Some(ValueTier::High),
            "medium" => Some(ValueTier::Medium),
            "low" => Some(ValueTier::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerFilter {
    pub search: Option<String>,
    pub club: Option<String>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub tier: Option<ValueTier>,
    pub favorites_only: bool,
}

impl PlayerFilter {
    pub fn matches(&self, row: &AnnotatedPlayer) -> bool {
        let p = &row.player;
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = [&p.name, &p.club, &p.nationality, &p.position]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self.club.as_deref().is_some_and(|c| c != p.club) {
            return false;
        }
        if self.position.as_deref().is_some_and(|c| c != p.position) {
            return false;
        }
        if self.nationality.as_deref().is_some_and(|c| c != p.nationality) {
            return false;
        }
        if self.tier.is_some_and(|t| t != ValueTier::of(p.percentile)) {
            return false;
        }
        if self.favorites_only && !row.favorite {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::ValueTier;

    #[test]
    fn tier_boundaries() {
        assert_eq!(ValueTier::of(100), ValueTier::Elite);
        assert_eq!(ValueTier::of(90), ValueTier::Elite);
        assert_eq!(ValueTier::of(89), ValueTier::High);
        assert_eq!(ValueTier::of(70), ValueTier::High);
        assert_eq!(ValueTier::of(69), ValueTier::Medium);
        assert_eq!(ValueTier::of(40), ValueTier::Medium);
        assert_eq!(ValueTier::of(39), ValueTier::Low);
        assert_eq!(ValueTier::of(0), ValueTier::Low);
    }
}
