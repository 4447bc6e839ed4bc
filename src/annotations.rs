//! User annotations: favorites, named favorite lists and comment history.
//!
//! Every mutation is a full read-modify-write of one JSON document. The
//! store holds a lock across the whole cycle so concurrent callers in the
//! same process cannot overwrite each other's changes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rand::Rng;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Result, ScoutError};
use crate::state::{AnnotationState, Comment, DEFAULT_LIST_ID, FavoriteList};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw document storage underneath [`AnnotationStore`].
pub trait AnnotationBackend: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> io::Result<Option<String>>;
    fn write(&self, raw: &str) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnnotationBackend for JsonFileBackend {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, raw: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            doc: Mutex::new(initial),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.doc.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl AnnotationBackend for MemoryBackend {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, raw: &str) -> io::Result<()> {
        *self.doc.lock().unwrap_or_else(|p| p.into_inner()) = Some(raw.to_string());
        Ok(())
    }
}

pub struct AnnotationStore<B: AnnotationBackend = JsonFileBackend> {
    backend: B,
    lock: Mutex<()>,
}

impl AnnotationStore<JsonFileBackend> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileBackend::new(path))
    }
}

impl<B: AnnotationBackend> AnnotationStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current state in canonical shape. Legacy shapes are upgraded and
    /// the upgrade is written back before returning.
    pub fn load(&self) -> Result<AnnotationState> {
        let _guard = self.guard();
        self.load_unlocked()
    }

    pub fn lists(&self) -> Result<BTreeMap<String, FavoriteList>> {
        Ok(self.load()?.favorite_lists)
    }

    pub fn comments_for(&self, player_id: &str) -> Result<Vec<Comment>> {
        Ok(self
            .load()?
            .comments
            .remove(player_id)
            .unwrap_or_default())
    }

    /// Flips membership of `player_id` in `list_id` (the default list when
    /// `None`). Returns the new membership.
    pub fn toggle_favorite(&self, player_id: &str, list_id: Option<&str>) -> Result<bool> {
        require("player_id", player_id)?;
        let list_id = list_id.unwrap_or(DEFAULT_LIST_ID);
        self.mutate(|state| {
            let list = list_mut(state, list_id)?;
            let member = if list.remove(player_id) {
                false
            } else {
                list.insert(player_id);
                true
            };
            if list_id == DEFAULT_LIST_ID {
                state.mirror_favorite(player_id, member);
            }
            Ok(member)
        })
    }

    pub fn add_comment(&self, player_id: &str, text: &str) -> Result<Vec<Comment>> {
        require("player_id", player_id)?;
        require("comment", text)?;
        self.mutate(|state| {
            let entries = state.comments.entry(player_id.to_string()).or_default();
            entries.push(Comment {
                text: text.to_string(),
                timestamp: now_timestamp(),
            });
            Ok(entries.clone())
        })
    }

    pub fn create_list(&self, name: &str, description: Option<&str>) -> Result<String> {
        require("name", name)?;
        self.mutate(|state| {
            let id = new_list_id(&state.favorite_lists);
            state.favorite_lists.insert(
                id.clone(),
                FavoriteList::new(name, description.unwrap_or_default()),
            );
            info!(list_id = %id, name, "favorite list created");
            Ok(id)
        })
    }

    /// `name` is only applied when non-empty; `description` is applied
    /// whenever supplied, including as an empty string.
    pub fn update_list(
        &self,
        list_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<FavoriteList> {
        self.mutate(|state| {
            let list = list_mut(state, list_id)?;
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                list.name = name.to_string();
            }
            if let Some(description) = description {
                list.description = description.to_string();
            }
            Ok(list.clone())
        })
    }

    pub fn delete_list(&self, list_id: &str) -> Result<()> {
        self.mutate(|state| {
            if !state.favorite_lists.contains_key(list_id) {
                return Err(ScoutError::NotFound(format!("list {list_id}")));
            }
            if list_id == DEFAULT_LIST_ID {
                return Err(ScoutError::InvalidOperation(
                    "the default list cannot be deleted".to_string(),
                ));
            }
            state.favorite_lists.remove(list_id);
            info!(list_id, "favorite list deleted");
            Ok(())
        })
    }

    pub fn add_player_to_list(&self, list_id: &str, player_id: &str) -> Result<Vec<String>> {
        require("player_id", player_id)?;
        self.mutate(|state| {
            let list = list_mut(state, list_id)?;
            list.insert(player_id);
            let players = list.players.clone();
            if list_id == DEFAULT_LIST_ID {
                state.mirror_favorite(player_id, true);
            }
            Ok(players)
        })
    }

    pub fn remove_player_from_list(&self, list_id: &str, player_id: &str) -> Result<Vec<String>> {
        require("player_id", player_id)?;
        self.mutate(|state| {
            let list = list_mut(state, list_id)?;
            list.remove(player_id);
            let players = list.players.clone();
            if list_id == DEFAULT_LIST_ID {
                state.mirror_favorite(player_id, false);
            }
            Ok(players)
        })
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Applies one change and persists only if it succeeded.
    fn mutate<T>(&self, change: impl FnOnce(&mut AnnotationState) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut state = self.load_unlocked()?;
        let out = change(&mut state)?;
        self.save_unlocked(&state)?;
        Ok(out)
    }

    fn load_unlocked(&self) -> Result<AnnotationState> {
        let raw = match self.backend.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(AnnotationState::default()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                return Ok(corrupt_defaults(err.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => return Ok(corrupt_defaults(format!("expected an object, found {other}"))),
            Err(err) => return Ok(corrupt_defaults(err.to_string())),
        };
        let (state, upgraded) = migrate(value, &now_timestamp());
        if upgraded {
            info!("annotation document upgraded to current shape");
            self.save_unlocked(&state)?;
        }
        Ok(state)
    }

    fn save_unlocked(&self, state: &AnnotationState) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        self.backend.write(&raw)?;
        Ok(())
    }
}

/// Unreadable documents are not rewritten here; the next mutation replaces them.
fn corrupt_defaults(reason: String) -> AnnotationState {
    let err = ScoutError::StorageCorrupt(reason);
    warn!(%err, "annotation document unreadable, starting from defaults");
    AnnotationState::default()
}

/// Normalizes any historical document shape into [`AnnotationState`].
/// The flag reports whether anything had to change.
pub fn migrate(raw: Value, now: &str) -> (AnnotationState, bool) {
    let Value::Object(mut doc) = raw else {
        warn!("annotation document is not an object, starting from defaults");
        return (AnnotationState::default(), true);
    };
    let mut upgraded = false;

    let flat_favorites = match doc.remove("favorites") {
        Some(Value::Array(items)) => {
            let (ids, dropped) = string_set(items);
            upgraded |= dropped;
            Some(ids)
        }
        Some(_) | None => {
            upgraded = true;
            None
        }
    };

    let comments = match doc.remove("comments") {
        Some(Value::Object(map)) => {
            let (comments, changed) = migrate_comments(map, now);
            upgraded |= changed;
            comments
        }
        Some(_) | None => {
            upgraded = true;
            BTreeMap::new()
        }
    };

    let mut favorite_lists = BTreeMap::new();
    match doc.remove("favorite_lists") {
        Some(Value::Object(map)) => {
            for (id, list) in map {
                match serde_json::from_value::<FavoriteList>(list) {
                    Ok(mut list) => {
                        let (players, dropped) = dedup(list.players);
                        list.players = players;
                        upgraded |= dropped;
                        favorite_lists.insert(id, list);
                    }
                    Err(err) => {
                        warn!(list_id = %id, %err, "dropping malformed favorite list");
                        upgraded = true;
                    }
                }
            }
        }
        Some(_) | None => upgraded = true,
    }
    // The flat set is derived from the default list when it is missing;
    // the default list is rebuilt from the flat set when that is missing.
    let favorites = match (flat_favorites, favorite_lists.get(DEFAULT_LIST_ID)) {
        (Some(ids), _) => ids,
        (None, Some(default)) => default.players.clone(),
        (None, None) => Vec::new(),
    };
    if !favorite_lists.contains_key(DEFAULT_LIST_ID) {
        favorite_lists.insert(
            DEFAULT_LIST_ID.to_string(),
            FavoriteList::default_list(favorites.clone()),
        );
        upgraded = true;
    }

    let state = AnnotationState {
        favorites,
        comments,
        favorite_lists,
    };
    (state, upgraded)
}

fn migrate_comments(map: Map<String, Value>, now: &str) -> (BTreeMap<String, Vec<Comment>>, bool) {
    let mut upgraded = false;
    let mut out = BTreeMap::new();
    for (player_id, value) in map {
        let entries = match value {
            Value::String(text) => {
                upgraded = true;
                if text.is_empty() {
                    continue;
                }
                vec![Comment {
                    text,
                    timestamp: now.to_string(),
                }]
            }
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    match comment_from_value(item, now) {
                        Some((comment, changed)) => {
                            upgraded |= changed;
                            entries.push(comment);
                        }
                        None => upgraded = true,
                    }
                }
                entries
            }
            _ => {
                upgraded = true;
                continue;
            }
        };
        out.insert(player_id, entries);
    }
    (out, upgraded)
}

fn comment_from_value(item: Value, now: &str) -> Option<(Comment, bool)> {
    match item {
        Value::String(text) => Some((
            Comment {
                text,
                timestamp: now.to_string(),
            },
            true,
        )),
        Value::Object(mut obj) => {
            let Some(Value::String(text)) = obj.remove("text") else {
                return None;
            };
            match obj.remove("timestamp") {
                Some(Value::String(timestamp)) => Some((Comment { text, timestamp }, false)),
                _ => Some((
                    Comment {
                        text,
                        timestamp: now.to_string(),
                    },
                    true,
                )),
            }
        }
        _ => None,
    }
}

fn string_set(items: Vec<Value>) -> (Vec<String>, bool) {
    let total = items.len();
    let ids: Vec<String> = items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect();
    let strings = ids.len();
    let (ids, dropped) = dedup(ids);
    (ids, dropped || strings != total)
}

fn dedup(ids: Vec<String>) -> (Vec<String>, bool) {
    let total = ids.len();
    let mut out: Vec<String> = Vec::with_capacity(total);
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    let dropped = out.len() != total;
    (out, dropped)
}

fn list_mut<'a>(state: &'a mut AnnotationState, list_id: &str) -> Result<&'a mut FavoriteList> {
    state
        .favorite_lists
        .get_mut(list_id)
        .ok_or_else(|| ScoutError::NotFound(format!("list {list_id}")))
}

/// Only the empty string is rejected; whitespace is kept as typed.
fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ScoutError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

fn new_list_id(existing: &BTreeMap<String, FavoriteList>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id = format!("{:08x}", rng.r#gen::<u32>());
        if id != DEFAULT_LIST_ID && !existing.contains_key(&id) {
            return id;
        }
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
