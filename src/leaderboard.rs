use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::{LeaderboardConfig, DEFAULT_NICKNAME};
use crate::error::Result;
use crate::score::{score_from_number, ScoreEntry};
use crate::storage::KeyValueStore;

/// One row of the persisted blob, read leniently: the page script may have
/// written fractional scores, null names or no date at all. The game id is
/// the map key, not a field.
#[derive(Deserialize, Debug)]
struct StoredScore {
    score: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl StoredScore {
    fn into_entry(self, game: &str) -> Option<ScoreEntry> {
        let score = score_from_number(self.score)?;
        let recorded_at = self
            .date
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Some(ScoreEntry {
            game: game.to_string(),
            score,
            name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NICKNAME.to_string()),
            recorded_at,
        })
    }
}

/// Game id to raw rows. Rows stay as JSON so ones this code cannot read
/// survive a save untouched.
type ScoreMap = Map<String, Value>;

fn parse_blob(json: &str) -> Result<ScoreMap> {
    Ok(serde_json::from_str(json)?)
}

/// Recent score history per game, kept under a single localStorage key.
pub struct LocalScoreStore<S> {
    storage: S,
    config: LeaderboardConfig,
}

impl<S: KeyValueStore> LocalScoreStore<S> {
    pub fn new(storage: S, config: LeaderboardConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    fn load(&self) -> Result<ScoreMap> {
        match self.storage.get_item(&self.config.storage_key)? {
            Some(json) => parse_blob(&json),
            None => Ok(ScoreMap::new()),
        }
    }

    fn store(&self, scores: &ScoreMap) -> Result<()> {
        let json = serde_json::to_string(scores)?;
        self.storage.set_item(&self.config.storage_key, &json)
    }

    /// Appends a score stamped with the current time. Returns false when the
    /// write failed or when a blob that was not a JSON object had to be replaced.
    pub fn save(&self, game: &str, score: i64, name: &str) -> bool {
        self.save_entry(self.config.new_entry(game, score, name))
    }

    pub fn save_entry(&self, entry: ScoreEntry) -> bool {
        let raw = match self.storage.get_item(&self.config.storage_key) {
            Ok(raw) => raw,
            Err(e) => {
                // Writing now could clobber a blob we never saw.
                log::warn!("Local scores unreadable, not saving: {e}");
                return false;
            }
        };
        let (mut scores, intact) = match raw.as_deref().map(parse_blob).transpose() {
            Ok(scores) => (scores.unwrap_or_default(), true),
            Err(e) => {
                log::warn!("Local scores corrupt, starting over: {e}");
                (ScoreMap::new(), false)
            }
        };

        let slot = scores
            .entry(entry.game.clone())
            .or_insert_with(|| json!([]));
        if !slot.is_array() {
            log::warn!("Local scores for {} were not a list, resetting them", entry.game);
            *slot = json!([]);
        }
        if let Some(list) = slot.as_array_mut() {
            list.push(json!({
                "score": entry.score,
                "name": entry.name,
                "date": entry.date_string(),
            }));
            // Capacity is by recency: the oldest go first, whatever their score.
            let cap = self.config.max_entries_per_game;
            if list.len() > cap {
                list.drain(..list.len() - cap);
            }
        }

        match self.store(&scores) {
            Ok(()) => intact,
            Err(e) => {
                log::warn!("Local score save failed: {e}");
                false
            }
        }
    }

    /// Highest scores first; equal scores keep their insertion order.
    pub fn top_n(&self, game: &str, n: usize) -> Vec<ScoreEntry> {
        let mut entries = self.entries(game);
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(n);
        entries
    }

    pub fn best(&self, game: &str) -> Option<ScoreEntry> {
        self.top_n(game, 1).into_iter().next()
    }

    /// Readable stored entries for `game`, oldest first.
    pub fn entries(&self, game: &str) -> Vec<ScoreEntry> {
        let mut scores = match self.load() {
            Ok(scores) => scores,
            Err(e) => {
                log::warn!("Local scores unreadable: {e}");
                return Vec::new();
            }
        };
        let Some(Value::Array(rows)) = scores.remove(game) else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<StoredScore>(row) {
                Ok(stored) => stored.into_entry(game),
                Err(e) => {
                    log::debug!("Skipping unreadable {game} score: {e}");
                    None
                }
            })
            .collect()
    }
}
