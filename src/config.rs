use chrono::Utc;
use serde::Deserialize;

use crate::error::{LeaderboardError, Result};
use crate::score::{normalize_nickname, ScoreEntry, MAX_NAME_CHARS};

pub const DEFAULT_STORAGE_KEY: &str = "mathgames_scores_v1";
pub const DEFAULT_COLLECTION: &str = "scores";
pub const DEFAULT_NICKNAME: &str = "Anon";

/// Knobs shared by the local store, the sync client and the page glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardConfig {
    pub storage_key: String,
    /// Entries kept per game; the oldest are dropped first.
    pub max_entries_per_game: usize,
    pub default_limit: usize,
    pub collection: String,
    pub max_name_chars: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_entries_per_game: 50,
            default_limit: 10,
            collection: DEFAULT_COLLECTION.to_string(),
            max_name_chars: MAX_NAME_CHARS,
        }
    }
}

impl LeaderboardConfig {
    /// A new entry stamped now, its nickname held to `max_name_chars`.
    pub fn new_entry(&self, game: &str, score: i64, name: &str) -> ScoreEntry {
        ScoreEntry {
            game: game.to_string(),
            score,
            name: normalize_nickname(name, self.max_name_chars),
            recorded_at: Utc::now(),
        }
    }
}

/// Firebase web config as pasted from the console into `window.FIREBASE_CONFIG`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_database_id")]
    pub database_id: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

fn default_database_id() -> String {
    "(default)".to_string()
}

impl FirebaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LeaderboardError::InvalidConfig("apiKey is missing".into()));
        }
        if self.project_id.trim().is_empty() {
            return Err(LeaderboardError::InvalidConfig("projectId is missing".into()));
        }
        Ok(())
    }

    /// Reads `window.FIREBASE_CONFIG`. `None` means local-only mode.
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let value = js_sys::Reflect::get(&window, &"FIREBASE_CONFIG".into()).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        match serde_wasm_bindgen::from_value::<FirebaseConfig>(value) {
            Ok(config) => Some(config),
            Err(e) => {
                // Still counts as "configured"; connecting will report it as invalid.
                log::warn!("FIREBASE_CONFIG could not be read: {e}");
                Some(FirebaseConfig::default())
            }
        }
    }
}
