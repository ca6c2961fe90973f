use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_NICKNAME;
use crate::error::{LeaderboardError, Result};

pub const MAX_NAME_CHARS: usize = 18;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub game: String,
    pub score: i64,
    pub name: String,
    #[serde(rename = "date")]
    pub recorded_at: DateTime<Utc>,
}

impl ScoreEntry {
    pub fn new(game: &str, score: i64, name: &str) -> Self {
        Self::recorded_at(game, score, name, Utc::now())
    }

    pub fn recorded_at(game: &str, score: i64, name: &str, at: DateTime<Utc>) -> Self {
        Self {
            game: game.to_string(),
            score,
            name: normalize_nickname(name, MAX_NAME_CHARS),
            recorded_at: at,
        }
    }

    pub fn date_string(&self) -> String {
        self.recorded_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

/// Where a leaderboard result came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Local,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Remote => "remote",
            Source::Local => "local",
        }
    }
}

/// Trims, caps at `max_chars` characters and falls back to `Anon` when blank.
pub fn normalize_nickname(raw: &str, max_chars: usize) -> String {
    let name: String = raw.trim().chars().take(max_chars).collect();
    let name = name.trim_end();
    if name.is_empty() {
        DEFAULT_NICKNAME.to_string()
    } else {
        name.to_string()
    }
}

/// JS numbers become integer scores by truncation; NaN and infinities are refused.
pub fn score_from_number(value: f64) -> Option<i64> {
    value.is_finite().then(|| value as i64)
}

/// Parses a score typed in by the player. Blank input counts as cancelling.
pub fn parse_manual_score(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LeaderboardError::Cancelled);
    }
    raw.parse::<i64>()
        .map_err(|_| LeaderboardError::InvalidScore(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_is_trimmed_and_capped() {
        assert_eq!(normalize_nickname("  Ana  ", MAX_NAME_CHARS), "Ana");
        assert_eq!(
            normalize_nickname("abcdefghijklmnopqrstuvwxyz", MAX_NAME_CHARS),
            "abcdefghijklmnopqr"
        );
        assert_eq!(normalize_nickname("   ", MAX_NAME_CHARS), "Anon");
        assert_eq!(normalize_nickname("", MAX_NAME_CHARS), "Anon");
    }

    #[test]
    fn test_nickname_counts_chars_not_bytes() {
        let name = "ğüşıöçĞÜŞİÖÇğüşıöçĞÜ";
        let normalized = normalize_nickname(name, MAX_NAME_CHARS);
        assert_eq!(normalized.chars().count(), 18);
    }

    #[test]
    fn test_score_from_number() {
        assert_eq!(score_from_number(42.0), Some(42));
        assert_eq!(score_from_number(12.9), Some(12));
        assert_eq!(score_from_number(-3.5), Some(-3));
        assert_eq!(score_from_number(f64::NAN), None);
        assert_eq!(score_from_number(f64::INFINITY), None);
    }

    #[test]
    fn test_manual_score() {
        assert_eq!(parse_manual_score(" 120 ").unwrap(), 120);
        assert_eq!(parse_manual_score("-5").unwrap(), -5);
        assert!(matches!(
            parse_manual_score("abc"),
            Err(LeaderboardError::InvalidScore(_))
        ));
        assert!(matches!(
            parse_manual_score("  "),
            Err(LeaderboardError::Cancelled)
        ));
    }

    #[test]
    fn test_entry_serializes_date_as_iso8601() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let entry = ScoreEntry::recorded_at("prime", 42, "Ana", at);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["game"], "prime");
        assert_eq!(json["score"], 42);
        assert_eq!(json["name"], "Ana");
        assert!(json["date"].as_str().unwrap().starts_with("2024-03-01T10:20:30.123"));
        assert_eq!(entry.date_string(), "2024-03-01T10:20:30.123Z");
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Source::Remote.as_str(), "remote");
        assert_eq!(serde_json::to_string(&Source::Local).unwrap(), "\"local\"");
    }
}
