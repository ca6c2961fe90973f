use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::RemoteScoreBackend;
use crate::config::{FirebaseConfig, LeaderboardConfig, DEFAULT_NICKNAME};
use crate::error::{LeaderboardError, Result};
use crate::score::ScoreEntry;

const FIRESTORE_HOST: &str = "https://firestore.googleapis.com/v1";

/// Firestore over its REST API, keyed by the web API key.
#[derive(Debug, Clone)]
pub struct FirestoreBackend {
    run_query_url: String,
    create_document_url: String,
    collection: String,
}

impl FirestoreBackend {
    pub fn new(config: &FirebaseConfig, collection: &str) -> Result<Self> {
        config.validate()?;
        let database = [
            "projects",
            config.project_id.trim(),
            "databases",
            config.database_id.as_str(),
        ];
        let api_key = config.api_key.trim();
        Ok(Self {
            run_query_url: endpoint(&database, &["documents:runQuery"], api_key)?,
            create_document_url: endpoint(&database, &["documents", collection], api_key)?,
            collection: collection.to_string(),
        })
    }

    fn run_query_url(&self) -> &str {
        &self.run_query_url
    }

    fn create_document_url(&self) -> &str {
        &self.create_document_url
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<String> {
        let request = gloo_net::http::Request::post(url)
            .json(body)
            .map_err(|e| LeaderboardError::Network(e.to_string()))?;
        let resp = request
            .send()
            .await
            .map_err(|e| LeaderboardError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LeaderboardError::Network(e.to_string()))?;
        if !resp.ok() {
            return Err(LeaderboardError::Http { status, body: text });
        }
        Ok(text)
    }
}

impl RemoteScoreBackend for FirestoreBackend {
    type Config = FirebaseConfig;

    async fn connect(config: &FirebaseConfig, settings: &LeaderboardConfig) -> Result<Self> {
        Self::new(config, &settings.collection)
    }

    async fn query(&self, game: &str, limit: usize) -> Result<Vec<ScoreEntry>> {
        let body = run_query_body(&self.collection, game, limit);
        let text = self.post(self.run_query_url(), &body).await?;
        let entries = decode_run_query(&text, game)?;
        log::debug!("Firestore returned {} scores for {game}", entries.len());
        Ok(entries)
    }

    async fn append(&self, entry: &ScoreEntry) -> Result<()> {
        let body = encode_document(entry);
        self.post(self.create_document_url(), &body).await?;
        Ok(())
    }
}

fn run_query_body(collection: &str, game: &str, limit: usize) -> serde_json::Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "game" },
                    "op": "EQUAL",
                    "value": { "stringValue": game }
                }
            },
            "orderBy": [{
                "field": { "fieldPath": "score" },
                "direction": "DESCENDING"
            }],
            "limit": limit
        }
    })
}

fn encode_document(entry: &ScoreEntry) -> serde_json::Value {
    json!({
        "fields": {
            "game": { "stringValue": entry.game },
            "name": { "stringValue": entry.name },
            // int64 travels as a decimal string
            "score": { "integerValue": entry.score.to_string() },
            "date": { "stringValue": entry.date_string() }
        }
    })
}

#[derive(Deserialize)]
struct RunQueryRow {
    document: Option<Document>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    integer_value: Option<serde_json::Value>,
    double_value: Option<f64>,
}

impl FieldValue {
    fn as_i64(&self) -> Option<i64> {
        if let Some(v) = &self.integer_value {
            return match v {
                serde_json::Value::String(s) => s.parse().ok(),
                other => other.as_i64(),
            };
        }
        self.double_value.map(|d| d as i64)
    }
}

fn decode_run_query(body: &str, game: &str) -> Result<Vec<ScoreEntry>> {
    let rows: Vec<RunQueryRow> = serde_json::from_str(body)
        .map_err(|e| LeaderboardError::MalformedResponse(e.to_string()))?;

    let mut entries = Vec::with_capacity(rows.len());
    for doc in rows.into_iter().filter_map(|row| row.document) {
        let Some(score) = doc.fields.get("score").and_then(FieldValue::as_i64) else {
            log::debug!("Skipping Firestore document without a score");
            continue;
        };
        let text = |key: &str| {
            doc.fields
                .get(key)
                .and_then(|v| v.string_value.clone())
        };
        let recorded_at = text("date")
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        entries.push(ScoreEntry {
            game: text("game").unwrap_or_else(|| game.to_string()),
            score,
            name: text("name").unwrap_or_else(|| DEFAULT_NICKNAME.to_string()),
            recorded_at,
        });
    }
    Ok(entries)
}

/// Joins path segments onto the REST root, percent-encoding each one, and adds the API key.
fn endpoint(database: &[&str], tail: &[&str], api_key: &str) -> Result<String> {
    let mut url = Url::parse(FIRESTORE_HOST)
        .map_err(|e| LeaderboardError::InvalidConfig(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| LeaderboardError::InvalidConfig(format!("{FIRESTORE_HOST} cannot take a path")))?
        .extend(database)
        .extend(tail);
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url.into())
}
