//! Remote score storage behind a small capability seam.
//!
//! The sync client only ever talks to a [`RemoteScoreBackend`]; which one it
//! gets is decided once, from whether remote configuration exists.

use crate::config::LeaderboardConfig;
use crate::error::{LeaderboardError, Result};
use crate::score::ScoreEntry;

pub mod firestore;

pub use firestore::FirestoreBackend;

/// A shared, append-only collection of scores, queryable by game.
///
/// Futures are not `Send`; everything runs on the page's event loop.
#[allow(async_fn_in_trait)]
pub trait RemoteScoreBackend: Sized {
    type Config;

    /// Builds a connection handle. Called lazily, and again only after a failure.
    async fn connect(config: &Self::Config, settings: &LeaderboardConfig) -> Result<Self>;

    /// Up to `limit` entries for `game`, highest score first.
    async fn query(&self, game: &str, limit: usize) -> Result<Vec<ScoreEntry>>;

    async fn append(&self, entry: &ScoreEntry) -> Result<()>;
}

/// Backend for local-only mode. It never connects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl RemoteScoreBackend for NullBackend {
    type Config = ();

    async fn connect(_config: &(), _settings: &LeaderboardConfig) -> Result<Self> {
        Err(LeaderboardError::NotConfigured)
    }

    async fn query(&self, _game: &str, _limit: usize) -> Result<Vec<ScoreEntry>> {
        Err(LeaderboardError::NotConfigured)
    }

    async fn append(&self, _entry: &ScoreEntry) -> Result<()> {
        Err(LeaderboardError::NotConfigured)
    }
}
