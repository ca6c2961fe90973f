use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use serde::Serialize;

use crate::error::Result;
use crate::leaderboard::LocalScoreStore;
use crate::remote::RemoteScoreBackend;
use crate::score::{ScoreEntry, Source};
use crate::storage::KeyValueStore;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub source: Source,
    pub items: Vec<ScoreEntry>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitResult {
    pub ok: bool,
    pub source: Source,
}

/// How a remote-then-local call was served.
enum Served<T> {
    Remote(T),
    /// The remote call failed and the local path ran instead.
    Fallback(T),
    /// No remote handle; only the local path ran.
    LocalOnly(T),
}

/// Reads and writes scores remote-first, falling back to the local store.
///
/// The remote handle is created lazily by [`init_remote_if_configured`] and
/// kept for the life of the client. Without remote configuration the client
/// stays local-only and never touches the network.
///
/// [`init_remote_if_configured`]: LeaderboardClient::init_remote_if_configured
pub struct LeaderboardClient<S, B: RemoteScoreBackend> {
    local: LocalScoreStore<S>,
    remote_config: RefCell<Option<Rc<B::Config>>>,
    remote: RefCell<Option<Rc<B>>>,
}

impl<S: KeyValueStore, B: RemoteScoreBackend> LeaderboardClient<S, B> {
    pub fn new(local: LocalScoreStore<S>, remote_config: Option<B::Config>) -> Self {
        Self {
            local,
            remote_config: RefCell::new(remote_config.map(Rc::new)),
            remote: RefCell::new(None),
        }
    }

    pub fn local_only(local: LocalScoreStore<S>) -> Self {
        Self::new(local, None)
    }

    pub fn local(&self) -> &LocalScoreStore<S> {
        &self.local
    }

    pub fn is_configured(&self) -> bool {
        self.remote_config.borrow().is_some()
    }

    /// Supplies remote configuration that showed up after the client was
    /// built. Ignored when the client already has some.
    pub fn configure_remote(&self, config: B::Config) -> bool {
        let mut slot = self.remote_config.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Rc::new(config));
        true
    }

    pub fn is_remote_ready(&self) -> bool {
        self.remote.borrow().is_some()
    }

    /// Connects once. A failed attempt leaves no handle, so a later call retries.
    pub async fn init_remote_if_configured(&self) -> bool {
        let Some(config) = self.remote_config.borrow().clone() else {
            return false;
        };
        if self.is_remote_ready() {
            return true;
        }
        match B::connect(&config, self.local.config()).await {
            Ok(backend) => {
                *self.remote.borrow_mut() = Some(Rc::new(backend));
                log::info!("Remote leaderboard ready");
                true
            }
            Err(e) => {
                log::warn!("Remote leaderboard init failed: {e}");
                false
            }
        }
    }

    // The handle is cloned out so no RefCell borrow is held across an await.
    fn remote_handle(&self) -> Option<Rc<B>> {
        self.remote.borrow().clone()
    }

    async fn remote_then_local<T, F, Fut>(
        &self,
        what: &str,
        remote: F,
        local: impl FnOnce() -> T,
    ) -> Served<T>
    where
        F: FnOnce(Rc<B>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(backend) = self.remote_handle() else {
            return Served::LocalOnly(local());
        };
        match remote(backend).await {
            Ok(value) => Served::Remote(value),
            Err(e) => {
                log::warn!("Remote {what} failed, using local scores: {e}");
                Served::Fallback(local())
            }
        }
    }

    pub async fn fetch_top(&self, game: &str, limit: usize) -> FetchResult {
        let served = self
            .remote_then_local(
                "read",
                |backend| async move { backend.query(game, limit).await },
                || self.local.top_n(game, limit),
            )
            .await;
        match served {
            Served::Remote(items) => FetchResult {
                source: Source::Remote,
                items,
            },
            Served::Fallback(items) | Served::LocalOnly(items) => FetchResult {
                source: Source::Local,
                items,
            },
        }
    }

    /// `ok` reports whether the remote write itself succeeded; with no remote
    /// handle at all, the local save counts as success.
    pub async fn submit(&self, game: &str, name: &str, score: i64) -> SubmitResult {
        let entry = self.local.config().new_entry(game, score, name);
        let pending = &entry;
        let served = self
            .remote_then_local(
                "write",
                |backend| async move { backend.append(pending).await },
                || {
                    self.local.save_entry(entry.clone());
                },
            )
            .await;
        match served {
            Served::Remote(()) => SubmitResult {
                ok: true,
                source: Source::Remote,
            },
            Served::Fallback(()) => SubmitResult {
                ok: false,
                source: Source::Local,
            },
            Served::LocalOnly(()) => SubmitResult {
                ok: true,
                source: Source::Local,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::LeaderboardConfig;
    use crate::error::LeaderboardError;
    use crate::remote::NullBackend;
    use crate::storage::MemoryStorage;

    /// Scripted stand-in for the shared remote collection.
    #[derive(Default)]
    struct FakeRemote {
        rows: RefCell<Vec<ScoreEntry>>,
        connect_failures: Cell<u32>,
        fail_query: Cell<bool>,
        fail_append: Cell<bool>,
        connects: Cell<u32>,
        queries: Cell<u32>,
        appends: Cell<u32>,
    }

    struct FakeBackend {
        remote: Rc<FakeRemote>,
    }

    impl RemoteScoreBackend for FakeBackend {
        type Config = Rc<FakeRemote>;

        async fn connect(config: &Rc<FakeRemote>, _settings: &LeaderboardConfig) -> Result<Self> {
            config.connects.set(config.connects.get() + 1);
            if config.connect_failures.get() > 0 {
                config.connect_failures.set(config.connect_failures.get() - 1);
                return Err(LeaderboardError::InvalidConfig("apiKey is missing".into()));
            }
            Ok(Self {
                remote: config.clone(),
            })
        }

        async fn query(&self, game: &str, limit: usize) -> Result<Vec<ScoreEntry>> {
            self.remote.queries.set(self.remote.queries.get() + 1);
            if self.remote.fail_query.get() {
                return Err(LeaderboardError::Network("timed out".into()));
            }
            let mut rows: Vec<_> = self
                .remote
                .rows
                .borrow()
                .iter()
                .filter(|e| e.game == game)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.score.cmp(&a.score));
            rows.truncate(limit);
            Ok(rows)
        }

        async fn append(&self, entry: &ScoreEntry) -> Result<()> {
            self.remote.appends.set(self.remote.appends.get() + 1);
            if self.remote.fail_append.get() {
                return Err(LeaderboardError::Http {
                    status: 403,
                    body: "PERMISSION_DENIED".into(),
                });
            }
            self.remote.rows.borrow_mut().push(entry.clone());
            Ok(())
        }
    }

    fn local_store() -> LocalScoreStore<MemoryStorage> {
        LocalScoreStore::new(MemoryStorage::new(), LeaderboardConfig::default())
    }

    fn remote_client(remote: &Rc<FakeRemote>) -> LeaderboardClient<MemoryStorage, FakeBackend> {
        LeaderboardClient::new(local_store(), Some(remote.clone()))
    }

    #[tokio::test]
    async fn test_local_only_submit_then_fetch() {
        let client: LeaderboardClient<_, NullBackend> = LeaderboardClient::local_only(local_store());
        assert!(!client.init_remote_if_configured().await);

        let result = client.submit("prime", "Bob", 99).await;
        assert_eq!(
            result,
            SubmitResult {
                ok: true,
                source: Source::Local
            }
        );

        let top = client.fetch_top("prime", 1).await;
        assert_eq!(top.source, Source::Local);
        assert_eq!(top.items.len(), 1);
        assert_eq!(top.items[0].name, "Bob");
        assert_eq!(top.items[0].score, 99);
    }

    #[tokio::test]
    async fn test_uninitialized_client_never_touches_remote() {
        let remote = Rc::new(FakeRemote::default());
        let client = remote_client(&remote);

        assert_eq!(client.submit("prime", "Bob", 5).await.source, Source::Local);
        assert_eq!(client.fetch_top("prime", 10).await.source, Source::Local);
        assert_eq!(remote.connects.get(), 0);
        assert_eq!(remote.queries.get(), 0);
        assert_eq!(remote.appends.get(), 0);
    }

    #[tokio::test]
    async fn test_remote_read_and_write() {
        let remote = Rc::new(FakeRemote::default());
        let client = remote_client(&remote);
        assert!(client.init_remote_if_configured().await);

        let result = client.submit("prime", "Ana", 42).await;
        assert_eq!(
            result,
            SubmitResult {
                ok: true,
                source: Source::Remote
            }
        );
        client.submit("prime", "Bob", 50).await;
        client.submit("fractions", "Cem", 70).await;

        let top = client.fetch_top("prime", 10).await;
        assert_eq!(top.source, Source::Remote);
        let scores: Vec<_> = top.items.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![50, 42]);
        // Remote writes are not mirrored locally.
        assert!(client.local().top_n("prime", 10).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_falls_back_to_local() {
        let remote = Rc::new(FakeRemote::default());
        remote.fail_append.set(true);
        let client = remote_client(&remote);
        assert!(client.init_remote_if_configured().await);

        let result = client.submit("prime", "Bob", 99).await;
        assert_eq!(
            result,
            SubmitResult {
                ok: false,
                source: Source::Local
            }
        );
        let local = client.local().top_n("prime", 10);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].score, 99);
        assert_eq!(local[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_failed_read_falls_back_to_local() {
        let remote = Rc::new(FakeRemote::default());
        remote.fail_query.set(true);
        let client = remote_client(&remote);
        assert!(client.init_remote_if_configured().await);
        client.local().save("prime", 10, "Anon");
        client.local().save("prime", 30, "Anon");
        client.local().save("prime", 20, "Anon");

        let top = client.fetch_top("prime", 2).await;
        assert_eq!(top.source, Source::Local);
        let scores: Vec<_> = top.items.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![30, 20]);
        assert_eq!(remote.queries.get(), 1);
    }

    #[tokio::test]
    async fn test_init_retries_after_failure_and_then_sticks() {
        let remote = Rc::new(FakeRemote::default());
        remote.connect_failures.set(1);
        let client = remote_client(&remote);

        assert!(!client.init_remote_if_configured().await);
        assert!(!client.is_remote_ready());
        assert!(client.init_remote_if_configured().await);
        assert!(client.init_remote_if_configured().await);
        assert_eq!(remote.connects.get(), 2);
    }

    #[tokio::test]
    async fn test_late_configuration_enables_remote() {
        let remote = Rc::new(FakeRemote::default());
        let client: LeaderboardClient<_, FakeBackend> = LeaderboardClient::local_only(local_store());
        assert!(!client.is_configured());
        assert!(!client.init_remote_if_configured().await);

        assert!(client.configure_remote(remote.clone()));
        assert!(!client.configure_remote(Rc::new(FakeRemote::default())));
        assert!(client.init_remote_if_configured().await);
        assert_eq!(client.submit("prime", "Ana", 8).await.source, Source::Remote);
        assert_eq!(remote.appends.get(), 1);
    }

    #[tokio::test]
    async fn test_submit_uses_configured_name_limit() {
        let config = LeaderboardConfig {
            max_name_chars: 5,
            ..Default::default()
        };
        let client: LeaderboardClient<_, NullBackend> =
            LeaderboardClient::local_only(LocalScoreStore::new(MemoryStorage::new(), config));
        client.submit("prime", "Bartholomew", 4).await;
        assert_eq!(client.fetch_top("prime", 1).await.items[0].name, "Barth");
    }

    #[tokio::test]
    async fn test_submit_normalizes_nickname() {
        let remote = Rc::new(FakeRemote::default());
        let client = remote_client(&remote);
        client.init_remote_if_configured().await;

        client.submit("prime", "   ", 1).await;
        client.submit("prime", "a-very-long-nickname-indeed", 2).await;
        let names: Vec<_> = remote.rows.borrow().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["Anon", "a-very-long-nickna"]);
    }
}
