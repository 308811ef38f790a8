//! Shared access to an authenticated Slack client and the workspace user directory.
//!
//! A single `ApiProvider` is built at startup and handed to every tool handler.
//! The first `provide()` call performs the handshake and directory bootstrap;
//! concurrent first callers wait for that one initialization and share its
//! client. Later calls are a lock-free read.

mod connector;
pub mod directory;

pub use connector::{Connector, WebConnector, build_http_client};
pub use directory::{BootstrapOutcome, USERS_PAGE_LIMIT};

use crate::config::Settings;
use crate::error::Result;
use crate::logging::{Timer, log_error};
use crate::slack::{SlackApi, SlackUser};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, RwLock};

/// User id to profile
pub type UsersMap = HashMap<String, SlackUser>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Bootstrapping,
    Ready,
}

pub struct ApiProvider {
    connector: Arc<dyn Connector>,
    client: OnceLock<Arc<dyn SlackApi>>,
    init_lock: Mutex<()>,
    users: RwLock<Arc<UsersMap>>,
    users_cache: Option<PathBuf>,
}

impl ApiProvider {
    pub fn new(connector: Arc<dyn Connector>, users_cache: Option<PathBuf>) -> Self {
        match &users_cache {
            Some(path) => tracing::info!(path = %path.display(), "User caching to disk is ENABLED"),
            None => tracing::info!("User caching to disk is DISABLED"),
        }

        Self {
            connector,
            client: OnceLock::new(),
            init_lock: Mutex::new(()),
            users: RwLock::new(Arc::new(HashMap::new())),
            users_cache,
        }
    }

    /// Provider wired to the real Slack API
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(WebConnector::new(settings)),
            settings.cache.users_cache.clone(),
        )
    }

    pub fn state(&self) -> ProviderState {
        if self.client.get().is_some() {
            ProviderState::Ready
        } else if self.init_lock.try_lock().is_err() {
            ProviderState::Bootstrapping
        } else {
            ProviderState::Uninitialized
        }
    }

    /// Return the authenticated client, bootstrapping on first use.
    ///
    /// A handshake error is fatal (`is_fatal()`); the caller must not retry it.
    /// A directory error is returned once, but the client stays cached and
    /// later calls succeed with an empty directory.
    pub async fn provide(&self) -> Result<Arc<dyn SlackApi>> {
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }

        let _guard = self.init_lock.lock().await;
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }

        let _timer = Timer::new("provider_bootstrap");
        let client = self
            .connector
            .connect()
            .await
            .inspect_err(|e| log_error("slack_handshake", e))?;

        let populated = self.populate_directory(client.as_ref()).await;
        let _ = self.client.set(client.clone());

        populated.map(|()| client)
    }

    /// Current directory snapshot. Never touches the network.
    pub async fn provide_users_map(&self) -> Arc<UsersMap> {
        self.users.read().await.clone()
    }

    async fn populate_directory(&self, api: &dyn SlackApi) -> Result<()> {
        let users = match directory::bootstrap(api, self.users_cache.as_deref()).await {
            BootstrapOutcome::CacheHit(users) => users,
            BootstrapOutcome::Fetched(users) => {
                tracing::info!(count = users.len(), "Fetched users from Slack API");
                users
            }
            BootstrapOutcome::FetchFailed(e) => {
                log_error("fetch_users", &e);
                return Err(e);
            }
        };

        let directory: UsersMap = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        *self.users.write().await = Arc::new(directory);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SlackMcpError;
    use crate::slack::{
        ChannelsPage, ChannelsPageRequest, HistoryPage, HistoryRequest, UsersPage,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn user(id: &str, name: &str) -> SlackUser {
        SlackUser {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// In-memory Slack double that records every request it sees.
    #[derive(Default)]
    pub(crate) struct FakeSlack {
        pub user_pages: StdMutex<VecDeque<(Vec<SlackUser>, String)>>,
        pub user_cursors: StdMutex<Vec<Option<String>>>,
        pub fail_users: bool,
        pub channels: ChannelsPage,
        pub channel_requests: StdMutex<Vec<ChannelsPageRequest>>,
        pub history: HistoryPage,
        pub history_requests: StdMutex<Vec<HistoryRequest>>,
        pub fail_remote: bool,
    }

    impl FakeSlack {
        pub(crate) fn with_user_pages(pages: Vec<(Vec<SlackUser>, &str)>) -> Self {
            Self {
                user_pages: StdMutex::new(
                    pages
                        .into_iter()
                        .map(|(users, cursor)| (users, cursor.to_string()))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        pub(crate) fn failing_users() -> Self {
            Self {
                fail_users: true,
                ..Default::default()
            }
        }

        pub(crate) fn user_calls(&self) -> usize {
            self.user_cursors.lock().unwrap().len()
        }

        pub(crate) fn channel_calls(&self) -> usize {
            self.channel_requests.lock().unwrap().len()
        }

        pub(crate) fn history_calls(&self) -> usize {
            self.history_requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn list_channels_page(&self, request: &ChannelsPageRequest) -> Result<ChannelsPage> {
            self.channel_requests.lock().unwrap().push(request.clone());
            if self.fail_remote {
                return Err(SlackMcpError::SlackApi("conversations.list: ratelimited".into()));
            }
            Ok(self.channels.clone())
        }

        async fn history_page(&self, request: &HistoryRequest) -> Result<HistoryPage> {
            self.history_requests.lock().unwrap().push(request.clone());
            if self.fail_remote {
                return Err(SlackMcpError::SlackApi(
                    "conversations.history: channel_not_found".into(),
                ));
            }
            Ok(self.history.clone())
        }

        async fn list_users_page(&self, _limit: u32, cursor: Option<&str>) -> Result<UsersPage> {
            self.user_cursors
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            if self.fail_users {
                return Err(SlackMcpError::SlackApi("users.list: ratelimited".into()));
            }
            let (users, next_cursor) = self.user_pages.lock().unwrap().pop_front().unwrap_or_default();
            Ok(UsersPage { users, next_cursor })
        }
    }

    pub(crate) struct FakeConnector {
        pub api: Arc<FakeSlack>,
        pub connects: AtomicUsize,
        pub delay: Duration,
        pub fail: bool,
    }

    impl FakeConnector {
        pub(crate) fn new(api: FakeSlack) -> Self {
            Self {
                api: Arc::new(api),
                connects: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self) -> Result<Arc<dyn SlackApi>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SlackMcpError::Handshake("auth.test: invalid_auth".into()));
            }
            Ok(self.api.clone() as Arc<dyn SlackApi>)
        }
    }

    /// Provider over a fake Slack with an already-ready directory
    pub(crate) async fn ready_provider(api: FakeSlack) -> (Arc<FakeSlack>, Arc<ApiProvider>) {
        let connector = Arc::new(FakeConnector::new(api));
        let api = connector.api.clone();
        let provider = Arc::new(ApiProvider::new(connector, None));
        provider.provide().await.unwrap();
        (api, provider)
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_handshake() {
        let connector = Arc::new(FakeConnector {
            delay: Duration::from_millis(50),
            ..FakeConnector::new(FakeSlack::with_user_pages(vec![(
                vec![user("U1", "ann")],
                "",
            )]))
        });
        let provider = Arc::new(ApiProvider::new(connector.clone(), None));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.provide().await.unwrap() })
            })
            .collect();

        let clients = futures::future::join_all(handles).await;
        let first = Arc::as_ptr(clients[0].as_ref().unwrap()) as *const ();
        for client in &clients {
            assert_eq!(Arc::as_ptr(client.as_ref().unwrap()) as *const (), first);
        }

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(connector.api.user_calls(), 1);
        assert_eq!(provider.state(), ProviderState::Ready);
    }

    #[tokio::test]
    async fn test_subsequent_calls_skip_network() {
        let connector = Arc::new(FakeConnector::new(FakeSlack::default()));
        let provider = ApiProvider::new(connector.clone(), None);
        assert_eq!(provider.state(), ProviderState::Uninitialized);

        tokio_test::assert_ok!(provider.provide().await);
        tokio_test::assert_ok!(provider.provide().await);

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(connector.api.user_calls(), 1);
    }

    #[tokio::test]
    async fn test_handshake_failure_is_fatal() {
        let connector = Arc::new(FakeConnector {
            fail: true,
            ..FakeConnector::new(FakeSlack::default())
        });
        let provider = ApiProvider::new(connector, None);

        let err = provider.provide().await.err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(provider.state(), ProviderState::Uninitialized);
    }

    #[tokio::test]
    async fn test_directory_failure_keeps_client() {
        let connector = Arc::new(FakeConnector::new(FakeSlack::failing_users()));
        let provider = ApiProvider::new(connector.clone(), None);

        let err = provider.provide().await.err().unwrap();
        assert!(!err.is_fatal());
        assert!(provider.provide_users_map().await.is_empty());

        tokio_test::assert_ok!(provider.provide().await);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(provider.state(), ProviderState::Ready);
    }

    #[tokio::test]
    async fn test_cache_hit_populates_directory_without_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".users_cache.json");
        let cached = vec![user("U1", "ann"), user("U2", "bob"), user("U3", "cid")];
        std::fs::write(&path, serde_json::to_vec(&cached).unwrap()).unwrap();

        let connector = Arc::new(FakeConnector::new(FakeSlack::with_user_pages(vec![(
            vec![user("U9", "zed")],
            "",
        )])));
        let provider = ApiProvider::new(connector.clone(), Some(path));

        provider.provide().await.unwrap();

        let users = provider.provide_users_map().await;
        assert_eq!(users.len(), 3);
        assert_eq!(users["U2"].name, "bob");
        assert_eq!(connector.api.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_unparsable_cache_refetches_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".users_cache.json");
        std::fs::write(&path, b"{not json").unwrap();

        let fetched = vec![user("U1", "ann"), user("U2", "bob")];
        let connector = Arc::new(FakeConnector::new(FakeSlack::with_user_pages(vec![
            (vec![fetched[0].clone()], "next"),
            (vec![fetched[1].clone()], ""),
        ])));
        let provider = ApiProvider::new(connector.clone(), Some(path.clone()));

        provider.provide().await.unwrap();

        assert_eq!(connector.api.user_calls(), 2);
        assert_eq!(provider.provide_users_map().await.len(), 2);

        let written: Vec<SlackUser> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, fetched);
    }

    #[tokio::test]
    async fn test_missing_cache_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".users_cache.json");

        let connector = Arc::new(FakeConnector::new(FakeSlack::with_user_pages(vec![(
            vec![user("U1", "ann")],
            "",
        )])));
        let provider = ApiProvider::new(connector.clone(), Some(path.clone()));

        provider.provide().await.unwrap();

        let written: Vec<SlackUser> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, vec![user("U1", "ann")]);
    }
}
