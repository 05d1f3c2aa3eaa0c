use crate::{Alert, AlertKey, BacklogClient, BacklogPolicy, Feed};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// AlertStore is the single source of truth for the active alerts of a Session.
///
/// It's cheaply cloned, and clones share the same Feed. Every mutation is
/// applied atomically and is observed by subscribers as soon as it returns.
/// Mutations which don't change the Feed don't notify subscribers.
#[derive(Clone)]
pub struct AlertStore {
    feed: Arc<watch::Sender<Feed>>,
}

/// Subscription observes the Feed of an AlertStore as it changes.
#[derive(Clone)]
pub struct Subscription {
    rx: watch::Receiver<Feed>,
}

impl AlertStore {
    /// Create an AlertStore having an empty Feed.
    pub fn new() -> Self {
        let (feed, _rx) = watch::channel(Feed::new());
        Self {
            feed: Arc::new(feed),
        }
    }

    /// Seed the store from the backlog of `client`.
    ///
    /// Makes exactly one fetch attempt. A failed fetch is logged and is
    /// applied as an empty backlog, same as a backlog which isn't found.
    /// If `cancel` is cancelled before the fetch completes then the fetch
    /// is abandoned, and the Feed is never touched.
    pub async fn initialize(
        &self,
        client: &BacklogClient,
        policy: BacklogPolicy,
        cancel: &CancellationToken,
    ) {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("alert backlog fetch cancelled");
                return;
            }
            result = client.fetch() => result,
        };

        if cancel.is_cancelled() {
            return;
        }

        let backlog = match result {
            Ok(backlog) => {
                tracing::debug!(count = backlog.len(), ?policy, "fetched alert backlog");
                backlog
            }
            Err(err) => {
                tracing::warn!(?err, "failed to fetch alert backlog (continuing with an empty backlog)");
                Vec::new()
            }
        };
        self.apply_backlog(backlog, policy);
    }

    /// Apply a fetched `backlog` to the Feed under the given `policy`.
    pub fn apply_backlog(&self, backlog: Vec<Alert>, policy: BacklogPolicy) {
        self.feed.send_if_modified(|feed| match policy {
            BacklogPolicy::Replace => feed.replace(backlog),
            BacklogPolicy::Merge => feed.merge_backlog(backlog),
        });
    }

    /// Ingest a newly arrived `alert`. Malformed and duplicate alerts are ignored.
    pub fn ingest(&self, alert: Alert) {
        self.feed.send_if_modified(|feed| feed.ingest(alert));
    }

    /// Dismiss every alert sharing the key of `alert`. A no-op if there are none.
    pub fn dismiss(&self, alert: &Alert) {
        self.feed.send_if_modified(|feed| feed.dismiss(alert));
    }

    /// Dismiss every alert identified by `key`. A no-op if there are none.
    pub fn dismiss_key(&self, key: &AlertKey) {
        self.feed.send_if_modified(|feed| feed.dismiss_key(key));
    }

    /// Subscribe to the Feed of this store.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.feed.subscribe(),
        }
    }

    /// Owned copy of the current alerts, most recently arrived first.
    pub fn snapshot(&self) -> Vec<Alert> {
        self.feed.borrow().to_vec()
    }

    /// Number of current alerts.
    pub fn len(&self) -> usize {
        self.feed.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.borrow().is_empty()
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    /// Wait for a change of the Feed which this Subscription hasn't yet selected.
    /// Returns false if the AlertStore has been dropped, and no further changes will occur.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Derive a value from the current Feed, marking it as seen.
    pub fn select<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&Feed) -> T,
    {
        f(&*self.rx.borrow_and_update())
    }

    /// Derive a value from the current Feed, without marking it as seen.
    pub fn peek<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Feed) -> T,
    {
        f(&*self.rx.borrow())
    }

    pub fn len(&self) -> usize {
        self.peek(Feed::len)
    }

    pub fn is_empty(&self) -> bool {
        self.peek(Feed::is_empty)
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.peek(|feed| feed.contains(key))
    }

    /// Owned copy of the current alerts, marking them as seen.
    pub fn snapshot(&mut self) -> Vec<Alert> {
        self.select(Feed::to_vec)
    }
}
