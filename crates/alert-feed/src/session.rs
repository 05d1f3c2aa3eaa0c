use crate::{Alert, AlertChannel, AlertStore, BacklogClient, Config, Error};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// Alerts which may be queued between the channel and the store.
const QUEUE_DEPTH: usize = 64;

/// Session ties an AlertStore and its AlertChannel to the lifetime of
/// an application shell.
///
/// Starting a Session fetches the alert backlog and connects to the alert
/// stream. Shutting it down (or dropping it) abandons an in-flight backlog
/// fetch and closes the stream. The AlertStore remains readable afterwards,
/// but no longer changes.
pub struct Session {
    store: AlertStore,
    cancel: CancellationToken,
    channel: Option<AlertChannel>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Session {
    /// Start a Session using `config`. Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self, Error> {
        let http_client = crate::new_http_client(&config.user_agent)?;
        Ok(Self::start_with_client(config, http_client))
    }

    /// Start a Session using `config` and the provided HTTP client.
    pub fn start_with_client(config: &Config, http_client: reqwest::Client) -> Self {
        let store = AlertStore::new();
        let cancel = CancellationToken::new();

        tracing::info!(
            api_base = %config.api_base(),
            socket_base = %config.socket_base(),
            backlog_policy = ?config.backlog_policy,
            "starting alert feed session"
        );

        let backlog = BacklogClient::new(config.api_base(), http_client.clone());
        let initialize = {
            let (store, cancel, policy) = (store.clone(), cancel.clone(), config.backlog_policy);
            tokio::spawn(async move { store.initialize(&backlog, policy, &cancel).await })
        };

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let channel = AlertChannel::connect(
            http_client,
            config.socket_base(),
            config.reconnect_delay,
            tx,
        );
        let forward = tokio::spawn(forward(store.clone(), rx, cancel.clone()));

        Self {
            store,
            cancel,
            channel: Some(channel),
            tasks: vec![initialize, forward],
        }
    }

    /// AlertStore of this Session, for handing to consumers.
    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    /// Stop the Session. May be called any number of times.
    pub fn shutdown(&self) {
        self.cancel.cancel();

        if let Some(channel) = &self.channel {
            channel.teardown();
        }
    }

    /// Stop the Session, and wait for its background tasks to exit.
    pub async fn closed(mut self) {
        self.shutdown();

        if let Some(channel) = self.channel.take() {
            channel.closed().await;
        }
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                tracing::warn!(?err, "alert feed session task failed");
            }
        }
        tracing::debug!("alert feed session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Ingest alerts received by the channel, one at a time, until cancelled.
async fn forward(store: AlertStore, mut rx: mpsc::Receiver<Alert>, cancel: CancellationToken) {
    loop {
        let alert = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            alert = rx.recv() => alert,
        };
        let Some(alert) = alert else {
            break; // Channel was torn down.
        };
        tracing::trace!(key = %alert.key(), "ingesting streamed alert");
        store.ingest(alert);
    }
}
