//! Live alert feed: a capped, deduplicated list of security alerts which is
//! seeded from a backlog fetch and kept current by a push event stream.
mod backlog;
mod channel;
mod config;
mod error;
mod feed;
mod models;
pub mod sse;
mod session;
mod store;

pub use backlog::Client as BacklogClient;
pub use channel::{AlertChannel, NEW_ALERT_EVENT, STREAM_PATH};
pub use config::{BacklogPolicy, Config};
pub use error::Error;
pub use feed::Feed;
pub use models::{Alert, AlertKey, MAX_ALERTS};
pub use session::Session;
pub use store::{AlertStore, Subscription};

/// Append `path` to `base`, treating `base` as a prefix rather than as a
/// document to resolve against. Unlike `Url::join`, the path of `base` is
/// always retained: `http://host/app` + `api/alerts` is `http://host/app/api/alerts`.
pub(crate) fn append_path(base: &url::Url, path: &str) -> Result<url::Url, url::ParseError> {
    let mut joined = base.as_str().trim_end_matches('/').to_string();
    joined.push('/');
    joined.push_str(path.trim_start_matches('/'));
    url::Url::parse(&joined)
}

/// Build the HTTP client shared by the backlog fetch and the alert channel.
pub fn new_http_client(user_agent: &str) -> Result<reqwest::Client, Error> {
    reqwest::ClientBuilder::new()
        .user_agent(user_agent.to_string())
        .build()
        .map_err(Error::Client)
}
