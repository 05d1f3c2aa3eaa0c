use std::time::Duration;

/// Config of an alert feed Session.
///
/// Every option may be provided as a flag or through the environment.
/// Endpoints which aren't set fall back to the `origin`.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Origin of the dashboard, used for any endpoint that isn't set explicitly.
    #[clap(
        long = "origin",
        env = "ALERTS_ORIGIN",
        default_value = "http://localhost:5000/"
    )]
    pub origin: url::Url,
    /// Base URL of the alerts REST API. Also used to resolve relative image URLs.
    #[clap(long = "api-base-url", env = "ALERTS_API_BASE_URL")]
    pub api_base_url: Option<url::Url>,
    /// Base URL of the real-time alert stream.
    #[clap(long = "socket-url", env = "ALERTS_SOCKET_URL")]
    pub socket_url: Option<url::Url>,
    /// How the backlog is combined with alerts that arrive before it.
    #[clap(
        long = "backlog-policy",
        env = "ALERTS_BACKLOG_POLICY",
        value_enum,
        default_value = "replace"
    )]
    pub backlog_policy: BacklogPolicy,
    /// Delay before the alert stream reconnects after being dropped.
    /// The server may override it.
    #[clap(
        long = "reconnect-delay",
        env = "ALERTS_RECONNECT_DELAY",
        default_value = "3s",
        value_parser = humantime::parse_duration
    )]
    pub reconnect_delay: Duration,
    /// User agent of HTTP requests.
    #[clap(
        long = "user-agent",
        env = "ALERTS_USER_AGENT",
        default_value = concat!("alert-feed/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,
}

/// BacklogPolicy determines how a landing backlog fetch treats alerts
/// which were ingested while the fetch was in flight.
#[derive(clap::ValueEnum, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum BacklogPolicy {
    /// The backlog replaces the feed, discarding alerts which arrived first.
    #[default]
    Replace,
    /// The backlog is appended behind alerts which arrived first.
    Merge,
}

impl Config {
    /// Config with default options and the given `origin`.
    pub fn with_origin(origin: url::Url) -> Self {
        Self {
            origin,
            api_base_url: None,
            socket_url: None,
            backlog_policy: BacklogPolicy::default(),
            reconnect_delay: Duration::from_secs(3),
            user_agent: concat!("alert-feed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Base URL of the alerts REST API.
    pub fn api_base(&self) -> &url::Url {
        self.api_base_url.as_ref().unwrap_or(&self.origin)
    }

    /// Base URL of the real-time alert stream.
    pub fn socket_base(&self) -> &url::Url {
        self.socket_url.as_ref().unwrap_or(&self.origin)
    }
}
