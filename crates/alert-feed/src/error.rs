#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("invalid URL")]
    Url(#[from] url::ParseError),
    #[error("request to {url} failed")]
    Request {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP status {status} from {url}: {body}")]
    Status {
        url: url::Url,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode alerts fetched from {url}")]
    Decode {
        url: url::Url,
        #[source]
        source: serde_json::Error,
    },
    #[error("event stream from {url} failed")]
    Stream {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Map a non-success response into an Error::Status,
    /// retaining a bounded prefix of its body.
    pub(crate) async fn from_status(url: &url::Url, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => String::from_utf8_lossy(&body[..body.len().min(512)]).into_owned(),
            Err(_) => String::new(),
        };
        Error::Status {
            url: url.clone(),
            status,
            body,
        }
    }
}
