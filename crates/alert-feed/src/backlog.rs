use crate::{Alert, Error};

/// Path of the backlog endpoint, relative to the API base URL.
pub const BACKLOG_PATH: &str = "api/alerts";

/// Client fetches the backlog of existing alerts from the alerts REST API.
#[derive(Clone)]
pub struct Client {
    /// Base URL of the REST API.
    pub base_url: url::Url,
    /// HTTP client to use for REST requests.
    pub http_client: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &url::Url, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.clone(),
            http_client,
        }
    }

    /// Fetch the backlog of alerts, in server order.
    ///
    /// A 404 response means there is no backlog, and is not an error.
    pub async fn fetch(&self) -> Result<Vec<Alert>, Error> {
        let url = crate::append_path(&self.base_url, BACKLOG_PATH)?;

        let response = self
            .http_client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| Error::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(%url, "alert backlog not found (treating as empty)");
            return Ok(Vec::new());
        } else if !status.is_success() {
            return Err(Error::from_status(&url, response).await);
        }

        let body = response.bytes().await.map_err(|source| Error::Request {
            url: url.clone(),
            source,
        })?;

        let alerts: Vec<Alert> =
            serde_json::from_slice(&body).map_err(|source| Error::Decode { url, source })?;

        Ok(alerts)
    }
}
