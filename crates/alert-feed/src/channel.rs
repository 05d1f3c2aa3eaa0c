use crate::{sse, Alert, Error};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Name of the event which carries a newly raised Alert.
pub const NEW_ALERT_EVENT: &str = "new_alert";
/// Path of the event stream, relative to the socket base URL.
pub const STREAM_PATH: &str = "alerts/stream";

/// AlertChannel owns one persistent connection to the alert event stream,
/// and forwards each well-formed Alert it receives to a queue.
///
/// The connection runs on a background task from `connect()` until
/// `teardown()` or until the AlertChannel is dropped.
pub struct AlertChannel {
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

// Reconnection state carried across connections of the stream.
struct Resume {
    last_event_id: Option<String>,
    delay: Duration,
}

// Why a connection to the stream ended without error.
enum Closed {
    // The server ended the stream, and we'll reconnect.
    Eof,
    // The server asked that we not reconnect.
    NoContent,
    // The receiver of forwarded alerts is gone.
    Dropped,
}

impl AlertChannel {
    /// Begin streaming alerts from `socket_base` into `sink`.
    ///
    /// Returns immediately: the connection is established in the background.
    /// Must be called from within a tokio runtime.
    pub fn connect(
        http_client: reqwest::Client,
        socket_base: &url::Url,
        reconnect_delay: Duration,
        sink: mpsc::Sender<Alert>,
    ) -> Self {
        let cancel = CancellationToken::new();

        let task = match crate::append_path(socket_base, STREAM_PATH) {
            Ok(endpoint) => Some(tokio::spawn(run(
                http_client,
                endpoint,
                reconnect_delay,
                sink,
                cancel.clone(),
            ))),
            Err(err) => {
                tracing::warn!(?err, %socket_base, "invalid alert stream endpoint (no alerts will be streamed)");
                None
            }
        };

        Self { cancel, task }
    }

    /// Close the connection. May be called any number of times.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Close the connection and wait for its background task to exit.
    pub async fn closed(mut self) {
        self.teardown();

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(?err, "alert channel task failed");
            }
        }
    }
}

impl Drop for AlertChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    http_client: reqwest::Client,
    endpoint: url::Url,
    reconnect_delay: Duration,
    sink: mpsc::Sender<Alert>,
    cancel: CancellationToken,
) {
    let mut resume = Resume {
        last_event_id: None,
        delay: reconnect_delay,
    };

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = serve(&http_client, &endpoint, &mut resume, &sink) => outcome,
        };

        match outcome {
            Ok(Closed::Dropped) => break,
            Ok(Closed::NoContent) => {
                tracing::info!(%endpoint, "alert stream closed by server (not reconnecting)");
                break;
            }
            Ok(Closed::Eof) => {
                tracing::info!(%endpoint, delay = ?resume.delay, "alert stream disconnected (will reconnect)");
            }
            Err(err) => {
                tracing::warn!(?err, delay = ?resume.delay, "alert stream failed (will reconnect)");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(resume.delay) => (),
        }
    }
    tracing::debug!(%endpoint, "alert channel torn down");
}

// Serve a single connection to the stream, forwarding its alerts into `sink`.
async fn serve(
    http_client: &reqwest::Client,
    endpoint: &url::Url,
    resume: &mut Resume,
    sink: &mpsc::Sender<Alert>,
) -> Result<Closed, Error> {
    let mut request = http_client
        .get(endpoint.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .header(reqwest::header::CACHE_CONTROL, "no-cache");

    if let Some(id) = &resume.last_event_id {
        request = request.header("Last-Event-ID", id.as_str());
    }

    let response = request.send().await.map_err(|source| Error::Request {
        url: endpoint.clone(),
        source,
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Closed::NoContent);
    } else if !status.is_success() {
        return Err(Error::from_status(endpoint, response).await);
    }
    tracing::info!(%endpoint, "alert stream connected");

    let mut events = Box::pin(sse::Events::resume(
        response.bytes_stream(),
        resume.last_event_id.clone(),
    ));

    while let Some(event) = events.next().await {
        let event = event.map_err(|source| Error::Stream {
            url: endpoint.clone(),
            source,
        })?;

        // Resume from the last event which was fully received.
        resume.last_event_id = event.id.clone();
        if let Some(retry) = events.retry() {
            resume.delay = retry;
        }

        let Some(alert) = decode_alert(&event) else {
            continue;
        };
        if sink.send(alert).await.is_err() {
            return Ok(Closed::Dropped);
        }
    }

    Ok(Closed::Eof)
}

/// Map an event of the stream into a well-formed Alert, or None if the
/// event isn't an alert or is malformed.
fn decode_alert(event: &sse::Event) -> Option<Alert> {
    if event.name != NEW_ALERT_EVENT {
        tracing::trace!(name = %event.name, "ignoring alert stream event");
        return None;
    }

    match serde_json::from_str::<Alert>(&event.data) {
        Ok(alert) if alert.is_well_formed() => Some(alert),
        Ok(alert) => {
            tracing::debug!(image_id = %alert.image_id, "dropping streamed alert without a timestamp");
            None
        }
        Err(err) => {
            tracing::warn!(?err, id = ?event.id, "dropping streamed alert which failed to decode");
            None
        }
    }
}
