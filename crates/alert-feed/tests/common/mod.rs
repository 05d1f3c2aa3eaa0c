use alert_feed::{Alert, Feed, Subscription};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Response of the test server's backlog endpoint.
#[derive(Clone)]
pub enum Backlog {
    Alerts(serde_json::Value),
    Status(StatusCode),
    Raw(&'static str),
}

#[derive(Clone)]
struct ServerState {
    backlog: Backlog,
    gate: Option<Arc<Notify>>,
    connections: Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Event>>>>,
    last_event_ids: Arc<Mutex<Vec<Option<String>>>>,
}

/// TestServer serves an alert backlog and alert event streams on a local port.
///
/// Each connection to the event stream takes the next queued connection
/// receiver, and streams its events until the paired sender is dropped.
/// With no queued connections, the stream responds with 204 No Content.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    state: ServerState,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    pub async fn start(backlog: Backlog) -> Self {
        Self::start_with_gate(backlog, None).await
    }

    /// Start a server whose backlog responses wait for a `gate` notification.
    pub async fn start_with_gate(backlog: Backlog, gate: Option<Arc<Notify>>) -> Self {
        let state = ServerState {
            backlog,
            gate,
            connections: Default::default(),
            last_event_ids: Default::default(),
        };

        let router = Router::new()
            .route("/api/alerts", get(serve_backlog))
            .route("/alerts/stream", get(serve_stream))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        TestServer {
            addr,
            state,
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Get the base URL for the test server.
    pub fn base_url(&self) -> url::Url {
        format!("http://{}", self.addr).parse().expect("valid URL")
    }

    /// Queue a connection of the event stream, returning its sender of events.
    pub fn queue_connection(&self) -> mpsc::UnboundedSender<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.connections.lock().unwrap().push_back(rx);
        tx
    }

    /// Last-Event-ID headers of each stream request, in request order.
    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.state.last_event_ids.lock().unwrap().clone()
    }
}

async fn serve_backlog(State(state): State<ServerState>) -> Response {
    if let Some(gate) = &state.gate {
        gate.notified().await;
    }
    match state.backlog {
        Backlog::Alerts(alerts) => Json(alerts).into_response(),
        Backlog::Status(status) => status.into_response(),
        Backlog::Raw(body) => body.into_response(),
    }
}

async fn serve_stream(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.last_event_ids.lock().unwrap().push(last_event_id);

    let Some(rx) = state.connections.lock().unwrap().pop_front() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let events = tokio_stream::wrappers::UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);

    Sse::new(events).into_response()
}

/// Build an SSE event carrying `alert`.
pub fn alert_event(alert: &Alert) -> Event {
    Event::default()
        .event(alert_feed::NEW_ALERT_EVENT)
        .data(serde_json::to_string(alert).unwrap())
}

pub fn alert(image_id: &str, timestamp: &str) -> Alert {
    Alert {
        image_id: image_id.to_string(),
        timestamp: Some(timestamp.to_string()),
        visitor_id: format!("visitor-{image_id}"),
        cam_id: "lobby".to_string(),
        status: "unverified".to_string(),
        image_url: Some(format!("/images/{image_id}.jpg")),
    }
}

pub fn ids(alerts: &[Alert]) -> Vec<&str> {
    alerts.iter().map(|a| a.image_id.as_str()).collect()
}

/// Wait until the subscribed Feed satisfies `pred`.
pub async fn wait_for<F>(sub: &mut Subscription, pred: F)
where
    F: Fn(&Feed) -> bool,
{
    let wait = async {
        loop {
            if sub.select(&pred) {
                return;
            }
            assert!(sub.changed().await, "store was dropped");
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(10), wait)
        .await
        .expect("timed out waiting for the alert feed");
}
