#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nimbus_common::resilience::BackoffStrategy;
use nimbus_domain::Event;
use nimbus_infra::api::{ApiConnection, ApiError, StaticTokenProvider};
use nimbus_infra::events::EventListener;
use nimbus_infra::http::RequestExecutor;
use wiremock::MockServer;

/// Connection to a stub server with millisecond backoff.
pub fn connection_for(server: &MockServer, max_attempts: u32) -> Arc<ApiConnection> {
    connection_with_backoff(server, max_attempts, Duration::from_millis(5))
}

/// Connection to a stub server waiting `delay` between failed attempts.
pub fn connection_with_backoff(
    server: &MockServer,
    max_attempts: u32,
    delay: Duration,
) -> Arc<ApiConnection> {
    let executor = RequestExecutor::builder()
        .max_attempts(max_attempts)
        .backoff(BackoffStrategy::Fixed(delay))
        .auth(Arc::new(StaticTokenProvider::new("test-token")))
        .build()
        .expect("executor should build");
    Arc::new(ApiConnection::new(&server.uri(), executor).expect("connection should build"))
}

/// Address nothing listens on.
pub fn closed_port() -> std::net::SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

/// Listener that records everything it is told.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub handles_errors: bool,
}

impl RecordingListener {
    pub fn handling() -> Self {
        Self { handles_errors: true, ..Self::default() }
    }

    pub fn event_ids(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.id().to_string());
    }

    fn on_exception(&self, error: &ApiError) -> bool {
        self.errors.lock().unwrap().push(error.to_string());
        self.handles_errors
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Number of requests the server saw that match `predicate`.
pub async fn count_requests(
    server: &MockServer,
    predicate: impl Fn(&wiremock::Request) -> bool,
) -> usize {
    let requests = server.received_requests().await.unwrap_or_default();
    requests.iter().filter(|request| predicate(request)).count()
}
