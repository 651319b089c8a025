//! Background poll loop
//!
//! One poller runs per started stream: long poll, fetch the page at the
//! current position, hand each event to the stream, advance the position.

use std::sync::Arc;

use nimbus_domain::{Event, EventPage, StreamPosition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::realtime::RealtimeServerConnection;
use super::stream::StreamShared;
use crate::api::{ApiConnection, ApiError};
use crate::http::ApiRequest;

/// Fetches the page of events after `position`.
pub(crate) async fn fetch_page(
    connection: &ApiConnection,
    position: StreamPosition,
    cancel: &CancellationToken,
) -> Result<EventPage, ApiError> {
    let mut request = ApiRequest::get(connection.events_url(position)?);
    connection.send(&mut request, cancel).await?.into_json()
}

pub(crate) struct Poller {
    connection: Arc<ApiConnection>,
    shared: Arc<StreamShared>,
    position: StreamPosition,
}

impl Poller {
    pub(crate) fn new(
        connection: Arc<ApiConnection>,
        shared: Arc<StreamShared>,
        position: StreamPosition,
    ) -> Self {
        Self { connection, shared, position }
    }

    /// Polls until `cancel` fires or a failure escapes.
    ///
    /// Failures observed after cancellation are part of shutting down and end
    /// the loop cleanly.
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> Result<(), ApiError> {
        match self.poll_loop(&cancel).await {
            Err(err) if cancel.is_cancelled() => {
                debug!(error = %err, "poller interrupted by stop");
                Ok(())
            }
            other => other,
        }
    }

    async fn poll_loop(&mut self, cancel: &CancellationToken) -> Result<(), ApiError> {
        let mut server = RealtimeServerConnection::discover(self.connection.clone(), cancel).await?;

        while !cancel.is_cancelled() {
            if server.remaining_retries() == 0 {
                info!(url = %server.endpoint().url, "real-time endpoint exhausted, rediscovering");
                server = RealtimeServerConnection::discover(self.connection.clone(), cancel).await?;
            }

            let changed = server.wait_for_change(self.position, cancel).await?;
            if cancel.is_cancelled() {
                break;
            }

            if changed {
                self.fetch_and_notify(cancel).await?;
            }
        }

        debug!(position = %self.position, "poller exiting");
        Ok(())
    }

    async fn fetch_and_notify(&mut self, cancel: &CancellationToken) -> Result<(), ApiError> {
        let page = fetch_page(&self.connection, self.position, cancel).await?;
        debug!(
            position = %self.position,
            next = %page.next_stream_position,
            entries = page.entries.len(),
            "fetched events"
        );

        for entry in &page.entries {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match Event::from_json(entry) {
                Ok(event) => self.shared.notify_event(&event),
                Err(err) => warn!(error = %err, "skipping malformed event entry"),
            }
        }

        self.position = page.next_stream_position;
        Ok(())
    }
}
