//! Real-time event stream
//!
//! [`EventStream`] owns the lifecycle of one background poller and fans its
//! events out to registered listeners.
//!
//! # Lifecycle
//!
//! - `start()` bootstraps the position with `stream_position=now`, spawns the
//!   poller and only then reports the stream as started.
//! - `stop()` flips the stream to stopped and cancels the poller. The task
//!   may still be unwinding when `stop()` returns.
//! - A stopped stream can be started again; it bootstraps afresh.
//! - Dropping a started stream cancels its poller.
//!
//! # Failures
//!
//! A failure that ends the poller stops the stream and is offered to each
//! listener's [`on_exception`](EventListener::on_exception) in registration
//! order until one reports it handled.

use std::sync::Arc;

use nimbus_common::collections::DedupCache;
use nimbus_domain::{Event, StreamPosition};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::dedup::DuplicateFilter;
use super::listener::EventListener;
use super::poller::{fetch_page, Poller};
use crate::api::{ApiConnection, ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Stopped,
    Starting,
    Started,
}

struct Run {
    id: u64,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

struct Lifecycle {
    state: StreamState,
    run: Option<Run>,
    runs: u64,
}

struct Delivery {
    listeners: Vec<Arc<dyn EventListener>>,
    filter: Box<dyn DuplicateFilter>,
}

/// State shared between the stream handle and its poller.
pub(crate) struct StreamShared {
    lifecycle: Mutex<Lifecycle>,
    delivery: Mutex<Delivery>,
}

impl StreamShared {
    fn new(filter: Box<dyn DuplicateFilter>) -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle { state: StreamState::Stopped, run: None, runs: 0 }),
            delivery: Mutex::new(Delivery { listeners: Vec::new(), filter }),
        }
    }

    /// Delivers `event` to every listener unless it was seen recently.
    pub(crate) fn notify_event(&self, event: &Event) {
        let mut delivery = self.delivery.lock();
        if !delivery.filter.first_sighting(event.id()) {
            debug!(event_id = event.id(), "dropping duplicate event");
            return;
        }
        for listener in &delivery.listeners {
            listener.on_event(event);
        }
    }

    /// Handles a failure that ended the poller of run `run_id`.
    fn notify_exception(&self, run_id: u64, error: ApiError) {
        {
            let mut lifecycle = self.lifecycle.lock();
            let current = lifecycle.run.as_ref().filter(|run| run.id == run_id);
            let stopping = current.map_or(true, |run| run.cancel.is_cancelled());

            if error.is_cancelled() && stopping {
                debug!("poller cancelled during stop");
                return;
            }

            if current.is_some() && lifecycle.state != StreamState::Stopped {
                lifecycle.state = StreamState::Stopped;
                if let Some(run) = &lifecycle.run {
                    run.cancel.cancel();
                }
            }
        }

        warn!(error = %error, category = ?error.category(), "event stream stopped by failure");

        let delivery = self.delivery.lock();
        for listener in &delivery.listeners {
            if listener.on_exception(&error) {
                return;
            }
        }
        debug!("failure was not handled by any listener");
    }
}

/// Long-polling stream of account events.
pub struct EventStream {
    connection: Arc<ApiConnection>,
    shared: Arc<StreamShared>,
}

impl EventStream {
    /// Stream that suppresses the most recent 512 event ids.
    pub fn new(connection: Arc<ApiConnection>) -> Self {
        Self::with_filter(connection, DedupCache::<String>::default())
    }

    /// Stream with a custom duplicate filter.
    pub fn with_filter(
        connection: Arc<ApiConnection>,
        filter: impl DuplicateFilter + 'static,
    ) -> Self {
        Self { connection, shared: Arc::new(StreamShared::new(Box::new(filter))) }
    }

    /// Appends a listener. Delivery follows registration order.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.shared.delivery.lock().listeners.push(listener);
    }

    /// Reflects the started flag, not whether the poller is still running.
    pub fn is_started(&self) -> bool {
        self.shared.lifecycle.lock().state == StreamState::Started
    }

    /// Whether the poller of the latest run is still alive.
    pub fn is_polling(&self) -> bool {
        self.shared
            .lifecycle
            .lock()
            .run
            .as_ref()
            .and_then(|run| run.supervisor.as_ref())
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Bootstraps the position and spawns the poller.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ApiError::IllegalState`] if the stream is not stopped.
    /// - Any error from the bootstrap request; the stream stays stopped.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ApiError> {
        let (run_id, cancel) = self.begin_start()?;
        let pending = PendingStart { shared: &self.shared, run_id, armed: true };

        let page = fetch_page(&self.connection, StreamPosition::Now, &cancel).await?;
        let position = page.next_stream_position;

        let poller = Poller::new(self.connection.clone(), self.shared.clone(), position);
        let poll_task = tokio::spawn(poller.run(cancel.clone()));

        let shared = self.shared.clone();
        let supervisor = tokio::spawn(async move {
            let failure = match poll_task.await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(join_err) if join_err.is_panic() => {
                    Some(ApiError::Internal(format!("event poller panicked: {join_err}")))
                }
                Err(_) => None,
            };
            if let Some(err) = failure {
                shared.notify_exception(run_id, err);
            }
        });

        pending.complete(supervisor, position);
        Ok(())
    }

    /// Cancels the poller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::IllegalState`] if the stream is not started.
    pub fn stop(&self) -> Result<(), ApiError> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != StreamState::Started {
            return Err(ApiError::IllegalState(
                "cannot stop the event stream because it isn't started".into(),
            ));
        }

        lifecycle.state = StreamState::Stopped;
        if let Some(run) = &lifecycle.run {
            run.cancel.cancel();
        }
        info!("event stream stopped");
        Ok(())
    }

    fn begin_start(&self) -> Result<(u64, CancellationToken), ApiError> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != StreamState::Stopped {
            return Err(ApiError::IllegalState(
                "cannot start the event stream because it isn't stopped".into(),
            ));
        }

        lifecycle.runs += 1;
        let id = lifecycle.runs;
        let cancel = CancellationToken::new();
        lifecycle.state = StreamState::Starting;
        lifecycle.run = Some(Run { id, cancel: cancel.clone(), supervisor: None });
        Ok((id, cancel))
    }
}

/// Start in progress between `begin_start` and the poller being spawned.
///
/// Dropped without [`complete`](Self::complete) (bootstrap failed, or the
/// `start()` future was dropped), it returns the stream to stopped.
struct PendingStart<'a> {
    shared: &'a StreamShared,
    run_id: u64,
    armed: bool,
}

impl PendingStart<'_> {
    fn complete(mut self, supervisor: JoinHandle<()>, position: StreamPosition) {
        self.armed = false;
        let mut guard = self.shared.lifecycle.lock();
        let lifecycle = &mut *guard;
        let Some(run) = lifecycle.run.as_mut().filter(|run| run.id == self.run_id) else {
            return;
        };
        run.supervisor = Some(supervisor);
        // The poller may already have failed and stopped the run.
        if lifecycle.state == StreamState::Starting {
            lifecycle.state = StreamState::Started;
            info!(%position, "event stream started");
        } else {
            debug!(%position, "poller failed before start completed");
        }
    }
}

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.run.as_ref().is_some_and(|run| run.id == self.run_id) {
            if let Some(run) = lifecycle.run.take() {
                run.cancel.cancel();
            }
            lifecycle.state = StreamState::Stopped;
            debug!("event stream start abandoned");
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let lifecycle = self.shared.lifecycle.lock();
        if let Some(run) = &lifecycle.run {
            if !run.cancel.is_cancelled() {
                warn!("EventStream dropped while running; cancelling");
                run.cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nimbus_domain::EventType;

    use super::*;
    use crate::events::dedup::NoDedup;
    use crate::http::RequestExecutor;

    #[derive(Default)]
    struct Counting {
        events: AtomicUsize,
        handled: bool,
        exceptions: AtomicUsize,
    }

    impl EventListener for Counting {
        fn on_event(&self, _event: &Event) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exception(&self, _error: &ApiError) -> bool {
            self.exceptions.fetch_add(1, Ordering::SeqCst);
            self.handled
        }
    }

    fn stream_with(filter: impl DuplicateFilter + 'static) -> EventStream {
        let connection =
            ApiConnection::new("http://localhost/", RequestExecutor::new().unwrap()).unwrap();
        EventStream::with_filter(Arc::new(connection), filter)
    }

    #[test]
    fn duplicates_are_dropped_by_default_filter() {
        let stream = stream_with(DedupCache::<String>::default());
        let listener = Arc::new(Counting::default());
        stream.add_listener(listener.clone());

        let event = Event::new("e1", EventType::ItemCreate);
        stream.shared.notify_event(&event);
        stream.shared.notify_event(&event);

        assert_eq!(listener.events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_filter_replaces_dedup() {
        let stream = stream_with(NoDedup);
        let listener = Arc::new(Counting::default());
        stream.add_listener(listener.clone());

        let event = Event::new("e1", EventType::ItemCreate);
        stream.shared.notify_event(&event);
        stream.shared.notify_event(&event);

        assert_eq!(listener.events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn first_handling_listener_stops_propagation() {
        let stream = stream_with(NoDedup);
        let first = Arc::new(Counting { handled: true, ..Default::default() });
        let second = Arc::new(Counting::default());
        stream.add_listener(first.clone());
        stream.add_listener(second.clone());

        stream.shared.notify_exception(1, ApiError::Internal("boom".into()));

        assert_eq!(first.exceptions.load(Ordering::SeqCst), 1);
        assert_eq!(second.exceptions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unhandled_failure_reaches_every_listener() {
        let stream = stream_with(NoDedup);
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        stream.add_listener(first.clone());
        stream.add_listener(second.clone());

        stream.shared.notify_exception(1, ApiError::Status { status: 404, body: String::new() });

        assert_eq!(first.exceptions.load(Ordering::SeqCst), 1);
        assert_eq!(second.exceptions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_of_stale_run_is_suppressed() {
        let stream = stream_with(NoDedup);
        let listener = Arc::new(Counting::default());
        stream.add_listener(listener.clone());

        stream.shared.notify_exception(7, ApiError::Cancelled);

        assert_eq!(listener.exceptions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_before_start_is_illegal() {
        let stream = stream_with(NoDedup);
        assert!(matches!(stream.stop(), Err(ApiError::IllegalState(_))));
        assert!(!stream.is_started());
        assert!(!stream.is_polling());
    }

    #[test]
    fn abandoned_start_returns_to_stopped() {
        let stream = stream_with(NoDedup);
        let (run_id, cancel) = stream.begin_start().unwrap();
        assert!(matches!(stream.begin_start(), Err(ApiError::IllegalState(_))));

        drop(PendingStart { shared: &stream.shared, run_id, armed: true });

        assert!(cancel.is_cancelled());
        assert!(!stream.is_started());
        assert!(stream.begin_start().is_ok());
    }

    #[tokio::test]
    async fn run_failed_during_start_is_not_marked_started() {
        let stream = stream_with(NoDedup);
        let listener = Arc::new(Counting { handled: true, ..Default::default() });
        stream.add_listener(listener.clone());

        let (run_id, cancel) = stream.begin_start().unwrap();
        let pending = PendingStart { shared: &stream.shared, run_id, armed: true };
        stream.shared.notify_exception(run_id, ApiError::Internal("discovery failed".into()));

        pending.complete(tokio::spawn(async {}), StreamPosition::At(0));

        assert!(cancel.is_cancelled());
        assert!(!stream.is_started());
        assert_eq!(listener.exceptions.load(Ordering::SeqCst), 1);
        assert!(matches!(stream.stop(), Err(ApiError::IllegalState(_))));
    }
}
