//! Drives one offer stream at a time and publishes the session view.
//!
//! The view lives in a `watch` channel. Every session carries a
//! generation number; the pump task for a session only mutates the view
//! while that generation is current, so a replaced stream can never leak
//! events into its successor.

use common::{Error, StreamEvent};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use gateway_client::OfferStreamClient;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::StreamSession;

const ENDED_EARLY: &str =
    "The offer feed closed before all ticket offers arrived. Please try again.";

/// Anything that can open a fixture's offer event stream.
pub trait OfferSource: Send + Sync + 'static {
    fn open(&self, fixture_id: &str) -> BoxStream<'static, Result<StreamEvent, Error>>;
}

impl OfferSource for OfferStreamClient {
    fn open(&self, fixture_id: &str) -> BoxStream<'static, Result<StreamEvent, Error>> {
        OfferStreamClient::open(self, fixture_id)
    }
}

/// Keeps at most one live stream per consumer.
pub struct OfferStreamSynchronizer<S: OfferSource> {
    source: Arc<S>,
    state: Arc<watch::Sender<StreamSession>>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl<S: OfferSource> OfferStreamSynchronizer<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (tx, _rx) = watch::channel(StreamSession::default());
        Self {
            source,
            state: Arc::new(tx),
            task: None,
            generation: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamSession> {
        self.state.subscribe()
    }

    /// Current session snapshot.
    pub fn view(&self) -> StreamSession {
        self.state.borrow().clone()
    }

    pub fn fixture_id(&self) -> Option<String> {
        self.state.borrow().fixture_id.clone()
    }

    /// Switch to a fixture, or to none.
    ///
    /// The previous stream is torn down and its session replaced before
    /// this returns. Setting the current fixture again is a no-op. Must
    /// be called from within a Tokio runtime.
    pub fn set_fixture(&mut self, fixture_id: Option<&str>) {
        let next = fixture_id.map(str::trim).filter(|id| !id.is_empty());
        if next == self.fixture_id().as_deref() {
            return;
        }

        self.stop_task();
        self.generation += 1;
        let generation = self.generation;

        match next {
            Some(id) => {
                let session = StreamSession::start(id, generation);
                info!(
                    "Opening offer stream for fixture {} (session {:?})",
                    id, session.session_id
                );
                self.state.send_replace(session);
                let events = self.source.open(id);
                self.task = Some(tokio::spawn(pump(
                    events,
                    self.state.clone(),
                    id.to_string(),
                    generation,
                )));
            }
            None => {
                self.state.send_replace(StreamSession::idle(generation));
            }
        }
    }

    /// Close any live stream and reset to idle.
    pub fn teardown(&mut self) {
        self.stop_task();
        self.generation += 1;
        self.state.send_replace(StreamSession::idle(self.generation));
    }

    /// Wait until the current session stops loading.
    pub async fn finished(&self) -> StreamSession {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|session| !session.is_loading()).await.map(|session| session.clone());
        match settled {
            Ok(session) => session,
            Err(_) => self.view(),
        }
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Stopped offer stream (generation {})", self.generation);
        }
    }
}

impl<S: OfferSource> Drop for OfferStreamSynchronizer<S> {
    fn drop(&mut self) {
        self.stop_task();
    }
}

/// Read events for one session until it ends or is replaced.
async fn pump(
    mut events: BoxStream<'static, Result<StreamEvent, Error>>,
    state: Arc<watch::Sender<StreamSession>>,
    fixture_id: String,
    generation: u64,
) {
    while let Some(item) = events.next().await {
        match &item {
            Ok(StreamEvent::Error { message, fatal }) => {
                warn!(
                    "Offer stream {} reported error (fatal={}): {}",
                    fixture_id, fatal, message
                );
            }
            Err(e) => warn!("Offer stream {} failed: {}", fixture_id, e),
            Ok(_) => {}
        }

        let mut current = true;
        let mut terminal = false;
        state.send_if_modified(|session| {
            if session.generation != generation {
                current = false;
                return false;
            }
            let changed = match item {
                Ok(event) => session.apply(event),
                Err(e) => session.fail(e.user_message()),
            };
            terminal = session.is_terminal();
            changed
        });

        if !current {
            debug!("Dropping events for replaced session of fixture {}", fixture_id);
            return;
        }
        if terminal {
            let view = state.borrow();
            info!(
                "Offer stream {} finished: {:?} with {} offers",
                fixture_id,
                view.state,
                view.offers.len()
            );
            return;
        }
    }

    state.send_if_modified(|session| {
        session.generation == generation && session.fail(ENDED_EARLY)
    });
    warn!("Offer stream {} ended without completing", fixture_id);
}
