//! Accumulated state for one fixture's offer stream.

use common::{FixtureSummary, Offer, StreamEvent, StreamSummary};
use serde::Serialize;
use uuid::Uuid;

/// Progress shown while the expected chunk count is unknown.
pub const PLACEHOLDER_PROGRESS: u8 = 15;
/// Highest progress reported before `complete` arrives.
pub const MAX_ACTIVE_PROGRESS: u8 = 95;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    Active,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// What a view should render for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Idle,
    Loading,
    Ready,
    NoOffers,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    pub session_id: Option<Uuid>,
    pub fixture_id: Option<String>,
    /// Set by the first `fixture` event; later ones are ignored.
    pub fixture: Option<FixtureSummary>,
    pub offers: Vec<Offer>,
    pub state: SessionState,
    /// Offer, batch and non-fatal error messages seen so far.
    pub received_chunks: u32,
    /// Expected chunk count from `metadata`; 0 when unknown.
    pub total_chunks: u32,
    /// Plain-language message once the session failed.
    pub error: Option<String>,
    pub summary: Option<StreamSummary>,
    pub nonfatal_errors: Vec<String>,
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl StreamSession {
    /// A fresh active session for `fixture_id`.
    pub fn start(fixture_id: impl Into<String>, generation: u64) -> Self {
        Self {
            session_id: Some(Uuid::new_v4()),
            fixture_id: Some(fixture_id.into()),
            state: SessionState::Active,
            generation,
            ..Default::default()
        }
    }

    pub(crate) fn idle(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    /// Fold one event into the session. Returns whether anything changed.
    ///
    /// Events are ignored once the session is terminal.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        if self.state != SessionState::Active {
            return false;
        }

        match event {
            StreamEvent::Metadata { total_chunks } => {
                self.total_chunks = total_chunks;
            }
            StreamEvent::Fixture(summary) => {
                if self.fixture.is_some() {
                    return false;
                }
                self.fixture = Some(summary);
            }
            StreamEvent::OffersBatch { offers, .. } => {
                self.offers.extend(offers);
                self.received_chunks = self.received_chunks.saturating_add(1);
            }
            StreamEvent::Offer { offer, .. } => {
                self.offers.push(offer);
                self.received_chunks = self.received_chunks.saturating_add(1);
            }
            StreamEvent::Error { message, fatal: false } => {
                self.nonfatal_errors.push(message);
                self.received_chunks = self.received_chunks.saturating_add(1);
            }
            StreamEvent::Error { fatal: true, .. } => {
                self.state = SessionState::Failed;
                self.error =
                    Some("Ticket offers are unavailable for this match right now. Please try again later.".into());
            }
            StreamEvent::Complete(summary) => {
                self.state = SessionState::Completed;
                self.summary = Some(summary);
            }
        }
        true
    }

    /// Move an active session to Failed with a user-facing message.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.state = SessionState::Failed;
        self.error = Some(message.into());
        true
    }

    /// Derived progress percentage, 0 to 100.
    pub fn progress(&self) -> u8 {
        match self.state {
            SessionState::NotStarted => 0,
            SessionState::Completed => 100,
            SessionState::Active | SessionState::Failed => {
                if self.total_chunks == 0 || self.received_chunks == 0 {
                    return PLACEHOLDER_PROGRESS;
                }
                let received = u64::from(self.received_chunks) * 100;
                let total = u64::from(self.total_chunks);
                let pct = received.div_ceil(total);
                pct.min(u64::from(MAX_ACTIVE_PROGRESS)) as u8
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn status(&self) -> ViewStatus {
        match self.state {
            SessionState::NotStarted => ViewStatus::Idle,
            SessionState::Active => ViewStatus::Loading,
            SessionState::Completed if self.offers.is_empty() => ViewStatus::NoOffers,
            SessionState::Completed => ViewStatus::Ready,
            SessionState::Failed => ViewStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: &str) -> Offer {
        Offer {
            id: id.into(),
            agent: None,
            supplier: None,
            price: 50.0,
            currency: "GBP".into(),
            category: None,
            quantity: Some(2),
            url: None,
        }
    }

    fn summary(id: &str, home: &str) -> FixtureSummary {
        FixtureSummary {
            id: id.into(),
            home_team: Some(home.into()),
            away_team: None,
            date: None,
            venue: None,
            league: None,
        }
    }

    #[test]
    fn test_first_fixture_summary_wins() {
        let mut session = StreamSession::start("F1", 1);
        assert!(session.apply(StreamEvent::Fixture(summary("F1", "Arsenal"))));
        assert!(!session.apply(StreamEvent::Fixture(summary("F1", "Spurs"))));
        assert_eq!(session.fixture.unwrap().home_team.as_deref(), Some("Arsenal"));
    }

    #[test]
    fn test_nonfatal_error_counts_as_chunk() {
        let mut session = StreamSession::start("F1", 1);
        session.apply(StreamEvent::Metadata { total_chunks: 2 });
        session.apply(StreamEvent::Error {
            message: "supplier timeout".into(),
            fatal: false,
        });

        assert_eq!(session.received_chunks, 1);
        assert_eq!(session.progress(), 50);
        assert!(session.is_loading());
        assert_eq!(session.nonfatal_errors, vec!["supplier timeout".to_string()]);
    }

    #[test]
    fn test_fatal_error_keeps_partial_offers() {
        let mut session = StreamSession::start("F1", 1);
        session.apply(StreamEvent::Metadata { total_chunks: 3 });
        session.apply(StreamEvent::OffersBatch {
            offers: vec![offer("O1"), offer("O2")],
            count: 2,
            source: Some("agent-a".into()),
        });
        session.apply(StreamEvent::Error {
            message: "aggregator crashed".into(),
            fatal: true,
        });

        assert_eq!(session.status(), ViewStatus::Failed);
        assert_eq!(session.offers.len(), 2);
        assert_eq!(session.progress(), 34);
        assert!(!session.error.as_deref().unwrap().contains("aggregator"));

        assert!(!session.apply(StreamEvent::Offer {
            offer: offer("O3"),
            source: None,
        }));
        assert_eq!(session.offers.len(), 2);
    }

    #[test]
    fn test_progress_caps_below_complete() {
        let mut session = StreamSession::start("F1", 1);
        session.apply(StreamEvent::Metadata { total_chunks: 2 });
        for i in 0..5 {
            session.apply(StreamEvent::Offer {
                offer: offer(&format!("O{i}")),
                source: None,
            });
        }
        assert_eq!(session.progress(), 95);

        session.apply(StreamEvent::Complete(StreamSummary::default()));
        assert_eq!(session.progress(), 100);
    }

    #[test]
    fn test_unknown_total_uses_placeholder() {
        let mut session = StreamSession::start("F1", 1);
        session.apply(StreamEvent::Offer {
            offer: offer("O1"),
            source: None,
        });
        assert_eq!(session.progress(), PLACEHOLDER_PROGRESS);
        assert_eq!(StreamSession::default().progress(), 0);
    }

    #[test]
    fn test_complete_without_offers_is_no_offers() {
        let mut session = StreamSession::start("F1", 1);
        session.apply(StreamEvent::Metadata { total_chunks: 0 });
        session.apply(StreamEvent::Complete(StreamSummary::default()));

        assert_eq!(session.status(), ViewStatus::NoOffers);
        assert!(!session.is_loading());
        assert!(session.error.is_none());
    }
}
