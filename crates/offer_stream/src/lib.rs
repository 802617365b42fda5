//! Progressive ticket-offer streams for one fixture at a time.

pub mod session;
pub mod synchronizer;

pub use session::{SessionState, StreamSession, ViewStatus};
pub use synchronizer::{OfferSource, OfferStreamSynchronizer};
