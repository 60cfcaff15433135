//! Durable storage for the shorts pipeline.
//!
//! The asset ledger remembers every identifier that reached a terminal
//! outcome, so a later run never processes the same asset twice. The track
//! history keeps background music from repeating across shorts.

mod json_set;

pub mod error;
pub mod ledger;
pub mod tracks;

pub use error::{LedgerError, LedgerResult};
pub use ledger::AssetLedger;
pub use tracks::TrackHistory;
