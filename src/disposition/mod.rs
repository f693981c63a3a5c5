//! Call disposition: data model, classification rules and the per-call
//! tracker.
//!
//! Classification is a pure function over the accumulated transcript and the
//! call duration, driven by an ordered keyword rule table that can be loaded
//! from a config file. The tracker owns transcript accumulation, connection
//! status and the append-only disposition history for one call.

mod rules;
mod tracker;
mod types;

pub use rules::{dial_failure_disposition, KeywordRule, RuleSet, RuleTable};
pub use tracker::DispositionTracker;
pub use types::{
    ConnectionStatus, Disposition, DispositionEvent, DispositionSnapshot, Speaker, TranscriptItem,
};
