use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

use super::rules::RuleSet;
use super::types::{
    ConnectionStatus, Disposition, DispositionEvent, DispositionSnapshot, Speaker, TranscriptItem,
};

/// Per-call disposition state: transcript accumulation, connection status and
/// the evaluation history.
///
/// One instance per call, mutated by a single logical writer (the session's
/// event consumer serializes all mutations behind its mutex).
pub struct DispositionTracker {
    rules: Arc<RuleSet>,
    current: Option<Disposition>,
    history: Vec<DispositionEvent>,
    connection_status: Option<ConnectionStatus>,
    transcript: Vec<TranscriptItem>,
    started_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
    forced: bool,
}

impl DispositionTracker {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            current: None,
            history: Vec::new(),
            connection_status: None,
            transcript: Vec::new(),
            started_at: Utc::now(),
            connected_at: None,
            forced: false,
        }
    }

    /// Record the dial outcome.
    ///
    /// # Panics
    ///
    /// Callable exactly once per call; a second call is a programmer error
    /// and panics.
    pub fn set_connection_status(&mut self, connected: bool) {
        assert!(
            self.connection_status.is_none(),
            "connection status already set"
        );
        self.connection_status = Some(if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::NotConnected
        });
        if connected {
            self.connected_at = Some(Utc::now());
        }
    }

    /// Append a conversation turn. Never fails; out-of-order timestamps are
    /// kept in arrival order.
    pub fn add_transcript_item(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptItem {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    /// Re-evaluate the disposition, or force one for an explicit business
    /// event (opt-out, completed transfer). Every invocation appends to the
    /// history, repeated identical values included.
    pub fn update_disposition(&mut self, force: Option<Disposition>) {
        let disposition = match force {
            Some(d) => {
                if let Some(status) = self.connection_status {
                    if d.required_connection() != status {
                        // Caller contract violation: surface it, but honor the
                        // forced value rather than silently correcting it.
                        error!(
                            disposition = %d,
                            connection_status = ?status,
                            "forced disposition conflicts with recorded connection status"
                        );
                    }
                }
                self.forced = true;
                d
            }
            None => self
                .rules
                .classify(&self.transcript, self.call_duration_secs()),
        };

        self.current = Some(disposition);
        self.history.push(DispositionEvent {
            timestamp: Utc::now(),
            disposition,
        });
    }

    /// Whether the current disposition came from an explicit business event
    /// rather than transcript analysis.
    pub fn was_forced(&self) -> bool {
        self.forced
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        self.connection_status
    }

    pub fn current_disposition(&self) -> Option<Disposition> {
        self.current
    }

    pub fn transcript(&self) -> &[TranscriptItem] {
        &self.transcript
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn call_duration_secs(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        elapsed.num_milliseconds() as f64 / 1000.0
    }

    /// Read-only view of the tracker state. Callable any number of times,
    /// including before any disposition update (disposition is then `None`).
    pub fn snapshot(&self) -> DispositionSnapshot {
        if let (Some(d), Some(status)) = (self.current, self.connection_status) {
            if d.required_connection() != status {
                warn!(
                    disposition = %d,
                    connection_status = ?status,
                    "final disposition is incompatible with the connection status"
                );
            }
        }
        DispositionSnapshot {
            disposition: self.current,
            connection_status: self.connection_status,
            history: self.history.clone(),
            transcript: self.transcript.clone(),
            call_duration_secs: self.call_duration_secs(),
        }
    }
}
