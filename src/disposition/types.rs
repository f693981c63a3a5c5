use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Customer,
}

/// One conversation turn. Immutable once appended; insertion order is
/// authoritative, not the timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Whether the dial attempt reached the customer. Set exactly once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    NotConnected,
}

/// Business outcome of a call attempt.
///
/// Each label requires a specific [`ConnectionStatus`]: a connected-only
/// disposition must never end up on a call that did not connect, and vice
/// versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    // Connected outcomes
    UserClaimedPaymentWithDate,
    UserClaimedPayment,
    UserAgreesToMaintainBalance,
    AgreeToPay,
    General,
    PaymentDueReminder,
    RefusedToPay,
    RtpCounselled,
    HumanHandoffRequested,
    RaiseDisputeWithDetail,
    UserBusyNow,
    NoResponse,
    CustomerHangup,
    DelayReason,
    UncertainPropensityToPay,
    AcceptablePromiseToPay,
    UnacceptablePromiseToPay,
    DoNotCall,
    // Not-connected outcomes
    Busy,
    Failed,
    NoAnswer,
}

impl Disposition {
    /// Every disposition, for exhaustive checks and reporting.
    pub const ALL: [Disposition; 21] = [
        Disposition::UserClaimedPaymentWithDate,
        Disposition::UserClaimedPayment,
        Disposition::UserAgreesToMaintainBalance,
        Disposition::AgreeToPay,
        Disposition::General,
        Disposition::PaymentDueReminder,
        Disposition::RefusedToPay,
        Disposition::RtpCounselled,
        Disposition::HumanHandoffRequested,
        Disposition::RaiseDisputeWithDetail,
        Disposition::UserBusyNow,
        Disposition::NoResponse,
        Disposition::CustomerHangup,
        Disposition::DelayReason,
        Disposition::UncertainPropensityToPay,
        Disposition::AcceptablePromiseToPay,
        Disposition::UnacceptablePromiseToPay,
        Disposition::DoNotCall,
        Disposition::Busy,
        Disposition::Failed,
        Disposition::NoAnswer,
    ];

    /// The connection status this disposition is valid for.
    pub fn required_connection(&self) -> ConnectionStatus {
        match self {
            Disposition::Busy | Disposition::Failed | Disposition::NoAnswer => {
                ConnectionStatus::NotConnected
            }
            _ => ConnectionStatus::Connected,
        }
    }

    /// Human-readable label used in reports and persisted records.
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::UserClaimedPaymentWithDate => "User Claimed Payment with Payment Date",
            Disposition::UserClaimedPayment => "User Claimed Payment",
            Disposition::UserAgreesToMaintainBalance => "User Agrees to Maintain Balance",
            Disposition::AgreeToPay => "Agree To Pay",
            Disposition::General => "General",
            Disposition::PaymentDueReminder => "Payment Due Reminder",
            Disposition::RefusedToPay => "Refused to Pay",
            Disposition::RtpCounselled => "RTP - Counselled",
            Disposition::HumanHandoffRequested => "Human Handoff Requested",
            Disposition::RaiseDisputeWithDetail => "Raise Dispute with Detail",
            Disposition::UserBusyNow => "User Busy Now",
            Disposition::NoResponse => "No Response",
            Disposition::CustomerHangup => "Customer Hangup",
            Disposition::DelayReason => "Delay Reason",
            Disposition::UncertainPropensityToPay => "Uncertain Propensity to Pay",
            Disposition::AcceptablePromiseToPay => "Acceptable Promise To Pay",
            Disposition::UnacceptablePromiseToPay => "Unacceptable Promise To Pay",
            Disposition::DoNotCall => "Do Not Call - Opted Out",
            Disposition::Busy => "Busy",
            Disposition::Failed => "Failed",
            Disposition::NoAnswer => "No Answer",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One disposition evaluation. History is append-only and never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispositionEvent {
    pub timestamp: DateTime<Utc>,
    pub disposition: Disposition,
}

/// Read-only view of a call's disposition state, requestable at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispositionSnapshot {
    pub disposition: Option<Disposition>,
    pub connection_status: Option<ConnectionStatus>,
    pub history: Vec<DispositionEvent>,
    pub transcript: Vec<TranscriptItem>,
    pub call_duration_secs: f64,
}
