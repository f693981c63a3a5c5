// Integration tests for disposition classification
//
// These exercise the built-in rule table end to end: rule ordering, the
// date upgrade, the short-call gate and the connection-status contract.

use chrono::Utc;
use outdial::disposition::{
    dial_failure_disposition, ConnectionStatus, Disposition, Speaker, TranscriptItem,
};
use outdial::RuleSet;

fn customer(text: &str) -> TranscriptItem {
    TranscriptItem {
        speaker: Speaker::Customer,
        text: text.to_string(),
        timestamp: Utc::now(),
    }
}

fn agent(text: &str) -> TranscriptItem {
    TranscriptItem {
        speaker: Speaker::Agent,
        text: text.to_string(),
        timestamp: Utc::now(),
    }
}

#[test]
fn payment_claim_with_relative_date() {
    let rules = RuleSet::builtin();
    let transcript = vec![
        agent("This is a reminder about your outstanding balance."),
        customer("I already paid it yesterday"),
    ];
    assert_eq!(
        rules.classify(&transcript, 35.0),
        Disposition::UserClaimedPaymentWithDate
    );
}

#[test]
fn handoff_request_wins_over_everything_else() {
    let rules = RuleSet::builtin();
    let transcript = vec![customer("I'm busy and I refuse, just get me a person")];
    assert_eq!(
        rules.classify(&transcript, 40.0),
        Disposition::HumanHandoffRequested
    );
}

#[test]
fn refusal_without_payment_words() {
    let rules = RuleSet::builtin();
    let transcript = vec![customer("I refuse, this is not my responsibility")];
    assert_eq!(rules.classify(&transcript, 40.0), Disposition::RefusedToPay);
}

#[test]
fn promise_with_date_is_acceptable() {
    let rules = RuleSet::builtin();
    let transcript = vec![customer("I promise, definitely tomorrow")];
    assert_eq!(
        rules.classify(&transcript, 40.0),
        Disposition::AcceptablePromiseToPay
    );
}

#[test]
fn delay_reason_needs_enough_words() {
    let rules = RuleSet::builtin();
    let long = vec![customer(
        "i could not make it because my salary got delayed a lot",
    )];
    assert_eq!(rules.classify(&long, 40.0), Disposition::DelayReason);

    // Same trigger word, too few words for the rule.
    let short = vec![customer("because of that")];
    assert_ne!(rules.classify(&short, 40.0), Disposition::DelayReason);
}

#[test]
fn short_call_is_a_hangup_regardless_of_text() {
    let rules = RuleSet::builtin();
    let transcript = vec![customer("I already paid it yesterday")];
    assert_eq!(rules.classify(&transcript, 4.2), Disposition::CustomerHangup);
}

#[test]
fn no_customer_speech_is_no_response() {
    let rules = RuleSet::builtin();
    let transcript = vec![agent("Hello, am I speaking with the account holder?")];
    assert_eq!(rules.classify(&transcript, 30.0), Disposition::NoResponse);
    assert_eq!(rules.classify(&[], 30.0), Disposition::NoResponse);
}

#[test]
fn fallbacks_depend_on_word_count() {
    let rules = RuleSet::builtin();
    let long = vec![customer("the weather is quite nice over here")];
    assert_eq!(rules.classify(&long, 30.0), Disposition::General);

    let short = vec![customer("hello yes")];
    assert_eq!(rules.classify(&short, 30.0), Disposition::PaymentDueReminder);
}

#[test]
fn classification_is_deterministic() {
    let rules = RuleSet::builtin();
    let transcript = vec![
        customer("I'm in a meeting right now"),
        customer("call later please"),
    ];
    let first = rules.classify(&transcript, 25.0);
    for _ in 0..10 {
        assert_eq!(rules.classify(&transcript, 25.0), first);
    }
    assert_eq!(first, Disposition::UserBusyNow);
}

#[test]
fn dial_failure_statuses_map_to_not_connected_labels() {
    assert_eq!(
        dial_failure_disposition("486 Busy Here"),
        Some(Disposition::Busy)
    );
    assert_eq!(
        dial_failure_disposition("no answer from callee"),
        Some(Disposition::NoAnswer)
    );
    assert_eq!(
        dial_failure_disposition("request timeout"),
        Some(Disposition::NoAnswer)
    );
    assert_eq!(
        dial_failure_disposition("call failed"),
        Some(Disposition::Failed)
    );
    assert_eq!(dial_failure_disposition("200 OK"), None);
}

#[test]
fn only_dial_failures_require_not_connected() {
    for d in Disposition::ALL {
        let expect_not_connected = matches!(
            d,
            Disposition::Busy | Disposition::Failed | Disposition::NoAnswer
        );
        let status = d.required_connection();
        if expect_not_connected {
            assert_eq!(status, ConnectionStatus::NotConnected, "{d}");
        } else {
            assert_eq!(status, ConnectionStatus::Connected, "{d}");
        }
    }
}
