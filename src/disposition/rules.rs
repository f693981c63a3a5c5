use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use super::types::{Disposition, Speaker, TranscriptItem};

/// A single keyword rule in the classification table.
///
/// Rules are evaluated in ascending `priority` order; the first match wins,
/// so relative priority is part of the classification contract.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub priority: u32,
    /// Keywords matched as case-folded substrings of the customer text.
    pub keywords: Vec<String>,
    /// When true, every keyword must be present; otherwise any one suffices.
    #[serde(default)]
    pub match_all: bool,
    /// Minimum customer word count for the rule to apply.
    #[serde(default)]
    pub min_words: Option<usize>,
    pub disposition: Disposition,
    /// Upgraded disposition when the customer text also contains a date.
    #[serde(default)]
    pub with_date: Option<Disposition>,
}

/// Externally loadable classification data: the keyword rules plus the date
/// patterns consulted by rules that carry a `with_date` upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<KeywordRule>,
    pub date_patterns: Vec<String>,
}

impl Default for RuleTable {
    fn default() -> Self {
        let kw = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            rules: vec![
                KeywordRule {
                    priority: 10,
                    keywords: kw(&[
                        "human",
                        "agent",
                        "person",
                        "representative",
                        "speak to someone",
                        "talk to someone",
                        "real person",
                        "supervisor",
                        "manager",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::HumanHandoffRequested,
                    with_date: None,
                },
                KeywordRule {
                    priority: 20,
                    keywords: kw(&[
                        "busy",
                        "driving",
                        "meeting",
                        "not free",
                        "call later",
                        "bad time",
                        "occupied",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::UserBusyNow,
                    with_date: None,
                },
                KeywordRule {
                    priority: 30,
                    keywords: kw(&[
                        "paid",
                        "payment",
                        "pay",
                        "made payment",
                        "already paid",
                        "cleared",
                        "settled",
                        "deposited",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::UserClaimedPayment,
                    with_date: Some(Disposition::UserClaimedPaymentWithDate),
                },
                KeywordRule {
                    priority: 40,
                    keywords: kw(&[
                        "won't pay",
                        "not paying",
                        "refuse",
                        "can't pay",
                        "no money",
                        "not my responsibility",
                        "won't",
                        "can't",
                        "unable",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::RefusedToPay,
                    with_date: None,
                },
                KeywordRule {
                    priority: 50,
                    keywords: kw(&[
                        "will pay",
                        "promise",
                        "guarantee",
                        "definitely",
                        "surely",
                        "tomorrow",
                        "next week",
                        "by",
                        "on",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::AgreeToPay,
                    with_date: Some(Disposition::AcceptablePromiseToPay),
                },
                KeywordRule {
                    priority: 60,
                    keywords: kw(&[
                        "dispute",
                        "complaint",
                        "issue",
                        "problem",
                        "error",
                        "mistake",
                        "wrong",
                        "incorrect",
                    ]),
                    match_all: false,
                    min_words: None,
                    disposition: Disposition::RaiseDisputeWithDetail,
                    with_date: None,
                },
                KeywordRule {
                    priority: 70,
                    keywords: kw(&["maintain", "balance"]),
                    match_all: true,
                    min_words: None,
                    disposition: Disposition::UserAgreesToMaintainBalance,
                    with_date: None,
                },
                KeywordRule {
                    priority: 80,
                    keywords: kw(&["because", "due to", "reason", "why", "since"]),
                    match_all: false,
                    min_words: Some(11),
                    disposition: Disposition::DelayReason,
                    with_date: None,
                },
            ],
            date_patterns: vec![
                r"(?i)\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b".to_string(),
                r"(?i)\b(yesterday|today|tomorrow|last\s+week|last\s+month)\b".to_string(),
                r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b".to_string(),
                r"(?i)\b\d{1,2}(st|nd|rd|th)\s+(january|february|march|april|may|june|july|august|september|october|november|december)\b".to_string(),
            ],
        }
    }
}

/// Compiled classification rules. Pure: classification has no state or I/O.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<KeywordRule>,
    date_patterns: Vec<Regex>,
}

impl RuleSet {
    /// Compile a rule table. Rules are sorted by priority; pattern compile
    /// errors surface here, never during classification.
    pub fn new(table: RuleTable) -> Result<Self> {
        let mut rules = table.rules;
        rules.sort_by_key(|r| r.priority);

        let date_patterns = table
            .date_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid date pattern: {p}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            date_patterns,
        })
    }

    /// The built-in rule table.
    pub fn builtin() -> Self {
        Self::new(RuleTable::default()).expect("built-in rule table compiles")
    }

    /// Load a rule table from a config file (TOML/JSON/YAML by extension).
    pub fn from_path(path: &str) -> Result<Self> {
        let table: RuleTable = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("failed to read rule table {path}"))?
            .try_deserialize()
            .context("failed to deserialize rule table")?;
        Self::new(table)
    }

    /// Classify a conversation into a disposition.
    ///
    /// Deterministic and total: the same transcript and duration always yield
    /// the same label, and there is always a label. Evaluation order:
    /// short-call gate, empty-text gate, the keyword table in priority order,
    /// then the word-count fallbacks.
    pub fn classify(&self, transcript: &[TranscriptItem], call_duration_secs: f64) -> Disposition {
        // Calls shorter than 10 seconds are immediate disconnects regardless
        // of what was said.
        if call_duration_secs > 0.0 && call_duration_secs < 10.0 {
            return Disposition::CustomerHangup;
        }

        let customer_text = transcript
            .iter()
            .filter(|item| item.speaker == Speaker::Customer)
            .map(|item| item.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        if customer_text.trim().is_empty() {
            return Disposition::NoResponse;
        }

        let word_count = customer_text.split_whitespace().count();

        for rule in &self.rules {
            if let Some(min) = rule.min_words {
                if word_count < min {
                    continue;
                }
            }
            let hit = if rule.match_all {
                rule.keywords.iter().all(|kw| customer_text.contains(kw))
            } else {
                rule.keywords.iter().any(|kw| customer_text.contains(kw))
            };
            if !hit {
                continue;
            }
            if let Some(upgraded) = rule.with_date {
                if self.contains_date(&customer_text) {
                    return upgraded;
                }
            }
            return rule.disposition;
        }

        // Conversation happened but no rule fired.
        if word_count > 5 {
            return Disposition::General;
        }

        Disposition::PaymentDueReminder
    }

    fn contains_date(&self, text: &str) -> bool {
        self.date_patterns.iter().any(|re| re.is_match(text))
    }
}

/// Map a telephony failure status to a not-connected disposition.
///
/// Returns `None` when the text carries no failure signal, meaning the call
/// did connect.
pub fn dial_failure_disposition(raw_status: &str) -> Option<Disposition> {
    let status = raw_status.to_lowercase();

    if status.contains("busy") {
        Some(Disposition::Busy)
    } else if status.contains("no answer") || status.contains("timeout") {
        Some(Disposition::NoAnswer)
    } else if status.contains("failed") || status.contains("error") {
        Some(Disposition::Failed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn customer(text: &str) -> TranscriptItem {
        TranscriptItem {
            speaker: Speaker::Customer,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn rule_order_prefers_handoff_over_busy() {
        // "busy" and "person" both present; the handoff rule has the lower
        // priority number and must win.
        let rules = RuleSet::builtin();
        let transcript = vec![customer("I'm busy, get me a real person")];
        assert_eq!(
            rules.classify(&transcript, 60.0),
            Disposition::HumanHandoffRequested
        );
    }

    #[test]
    fn payment_claim_without_date() {
        let rules = RuleSet::builtin();
        let transcript = vec![customer("the payment was settled")];
        assert_eq!(
            rules.classify(&transcript, 60.0),
            Disposition::UserClaimedPayment
        );
    }

    #[test]
    fn maintain_balance_requires_both_keywords() {
        let rules = RuleSet::builtin();
        let t1 = vec![customer("i maintain that view")];
        assert_ne!(
            rules.classify(&t1, 60.0),
            Disposition::UserAgreesToMaintainBalance
        );
        let t2 = vec![customer("i will maintain the minimum balance")];
        assert_eq!(
            rules.classify(&t2, 60.0),
            Disposition::UserAgreesToMaintainBalance
        );
    }

    #[test]
    fn numeric_date_pattern_matches() {
        let rules = RuleSet::builtin();
        let transcript = vec![customer("already paid it 12/05/2024")];
        assert_eq!(
            rules.classify(&transcript, 60.0),
            Disposition::UserClaimedPaymentWithDate
        );
    }

    #[test]
    fn custom_table_overrides_builtin() {
        let table = RuleTable {
            rules: vec![KeywordRule {
                priority: 1,
                keywords: vec!["anything".to_string()],
                match_all: false,
                min_words: None,
                disposition: Disposition::General,
                with_date: None,
            }],
            date_patterns: vec![],
        };
        let rules = RuleSet::new(table).unwrap();
        let transcript = vec![customer("anything at all")];
        assert_eq!(rules.classify(&transcript, 60.0), Disposition::General);
    }
}
