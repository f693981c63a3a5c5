use serde::{Deserialize, Serialize};

/// Who to call and why: the dispatch parameters for one outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialInfo {
    /// Number to dial, optionally as a "from,to" pair.
    pub phone_number: String,
    /// Human agent number for handoff, when available.
    #[serde(default)]
    pub transfer_to: Option<String>,
    /// Opaque account context (customer name, amounts due, ...) passed
    /// through to the speech agent.
    #[serde(default)]
    pub account: serde_json::Value,
}

impl DialInfo {
    /// The number to actually dial. A "from,to" pair dials the second part;
    /// anything else is dialed as-is.
    pub fn dial_target(&self) -> &str {
        match self.phone_number.split_once(',') {
            Some((_from, to)) => to.trim(),
            None => self.phone_number.trim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dial(number: &str) -> DialInfo {
        DialInfo {
            phone_number: number.to_string(),
            transfer_to: None,
            account: serde_json::Value::Null,
        }
    }

    #[test]
    fn bare_number_is_dialed_as_is() {
        assert_eq!(dial("+15550100").dial_target(), "+15550100");
    }

    #[test]
    fn from_to_pair_dials_the_second_part() {
        assert_eq!(dial("+15550100, +15550199").dial_target(), "+15550199");
    }
}
