use serde::{Deserialize, Serialize};

/// Routing discipline of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowType {
    /// Recipients act one at a time in ascending `order`.
    Sequential,
    /// Every actionable recipient is active from `send()` on.
    Parallel,
}

/// Envelope-level lifecycle.
///
/// `Draft → Sent → InProgress → Completed`, with `Declined`, `Cancelled` and
/// `Expired` reachable from any non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeStatus {
    Draft,
    Sent,
    InProgress,
    Completed,
    Declined,
    Cancelled,
    Expired,
}

impl EnvelopeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnvelopeStatus::Completed
                | EnvelopeStatus::Declined
                | EnvelopeStatus::Cancelled
                | EnvelopeStatus::Expired
        )
    }

    /// Sent or in progress: recipients may act.
    pub fn is_routing(&self) -> bool {
        matches!(self, EnvelopeStatus::Sent | EnvelopeStatus::InProgress)
    }
}

impl std::fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvelopeStatus::Draft => "DRAFT",
            EnvelopeStatus::Sent => "SENT",
            EnvelopeStatus::InProgress => "IN_PROGRESS",
            EnvelopeStatus::Completed => "COMPLETED",
            EnvelopeStatus::Declined => "DECLINED",
            EnvelopeStatus::Cancelled => "CANCELLED",
            EnvelopeStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}
