use crate::record::EventKind;

/// Presentation bucket for a record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCategory {
    Success,
    Failure,
    Informational,
    Progress,
}

/// Result of classifying a record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub category: DisplayCategory,
    /// The record ends the session.
    pub terminal: bool,
}

/// Classifies a kind. Total: unknown kinds are informational and non-terminal.
pub fn classify(kind: &EventKind) -> Classification {
    let category = match kind {
        EventKind::Success | EventKind::Complete => DisplayCategory::Success,
        EventKind::Failure | EventKind::Error => DisplayCategory::Failure,
        EventKind::AttemptStart
        | EventKind::Decision
        | EventKind::Evaluation
        | EventKind::EvaluationResult
        | EventKind::PromptUpdated
        | EventKind::Countdown => DisplayCategory::Progress,
        EventKind::Status | EventKind::PriceUpdate | EventKind::Other(_) => {
            DisplayCategory::Informational
        }
    };
    Classification {
        category,
        terminal: is_terminal(kind),
    }
}

/// True exactly for `complete` and `error`.
pub fn is_terminal(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Complete | EventKind::Error)
}
