use std::collections::BTreeSet;
use std::fmt;

use crate::record::EventKind;
use crate::session::LogEntry;

/// Coarse lifecycle phase of an agent run, in display order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Analyzing,
    Decision,
    Evaluating,
    Learning,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Starting,
        Stage::Analyzing,
        Stage::Decision,
        Stage::Evaluating,
        Stage::Learning,
        Stage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::Analyzing => "analyzing",
            Stage::Decision => "decision",
            Stage::Evaluating => "evaluating",
            Stage::Learning => "learning",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const THROUGH_STARTING: &[Stage] = &[Stage::Starting];
const THROUGH_ANALYZING: &[Stage] = &[Stage::Starting, Stage::Analyzing];
const THROUGH_DECISION: &[Stage] = &[Stage::Starting, Stage::Analyzing, Stage::Decision];
const THROUGH_EVALUATING: &[Stage] = &[
    Stage::Starting,
    Stage::Analyzing,
    Stage::Decision,
    Stage::Evaluating,
];

/// Stage view derived from a session log.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageProjection {
    pub active: Stage,
    pub completed: BTreeSet<Stage>,
}

impl StageProjection {
    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }
}

impl Default for StageProjection {
    fn default() -> Self {
        Self {
            active: Stage::Starting,
            completed: BTreeSet::new(),
        }
    }
}

/// Infers the stage projection from scratch.
///
/// Evidence is the presence of kinds anywhere in the log. A `prompt_updated`
/// record overrides the active stage with `Learning` without touching the
/// completed set, so the active stage is not monotonic.
pub fn infer_stage(log: &[LogEntry]) -> StageProjection {
    let Some(last) = log.last() else {
        return StageProjection::default();
    };
    if last.record.kind == EventKind::Complete {
        return StageProjection {
            active: Stage::Complete,
            completed: Stage::ALL.into_iter().collect(),
        };
    }

    let has = |pred: fn(&EventKind) -> bool| log.iter().any(|entry| pred(&entry.record.kind));
    let (active, completed) = if has(EventKind::is_evaluation) {
        (Stage::Evaluating, THROUGH_EVALUATING)
    } else if has(|k| *k == EventKind::Decision) {
        (Stage::Decision, THROUGH_DECISION)
    } else if has(|k| *k == EventKind::AttemptStart) {
        (Stage::Analyzing, THROUGH_ANALYZING)
    } else {
        (Stage::Starting, THROUGH_STARTING)
    };

    let active = if has(|k| *k == EventKind::PromptUpdated) {
        Stage::Learning
    } else {
        active
    };

    StageProjection {
        active,
        completed: completed.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventRecord;

    fn log_of(tags: &[&str]) -> Vec<LogEntry> {
        tags.iter()
            .enumerate()
            .map(|(seq, tag)| {
                LogEntry::capture(seq as u64, EventRecord::new(*tag, Default::default()))
            })
            .collect()
    }

    #[test]
    fn empty_log_is_starting_with_nothing_completed() {
        let projection = infer_stage(&[]);
        assert_eq!(projection.active, Stage::Starting);
        assert!(projection.completed.is_empty());
    }

    #[test]
    fn status_only_log_completes_starting() {
        let projection = infer_stage(&log_of(&["status"]));
        assert_eq!(projection.active, Stage::Starting);
        assert_eq!(projection.completed, BTreeSet::from([Stage::Starting]));
    }

    #[test]
    fn evidence_picks_the_furthest_stage() {
        let projection = infer_stage(&log_of(&["attempt_start", "decision", "evaluation_result"]));
        assert_eq!(projection.active, Stage::Evaluating);
        for stage in [
            Stage::Starting,
            Stage::Analyzing,
            Stage::Decision,
            Stage::Evaluating,
        ] {
            assert!(projection.is_completed(stage), "{stage}");
        }

        assert_eq!(
            infer_stage(&log_of(&["attempt_start"])).active,
            Stage::Analyzing
        );
        assert_eq!(
            infer_stage(&log_of(&["attempt_start", "decision"])).active,
            Stage::Decision
        );
    }

    #[test]
    fn prompt_update_overrides_active_and_keeps_completed() {
        let before = infer_stage(&log_of(&["attempt_start", "decision", "evaluation_result"]));
        let after = infer_stage(&log_of(&[
            "attempt_start",
            "decision",
            "evaluation_result",
            "prompt_updated",
        ]));
        assert_eq!(after.active, Stage::Learning);
        assert_eq!(after.completed, before.completed);

        let later = infer_stage(&log_of(&[
            "attempt_start",
            "prompt_updated",
            "attempt_start",
            "decision",
        ]));
        assert_eq!(later.active, Stage::Learning);
    }

    #[test]
    fn trailing_complete_marks_every_stage() {
        let projection = infer_stage(&log_of(&["attempt_start", "complete"]));
        assert_eq!(projection.active, Stage::Complete);
        assert_eq!(projection.completed.len(), Stage::ALL.len());
    }
}
