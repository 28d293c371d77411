use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::errors::SessionFault;
use crate::record::{EventKind, EventRecord};
use crate::stage::{StageProjection, infer_stage};

/// Lifecycle state of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Errored,
    Cancelled,
}

impl SessionStatus {
    /// Completed, Errored and Cancelled end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// A record as captured into the session log. Immutable once appended.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// List identity, unique within and across sessions.
    pub id: uuid::Uuid,
    /// Zero-based insertion index.
    pub seq: u64,
    pub captured_at: DateTime<Utc>,
    pub record: EventRecord,
}

impl LogEntry {
    pub fn capture(seq: u64, record: EventRecord) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            seq,
            captured_at: Utc::now(),
            record,
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.record.kind
    }
}

/// Result of offering a record to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was appended. `terminal` means the session just ended and
    /// the reader must stop.
    Accepted { terminal: bool },
    /// The session is not running; the record was dropped.
    Rejected,
}

/// Business outcome reported by the agent's `complete` record.
///
/// Display data only; it does not influence `SessionStatus`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub attempts: Option<u64>,
}

/// Read-only view of a session, recomputed after every mutation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Option<uuid::Uuid>,
    pub status: SessionStatus,
    pub running: bool,
    pub errored: bool,
    pub log: Vec<LogEntry>,
    pub latest: Option<LogEntry>,
    pub stage: StageProjection,
    pub fault: Option<SessionFault>,
    pub malformed_frames: u64,
}

impl SessionSnapshot {
    /// Outcome carried by a trailing `complete` record, if any.
    pub fn outcome(&self) -> Option<RunOutcome> {
        let latest = self.latest.as_ref()?;
        if latest.record.kind != EventKind::Complete {
            return None;
        }
        Some(RunOutcome {
            success: latest.record.bool_field("success").unwrap_or(false),
            attempts: latest.record.u64_field("attempts"),
        })
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionState::new().snapshot()
    }
}

/// Append-only session log plus its lifecycle state.
///
/// `append`, `fail` and `cancel` are the only transitions out of `Running`;
/// once a terminal state is reached every further record is rejected.
#[derive(Clone, Debug)]
pub struct SessionState {
    session_id: Option<uuid::Uuid>,
    status: SessionStatus,
    log: Vec<LogEntry>,
    fault: Option<SessionFault>,
    malformed_frames: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates an idle session with an empty log.
    pub fn new() -> Self {
        Self {
            session_id: None,
            status: SessionStatus::Idle,
            log: Vec::new(),
            fault: None,
            malformed_frames: 0,
        }
    }

    /// Replaces this state with a fresh running session.
    ///
    /// Returns `false` without touching anything if a run is already active.
    pub fn start(&mut self) -> bool {
        if self.status == SessionStatus::Running {
            return false;
        }
        self.reset();
        let session_id = uuid::Uuid::new_v4();
        self.session_id = Some(session_id);
        self.status = SessionStatus::Running;
        info!(session_id = %session_id, "session started");
        true
    }

    /// Discards the current run and returns to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Appends a record and applies the transition it implies.
    pub fn append(&mut self, record: EventRecord) -> AppendOutcome {
        if self.status != SessionStatus::Running {
            debug!(status = ?self.status, kind = %record.kind, "record rejected: session not running");
            return AppendOutcome::Rejected;
        }

        let classification = classify(&record.kind);
        let seq = self.log.len() as u64;
        debug!(session_id = ?self.session_id, seq, kind = %record.kind, "record appended");

        if classification.terminal {
            match record.kind {
                EventKind::Error => {
                    let message = record
                        .str_field("message")
                        .unwrap_or("agent reported an error")
                        .to_string();
                    self.fault = Some(SessionFault::Reported { message });
                    self.status = SessionStatus::Errored;
                }
                _ => self.status = SessionStatus::Completed,
            }
            info!(session_id = ?self.session_id, status = ?self.status, "session ended");
        }

        self.log.push(LogEntry::capture(seq, record));
        AppendOutcome::Accepted {
            terminal: classification.terminal,
        }
    }

    /// Ends a running session with a synthesized `error` entry.
    pub fn fail(&mut self, fault: SessionFault) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }
        warn!(session_id = ?self.session_id, error = %fault, "session failed");
        let seq = self.log.len() as u64;
        self.log
            .push(LogEntry::capture(seq, EventRecord::error(fault.to_string())));
        self.fault = Some(fault);
        self.status = SessionStatus::Errored;
        true
    }

    /// Cancels a running session. No-op in any other state.
    pub fn cancel(&mut self) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }
        info!(session_id = ?self.session_id, "session cancelled");
        self.status = SessionStatus::Cancelled;
        true
    }

    /// Counts a skipped malformed frame.
    pub fn record_malformed(&mut self) {
        self.malformed_frames = self.malformed_frames.saturating_add(1);
    }

    pub fn session_id(&self) -> Option<uuid::Uuid> {
        self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn has_error(&self) -> bool {
        self.status == SessionStatus::Errored
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.log.last()
    }

    pub fn fault(&self) -> Option<&SessionFault> {
        self.fault.as_ref()
    }

    pub fn stage(&self) -> StageProjection {
        infer_stage(&self.log)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            status: self.status,
            running: self.is_running(),
            errored: self.has_error(),
            log: self.log.clone(),
            latest: self.latest().cloned(),
            stage: self.stage(),
            fault: self.fault.clone(),
            malformed_frames: self.malformed_frames,
        }
    }
}
