//! Common imports for typical monitor usage.
pub use crate::{
    AgentClient, EventKind, EventRecord, EventSource, LogEntry, MonitorConfig, MonitorError,
    RunRequest, SessionController, SessionSnapshot, SessionStatus, Stage, StageProjection,
};
