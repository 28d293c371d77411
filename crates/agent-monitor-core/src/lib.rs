//! Live view of an externally-run decision agent.
//!
//! The agent streams newline-delimited `data: {json}` frames over a single
//! HTTP response. This crate decodes that stream, keeps an append-only session
//! log with a small lifecycle state machine, and derives which stage of the
//! run is active.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agent_monitor_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), MonitorError> {
//! let client = AgentClient::new(MonitorConfig::default().base_url("http://127.0.0.1:8000"))?;
//! let controller = SessionController::new(Arc::new(client));
//!
//! let snapshot = controller.start(RunRequest::new("BTC", 3)?).await;
//! println!("{:?} after {} records", snapshot.status, snapshot.log.len());
//! # Ok(())
//! # }
//! ```

/// Record kind classification into display categories.
pub mod classify;
/// HTTP client for the agent server.
pub mod client;
/// Connection configuration.
pub mod config;
/// Session controller: start/stop and the stream read loop.
pub mod controller;
/// Incremental byte and line decoding of the event stream.
pub mod decoder;
/// Error types.
pub mod errors;
/// Run request and auxiliary endpoint payloads.
pub mod model;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Decoded stream records.
pub mod record;
/// Session state machine and snapshots.
pub mod session;
/// Transport seam consumed by the controller.
pub mod source;
/// Stage inference over a session log.
pub mod stage;

pub use classify::{Classification, DisplayCategory, classify};
pub use client::AgentClient;
pub use config::MonitorConfig;
pub use controller::SessionController;
pub use decoder::{DecodedFrame, EventFrameDecoder, Utf8ChunkDecoder};
pub use errors::{MalformedFrame, MonitorError, SessionFault, SourceError};
pub use model::{Coin, HealthStatus, RunRequest};
pub use observability::init_observability;
pub use record::{EventKind, EventRecord, Payload};
pub use session::{AppendOutcome, LogEntry, RunOutcome, SessionSnapshot, SessionState, SessionStatus};
pub use source::{EventByteStream, EventSource};
pub use stage::{Stage, StageProjection, infer_stage};
