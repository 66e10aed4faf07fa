//! Proctoring kernel
//!
//! Ingests frames from remote exam-monitoring clients, runs every configured
//! detector capability over each frame, fuses the categorical readings into a
//! per-frame suspicion verdict, and keeps a per-session activity log from
//! which violation summaries are derived.
//!
//! # Module Structure
//!
//! - `frame`: decoded RGB8 rasters
//! - `detect`: detector capability contracts, the shared `DetectorSet`, built-in backends
//! - `analyzer`: one isolated pass of every detector over one frame
//! - `fusion`: per-frame suspicion rules
//! - `session`: per-session log, blink state, summary, and the session registry
//! - `engine`: the facade the HTTP API and CLI tools drive
//! - `api`: blocking HTTP/1.1 boundary
//! - `config`: `proctord` configuration (JSON file plus `PROCTOR_*` overrides)
//! - `error`: domain errors and their HTTP status mapping

use chrono::{SecondsFormat, Utc};

pub mod analyzer;
pub mod api;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod session;

pub use analyzer::{DetectorFailure, FrameAnalyzer, RawResultSet};
pub use detect::{
    AudioStatus, BlinkStatus, Capability, DetectorSet, FaceRegion, FaceStatus, GazeStatus,
    HeadPoseStatus, StubBackend,
};
pub use engine::ProctorEngine;
pub use error::ProctorError;
pub use frame::Frame;
pub use fusion::{fuse, SuspicionTag, SuspicionTags};
pub use session::{FrameAnalysis, Session, SessionRegistry, SessionSummary};

/// ISO-8601 UTC timestamp with microsecond precision, as stamped on records.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
