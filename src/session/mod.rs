//! Proctoring sessions.
//!
//! A `Session` owns one exam taker's activity log and blink state (the
//! cumulative count plus the previous frame's open-eye reading). Two locks
//! guard it:
//!
//! - the analysis lock, held for a whole `submit_frame` (detector run, blink
//!   edge, fusion and log append) and for `reset`. At most one frame is
//!   analysed per session at a time, and log order is lock-acquisition order.
//! - the log lock, held only to push a record or copy the log. Readers never
//!   wait for a detector run.
//!
//! Arrival order of two racing submissions to the same session is whichever
//! takes the analysis lock first.

pub mod registry;
mod summary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use crate::analyzer::{FrameAnalyzer, RawResultSet};
use crate::detect::{AudioStatus, BlinkStatus, EyeReading, FaceStatus, GazeStatus};
use crate::detect::{HeadPoseStatus, ObjectLabels};
use crate::error::ProctorError;
use crate::frame::Frame;
use crate::fusion::{self, SuspicionTag, SuspicionTags};

pub use registry::SessionRegistry;
pub use summary::SessionSummary;

/// Immutable record of one analysed frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub timestamp: String,
    pub face_status: FaceStatus,
    pub faces_count: usize,
    pub gaze_direction: GazeStatus,
    pub head_pose: HeadPoseStatus,
    pub detected_objects: ObjectLabels,
    pub blink_status: BlinkStatus,
    /// Session blink count including this frame.
    pub blink_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_status: Option<AudioStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_volume: Option<u32>,
    pub suspicious_activity: SuspicionTags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameAnalysis {
    fn from_results(
        timestamp: String,
        results: &RawResultSet,
        tags: SuspicionTags,
        blink_status: BlinkStatus,
        blink_count: u64,
    ) -> Self {
        Self {
            timestamp,
            face_status: results.face.status,
            faces_count: results.face.faces.len(),
            gaze_direction: results.gaze,
            head_pose: results.head_pose,
            detected_objects: results.objects.clone(),
            blink_status,
            blink_count,
            audio_status: results.audio.map(|a| a.status),
            audio_volume: results.audio.map(|a| a.peak_volume),
            suspicious_activity: tags,
            error: None,
        }
    }

    /// Record for a frame whose analysis hit a detector error.
    ///
    /// Every categorical field carries its error sentinel and the only tag is
    /// `analysis_error`.
    pub(crate) fn failed(
        timestamp: String,
        error: String,
        blink_count: u64,
        audio_enabled: bool,
    ) -> Self {
        Self {
            timestamp,
            face_status: FaceStatus::Error,
            faces_count: 0,
            gaze_direction: GazeStatus::Error,
            head_pose: HeadPoseStatus::Error,
            detected_objects: ObjectLabels::new(),
            blink_status: BlinkStatus::Error,
            blink_count,
            audio_status: audio_enabled.then_some(AudioStatus::Error),
            audio_volume: audio_enabled.then_some(0),
            suspicious_activity: fusion::error_tags(),
            error: Some(error),
        }
    }

    pub fn has_tag(&self, tag: SuspicionTag) -> bool {
        self.suspicious_activity.contains(&tag)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Blink bookkeeping carried from frame to frame.
#[derive(Debug, Default)]
struct BlinkState {
    count: u64,
    previous_eyes: u32,
}

impl BlinkState {
    /// A blink is at least two open eyes on the previous face frame and none
    /// on this one. Frames without a face leave the previous reading alone.
    fn observe(&mut self, eyes: EyeReading) -> BlinkStatus {
        match eyes {
            EyeReading::Visible(current) => {
                let blinked = self.previous_eyes >= 2 && current == 0;
                self.previous_eyes = current;
                if blinked {
                    self.count += 1;
                    BlinkStatus::Blink
                } else {
                    BlinkStatus::NoBlink
                }
            }
            EyeReading::NoFace => BlinkStatus::NoBlink,
            EyeReading::Error => BlinkStatus::Error,
        }
    }
}

/// One monitored exam session.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    /// Holding this lock is the right to analyse.
    analysis: Mutex<BlinkState>,
    log: RwLock<Vec<FrameAnalysis>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            analysis: Mutex::new(BlinkState::default()),
            log: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Analyse one frame and append the result to the log.
    pub fn submit_frame(
        &self,
        analyzer: &FrameAnalyzer,
        frame: &Frame,
    ) -> Result<FrameAnalysis, ProctorError> {
        let mut blink = self
            .analysis
            .lock()
            .map_err(|_| ProctorError::Poisoned("session analysis"))?;

        let started = Instant::now();
        let timestamp = crate::timestamp_now();
        let results = analyzer.analyze(frame);

        let record = match results.error_message() {
            Some(error) => FrameAnalysis::failed(
                timestamp,
                error,
                blink.count,
                analyzer.detectors().has_audio(),
            ),
            None => {
                let status = blink.observe(results.eyes);
                let tags = fusion::fuse(&results);
                FrameAnalysis::from_results(timestamp, &results, tags, status, blink.count)
            }
        };

        self.log
            .write()
            .map_err(|_| ProctorError::Poisoned("session log"))?
            .push(record.clone());

        log::debug!(
            "session {}: frame analysed in {:?}, tags={:?}",
            self.id,
            started.elapsed(),
            record.suspicious_activity
        );
        Ok(record)
    }

    /// Snapshot of the full activity log.
    pub fn activity_log(&self) -> Result<Vec<FrameAnalysis>, ProctorError> {
        Ok(self.read_log()?.clone())
    }

    /// Snapshot of the last `limit` records, plus the full log length.
    pub fn recent_activity(
        &self,
        limit: usize,
    ) -> Result<(Vec<FrameAnalysis>, usize), ProctorError> {
        let log = self.read_log()?;
        let start = log.len().saturating_sub(limit);
        Ok((log[start..].to_vec(), log.len()))
    }

    pub fn frames_analyzed(&self) -> Result<usize, ProctorError> {
        Ok(self.read_log()?.len())
    }

    pub fn summary(&self) -> Result<SessionSummary, ProctorError> {
        Ok(SessionSummary::from_log(&self.read_log()?))
    }

    /// Clear the log and blink state. Waits for an in-flight analysis.
    pub fn reset(&self) -> Result<(), ProctorError> {
        let mut blink = self
            .analysis
            .lock()
            .map_err(|_| ProctorError::Poisoned("session analysis"))?;
        let mut log = self
            .log
            .write()
            .map_err(|_| ProctorError::Poisoned("session log"))?;
        log.clear();
        *blink = BlinkState::default();
        Ok(())
    }

    fn read_log(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<FrameAnalysis>>, ProctorError> {
        self.log
            .read()
            .map_err(|_| ProctorError::Poisoned("session log"))
    }
}
