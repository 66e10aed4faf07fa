use serde::{Deserialize, Serialize};

use super::FrameAnalysis;
use crate::fusion::SuspicionTag;

/// Violation statistics derived from a session's activity log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_frames_analyzed: usize,
    pub total_blinks: u64,
    pub face_anomalies: usize,
    pub gaze_violations: usize,
    pub head_movement_violations: usize,
    pub object_detections: usize,
    pub audio_violations: usize,
    pub analysis_errors: usize,
    /// Sum of tag occurrences; a frame with two tags counts twice.
    pub total_violations: usize,
}

impl SessionSummary {
    pub fn from_log(log: &[FrameAnalysis]) -> Self {
        let mut summary = SessionSummary {
            total_frames_analyzed: log.len(),
            total_blinks: log.last().map(|record| record.blink_count).unwrap_or(0),
            ..SessionSummary::default()
        };
        for record in log {
            for tag in &record.suspicious_activity {
                *summary.counter_mut(*tag) += 1;
                summary.total_violations += 1;
            }
        }
        summary
    }

    /// Frames carrying `tag`.
    pub fn count_for(&self, tag: SuspicionTag) -> usize {
        match tag {
            SuspicionTag::FaceAnomaly => self.face_anomalies,
            SuspicionTag::LookingAway => self.gaze_violations,
            SuspicionTag::HeadMovement => self.head_movement_violations,
            SuspicionTag::ObjectsDetected => self.object_detections,
            SuspicionTag::SuspiciousAudio => self.audio_violations,
            SuspicionTag::AnalysisError => self.analysis_errors,
        }
    }

    fn counter_mut(&mut self, tag: SuspicionTag) -> &mut usize {
        match tag {
            SuspicionTag::FaceAnomaly => &mut self.face_anomalies,
            SuspicionTag::LookingAway => &mut self.gaze_violations,
            SuspicionTag::HeadMovement => &mut self.head_movement_violations,
            SuspicionTag::ObjectsDetected => &mut self.object_detections,
            SuspicionTag::SuspiciousAudio => &mut self.audio_violations,
            SuspicionTag::AnalysisError => &mut self.analysis_errors,
        }
    }
}
