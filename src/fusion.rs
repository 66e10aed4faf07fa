//! Fusion rules: per-detector statuses in, suspicion tags out.
//!
//! Rules are independent and every matching tag is reported, except that any
//! detector error collapses the set to exactly `{analysis_error}`. Absent
//! capabilities (audio not configured) contribute nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::analyzer::RawResultSet;
use crate::detect::{AudioStatus, FaceStatus, GazeStatus, HeadPoseStatus};

/// A discrete violation indicator attached to one frame.
///
/// Variant order is the serialization order of a tag set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionTag {
    FaceAnomaly,
    LookingAway,
    HeadMovement,
    ObjectsDetected,
    SuspiciousAudio,
    AnalysisError,
}

impl SuspicionTag {
    pub const ALL: [SuspicionTag; 6] = [
        SuspicionTag::FaceAnomaly,
        SuspicionTag::LookingAway,
        SuspicionTag::HeadMovement,
        SuspicionTag::ObjectsDetected,
        SuspicionTag::SuspiciousAudio,
        SuspicionTag::AnalysisError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SuspicionTag::FaceAnomaly => "face_anomaly",
            SuspicionTag::LookingAway => "looking_away",
            SuspicionTag::HeadMovement => "head_movement",
            SuspicionTag::ObjectsDetected => "objects_detected",
            SuspicionTag::SuspiciousAudio => "suspicious_audio",
            SuspicionTag::AnalysisError => "analysis_error",
        }
    }
}

impl fmt::Display for SuspicionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type SuspicionTags = BTreeSet<SuspicionTag>;

/// The set holding only `analysis_error`.
pub fn error_tags() -> SuspicionTags {
    SuspicionTags::from([SuspicionTag::AnalysisError])
}

/// Derive the suspicion verdict for one frame.
pub fn fuse(results: &RawResultSet) -> SuspicionTags {
    if results.has_error() {
        return error_tags();
    }

    let mut tags = SuspicionTags::new();
    if matches!(
        results.face.status,
        FaceStatus::NoFace | FaceStatus::MultipleFaces
    ) {
        tags.insert(SuspicionTag::FaceAnomaly);
    }
    if results.gaze == GazeStatus::LookingAway {
        tags.insert(SuspicionTag::LookingAway);
    }
    if results.head_pose == HeadPoseStatus::HeadTurned {
        tags.insert(SuspicionTag::HeadMovement);
    }
    if !results.objects.is_empty() {
        tags.insert(SuspicionTag::ObjectsDetected);
    }
    if results
        .audio
        .is_some_and(|audio| audio.status == AudioStatus::SuspiciousAudio)
    {
        tags.insert(SuspicionTag::SuspiciousAudio);
    }
    tags
}
