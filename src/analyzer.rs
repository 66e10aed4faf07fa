//! Frame analyzer: one pass of every configured detector over one frame.
//!
//! Face detection runs first and its region list is handed unchanged to gaze,
//! head pose and blink, so all readings in one result set describe the same
//! faces. Each detector call is isolated: an `Err` or a panic becomes that
//! detector's `Error` status plus a `DetectorFailure`, and the remaining
//! detectors still run.

use anyhow::Result;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::detect::{
    AudioReading, AudioStatus, Capability, DetectorSet, EyeReading, FaceReading, FaceStatus,
    GazeStatus, HeadPoseStatus, ObjectLabels,
};
use crate::frame::Frame;

/// A detector call that did not produce a result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetectorFailure {
    pub capability: Capability,
    pub message: String,
}

/// One result per capability for a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResultSet {
    pub face: FaceReading,
    pub gaze: GazeStatus,
    pub head_pose: HeadPoseStatus,
    pub eyes: EyeReading,
    pub objects: ObjectLabels,
    /// `None` when the audio capability is not configured.
    pub audio: Option<AudioReading>,
    pub failures: Vec<DetectorFailure>,
}

impl RawResultSet {
    /// Result set for a frame with no pixels.
    pub fn no_frame(audio: Option<AudioReading>) -> Self {
        Self {
            face: FaceReading {
                status: FaceStatus::NoFrame,
                faces: Vec::new(),
            },
            gaze: GazeStatus::NoFace,
            head_pose: HeadPoseStatus::NoFace,
            eyes: EyeReading::NoFace,
            objects: ObjectLabels::new(),
            audio,
            failures: Vec::new(),
        }
    }

    /// True when any detector failed or reported its `Error` status.
    pub fn has_error(&self) -> bool {
        !self.failures.is_empty()
            || self.face.status == FaceStatus::Error
            || self.gaze == GazeStatus::Error
            || self.head_pose == HeadPoseStatus::Error
            || self.eyes == EyeReading::Error
            || self
                .audio
                .is_some_and(|audio| audio.status == AudioStatus::Error)
    }

    /// Human-readable description of what went wrong, if anything did.
    pub fn error_message(&self) -> Option<String> {
        if !self.failures.is_empty() {
            let joined = self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.capability, f.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Some(joined);
        }
        if self.has_error() {
            return Some("detector reported error status".to_string());
        }
        None
    }
}

/// Runs a `DetectorSet` over frames. Holds no per-call state.
#[derive(Clone)]
pub struct FrameAnalyzer {
    detectors: DetectorSet,
}

impl FrameAnalyzer {
    pub fn new(detectors: DetectorSet) -> Self {
        Self { detectors }
    }

    pub fn detectors(&self) -> &DetectorSet {
        &self.detectors
    }

    pub fn analyze(&self, frame: &Frame) -> RawResultSet {
        let mut failures = Vec::new();

        if frame.is_empty() {
            let audio = self.sample_audio(&mut failures);
            let mut results = RawResultSet::no_frame(audio);
            results.failures = failures;
            return results;
        }

        let face = isolate(Capability::Face, &mut failures, || {
            self.detectors.face.detect(frame)
        })
        .unwrap_or(FaceReading {
            status: FaceStatus::Error,
            faces: Vec::new(),
        });
        let faces = face.faces.as_slice();

        let gaze = isolate(Capability::Gaze, &mut failures, || {
            self.detectors.gaze.estimate(frame, faces)
        })
        .unwrap_or(GazeStatus::Error);

        let head_pose = isolate(Capability::HeadPose, &mut failures, || {
            self.detectors.head_pose.estimate(frame, faces)
        })
        .unwrap_or(HeadPoseStatus::Error);

        let eyes = isolate(Capability::Blink, &mut failures, || {
            self.detectors.blink.detect(frame, faces)
        })
        .unwrap_or(EyeReading::Error);

        let mut objects = isolate(Capability::Object, &mut failures, || {
            self.detectors.object.detect(frame)
        })
        .unwrap_or_default();
        if let Some(vocabulary) = self.detectors.object_vocabulary() {
            objects = objects
                .into_iter()
                .map(|label| label.trim().to_lowercase())
                .filter(|label| vocabulary.contains(label))
                .collect();
        }

        let audio = self.sample_audio(&mut failures);

        RawResultSet {
            face,
            gaze,
            head_pose,
            eyes,
            objects,
            audio,
            failures,
        }
    }

    fn sample_audio(&self, failures: &mut Vec<DetectorFailure>) -> Option<AudioReading> {
        let audio = self.detectors.audio.as_ref()?;
        Some(
            isolate(Capability::Audio, failures, || audio.sample()).unwrap_or(AudioReading {
                status: AudioStatus::Error,
                peak_volume: 0,
            }),
        )
    }
}

fn isolate<T>(
    capability: Capability,
    failures: &mut Vec<DetectorFailure>,
    call: impl FnOnce() -> Result<T>,
) -> Option<T> {
    let message = match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(err)) => format!("{:#}", err),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    log::warn!("{} detector failed: {}", capability, message);
    failures.push(DetectorFailure {
        capability,
        message,
    });
    None
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
