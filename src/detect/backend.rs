use anyhow::Result;
use std::sync::{Mutex, PoisonError};

use crate::detect::result::{AudioReading, EyeReading, FaceReading, FaceRegion, GazeStatus};
use crate::detect::result::{HeadPoseStatus, ObjectLabels};
use crate::frame::Frame;

// Capability traits.
//
// One detector instance is shared by every session, so `detect` takes `&self`
// and may run concurrently from several request threads. A detector that is
// not `Sync` (non-thread-safe model handle, interior `RefCell` state) is wrapped
// in `Serialized`, which funnels every call through one mutex.
//
// Detectors must not keep per-session state. Counters that outlive a single
// frame belong to the `Session`.

/// Face presence and localisation.
pub trait FaceDetector: Send {
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame) -> Result<FaceReading>;
}

/// Gaze direction from the faces found in the same frame.
pub trait GazeEstimator: Send {
    fn name(&self) -> &'static str;

    fn estimate(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<GazeStatus>;
}

/// Head orientation from the faces found in the same frame.
pub trait HeadPoseEstimator: Send {
    fn name(&self) -> &'static str;

    fn estimate(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<HeadPoseStatus>;
}

/// Open-eye count from the faces found in the same frame. Blink edges are
/// derived per session from consecutive readings.
pub trait BlinkDetector: Send {
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<EyeReading>;
}

/// Suspicious-object presence. The analyzer drops labels outside the
/// detector set's vocabulary.
pub trait ObjectDetector: Send {
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame) -> Result<ObjectLabels>;
}

/// Live audio level. Reads its own input stream; takes no frame.
pub trait AudioSampler: Send {
    fn name(&self) -> &'static str;

    fn sample(&self) -> Result<AudioReading>;
}

/// Serializes every call to a detector that cannot be invoked concurrently.
///
/// A panic inside the wrapped detector poisons the mutex; the next call
/// takes the guard back, so one failed frame does not disable the detector.
pub struct Serialized<T> {
    inner: Mutex<T>,
}

impl<T> Serialized<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl<T: FaceDetector> FaceDetector for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn detect(&self, frame: &Frame) -> Result<FaceReading> {
        self.with(|d| d.detect(frame))
    }
}

impl<T: GazeEstimator> GazeEstimator for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn estimate(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<GazeStatus> {
        self.with(|d| d.estimate(frame, faces))
    }
}

impl<T: HeadPoseEstimator> HeadPoseEstimator for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn estimate(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<HeadPoseStatus> {
        self.with(|d| d.estimate(frame, faces))
    }
}

impl<T: BlinkDetector> BlinkDetector for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn detect(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<EyeReading> {
        self.with(|d| d.detect(frame, faces))
    }
}

impl<T: ObjectDetector> ObjectDetector for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn detect(&self, frame: &Frame) -> Result<ObjectLabels> {
        self.with(|d| d.detect(frame))
    }
}

impl<T: AudioSampler> AudioSampler for Serialized<T> {
    fn name(&self) -> &'static str {
        self.with(|d| d.name())
    }

    fn sample(&self) -> Result<AudioReading> {
        self.with(|d| d.sample())
    }
}
