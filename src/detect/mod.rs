//! Detector capabilities.
//!
//! Each capability is an opaque per-frame classifier returning one categorical
//! status plus auxiliary data. This module defines their contracts, the shared
//! `DetectorSet`, and the built-in backends.

mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{
    AudioSampler, BlinkDetector, FaceDetector, GazeEstimator, HeadPoseEstimator, ObjectDetector,
    Serialized,
};
pub use backends::StubBackend;
pub use registry::DetectorSet;
pub use result::{
    AudioReading, AudioStatus, BlinkStatus, Capability, EyeReading, FaceReading, FaceRegion,
    FaceStatus, GazeStatus, HeadPoseStatus, ObjectLabels,
};
