//! Model-free detector heuristics.
//!
//! These cover the capabilities that reduce to arithmetic over inputs another
//! component already produced: face geometry, raw audio samples, scored labels.

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Mutex, PoisonError};

use crate::detect::backend::{AudioSampler, HeadPoseEstimator, ObjectDetector};
use crate::detect::result::{AudioReading, AudioStatus, FaceRegion, HeadPoseStatus, ObjectLabels};
use crate::frame::Frame;

pub const DEFAULT_HEAD_TURN_DEVIATION: f32 = 0.3;
pub const DEFAULT_AUDIO_THRESHOLD: u32 = 2000;
pub const DEFAULT_OBJECT_CONFIDENCE: f32 = 0.5;

// -------------------- Head pose --------------------

/// Flags a turned head when the first face sits too far from the frame's
/// vertical centre line. Deviation is measured as a fraction of frame width.
#[derive(Clone, Copy, Debug)]
pub struct OffCenterHeadPose {
    max_deviation: f32,
}

impl OffCenterHeadPose {
    pub fn new(max_deviation: f32) -> Self {
        Self { max_deviation }
    }
}

impl Default for OffCenterHeadPose {
    fn default() -> Self {
        Self::new(DEFAULT_HEAD_TURN_DEVIATION)
    }
}

impl HeadPoseEstimator for OffCenterHeadPose {
    fn name(&self) -> &'static str {
        "off_center"
    }

    fn estimate(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<HeadPoseStatus> {
        let Some(face) = faces.first() else {
            return Ok(HeadPoseStatus::NoFace);
        };
        if frame.width() == 0 {
            return Err(anyhow!("head pose requires a frame with non-zero width"));
        }
        let frame_center = (frame.width() / 2) as f32;
        let deviation = (face.center_x() as f32 - frame_center).abs() / frame.width() as f32;
        if deviation > self.max_deviation {
            Ok(HeadPoseStatus::HeadTurned)
        } else {
            Ok(HeadPoseStatus::Normal)
        }
    }
}

// -------------------- Audio --------------------

/// Supplier of mono 16-bit sample chunks.
pub trait SampleSource: Send {
    /// Next chunk, or `None` while the stream has not produced audio yet.
    fn next_chunk(&mut self) -> Result<Option<Vec<i16>>>;
}

/// Chunks pushed by a capture thread.
impl SampleSource for Receiver<Vec<i16>> {
    fn next_chunk(&mut self) -> Result<Option<Vec<i16>>> {
        match self.try_recv() {
            Ok(chunk) => Ok(Some(chunk)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(anyhow!("audio capture stream closed")),
        }
    }
}

/// A fixed chunk, replayed on every read.
impl SampleSource for Vec<i16> {
    fn next_chunk(&mut self) -> Result<Option<Vec<i16>>> {
        Ok(Some(self.clone()))
    }
}

/// Peak-amplitude audio check over one chunk.
pub struct PeakLevelAudio<S> {
    source: Mutex<S>,
    threshold: u32,
}

impl<S: SampleSource> PeakLevelAudio<S> {
    pub fn new(source: S, threshold: u32) -> Self {
        Self {
            source: Mutex::new(source),
            threshold,
        }
    }
}

impl<S: SampleSource> AudioSampler for PeakLevelAudio<S> {
    fn name(&self) -> &'static str {
        "peak_level"
    }

    fn sample(&self) -> Result<AudioReading> {
        let chunk = {
            // a source that panicked mid-read is still asked for the next chunk
            let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            source.next_chunk()?
        };
        let Some(chunk) = chunk else {
            return Ok(AudioReading {
                status: AudioStatus::NotStarted,
                peak_volume: 0,
            });
        };
        let peak = chunk
            .iter()
            .map(|s| s.unsigned_abs() as u32)
            .max()
            .unwrap_or(0);
        let status = if peak > self.threshold {
            AudioStatus::SuspiciousAudio
        } else {
            AudioStatus::NormalAudio
        };
        Ok(AudioReading {
            status,
            peak_volume: peak,
        })
    }
}

// -------------------- Objects --------------------

/// A classifier output before vocabulary filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredLabel {
    pub label: String,
    pub confidence: f32,
}

impl ScoredLabel {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Open-vocabulary classifier (e.g. an object-detection network).
pub trait LabelClassifier: Send {
    fn name(&self) -> &'static str;

    fn classify(&self, frame: &Frame) -> Result<Vec<ScoredLabel>>;
}

/// Restricts a classifier to the suspicious-object vocabulary.
///
/// Keeps labels scoring strictly above `min_confidence` whose lower-cased form
/// is in the vocabulary. Duplicates collapse.
pub struct VocabularyFilter<C> {
    classifier: C,
    vocabulary: BTreeSet<String>,
    min_confidence: f32,
}

impl<C: LabelClassifier> VocabularyFilter<C> {
    pub fn new<I, S>(classifier: C, vocabulary: I, min_confidence: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            classifier,
            vocabulary: vocabulary
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
            min_confidence,
        }
    }
}

impl<C: LabelClassifier> ObjectDetector for VocabularyFilter<C> {
    fn name(&self) -> &'static str {
        self.classifier.name()
    }

    fn detect(&self, frame: &Frame) -> Result<ObjectLabels> {
        let scored = self.classifier.classify(frame)?;
        Ok(scored
            .into_iter()
            .filter(|s| s.confidence > self.min_confidence)
            .map(|s| s.label.trim().to_lowercase())
            .filter(|label| self.vocabulary.contains(label))
            .collect())
    }
}
