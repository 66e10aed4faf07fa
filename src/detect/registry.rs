use std::collections::BTreeSet;
use std::sync::Arc;

use super::backend::{
    AudioSampler, BlinkDetector, FaceDetector, GazeEstimator, HeadPoseEstimator, ObjectDetector,
};
use super::result::Capability;

/// The detector capability set shared by every session.
///
/// Holds exactly one instance per capability. Audio is optional; when absent
/// it is skipped by the analyzer and ignored by fusion.
#[derive(Clone)]
pub struct DetectorSet {
    pub(crate) face: Arc<dyn FaceDetector + Sync>,
    pub(crate) gaze: Arc<dyn GazeEstimator + Sync>,
    pub(crate) head_pose: Arc<dyn HeadPoseEstimator + Sync>,
    pub(crate) blink: Arc<dyn BlinkDetector + Sync>,
    pub(crate) object: Arc<dyn ObjectDetector + Sync>,
    pub(crate) audio: Option<Arc<dyn AudioSampler + Sync>>,
    vocabulary: Option<Arc<BTreeSet<String>>>,
}

impl DetectorSet {
    /// Build a set from the five frame capabilities. Audio starts disabled.
    pub fn new(
        face: impl FaceDetector + Sync + 'static,
        gaze: impl GazeEstimator + Sync + 'static,
        head_pose: impl HeadPoseEstimator + Sync + 'static,
        blink: impl BlinkDetector + Sync + 'static,
        object: impl ObjectDetector + Sync + 'static,
    ) -> Self {
        Self {
            face: Arc::new(face),
            gaze: Arc::new(gaze),
            head_pose: Arc::new(head_pose),
            blink: Arc::new(blink),
            object: Arc::new(object),
            audio: None,
            vocabulary: None,
        }
    }

    /// Use one backend for every frame capability.
    pub fn uniform<B>(backend: B) -> Self
    where
        B: FaceDetector
            + GazeEstimator
            + HeadPoseEstimator
            + BlinkDetector
            + ObjectDetector
            + Sync
            + 'static,
    {
        let shared = Arc::new(backend);
        Self {
            face: shared.clone(),
            gaze: shared.clone(),
            head_pose: shared.clone(),
            blink: shared.clone(),
            object: shared,
            audio: None,
            vocabulary: None,
        }
    }

    pub fn with_face(mut self, face: impl FaceDetector + Sync + 'static) -> Self {
        self.face = Arc::new(face);
        self
    }

    pub fn with_gaze(mut self, gaze: impl GazeEstimator + Sync + 'static) -> Self {
        self.gaze = Arc::new(gaze);
        self
    }

    pub fn with_head_pose(mut self, head_pose: impl HeadPoseEstimator + Sync + 'static) -> Self {
        self.head_pose = Arc::new(head_pose);
        self
    }

    pub fn with_blink(mut self, blink: impl BlinkDetector + Sync + 'static) -> Self {
        self.blink = Arc::new(blink);
        self
    }

    pub fn with_object(mut self, object: impl ObjectDetector + Sync + 'static) -> Self {
        self.object = Arc::new(object);
        self
    }

    /// Enable the audio capability.
    pub fn with_audio(mut self, audio: impl AudioSampler + Sync + 'static) -> Self {
        self.audio = Some(Arc::new(audio));
        self
    }

    /// Restrict object labels to `labels` (compared lower-cased). Labels an
    /// object detector reports outside the vocabulary are dropped.
    pub fn with_object_vocabulary<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocabulary: BTreeSet<String> = labels
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self.vocabulary = Some(Arc::new(vocabulary));
        self
    }

    pub fn object_vocabulary(&self) -> Option<&BTreeSet<String>> {
        self.vocabulary.as_deref()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Configured capabilities, in analysis order.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![
            Capability::Face,
            Capability::Gaze,
            Capability::HeadPose,
            Capability::Blink,
            Capability::Object,
        ];
        if self.audio.is_some() {
            caps.push(Capability::Audio);
        }
        caps
    }

    /// Backend name per configured capability, for startup logging.
    pub fn describe(&self) -> Vec<(Capability, &'static str)> {
        self.capabilities()
            .into_iter()
            .map(|capability| (capability, self.backend_name(capability)))
            .collect()
    }

    fn backend_name(&self, capability: Capability) -> &'static str {
        match capability {
            Capability::Face => self.face.name(),
            Capability::Gaze => self.gaze.name(),
            Capability::HeadPose => self.head_pose.name(),
            Capability::Blink => self.blink.name(),
            Capability::Object => self.object.name(),
            Capability::Audio => self.audio.as_ref().map_or("none", |audio| audio.name()),
        }
    }
}
