use anyhow::Result;

use crate::detect::backend::{
    BlinkDetector, FaceDetector, GazeEstimator, HeadPoseEstimator, ObjectDetector,
};
use crate::detect::result::{
    EyeReading, FaceReading, FaceRegion, GazeStatus, HeadPoseStatus, ObjectLabels,
};
use crate::frame::Frame;

/// Stub backend for testing and model-less deployments.
///
/// Reports a fixed scene for every frame: `face_count` evenly spaced faces,
/// plus configured gaze, head pose, eye and object results. Face-consuming
/// capabilities report their "no face" status when the region list they are
/// handed is empty, so the stub stays consistent when mixed with other backends.
#[derive(Clone, Debug)]
pub struct StubBackend {
    face_count: usize,
    gaze: GazeStatus,
    head_pose: HeadPoseStatus,
    eyes_per_face: u32,
    closed_on_dark: bool,
    objects: ObjectLabels,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            face_count: 1,
            gaze: GazeStatus::Center,
            head_pose: HeadPoseStatus::Normal,
            eyes_per_face: 2,
            closed_on_dark: false,
            objects: ObjectLabels::new(),
        }
    }

    pub fn with_faces(mut self, count: usize) -> Self {
        self.face_count = count;
        self
    }

    pub fn with_gaze(mut self, gaze: GazeStatus) -> Self {
        self.gaze = gaze;
        self
    }

    pub fn with_head_pose(mut self, head_pose: HeadPoseStatus) -> Self {
        self.head_pose = head_pose;
        self
    }

    /// Open eyes reported for every detected face.
    pub fn with_eyes(mut self, per_face: u32) -> Self {
        self.eyes_per_face = per_face;
        self
    }

    /// Report closed eyes when the frame's top-left pixel is black, so a
    /// bright frame followed by a dark one reads as a blink.
    pub fn eyes_closed_on_dark_frames(mut self) -> Self {
        self.closed_on_dark = true;
        self
    }

    pub fn with_objects<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.objects = labels.into_iter().map(Into::into).collect();
        self
    }

    fn regions_for(&self, frame: &Frame) -> Vec<FaceRegion> {
        if self.face_count == 0 {
            return Vec::new();
        }
        let slot = frame.width() / self.face_count as u32;
        let size = (slot / 2).min(frame.height() / 2).max(1);
        (0..self.face_count as u32)
            .map(|i| {
                let x = i * slot + slot.saturating_sub(size) / 2;
                let y = frame.height().saturating_sub(size) / 2;
                FaceRegion::new(x, y, size, size)
            })
            .collect()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, frame: &Frame) -> Result<FaceReading> {
        Ok(FaceReading::from_regions(self.regions_for(frame)))
    }
}

impl GazeEstimator for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn estimate(&self, _frame: &Frame, faces: &[FaceRegion]) -> Result<GazeStatus> {
        if faces.is_empty() {
            return Ok(GazeStatus::NoFace);
        }
        Ok(self.gaze)
    }
}

impl HeadPoseEstimator for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn estimate(&self, _frame: &Frame, faces: &[FaceRegion]) -> Result<HeadPoseStatus> {
        if faces.is_empty() {
            return Ok(HeadPoseStatus::NoFace);
        }
        Ok(self.head_pose)
    }
}

impl BlinkDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, frame: &Frame, faces: &[FaceRegion]) -> Result<EyeReading> {
        if self.closed_on_dark && frame.pixel(0, 0) == Some([0, 0, 0]) {
            return Ok(EyeReading::from_count(faces, 0));
        }
        let open = self.eyes_per_face.saturating_mul(faces.len() as u32);
        Ok(EyeReading::from_count(faces, open))
    }
}

impl ObjectDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, _frame: &Frame) -> Result<ObjectLabels> {
        Ok(self.objects.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::FaceStatus;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 640 * 480 * 3], 640, 480).unwrap()
    }

    #[test]
    fn face_regions_follow_configured_count() -> Result<()> {
        let frame = frame();
        for (count, status) in [
            (0, FaceStatus::NoFace),
            (1, FaceStatus::Normal),
            (3, FaceStatus::MultipleFaces),
        ] {
            let backend = StubBackend::new().with_faces(count);
            let reading = FaceDetector::detect(&backend, &frame)?;
            assert_eq!(reading.status, status);
            assert_eq!(reading.faces.len(), count);
            for face in &reading.faces {
                assert!(face.x + face.width <= frame.width());
                assert!(face.y + face.height <= frame.height());
            }
        }
        Ok(())
    }

    #[test]
    fn face_consumers_report_no_face_without_regions() -> Result<()> {
        let frame = frame();
        let backend = StubBackend::new()
            .with_gaze(GazeStatus::LookingAway)
            .with_head_pose(HeadPoseStatus::HeadTurned)
            .with_eyes(1);

        assert_eq!(
            GazeEstimator::estimate(&backend, &frame, &[])?,
            GazeStatus::NoFace
        );
        assert_eq!(
            HeadPoseEstimator::estimate(&backend, &frame, &[])?,
            HeadPoseStatus::NoFace
        );
        assert_eq!(
            BlinkDetector::detect(&backend, &frame, &[])?,
            EyeReading::NoFace
        );

        let faces = [FaceRegion::new(10, 10, 50, 50)];
        assert_eq!(
            GazeEstimator::estimate(&backend, &frame, &faces)?,
            GazeStatus::LookingAway
        );
        assert_eq!(
            BlinkDetector::detect(&backend, &frame, &faces)?,
            EyeReading::Visible(1)
        );
        Ok(())
    }

    #[test]
    fn eyes_close_on_dark_frames_only_when_asked() -> Result<()> {
        let dark = frame();
        let bright = Frame::from_rgb(vec![200u8; 8 * 8 * 3], 8, 8)?;
        let faces = [FaceRegion::new(0, 0, 4, 4), FaceRegion::new(4, 0, 4, 4)];

        let steady = StubBackend::new();
        assert_eq!(
            BlinkDetector::detect(&steady, &dark, &faces)?,
            EyeReading::Visible(4)
        );

        let closing = StubBackend::new().eyes_closed_on_dark_frames();
        assert_eq!(
            BlinkDetector::detect(&closing, &bright, &faces)?,
            EyeReading::Visible(4)
        );
        assert_eq!(
            BlinkDetector::detect(&closing, &dark, &faces)?,
            EyeReading::Visible(0)
        );
        Ok(())
    }

    #[test]
    fn objects_are_deduplicated() -> Result<()> {
        let backend = StubBackend::new().with_objects(["book", "cell phone", "book"]);
        let labels = ObjectDetector::detect(&backend, &frame())?;
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("cell phone"));
        Ok(())
    }
}
