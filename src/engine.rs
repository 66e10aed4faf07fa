use std::sync::Arc;

use crate::analyzer::FrameAnalyzer;
use crate::detect::DetectorSet;
use crate::error::ProctorError;
use crate::frame::Frame;
use crate::session::{FrameAnalysis, Session, SessionRegistry, SessionSummary};

/// The proctoring kernel: one shared analyzer plus the session registry.
///
/// Only `submit_frame` creates sessions. Every other operation on an unknown
/// id fails with `SessionNotFound`.
pub struct ProctorEngine {
    analyzer: FrameAnalyzer,
    sessions: SessionRegistry,
}

impl ProctorEngine {
    pub fn new(detectors: DetectorSet) -> Self {
        Self {
            analyzer: FrameAnalyzer::new(detectors),
            sessions: SessionRegistry::new(),
        }
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }

    /// Analyse `frame` for `session_id`, creating the session on first use.
    pub fn submit_frame(
        &self,
        session_id: &str,
        frame: &Frame,
    ) -> Result<FrameAnalysis, ProctorError> {
        self.submit(session_id, frame).map(|(record, _)| record)
    }

    /// Decode an encoded image and analyse it. Undecodable payloads are
    /// rejected before any session is touched.
    ///
    /// Also returns the session the record was appended to. The handle stays
    /// readable after a concurrent `delete` drops the id from the registry.
    pub fn submit_encoded(
        &self,
        session_id: &str,
        image_bytes: &[u8],
    ) -> Result<(FrameAnalysis, Arc<Session>), ProctorError> {
        let frame = Frame::decode(image_bytes)
            .map_err(|e| ProctorError::InvalidFrame(format!("{:#}", e)))?;
        self.submit(session_id, &frame)
    }

    fn submit(
        &self,
        session_id: &str,
        frame: &Frame,
    ) -> Result<(FrameAnalysis, Arc<Session>), ProctorError> {
        let session = self.sessions.get_or_create(session_id)?;
        let record = session.submit_frame(&self.analyzer, frame)?;
        Ok((record, session))
    }

    pub fn session(&self, session_id: &str) -> Result<Arc<Session>, ProctorError> {
        self.sessions.get(session_id)
    }

    pub fn activity_log(&self, session_id: &str) -> Result<Vec<FrameAnalysis>, ProctorError> {
        self.sessions.get(session_id)?.activity_log()
    }

    pub fn summary(&self, session_id: &str) -> Result<SessionSummary, ProctorError> {
        self.sessions.get(session_id)?.summary()
    }

    pub fn reset(&self, session_id: &str) -> Result<(), ProctorError> {
        self.sessions.get(session_id)?.reset()?;
        log::info!("session {} reset", session_id);
        Ok(())
    }

    pub fn delete(&self, session_id: &str) -> Result<(), ProctorError> {
        self.sessions.delete(session_id).map(|_| ())
    }

    pub fn list_sessions(&self) -> Result<Vec<String>, ProctorError> {
        self.sessions.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use crate::fusion::SuspicionTag;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 16 * 16 * 3], 16, 16).unwrap()
    }

    #[test]
    fn only_submission_creates_sessions() {
        let engine = ProctorEngine::new(DetectorSet::uniform(StubBackend::new()));
        assert!(matches!(
            engine.summary("s1"),
            Err(ProctorError::SessionNotFound(_))
        ));
        assert!(engine.reset("s1").is_err());
        assert!(engine.activity_log("s1").is_err());
        assert!(engine.list_sessions().unwrap().is_empty());

        engine.submit_frame("s1", &frame()).unwrap();
        assert_eq!(engine.list_sessions().unwrap(), vec!["s1"]);
    }

    #[test]
    fn objects_show_up_in_summary() {
        let engine = ProctorEngine::new(DetectorSet::uniform(
            StubBackend::new().with_objects(["cell phone"]),
        ));
        let record = engine.submit_frame("s1", &frame()).unwrap();
        assert!(record.has_tag(SuspicionTag::ObjectsDetected));
        assert_eq!(engine.summary("s1").unwrap().object_detections, 1);
    }

    #[test]
    fn undecodable_payload_touches_no_session() {
        let engine = ProctorEngine::new(DetectorSet::uniform(StubBackend::new()));
        assert!(matches!(
            engine.submit_encoded("s1", b"not an image"),
            Err(ProctorError::InvalidFrame(_))
        ));
        assert!(engine.session("s1").is_err());
    }

    #[test]
    fn submitted_session_outlives_delete() {
        let engine = ProctorEngine::new(DetectorSet::uniform(StubBackend::new()));
        let mut png = Vec::new();
        image::RgbImage::new(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let (record, session) = engine.submit_encoded("s1", &png).unwrap();
        engine.delete("s1").unwrap();

        assert!(engine.summary("s1").is_err());
        assert_eq!(session.id(), "s1");
        assert_eq!(session.summary().unwrap().total_frames_analyzed, 1);
        assert_eq!(session.activity_log().unwrap(), vec![record]);
    }
}
