use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::json;

use super::http::{HttpRequest, HttpResponse};
use crate::engine::ProctorEngine;
use crate::error::ProctorError;

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";

#[derive(Debug, Deserialize)]
struct AnalyzeFrameRequest {
    frame: Option<String>,
    session_id: Option<String>,
}

/// Route one request. Pure with respect to the socket.
pub(crate) fn route(
    engine: &ProctorEngine,
    default_session_id: &str,
    request: &HttpRequest,
) -> HttpResponse {
    if request.method == "OPTIONS" {
        return HttpResponse::empty(204)
            .with_header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .with_header("Access-Control-Allow-Headers", "Content-Type");
    }

    let segments = request.segments();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let method = request.method.as_str();

    let result = match segments.as_slice() {
        ["health"] => expect_method(method, "GET").map(|_| health()),
        ["analyze-frame"] => expect_method(method, "POST")
            .and_then(|_| analyze_frame(engine, default_session_id, request)),
        ["session", id, "activity-log"] => {
            expect_method(method, "GET").and_then(|_| activity_log(engine, id, request))
        }
        ["session", id, "summary"] => {
            expect_method(method, "GET").and_then(|_| summary(engine, id))
        }
        ["session", id, "reset"] => {
            expect_method(method, "POST").and_then(|_| reset(engine, id))
        }
        ["session", id, "delete"] => {
            expect_method(method, "DELETE").and_then(|_| delete(engine, id))
        }
        ["sessions"] => expect_method(method, "GET").and_then(|_| sessions(engine)),
        _ => Err(RouteError::new(404, "Not found")),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            if err.status >= 500 {
                log::error!("{} {} failed: {}", method, request.path, err.message);
            } else {
                log::debug!("{} {} -> {}: {}", method, request.path, err.status, err.message);
            }
            let response = error_response(err.status, &err.message);
            if err.status == 405 {
                response.with_header("Allow", ALLOWED_METHODS)
            } else {
                response
            }
        }
    }
}

pub(crate) fn error_response(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({ "success": false, "error": message }))
}

#[derive(Debug)]
struct RouteError {
    status: u16,
    message: String,
}

impl RouteError {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ProctorError> for RouteError {
    fn from(err: ProctorError) -> Self {
        let message = match &err {
            ProctorError::SessionNotFound(_) => "Session not found".to_string(),
            ProctorError::InvalidFrame(detail) => format!("Failed to decode image: {}", detail),
            other => other.to_string(),
        };
        Self::new(err.status_code(), message)
    }
}

type RouteResult = Result<HttpResponse, RouteError>;

fn expect_method(actual: &str, expected: &str) -> Result<(), RouteError> {
    if actual == expected {
        Ok(())
    } else {
        Err(RouteError::new(405, "Method not allowed"))
    }
}

fn health() -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({
            "status": "healthy",
            "service": "proctoring-service",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn analyze_frame(
    engine: &ProctorEngine,
    default_session_id: &str,
    request: &HttpRequest,
) -> RouteResult {
    if request.body.iter().all(u8::is_ascii_whitespace) {
        return Err(RouteError::new(400, "No JSON data provided"));
    }
    let body: AnalyzeFrameRequest = serde_json::from_slice(&request.body)
        .map_err(|e| RouteError::new(400, format!("Invalid JSON body: {}", e)))?;

    let frame = body
        .frame
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| RouteError::new(400, "No frame data provided"))?;
    let session_id = body
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(default_session_id);

    let image_bytes = decode_frame_payload(frame)?;
    let (analysis, session) = engine.submit_encoded(session_id, &image_bytes)?;
    let stats = session.summary()?;

    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "session_id": session_id,
            "analysis": analysis,
            "session_stats": {
                "frames_analyzed": stats.total_frames_analyzed,
                "total_violations": stats.total_violations,
            },
        }),
    ))
}

/// Accepts bare base64 or a `data:image/...;base64,` URL.
fn decode_frame_payload(frame: &str) -> Result<Vec<u8>, RouteError> {
    let encoded = match frame.split_once("base64,") {
        Some((_, rest)) => rest,
        None => frame,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).map_err(|e| {
        RouteError::new(
            400,
            format!("Failed to decode image: invalid base64 ({})", e),
        )
    })
}

fn activity_log(engine: &ProctorEngine, id: &str, request: &HttpRequest) -> RouteResult {
    let limit = match request.query.get("limit") {
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| RouteError::new(400, "limit must be a non-negative integer"))?,
        ),
        None => None,
    };
    let session = engine.session(id)?;
    let (entries, total) = match limit {
        Some(limit) => session.recent_activity(limit)?,
        None => {
            let entries = session.activity_log()?;
            let total = entries.len();
            (entries, total)
        }
    };
    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "session_id": id,
            "total_activities": total,
            "activity_log": entries,
        }),
    ))
}

fn summary(engine: &ProctorEngine, id: &str) -> RouteResult {
    let session = engine.session(id)?;
    let summary = session.summary()?;
    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "session_id": id,
            "created_at": session
                .created_at()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            "summary": summary,
        }),
    ))
}

fn reset(engine: &ProctorEngine, id: &str) -> RouteResult {
    engine.reset(id)?;
    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "message": format!("Session {} has been reset", id),
        }),
    ))
}

fn delete(engine: &ProctorEngine, id: &str) -> RouteResult {
    engine.delete(id)?;
    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "message": format!("Session {} has been deleted", id),
        }),
    ))
}

fn sessions(engine: &ProctorEngine) -> RouteResult {
    let ids = engine.list_sessions()?;
    Ok(HttpResponse::json(
        200,
        &json!({
            "success": true,
            "total_sessions": ids.len(),
            "active_sessions": ids,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorSet, FaceDetector, FaceReading, StubBackend};
    use crate::frame::Frame;
    use image::{ImageFormat, RgbImage};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::{Arc, OnceLock, Weak};

    fn engine(backend: StubBackend) -> ProctorEngine {
        ProctorEngine::new(DetectorSet::uniform(backend))
    }

    fn png_base64() -> String {
        let mut bytes = Vec::new();
        RgbImage::new(8, 8)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        STANDARD.encode(bytes)
    }

    fn request(method: &str, target: &str, body: &str) -> HttpRequest {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (
                path,
                query
                    .split('&')
                    .filter_map(|p| p.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            None => (target, HashMap::new()),
        };
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn call(engine: &ProctorEngine, method: &str, target: &str, body: &str) -> (u16, Value) {
        let response = route(engine, "default", &request(method, target, body));
        let value = if response.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&response.body).unwrap()
        };
        (response.status, value)
    }

    fn analyze(engine: &ProctorEngine, session: Option<&str>) -> (u16, Value) {
        let mut body = json!({ "frame": format!("data:image/png;base64,{}", png_base64()) });
        if let Some(id) = session {
            body["session_id"] = json!(id);
        }
        call(engine, "POST", "/analyze-frame", &body.to_string())
    }

    #[test]
    fn analyze_frame_returns_record_and_stats() {
        let engine = engine(StubBackend::new().with_objects(["cell phone"]));
        let (status, body) = analyze(&engine, Some("exam-1"));
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["session_id"], "exam-1");
        assert_eq!(body["analysis"]["face_status"], "normal");
        assert_eq!(body["analysis"]["detected_objects"], json!(["cell phone"]));
        assert_eq!(body["analysis"]["suspicious_activity"], json!(["objects_detected"]));
        assert_eq!(body["session_stats"]["frames_analyzed"], 1);
        assert_eq!(body["session_stats"]["total_violations"], 1);
    }

    #[test]
    fn missing_session_id_uses_default() {
        let engine = engine(StubBackend::new());
        let (status, body) = analyze(&engine, None);
        assert_eq!(status, 200);
        assert_eq!(body["session_id"], "default");
        assert_eq!(engine.list_sessions().unwrap(), vec!["default"]);
    }

    #[test]
    fn bad_payloads_are_client_errors() {
        let engine = engine(StubBackend::new());
        let (status, body) = call(&engine, "POST", "/analyze-frame", "");
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);

        let (status, _) = call(&engine, "POST", "/analyze-frame", "{not json");
        assert_eq!(status, 400);

        let (status, body) = call(&engine, "POST", "/analyze-frame", r#"{"session_id":"s"}"#);
        assert_eq!(status, 400);
        assert_eq!(body["error"], "No frame data provided");

        let (status, _) = call(&engine, "POST", "/analyze-frame", r#"{"frame":"@@@"}"#);
        assert_eq!(status, 400);

        let not_an_image = STANDARD.encode(b"definitely not a png");
        let (status, body) = call(
            &engine,
            "POST",
            "/analyze-frame",
            &json!({ "frame": not_an_image, "session_id": "s" }).to_string(),
        );
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to decode image"));
        assert!(engine.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn unknown_sessions_are_not_found() {
        let engine = engine(StubBackend::new());
        for (method, target) in [
            ("GET", "/session/ghost/activity-log"),
            ("GET", "/session/ghost/summary"),
            ("POST", "/session/ghost/reset"),
            ("DELETE", "/session/ghost/delete"),
        ] {
            let (status, body) = call(&engine, method, target, "");
            assert_eq!(status, 404, "{} {}", method, target);
            assert_eq!(body["error"], "Session not found");
        }
        assert!(engine.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn activity_log_honours_limit() {
        let engine = engine(StubBackend::new());
        for _ in 0..3 {
            analyze(&engine, Some("s"));
        }
        let (status, body) = call(&engine, "GET", "/session/s/activity-log", "");
        assert_eq!(status, 200);
        assert_eq!(body["total_activities"], 3);
        assert_eq!(body["activity_log"].as_array().unwrap().len(), 3);

        let (_, body) = call(&engine, "GET", "/session/s/activity-log?limit=2", "");
        assert_eq!(body["total_activities"], 3);
        assert_eq!(body["activity_log"].as_array().unwrap().len(), 2);

        let (status, _) = call(&engine, "GET", "/session/s/activity-log?limit=-1", "");
        assert_eq!(status, 400);
    }

    #[test]
    fn summary_reset_delete_lifecycle() {
        let engine = engine(StubBackend::new().with_faces(0));
        analyze(&engine, Some("s"));
        analyze(&engine, Some("s"));

        let (status, body) = call(&engine, "GET", "/session/s/summary", "");
        assert_eq!(status, 200);
        assert_eq!(body["summary"]["total_frames_analyzed"], 2);
        assert_eq!(body["summary"]["face_anomalies"], 2);
        assert!(body["created_at"].as_str().unwrap().ends_with('Z'));

        let (status, body) = call(&engine, "POST", "/session/s/reset", "");
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Session s has been reset");
        let (_, body) = call(&engine, "GET", "/session/s/summary", "");
        assert_eq!(body["summary"]["total_frames_analyzed"], 0);

        let (_, body) = call(&engine, "GET", "/sessions", "");
        assert_eq!(body["active_sessions"], json!(["s"]));
        assert_eq!(body["total_sessions"], 1);

        let (status, _) = call(&engine, "DELETE", "/session/s/delete", "");
        assert_eq!(status, 200);
        let (_, body) = call(&engine, "GET", "/sessions", "");
        assert_eq!(body["total_sessions"], 0);
    }

    /// Deletes the session it is analysing, as a racing `DELETE` would.
    #[derive(Clone, Default)]
    struct DeletingFaces {
        engine: Arc<OnceLock<Weak<ProctorEngine>>>,
    }

    impl FaceDetector for DeletingFaces {
        fn name(&self) -> &'static str {
            "deleting"
        }

        fn detect(&self, frame: &Frame) -> anyhow::Result<FaceReading> {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                engine.delete("gone")?;
            }
            FaceDetector::detect(&StubBackend::new(), frame)
        }
    }

    #[test]
    fn stats_survive_delete_during_analysis() {
        let faces = DeletingFaces::default();
        let engine = Arc::new(ProctorEngine::new(
            DetectorSet::uniform(StubBackend::new()).with_face(faces.clone()),
        ));
        faces.engine.set(Arc::downgrade(&engine)).unwrap();

        let (status, body) = analyze(&engine, Some("gone"));
        assert_eq!(status, 200);
        assert_eq!(body["analysis"]["face_status"], "normal");
        assert_eq!(body["session_stats"]["frames_analyzed"], 1);
        assert!(engine.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn routing_errors() {
        let engine = engine(StubBackend::new());
        let (status, body) = call(&engine, "GET", "/health", "");
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");

        assert_eq!(call(&engine, "GET", "/nope", "").0, 404);
        assert_eq!(call(&engine, "GET", "/analyze-frame", "").0, 405);
        assert_eq!(call(&engine, "GET", "/session/s/reset", "").0, 405);

        let response = route(&engine, "default", &request("OPTIONS", "/analyze-frame", ""));
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }
}
