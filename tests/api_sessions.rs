use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use proctor_kernel::api::{ApiConfig, ApiHandle, ApiServer};
use proctor_kernel::{BlinkStatus, DetectorSet, ProctorEngine, StubBackend};

fn png_data_url() -> String {
    filled_png_data_url(0)
}

/// Uniform grey frame. Non-zero levels read as open eyes with
/// `eyes_closed_on_dark_frames`.
fn filled_png_data_url(level: u8) -> String {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(32, 24, Rgb([level; 3]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

struct TestApi {
    engine: Arc<ProctorEngine>,
    api_handle: Option<ApiHandle>,
}

impl TestApi {
    fn new(backend: StubBackend) -> Result<Self> {
        Self::with_config(backend, ApiConfig::default())
    }

    fn with_config(backend: StubBackend, cfg: ApiConfig) -> Result<Self> {
        let engine = Arc::new(ProctorEngine::new(
            DetectorSet::uniform(backend).with_object_vocabulary(["cell phone", "book"]),
        ));
        let api_config = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            ..cfg
        };
        let api_handle = ApiServer::new(api_config, engine.clone()).spawn()?;
        Ok(Self {
            engine,
            api_handle: Some(api_handle),
        })
    }

    fn handle(&self) -> &ApiHandle {
        self.api_handle
            .as_ref()
            .expect("test API handle should be initialized")
    }

    fn send(&self, method: &str, path: &str, body: Option<&Value>) -> Result<(String, Value)> {
        let mut stream = TcpStream::connect(self.handle().addr)?;
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{payload}",
            payload.len()
        );
        stream.write_all(request.as_bytes())?;
        let (headers, body) = read_response(&mut stream)?;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };
        Ok((headers, value))
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.api_handle.take() {
            handle.stop().expect("failed to stop API server");
        }
    }
}

#[test]
fn health_reports_service_with_cors() -> Result<()> {
    let api = TestApi::new(StubBackend::new())?;
    let (headers, body) = api.send("GET", "/health", None)?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("Access-Control-Allow-Origin: *"));
    assert!(headers.contains("Connection: close"));
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "proctoring-service");
    Ok(())
}

#[test]
fn preflight_is_answered_without_body() -> Result<()> {
    let api = TestApi::new(StubBackend::new())?;
    let (headers, body) = api.send("OPTIONS", "/analyze-frame", None)?;
    assert!(headers.contains("204 No Content"));
    assert!(headers.contains("Access-Control-Allow-Methods"));
    assert_eq!(body, Value::Null);
    Ok(())
}

#[test]
fn frames_flow_into_log_and_summary() -> Result<()> {
    let api = TestApi::new(StubBackend::new().with_objects(["cell phone", "coffee mug"]))?;
    let frame = json!({ "frame": png_data_url(), "session_id": "exam-7" });

    for expected in 1..=3 {
        let (headers, body) = api.send("POST", "/analyze-frame", Some(&frame))?;
        assert!(headers.contains("200 OK"));
        assert_eq!(body["success"], true);
        assert_eq!(body["analysis"]["detected_objects"], json!(["cell phone"]));
        assert_eq!(body["session_stats"]["frames_analyzed"], expected);
    }

    let (_, body) = api.send("GET", "/session/exam-7/activity-log?limit=1", None)?;
    assert_eq!(body["total_activities"], 3);
    assert_eq!(body["activity_log"].as_array().map(Vec::len), Some(1));

    let (_, body) = api.send("GET", "/session/exam-7/summary", None)?;
    assert_eq!(body["summary"]["total_frames_analyzed"], 3);
    assert_eq!(body["summary"]["object_detections"], 3);
    assert_eq!(body["summary"]["total_violations"], 3);

    let (_, body) = api.send("GET", "/sessions", None)?;
    assert_eq!(body["active_sessions"], json!(["exam-7"]));
    Ok(())
}

#[test]
fn reset_and_delete_over_http() -> Result<()> {
    let api = TestApi::new(StubBackend::new().eyes_closed_on_dark_frames())?;
    let open = json!({ "frame": filled_png_data_url(200), "session_id": "s" });
    let closed = json!({ "frame": png_data_url(), "session_id": "s" });
    for expected in 1..=2 {
        api.send("POST", "/analyze-frame", Some(&open))?;
        let (_, body) = api.send("POST", "/analyze-frame", Some(&closed))?;
        assert_eq!(body["analysis"]["blink_status"], "blink");
        assert_eq!(body["analysis"]["blink_count"], expected);
    }

    let (headers, _) = api.send("POST", "/session/s/reset", None)?;
    assert!(headers.contains("200 OK"));
    api.send("POST", "/analyze-frame", Some(&open))?;
    let (_, body) = api.send("POST", "/analyze-frame", Some(&closed))?;
    assert_eq!(body["analysis"]["blink_count"], 1);

    let (headers, _) = api.send("DELETE", "/session/s/delete", None)?;
    assert!(headers.contains("200 OK"));
    let (headers, body) = api.send("GET", "/session/s/summary", None)?;
    assert!(headers.contains("404 Not Found"));
    assert_eq!(body["success"], false);
    Ok(())
}

#[test]
fn oversized_body_is_rejected() -> Result<()> {
    let cfg = ApiConfig {
        max_body_bytes: 1024,
        ..ApiConfig::default()
    };
    let api = TestApi::with_config(StubBackend::new(), cfg)?;

    let mut stream = TcpStream::connect(api.handle().addr)?;
    let request = "POST /analyze-frame HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100000\r\n\r\n";
    stream.write_all(request.as_bytes())?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("413 Payload Too Large"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["success"], false);
    assert!(api.engine.list_sessions()?.is_empty());
    Ok(())
}

#[test]
fn concurrent_clients_share_one_session() -> Result<()> {
    let api = Arc::new(TestApi::new(StubBackend::new().eyes_closed_on_dark_frames())?);
    let open = json!({ "frame": filled_png_data_url(200), "session_id": "shared" });
    let closed = json!({ "frame": png_data_url(), "session_id": "shared" });

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let api = api.clone();
            let frames = [open.clone(), closed.clone()];
            std::thread::spawn(move || -> Result<()> {
                for _ in 0..2 {
                    for frame in &frames {
                        let (headers, _) = api.send("POST", "/analyze-frame", Some(frame))?;
                        assert!(headers.contains("200 OK"));
                    }
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("client thread panicked")?;
    }

    let summary = api.engine.summary("shared")?;
    assert_eq!(summary.total_frames_analyzed, 32);

    // Arrival order decides which closed frames are blinks; the count must
    // still track the log exactly.
    let log = api.engine.activity_log("shared")?;
    let mut blinks = 0;
    for record in &log {
        if record.blink_status == BlinkStatus::Blink {
            blinks += 1;
        }
        assert_eq!(record.blink_count, blinks);
    }
    assert_eq!(summary.total_blinks, blinks);
    Ok(())
}
