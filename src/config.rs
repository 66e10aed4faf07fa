use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::detect::backends::cpu::DEFAULT_HEAD_TURN_DEVIATION;

const DEFAULT_API_ADDR: &str = "127.0.0.1:5001";
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_CONNECTIONS: usize = 64;
const DEFAULT_CORS_ORIGIN: &str = "*";
const DEFAULT_SESSION_ID: &str = "default";
const DEFAULT_SUSPICIOUS_OBJECTS: [&str; 5] = ["cell phone", "book", "laptop", "person", "remote"];

#[derive(Debug, Deserialize, Default)]
struct ProctordConfigFile {
    default_session_id: Option<String>,
    api: Option<ApiConfigFile>,
    detectors: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    max_body_bytes: Option<usize>,
    max_connections: Option<usize>,
    cors_origin: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    suspicious_objects: Option<Vec<String>>,
    head_turn_deviation: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ProctordConfig {
    pub api_addr: String,
    pub max_body_bytes: usize,
    pub max_connections: usize,
    pub cors_origin: String,
    pub default_session_id: String,
    pub detectors: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Lower-cased, deduplicated, in first-seen order.
    pub suspicious_objects: Vec<String>,
    pub head_turn_deviation: f32,
}

impl Default for ProctordConfig {
    fn default() -> Self {
        // Defaults always parse and validate.
        Self::from_file(ProctordConfigFile::default())
    }
}

impl ProctordConfig {
    /// Load from `PROCTOR_CONFIG` (JSON, optional), then apply `PROCTOR_*`
    /// environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROCTOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProctordConfigFile) -> Self {
        let api = file.api.unwrap_or_default();
        let detectors = file.detectors.unwrap_or_default();
        Self {
            api_addr: api.addr.unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_body_bytes: api.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            max_connections: api.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            cors_origin: api
                .cors_origin
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            default_session_id: file
                .default_session_id
                .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()),
            detectors: DetectorSettings {
                suspicious_objects: detectors.suspicious_objects.unwrap_or_else(|| {
                    DEFAULT_SUSPICIOUS_OBJECTS
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
                head_turn_deviation: detectors
                    .head_turn_deviation
                    .unwrap_or(DEFAULT_HEAD_TURN_DEVIATION),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PROCTOR_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(value) = std::env::var("PROCTOR_MAX_BODY_BYTES") {
            self.max_body_bytes = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCTOR_MAX_BODY_BYTES must be an integer byte count"))?;
        }
        if let Ok(value) = std::env::var("PROCTOR_MAX_CONNECTIONS") {
            self.max_connections = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCTOR_MAX_CONNECTIONS must be an integer"))?;
        }
        if let Ok(origin) = std::env::var("PROCTOR_CORS_ORIGIN") {
            if !origin.trim().is_empty() {
                self.cors_origin = origin;
            }
        }
        if let Ok(id) = std::env::var("PROCTOR_DEFAULT_SESSION") {
            if !id.trim().is_empty() {
                self.default_session_id = id;
            }
        }
        if let Ok(objects) = std::env::var("PROCTOR_SUSPICIOUS_OBJECTS") {
            let parsed = split_csv(&objects);
            if !parsed.is_empty() {
                self.detectors.suspicious_objects = parsed;
            }
        }
        if let Ok(value) = std::env::var("PROCTOR_HEAD_TURN_DEVIATION") {
            self.detectors.head_turn_deviation = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCTOR_HEAD_TURN_DEVIATION must be a number"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.api_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid api addr '{}': {}", self.api_addr, e))?;
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than zero"));
        }
        if self.max_connections == 0 {
            return Err(anyhow!("max_connections must be greater than zero"));
        }
        self.default_session_id = self.default_session_id.trim().to_string();
        if self.default_session_id.is_empty() {
            return Err(anyhow!("default_session_id must not be empty"));
        }

        let mut vocabulary: Vec<String> = Vec::new();
        for label in &self.detectors.suspicious_objects {
            let label = label.trim().to_lowercase();
            if !label.is_empty() && !vocabulary.contains(&label) {
                vocabulary.push(label);
            }
        }
        if vocabulary.is_empty() {
            return Err(anyhow!("suspicious object vocabulary must not be empty"));
        }
        self.detectors.suspicious_objects = vocabulary;

        let deviation = self.detectors.head_turn_deviation;
        if !(deviation > 0.0 && deviation < 1.0) {
            return Err(anyhow!(
                "head_turn_deviation must be within (0, 1), got {}",
                deviation
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ProctordConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
