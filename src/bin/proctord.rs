//! proctord - exam proctoring HTTP service
//!
//! This daemon:
//! 1. Loads configuration (`PROCTOR_CONFIG` file plus `PROCTOR_*` overrides)
//! 2. Builds the shared detector set
//! 3. Serves the proctoring API until Ctrl-C

use anyhow::{anyhow, Result};
use std::sync::mpsc;
use std::sync::Arc;

use proctor_kernel::{
    api::{ApiConfig, ApiServer},
    config::ProctordConfig,
    detect::backends::OffCenterHeadPose,
    DetectorSet, ProctorEngine, StubBackend,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ProctordConfig::load()?;
    let detectors = DetectorSet::uniform(StubBackend::new())
        .with_head_pose(OffCenterHeadPose::new(config.detectors.head_turn_deviation))
        .with_object_vocabulary(&config.detectors.suspicious_objects);

    let described = detectors.describe();
    for (capability, backend) in &described {
        log::info!("detector {}: {}", capability, backend);
    }
    if described.iter().any(|(_, backend)| *backend == "stub") {
        log::warn!("stub detectors are active; readings for those capabilities are fixed");
    }
    log::info!(
        "suspicious objects: {}",
        config.detectors.suspicious_objects.join(", ")
    );

    let engine = Arc::new(ProctorEngine::new(detectors));
    let api_handle = ApiServer::new(ApiConfig::from(&config), engine).spawn()?;
    log::info!("proctoring api listening on http://{}", api_handle.addr);
    log::info!(
        "default session for unnamed submissions: {}",
        config.default_session_id
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("proctord waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
