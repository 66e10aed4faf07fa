use anyhow::{anyhow, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::ProctordConfig;
use crate::engine::ProctorEngine;

mod http;
mod routes;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_body_bytes: usize,
    /// Connections served concurrently; the rest get 503.
    pub max_connections: usize,
    pub cors_origin: String,
    /// Session used when `/analyze-frame` names none.
    pub default_session_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ProctordConfig::default())
    }
}

impl From<&ProctordConfig> for ApiConfig {
    fn from(cfg: &ProctordConfig) -> Self {
        Self {
            addr: cfg.api_addr.clone(),
            max_body_bytes: cfg.max_body_bytes,
            max_connections: cfg.max_connections,
            cors_origin: cfg.cors_origin.clone(),
            default_session_id: cfg.default_session_id.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop accepting and wait for the accept loop. In-flight requests
    /// finish on their own threads.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    engine: Arc<ProctorEngine>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, engine: Arc<ProctorEngine>) -> Self {
        Self { cfg, engine }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = Arc::new(self.cfg);
        let engine = self.engine;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, engine, shutdown_thread) {
                log::error!("proctoring api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

/// Decrements the in-flight counter when a connection thread ends.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_api(
    listener: TcpListener,
    cfg: Arc<ApiConfig>,
    engine: Arc<ProctorEngine>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let in_flight = Arc::new(AtomicUsize::new(0));
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                if in_flight.fetch_add(1, Ordering::SeqCst) >= cfg.max_connections {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    log::warn!("rejecting {}: connection limit reached", peer);
                    if let Err(err) = reject_busy(stream, &cfg) {
                        log::debug!("failed to send 503 to {}: {}", peer, err);
                    }
                    continue;
                }
                let guard = InFlight(in_flight.clone());
                let cfg = cfg.clone();
                let engine = engine.clone();
                std::thread::spawn(move || {
                    let _guard = guard;
                    if let Err(err) = handle_connection(stream, &engine, &cfg) {
                        log::warn!("proctoring api connection from {} failed: {}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn prepare_stream(stream: &TcpStream) -> Result<()> {
    // Accepted sockets may inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok(())
}

fn reject_busy(mut stream: TcpStream, cfg: &ApiConfig) -> Result<()> {
    prepare_stream(&stream)?;
    let response = routes::error_response(503, "Server busy");
    http::write_response(&mut stream, &response, &cfg.cors_origin)?;
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    engine: &ProctorEngine,
    cfg: &ApiConfig,
) -> Result<()> {
    prepare_stream(&stream)?;
    let response = match http::read_request(&mut stream, cfg.max_body_bytes) {
        Ok(request) => routes::route(engine, &cfg.default_session_id, &request),
        Err(err) => {
            log::warn!("proctoring api request rejected: {}", err);
            routes::error_response(err.status, &err.message)
        }
    };
    http::write_response(&mut stream, &response, &cfg.cors_origin)?;
    Ok(())
}
