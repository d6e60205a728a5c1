//! HTTP surface over the orchestrator.
//!
//! Each endpoint maps to one orchestrator call:
//!
//! | route                  | call                      |
//! |------------------------|---------------------------|
//! | `POST /monitor`        | `Orchestrator::start`     |
//! | `POST /monitor/batch`  | `Orchestrator::start_batch` |
//! | `POST /stop/all`       | `Orchestrator::stop_all`  |
//! | `POST /stop/{camera}`  | `Orchestrator::stop`      |
//! | `GET /monitored`       | `Orchestrator::list`      |
//! | `GET /status/{camera}` | `Orchestrator::status`    |
//!
//! Connections are served on their own short-lived threads because `stop`
//! blocks until the session has released its resources.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::camera::CameraId;
use crate::error::MonitorError;
use crate::orchestrator::Orchestrator;
use crate::session::SessionConfig;

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8800".to_string(),
        }
    }
}

/// `POST /monitor` body.
#[derive(Clone, Debug, Deserialize)]
pub struct MonitorRequest {
    pub camera_id: CameraId,
    #[serde(flatten)]
    pub config: SessionConfig,
}

/// `POST /monitor/batch` body.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchMonitorRequest {
    pub camera_ids: Vec<CameraId>,
    #[serde(flatten)]
    pub config: SessionConfig,
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
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
    orchestrator: Arc<Orchestrator>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self { cfg, orchestrator }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let orchestrator = self.orchestrator;
        let join = std::thread::Builder::new()
            .name("monitor-api".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, orchestrator, shutdown_thread) {
                    log::error!("monitor api stopped: {}", err);
                }
            })?;

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                let orchestrator = orchestrator.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &orchestrator) {
                        log::warn!("monitor api request rejected: {}", err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, orchestrator: &Orchestrator) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            let body = json!({ "detail": format!("bad request: {}", err) });
            write_json_response(&mut stream, 400, &body)?;
            return Err(err);
        }
    };
    let (status, body) = route(orchestrator, &request.method, &request.path, &request.body);
    log::debug!("{} {} -> {}", request.method, request.path, status);
    write_json_response(&mut stream, status, &body)
}

/// Dispatch one request. Returns the status code and JSON body.
pub fn route(orchestrator: &Orchestrator, method: &str, path: &str, body: &[u8]) -> (u16, Value) {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        ("GET", [""]) => (200, service_metadata()),
        ("GET", ["health"]) => (200, json!({ "status": "ok" })),
        ("POST", ["monitor"]) => start_monitoring(orchestrator, body),
        ("POST", ["monitor", "batch"]) => start_batch(orchestrator, body),
        ("POST", ["stop", "all"]) => {
            let stopped = orchestrator.stop_all();
            (
                200,
                json!({
                    "detail": format!("monitoring stopped for {} cameras", stopped),
                    "stopped": stopped,
                }),
            )
        }
        ("POST", ["stop", raw_id]) => stop_monitoring(orchestrator, raw_id),
        ("GET", ["monitored"]) => (200, json!({ "cameras": orchestrator.list() })),
        ("GET", ["status", raw_id]) => match monitored_id(raw_id) {
            Ok(id) => match orchestrator.status(&id) {
                Ok(summary) => (200, json!(summary)),
                Err(err) => error_body(&err),
            },
            Err(rejected) => rejected,
        },
        (
            _,
            [""] | ["health"] | ["monitor"] | ["monitor", "batch"] | ["stop", _] | ["monitored"]
            | ["status", _],
        ) => (405, json!({ "detail": "method not allowed" })),
        _ => (404, json!({ "detail": "not found" })),
    }
}

fn start_monitoring(orchestrator: &Orchestrator, body: &[u8]) -> (u16, Value) {
    let request: MonitorRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return error_body(&MonitorError::invalid(format!("invalid body: {}", err))),
    };
    let camera = request.camera_id.clone();
    match orchestrator.start(request.camera_id, request.config) {
        Ok(handle) => (
            200,
            json!({
                "detail": format!("monitoring started for camera {}", camera),
                "camera": handle,
            }),
        ),
        Err(err) => error_body(&err),
    }
}

fn start_batch(orchestrator: &Orchestrator, body: &[u8]) -> (u16, Value) {
    let request: BatchMonitorRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return error_body(&MonitorError::invalid(format!("invalid body: {}", err))),
    };
    match orchestrator.start_batch(&request.camera_ids, &request.config) {
        Ok(report) => (
            200,
            json!({
                "detail": format!(
                    "processed {} cameras: {} started, {} failed",
                    report.total_cameras,
                    report.successful.len(),
                    report.failed.len()
                ),
                "total_cameras": report.total_cameras,
                "successful": report.successful,
                "failed": report.failed,
            }),
        ),
        Err(err) => error_body(&err),
    }
}

fn stop_monitoring(orchestrator: &Orchestrator, raw_id: &str) -> (u16, Value) {
    let id = match monitored_id(raw_id) {
        Ok(id) => id,
        Err(rejected) => return rejected,
    };
    match orchestrator.stop(&id) {
        Ok(()) => (
            200,
            json!({ "detail": format!("monitoring stopped for camera {}", id) }),
        ),
        Err(err) => error_body(&err),
    }
}

/// A path id that is not a valid camera id cannot be monitored.
fn monitored_id(raw: &str) -> std::result::Result<CameraId, (u16, Value)> {
    CameraId::parse(raw).map_err(|_| {
        (
            404,
            json!({ "detail": format!("camera {} is not being monitored", raw) }),
        )
    })
}

fn error_body(err: &MonitorError) -> (u16, Value) {
    (err.http_status(), json!({ "detail": err.to_string() }))
}

fn service_metadata() -> Value {
    json!({
        "service": "camera-monitor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /monitor",
            "POST /monitor/batch",
            "POST /stop/{camera_id}",
            "POST /stop/all",
            "GET /monitored",
            "GET /status/{camera_id}",
            "GET /health",
        ],
    })
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before headers"));
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = match headers.get("content-length") {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow!("invalid content-length"))?,
        None => 0,
    };
    let total = (header_end + 4).checked_add(content_length);
    if total.map_or(true, |total| total > MAX_REQUEST_BYTES) {
        return Err(anyhow!("request too large"));
    }
    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &Value) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    write_response(stream, status, "application/json", &payload)
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        409 => "HTTP/1.1 409 Conflict",
        422 => "HTTP/1.1 422 Unprocessable Entity",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nConnection: close\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}
