use serde_json::Value;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use camera_monitor::api::{ApiConfig, ApiHandle, ApiServer};
use camera_monitor::{DetectorRegistry, MemorySink, Orchestrator, SourceCatalog};

fn spawn_api() -> (ApiHandle, Arc<Orchestrator>) {
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(DetectorRegistry::with_builtin()),
        Arc::new(SourceCatalog::new(16, 12)),
        Arc::new(MemorySink::new()),
    ));
    let handle = ApiServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        },
        orchestrator.clone(),
    )
    .spawn()
    .expect("spawn api");
    (handle, orchestrator)
}

fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, Value) {
    let body = body.unwrap_or("");
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\n\r\n{body}",
        method = method,
        path = path,
        addr = addr,
        len = body.len(),
        body = body
    );
    send_raw(addr, &req)
}

fn send_raw(addr: SocketAddr, req: &str) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.write_all(req.as_bytes()).expect("write request");
    let mut resp = String::new();
    stream.read_to_string(&mut resp).expect("read response");

    let status: u16 = resp
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status code");
    let (_, payload) = resp.split_once("\r\n\r\n").expect("response body");
    let json = serde_json::from_str(payload).expect("json body");
    (status, json)
}

const MONITOR_BODY: &str = r#"{
    "camera_id": 1,
    "device": "cpu",
    "detection_model_path": "stub://yolov8n.pt",
    "classes": ["person", "car"],
    "tracker_model": "bytetrack.yaml",
    "frames_per_second": 30,
    "frames_before_disappearance": 10,
    "confidence_threshold": 0.5,
    "iou": 0.7
}"#;

#[test]
fn monitor_and_stop_over_http() {
    let (api, orchestrator) = spawn_api();

    let (status, body) = request(api.addr, "POST", "/monitor", Some(MONITOR_BODY));
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["camera"]["camera_id"], 1);
    assert!(orchestrator.is_monitoring(&camera_monitor::CameraId::from(1)));

    let (status, _) = request(api.addr, "POST", "/monitor", Some(MONITOR_BODY));
    assert_eq!(status, 409);

    let (status, body) = request(api.addr, "GET", "/monitored", None);
    assert_eq!(status, 200);
    let cameras = body["cameras"].as_array().unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0]["config"]["classes"], serde_json::json!(["car", "person"]));
    assert_eq!(cameras[0]["config"]["min_track_frames"], 7);

    let (status, _) = request(api.addr, "POST", "/stop/1", None);
    assert_eq!(status, 200);
    let (status, body) = request(api.addr, "POST", "/stop/1", None);
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains("not being monitored"));

    api.stop().unwrap();
}

#[test]
fn stop_all_route_wins_over_camera_route() {
    let (api, orchestrator) = spawn_api();
    for id in ["2", "\"dock\""] {
        let body = MONITOR_BODY.replace("\"camera_id\": 1", &format!("\"camera_id\": {}", id));
        let (status, _) = request(api.addr, "POST", "/monitor", Some(&body));
        assert_eq!(status, 200);
    }

    let (status, body) = request(api.addr, "POST", "/stop/all", None);
    assert_eq!(status, 200);
    assert_eq!(body["stopped"], 2);
    assert!(orchestrator.is_empty());

    let (status, body) = request(api.addr, "GET", "/monitored", None);
    assert_eq!(status, 200);
    assert!(body["cameras"].as_array().unwrap().is_empty());

    api.stop().unwrap();
}

#[test]
fn rejects_invalid_requests() {
    let (api, orchestrator) = spawn_api();

    let bad_device = MONITOR_BODY.replace("\"cpu\"", "\"tpu\"");
    let (status, body) = request(api.addr, "POST", "/monitor", Some(&bad_device));
    assert_eq!(status, 422);
    assert!(body["detail"].as_str().unwrap().contains("device"));

    let reserved = MONITOR_BODY.replace("\"camera_id\": 1", "\"camera_id\": \"all\"");
    let (status, _) = request(api.addr, "POST", "/monitor", Some(&reserved));
    assert_eq!(status, 422);

    let (status, _) = request(api.addr, "POST", "/monitor", Some("[]"));
    assert_eq!(status, 422);
    assert!(orchestrator.is_empty());

    let (status, _) = request(api.addr, "GET", "/status/42", None);
    assert_eq!(status, 404);
    let (status, _) = request(api.addr, "PUT", "/monitored", None);
    assert_eq!(status, 405);
    let (status, _) = request(api.addr, "GET", "/metrics", None);
    assert_eq!(status, 404);

    api.stop().unwrap();
}

#[test]
fn metadata_health_and_status() {
    let (api, _orchestrator) = spawn_api();

    let (status, body) = request(api.addr, "GET", "/", None);
    assert_eq!(status, 200);
    assert_eq!(body["service"], "camera-monitor");
    assert!(body["endpoints"].as_array().unwrap().len() >= 6);

    let (status, body) = request(api.addr, "GET", "/health", None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let batch = MONITOR_BODY.replace("\"camera_id\": 1", "\"camera_ids\": [5, 6]");
    let (status, body) = request(api.addr, "POST", "/monitor/batch", Some(&batch));
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["total_cameras"], 2);
    assert!(body["failed"].as_array().unwrap().is_empty());

    let (status, body) = request(api.addr, "GET", "/status/5", None);
    assert_eq!(status, 200);
    assert_eq!(body["camera_id"], 5);
    assert_eq!(body["config"]["frames_per_second"], 30);

    let (status, _) = request(api.addr, "POST", "/stop/all", None);
    assert_eq!(status, 200);
    api.stop().unwrap();
}

#[test]
fn oversized_content_length_is_a_bad_request() {
    let (api, orchestrator) = spawn_api();

    for len in [usize::MAX.to_string(), (1024 * 1024).to_string()] {
        let req = format!(
            "POST /monitor HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\n\r\n",
            api.addr, len
        );
        let (status, body) = send_raw(api.addr, &req);
        assert_eq!(status, 400, "Content-Length {}", len);
        assert!(body["detail"].as_str().unwrap().contains("too large"));
    }
    assert!(orchestrator.is_empty());

    // The server keeps serving after rejecting them.
    let (status, _) = request(api.addr, "GET", "/health", None);
    assert_eq!(status, 200);
    api.stop().unwrap();
}
