use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::api::MonitorRequest;
use crate::camera::CameraId;
use crate::ingest::synthetic::MAX_FRAME_SIDE;
use crate::ingest::SourceCatalog;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8800";
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct MonitordConfigFile {
    api: Option<ApiConfigFile>,
    events: Option<EventsConfigFile>,
    sources: Option<SourcesConfigFile>,
    autostart: Option<Vec<MonitorRequest>>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EventsConfigFile {
    log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SourcesConfigFile {
    cameras: Option<BTreeMap<String, String>>,
    synthetic_fallback: Option<bool>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MonitordConfig {
    pub api_addr: String,
    /// JSONL event log, in addition to the log sink.
    pub event_log: Option<PathBuf>,
    pub sources: SourceSettings,
    /// Sessions started when the daemon boots.
    pub autostart: Vec<MonitorRequest>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub cameras: BTreeMap<CameraId, String>,
    pub synthetic_fallback: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for MonitordConfig {
    fn default() -> Self {
        Self {
            api_addr: DEFAULT_API_ADDR.to_string(),
            event_log: None,
            sources: SourceSettings {
                cameras: BTreeMap::new(),
                synthetic_fallback: true,
                width: DEFAULT_FRAME_WIDTH,
                height: DEFAULT_FRAME_HEIGHT,
            },
            autostart: Vec::new(),
        }
    }
}

impl MonitordConfig {
    /// File named by `CAMERA_MONITOR_CONFIG` (if set), then environment
    /// overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMERA_MONITOR_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitordConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or(defaults.api_addr);
        let event_log = file.events.and_then(|events| events.log_path);

        let sources_file = file.sources.unwrap_or_default();
        let mut cameras = BTreeMap::new();
        for (raw_id, url) in sources_file.cameras.unwrap_or_default() {
            let camera = CameraId::parse(&raw_id)
                .map_err(|e| anyhow!("sources.cameras: {}", e))?;
            cameras.insert(camera, url.trim().to_string());
        }
        let sources = SourceSettings {
            cameras,
            synthetic_fallback: sources_file
                .synthetic_fallback
                .unwrap_or(defaults.sources.synthetic_fallback),
            width: sources_file.width.unwrap_or(defaults.sources.width),
            height: sources_file.height.unwrap_or(defaults.sources.height),
        };

        Ok(Self {
            api_addr,
            event_log,
            sources,
            autostart: file.autostart.unwrap_or_default(),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("CAMERA_MONITOR_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("CAMERA_MONITOR_EVENT_LOG") {
            if !path.trim().is_empty() {
                self.event_log = Some(PathBuf::from(path.trim()));
            }
        }
        if let Ok(flag) = std::env::var("CAMERA_MONITOR_SYNTHETIC_FALLBACK") {
            self.sources.synthetic_fallback = parse_flag(&flag).ok_or_else(|| {
                anyhow!("CAMERA_MONITOR_SYNTHETIC_FALLBACK must be true/false, 1/0 or yes/no")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.api_addr
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("api.addr '{}' is not a socket address", self.api_addr))?;

        for (name, side) in [("width", self.sources.width), ("height", self.sources.height)] {
            if side == 0 || side > MAX_FRAME_SIDE {
                return Err(anyhow!(
                    "sources.{} must be in 1..={}, got {}",
                    name,
                    MAX_FRAME_SIDE,
                    side
                ));
            }
        }
        for (camera, url) in &self.sources.cameras {
            if url.is_empty() {
                return Err(anyhow!("sources.cameras.{} has an empty url", camera));
            }
        }

        let mut seen = BTreeSet::new();
        for request in &self.autostart {
            if !seen.insert(request.camera_id.clone()) {
                return Err(anyhow!(
                    "autostart lists camera {} more than once",
                    request.camera_id
                ));
            }
            request
                .config
                .validate()
                .map_err(|e| anyhow!("autostart camera {}: {}", request.camera_id, e))?;
        }
        Ok(())
    }

    pub fn source_catalog(&self) -> SourceCatalog {
        self.sources
            .cameras
            .iter()
            .fold(
                SourceCatalog::new(self.sources.width, self.sources.height),
                |catalog, (camera, url)| catalog.with_camera(camera.clone(), url.clone()),
            )
            .with_synthetic_fallback(self.sources.synthetic_fallback)
    }
}

fn read_config_file(path: &Path) -> Result<MonitordConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
