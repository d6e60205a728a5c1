use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::{Detector, DetectorFactory};
use super::backends::{ReplayBackend, StubBackend};
use crate::session::SessionConfig;

type BuildFn = dyn Fn(&SessionConfig) -> Result<Box<dyn Detector>> + Send + Sync;

/// Named detector constructors.
///
/// The backend for a session is chosen by the scheme of its model path
/// (`stub://...`, `replay://...`). Paths without a registered scheme use the
/// default backend, which is the first one registered.
pub struct DetectorRegistry {
    builders: HashMap<String, Arc<BuildFn>>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry with the `stub` (default) and `replay` backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stub", |_cfg| Ok(Box::new(StubBackend::new())));
        registry.register("replay", |cfg| {
            let path = model_path_body(&cfg.detection_model_path);
            Ok(Box::new(ReplayBackend::load(Path::new(path))?))
        });
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<F>(&mut self, name: &str, build: F)
    where
        F: Fn(&SessionConfig) -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.builders.insert(name.to_string(), Arc::new(build));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.builders.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Backend name that would serve `model_path`.
    pub fn resolve(&self, model_path: &str) -> Result<String> {
        if let Some((scheme, _)) = model_path.split_once("://") {
            if self.builders.contains_key(scheme) {
                return Ok(scheme.to_string());
            }
        }
        self.default_name
            .clone()
            .ok_or_else(|| anyhow!("no detector backend registered"))
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorFactory for DetectorRegistry {
    fn build(&self, config: &SessionConfig) -> Result<Box<dyn Detector>> {
        let name = self.resolve(&config.detection_model_path)?;
        let build = self
            .builders
            .get(&name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        let mut detector = build(config)?;
        detector.warm_up()?;
        log::info!(
            "detector '{}' ready: model={} device={} tracker={}",
            detector.name(),
            config.detection_model_path,
            config.device,
            config.tracker_model
        );
        Ok(detector)
    }
}

fn model_path_body(model_path: &str) -> &str {
    model_path
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(model_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_scheme_with_default_fallback() {
        let registry = DetectorRegistry::with_builtin();
        assert_eq!(registry.resolve("stub://yolo").unwrap(), "stub");
        assert_eq!(registry.resolve("replay:///tmp/x.json").unwrap(), "replay");
        assert_eq!(registry.resolve("models/yolo11n.pt").unwrap(), "stub");
        assert_eq!(registry.resolve("onnx://model").unwrap(), "stub");
    }

    #[test]
    fn default_can_be_changed() {
        let mut registry = DetectorRegistry::with_builtin();
        registry.set_default("replay").unwrap();
        assert_eq!(registry.resolve("yolo.pt").unwrap(), "replay");
        assert!(registry.set_default("tensorrt").is_err());
        assert_eq!(registry.list(), vec!["replay", "stub"]);
    }

    #[test]
    fn empty_registry_cannot_build() {
        let registry = DetectorRegistry::new();
        assert!(registry.build(&SessionConfig::default()).is_err());
    }

    #[test]
    fn replay_backend_reads_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, "[[]]").unwrap();
        let cfg = SessionConfig {
            detection_model_path: format!("replay://{}", path.display()),
            ..SessionConfig::default()
        };
        let detector = DetectorRegistry::with_builtin().build(&cfg).unwrap();
        assert_eq!(detector.name(), "replay");

        let missing = SessionConfig {
            detection_model_path: "replay:///nonexistent/script.json".to_string(),
            ..SessionConfig::default()
        };
        assert!(DetectorRegistry::with_builtin().build(&missing).is_err());
    }
}
