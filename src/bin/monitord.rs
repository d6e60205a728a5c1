//! monitord - camera monitoring daemon
//!
//! This daemon:
//! 1. Loads `MonitordConfig` (file + environment)
//! 2. Starts the configured autostart sessions
//! 3. Serves the monitoring API
//! 4. On Ctrl-C, stops every session and then the API

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use camera_monitor::{
    api::{ApiConfig, ApiServer},
    config::MonitordConfig,
    DetectorRegistry, EventSink, FanoutSink, JsonlSink, LogSink, Orchestrator,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (.toml or .json). Defaults to $CAMERA_MONITOR_CONFIG.
    #[arg(long, env = "CAMERA_MONITOR_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = MonitordConfig::load_from(args.config.as_deref())?;

    let detectors = DetectorRegistry::with_builtin();
    log::info!("detector backends: {}", detectors.list().join(", "));

    let mut sink = FanoutSink::new().with(Arc::new(LogSink));
    if let Some(path) = &config.event_log {
        sink = sink.with(Arc::new(JsonlSink::open(path)?));
        log::info!("appending events to {}", path.display());
    }
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(detectors),
        Arc::new(config.source_catalog()),
        sink,
    ));

    for request in &config.autostart {
        match orchestrator.start(request.camera_id.clone(), request.config.clone()) {
            Ok(handle) => log::info!(
                "autostart: camera {} (session {})",
                handle.camera_id,
                handle.session_id
            ),
            Err(err) => log::error!("autostart: camera {}: {}", request.camera_id, err),
        }
    }

    let api_handle = ApiServer::new(
        ApiConfig {
            addr: config.api_addr.clone(),
        },
        orchestrator.clone(),
    )
    .spawn()?;
    log::info!("monitor api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("monitord waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping sessions...");
    let stopped = orchestrator.stop_all();
    log::info!("{} sessions stopped, stopping API server...", stopped);
    api_handle.stop()?;

    Ok(())
}
