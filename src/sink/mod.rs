//! Event sinks.
//!
//! Sessions publish every validated event to one shared `EventSink`.
//! Publishing is best-effort: a failing sink is logged by the session and
//! never stops monitoring.

mod jsonl;

pub use jsonl::JsonlSink;

use anyhow::{anyhow, Result};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::event::{Event, EventKind};

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &Event) -> Result<()>;
}

/// Writes events to the log at `info`.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &Event) -> Result<()> {
        let verb = match event.kind {
            EventKind::Confirmed => "appeared",
            EventKind::Disappeared => "disappeared",
        };
        log::info!(
            "camera {}: {} #{} {} (frame {})",
            event.camera_id,
            event.class,
            event.track_id,
            verb,
            event.frame_index
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Forwards events over an mpsc channel.
pub struct ChannelSink {
    tx: Mutex<Sender<Event>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &Event) -> Result<()> {
        self.tx
            .lock()
            .map_err(|_| anyhow!("channel sink lock poisoned"))?
            .send(event.clone())
            .map_err(|_| anyhow!("event receiver dropped"))
    }
}

/// Publishes to every inner sink; reports the first failure after trying all.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: &Event) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.publish(event) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
