//! Change Sinks
//!
//! A sink receives every `(path, value)` pair the differ emits, synchronously
//! and in traversal order. MQTT or Home Assistant publishers plug in here; the
//! exporter ships the MIB updater and a tracing sink.

use crate::mib::{SharedMib, UpdateOutcome};
use tracing::debug;

pub trait ChangeSink {
    fn publish(&mut self, path: &str, value: &str);
}

impl<F> ChangeSink for F
where
    F: FnMut(&str, &str),
{
    fn publish(&mut self, path: &str, value: &str) {
        self(path, value)
    }
}

/// Logs every change at `debug`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ChangeSink for LogSink {
    fn publish(&mut self, path: &str, value: &str) {
        debug!("{} = {}", path, value);
    }
}

/// Collects changes for a later asynchronous hand-off.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub changes: Vec<(String, String)>,
}

impl ChangeSink for BufferSink {
    fn publish(&mut self, path: &str, value: &str) {
        self.changes.push((path.to_string(), value.to_string()));
    }
}

impl BufferSink {
    pub fn drain(&mut self) -> std::vec::Drain<'_, (String, String)> {
        self.changes.drain(..)
    }
}

/// Applies changes to the MIB registry.
#[derive(Clone)]
pub struct MibSink {
    registry: SharedMib,
}

impl MibSink {
    pub fn new(registry: SharedMib) -> Self {
        Self { registry }
    }

    /// Apply a batch of changes under one write lock; returns how many entries changed.
    pub async fn apply<I>(&self, changes: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut registry = self.registry.write().await;
        let mut updated = 0;
        for (path, value) in changes {
            if let UpdateOutcome::Updated(oid) = registry.update_value(&path, &value) {
                debug!("{} -> {} = {}", path, oid, value);
                updated += 1;
            }
        }
        updated
    }
}

/// Fans one change out to several sinks in order.
pub struct FanOut<'a> {
    sinks: Vec<&'a mut dyn ChangeSink>,
}

impl<'a> FanOut<'a> {
    pub fn new(sinks: Vec<&'a mut dyn ChangeSink>) -> Self {
        Self { sinks }
    }
}

impl ChangeSink for FanOut<'_> {
    fn publish(&mut self, path: &str, value: &str) {
        for sink in self.sinks.iter_mut() {
            sink.publish(path, value);
        }
    }
}
