//! Status Tree Differencing
//!
//! Flattens a [`StatusNode`] tree into slash-delimited leaf paths and emits a
//! change for every leaf whose value differs from the one last emitted for
//! the same path, or whose last emission is older than the flush interval.
//!
//! # Traversal
//!
//! - Objects append `/key` to the path and recurse in key order
//! - String lists are one leaf whose value is the elements joined with `", "`
//! - Other sequences recurse into each object element with the *same* path;
//!   list elements are alternate updates of one logical signal
//! - Numeric entities are one leaf whose value is the inner `value`
//! - Anything else is a traversal type error: logged, skipped, siblings continue
//!
//! A differ instance is meant to be owned by a single polling loop. Share it
//! behind an external lock if several pollers feed it.

use super::node::StatusNode;
use crate::sinks::ChangeSink;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Last emitted state of one path
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedValue {
    pub value: String,
    pub last_emitted: Instant,
}

/// Counters for one `observe` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveSummary {
    /// Leaves handed to the sink
    pub emitted: usize,
    /// Leaves dropped by the blacklist
    pub suppressed: usize,
    /// Nodes skipped because of an unsupported shape
    pub type_errors: usize,
}

pub struct StatusTreeDiffer {
    blacklist: Vec<String>,
    flush_interval: Option<Duration>,
    retained: HashMap<String, RetainedValue>,
}

impl StatusTreeDiffer {
    /// `blacklist` entries match case-insensitively anywhere in a path.
    /// A `flush_interval` of `None` never re-emits unchanged values.
    pub fn new(blacklist: Vec<String>, flush_interval: Option<Duration>) -> Self {
        Self {
            blacklist: blacklist
                .into_iter()
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect(),
            flush_interval,
            retained: HashMap::new(),
        }
    }

    pub fn observe<S>(&mut self, root: &StatusNode, prefix: &str, sink: &mut S) -> ObserveSummary
    where
        S: ChangeSink + ?Sized,
    {
        self.observe_at(root, prefix, Instant::now(), sink)
    }

    /// Same as [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at<S>(
        &mut self,
        root: &StatusNode,
        prefix: &str,
        now: Instant,
        sink: &mut S,
    ) -> ObserveSummary
    where
        S: ChangeSink + ?Sized,
    {
        let mut summary = ObserveSummary::default();
        self.descend(root, prefix, now, sink, &mut summary);
        summary
    }

    fn descend<S>(
        &mut self,
        node: &StatusNode,
        path: &str,
        now: Instant,
        sink: &mut S,
        summary: &mut ObserveSummary,
    ) where
        S: ChangeSink + ?Sized,
    {
        match node {
            StatusNode::Object(entries) => {
                for (key, child) in entries {
                    let child_path = join_path(path, key);
                    self.descend(child, &child_path, now, sink, summary);
                }
            }
            StatusNode::Sequence(items) => {
                for item in items {
                    match item {
                        StatusNode::Object(_) | StatusNode::NumericEntity { .. } => {
                            self.descend(item, path, now, sink, summary)
                        }
                        other => {
                            warn!(
                                "Invalid type in status document at '{}': {} inside a list",
                                path,
                                other.shape()
                            );
                            summary.type_errors += 1;
                        }
                    }
                }
            }
            StatusNode::StringList(items) => {
                self.check_leaf(path, items.join(", "), now, sink, summary)
            }
            StatusNode::NumericEntity { value, .. } => {
                self.check_leaf(path, value.clone(), now, sink, summary)
            }
            StatusNode::Scalar(value) => self.check_leaf(path, value.clone(), now, sink, summary),
            StatusNode::Unsupported(kind) => {
                warn!("Invalid type in status document at '{}': {}", path, kind);
                summary.type_errors += 1;
            }
        }
    }

    fn check_leaf<S>(
        &mut self,
        path: &str,
        value: String,
        now: Instant,
        sink: &mut S,
        summary: &mut ObserveSummary,
    ) where
        S: ChangeSink + ?Sized,
    {
        if self.is_blacklisted(path) {
            summary.suppressed += 1;
            return;
        }

        let changed = match self.retained.get(path) {
            None => true,
            Some(last) => {
                last.value != value
                    || self
                        .flush_interval
                        .is_some_and(|flush| now.saturating_duration_since(last.last_emitted) >= flush)
            }
        };
        if !changed {
            return;
        }

        debug!("{} : {}", path, value);
        sink.publish(path, &value);
        self.retained.insert(
            path.to_string(),
            RetainedValue {
                value,
                last_emitted: now,
            },
        );
        summary.emitted += 1;
    }

    pub fn is_blacklisted(&self, path: &str) -> bool {
        if self.blacklist.is_empty() {
            return false;
        }
        let lowered = path.to_lowercase();
        self.blacklist.iter().any(|item| lowered.contains(item.as_str()))
    }

    /// Current retained entry for `path`, if any.
    pub fn retained(&self, path: &str) -> Option<&RetainedValue> {
        self.retained.get(path)
    }

    /// Number of paths in the retained table.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Forget every retained value; the next pass re-emits all leaves.
    pub fn clear(&mut self) {
        self.retained.clear();
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}
