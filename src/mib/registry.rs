//! MIB Registry
//!
//! The ordered table of OID bindings the SNMP agent serves.
//!
//! # Invariants
//!
//! - Entries are sorted by OID and unique once [`MibBuilder::build`] returns.
//! - Entries are never added, removed or reordered afterwards; only values change.
//! - Keyword rules are evaluated in registry order and the first match wins.
//!
//! # Lookups
//!
//! - [`MibRegistry::get`] - exact match through a hash index
//! - [`MibRegistry::get_next`] - binary search for the insertion point after
//!   the requested OID, then the entry at that point

use super::oid::Oid;
use crate::error::{ExporterError, Result};
use async_snmp::Value;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Registry shared between the collection loop (writer) and the agent (reader)
pub type SharedMib = Arc<RwLock<MibRegistry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    /// Computed from the registry's creation time; never stored.
    TimeTicks,
    ObjectIdentifier,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "str",
            ValueKind::Integer => "int",
            ValueKind::TimeTicks => "timeticks",
            ValueKind::ObjectIdentifier => "oid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MibValue {
    String(String),
    Integer(i64),
    TimeTicks,
    ObjectIdentifier(Oid),
}

#[derive(Debug, Clone)]
pub struct MibEntry {
    pub oid: Oid,
    pub kind: ValueKind,
    pub description: String,
    pub value: MibValue,
    pub keywords: Vec<String>,
}

/// Maps a path to an entry when every keyword occurs in the path.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    keywords: Vec<String>,
    entry: usize,
}

impl KeywordRule {
    pub fn matches(&self, path: &str) -> bool {
        !self.keywords.is_empty() && self.keywords.iter().all(|kw| path.contains(kw.as_str()))
    }
}

/// Result of [`MibRegistry::update_value`]
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Oid),
    /// No rule matched the path
    Unmatched,
    /// A rule matched but the value could not be coerced; the old value stands
    Rejected(Oid),
}

/// Strips alphabetic characters, spaces and `%`, then truncates to an integer.
/// `"60.1 Hz"` becomes `60`.
pub fn coerce_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_alphabetic() && *c != ' ' && *c != '%')
        .collect();
    let cleaned = cleaned.trim();

    if let Ok(float) = cleaned.parse::<f64>() {
        if float.is_finite() {
            return Some(float.trunc() as i64);
        }
    }
    cleaned.parse::<i64>().ok()
}

fn coerce(kind: ValueKind, raw: &str) -> Option<MibValue> {
    match kind {
        ValueKind::String => Some(MibValue::String(raw.to_string())),
        ValueKind::Integer => coerce_integer(raw).map(MibValue::Integer),
        ValueKind::TimeTicks => Some(MibValue::TimeTicks),
        ValueKind::ObjectIdentifier => raw.parse::<Oid>().ok().map(MibValue::ObjectIdentifier),
    }
}

fn zero_value(kind: ValueKind) -> MibValue {
    match kind {
        ValueKind::String => MibValue::String(String::new()),
        ValueKind::Integer => MibValue::Integer(0),
        ValueKind::TimeTicks => MibValue::TimeTicks,
        ValueKind::ObjectIdentifier => MibValue::ObjectIdentifier(Oid::default()),
    }
}

/// Collects entries at startup.
#[derive(Debug, Default)]
pub struct MibBuilder {
    entries: Vec<MibEntry>,
}

impl MibBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_oid(
        &mut self,
        oid: Oid,
        kind: ValueKind,
        description: impl Into<String>,
        default: &str,
        keywords: Vec<String>,
    ) -> &mut Self {
        let value = coerce(kind, default).unwrap_or_else(|| {
            warn!("Invalid default {:?} for {} ({}), using zero", default, oid, kind);
            zero_value(kind)
        });
        self.entries.push(MibEntry {
            oid,
            kind,
            description: description.into(),
            value,
            keywords,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort, reject duplicates and index the table.
    pub fn build(mut self) -> Result<MibRegistry> {
        self.entries.sort_by(|a, b| a.oid.cmp(&b.oid));

        let mut index = HashMap::with_capacity(self.entries.len());
        for (position, entry) in self.entries.iter().enumerate() {
            if index.insert(entry.oid.clone(), position).is_some() {
                return Err(ExporterError::Config(format!(
                    "duplicate OID {} ({})",
                    entry.oid, entry.description
                )));
            }
        }

        let rules = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.keywords.is_empty())
            .map(|(position, entry)| KeywordRule {
                keywords: entry.keywords.clone(),
                entry: position,
            })
            .collect();

        Ok(MibRegistry {
            entries: self.entries,
            index,
            rules,
            started: Instant::now(),
        })
    }
}

pub struct MibRegistry {
    entries: Vec<MibEntry>,
    index: HashMap<Oid, usize>,
    rules: Vec<KeywordRule>,
    started: Instant,
}

impl MibRegistry {
    pub fn builder() -> MibBuilder {
        MibBuilder::new()
    }

    pub fn into_shared(self) -> SharedMib {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MibEntry] {
        &self.entries
    }

    pub fn get(&self, oid: &Oid) -> Option<&MibEntry> {
        self.index.get(oid).map(|&position| &self.entries[position])
    }

    /// Smallest entry strictly greater than `oid`; `None` is end of MIB view.
    pub fn get_next(&self, oid: &Oid) -> Option<&MibEntry> {
        let position = self.entries.partition_point(|entry| entry.oid <= *oid);
        self.entries.get(position)
    }

    /// First rule matching `path`, in registry order.
    fn rule_position(&self, path: &str) -> Option<usize> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.entry)
    }

    /// Store `value` in the entry matched by `path`, coerced to the entry's kind.
    pub fn update_value(&mut self, path: &str, value: &str) -> UpdateOutcome {
        if path.is_empty() {
            return UpdateOutcome::Unmatched;
        }
        let Some(position) = self.rule_position(path) else {
            return UpdateOutcome::Unmatched;
        };

        let entry = &mut self.entries[position];
        debug!("{} : {}, type= {}", path, value, entry.kind);

        match entry.kind {
            ValueKind::TimeTicks => UpdateOutcome::Updated(entry.oid.clone()),
            kind => match coerce(kind, value) {
                Some(coerced) => {
                    entry.value = coerced;
                    UpdateOutcome::Updated(entry.oid.clone())
                }
                None => {
                    warn!(
                        "Cannot store {:?} from '{}' in {} ({})",
                        value, path, entry.oid, kind
                    );
                    UpdateOutcome::Rejected(entry.oid.clone())
                }
            },
        }
    }

    /// Wire value of an entry; time ticks are hundredths of a second since
    /// the registry was built.
    pub fn wire_value(&self, entry: &MibEntry) -> Value {
        match &entry.value {
            MibValue::String(s) => Value::OctetString(Bytes::from(s.clone())),
            MibValue::Integer(i) => {
                Value::Integer((*i).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            }
            MibValue::ObjectIdentifier(oid) => Value::ObjectIdentifier(oid.to_wire()),
            // Hundredths of a second; wraps like sysUpTime
            MibValue::TimeTicks => {
                Value::TimeTicks((self.started.elapsed().as_millis() / 10) as u32)
            }
        }
    }
}
