//! Object Identifiers
//!
//! An [`Oid`] is an ordered tuple of non-negative arcs. The derived ordering is
//! lexicographic over the arcs, which is exactly SNMP's canonical OID order
//! (a prefix sorts before any of its extensions).

use crate::error::{ExporterError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new OID made of `self` followed by `suffix`.
    pub fn child(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.0.clone();
        arcs.extend_from_slice(suffix);
        Oid(arcs)
    }

    /// The codec's representation, used for variable bindings on the wire.
    pub fn to_wire(&self) -> async_snmp::Oid {
        async_snmp::Oid::from_slice(&self.0)
    }
}

impl From<&async_snmp::Oid> for Oid {
    fn from(wire: &async_snmp::Oid) -> Self {
        Oid(wire.arcs().to_vec())
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

/// Accepts dotted (`1.3.6.1`, `.1.3.6.1`) and tuple (`(1, 3, 6, 1)`) notation.
impl FromStr for Oid {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim()
            .trim_start_matches('.');
        if trimmed.is_empty() {
            return Ok(Oid::default());
        }

        let separator = if trimmed.contains(',') { ',' } else { '.' };
        trimmed
            .split(separator)
            .map(str::trim)
            .filter(|arc| !arc.is_empty() || separator == '.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| ExporterError::Config(format!("invalid OID '{}'", s)))
            })
            .collect::<Result<Vec<u32>>>()
            .map(Oid)
    }
}
