pub mod definitions;
pub mod oid;
pub mod registry;

pub use definitions::{ControllerKind, MibLayout};
pub use oid::Oid;
pub use registry::{
    coerce_integer, MibBuilder, MibEntry, MibRegistry, MibValue, SharedMib, UpdateOutcome,
    ValueKind,
};
