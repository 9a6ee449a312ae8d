pub mod agent;

pub use agent::{answer, AgentHandle, Responder, SnmpAgent};
