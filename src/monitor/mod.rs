pub mod client;
pub mod connection;
pub mod types;

pub use client::MonitorClient;
pub use connection::ConnectionManager;
