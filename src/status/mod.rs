pub mod differ;
pub mod node;

pub use differ::{ObserveSummary, RetainedValue, StatusTreeDiffer};
pub use node::StatusNode;
