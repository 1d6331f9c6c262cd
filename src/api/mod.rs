//! Letta API endpoint implementations.
//!
//! The bridge is a thin Letta client: it only lists agents and sends them
//! messages, so only those two endpoint groups are implemented here.

pub mod agents;
pub mod messages;

pub use agents::AgentApi;
pub use messages::MessageApi;
