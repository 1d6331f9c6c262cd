//! Type definitions used by the Letta client and Matrix client.

pub mod agent;
pub mod common;
pub mod message;

pub use agent::*;
pub use common::*;
pub use message::*;
