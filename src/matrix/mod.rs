//! Minimal Matrix Client-Server API client: login/registration, room
//! management, sending state and message events, and long-polling `/sync`.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MatrixClient, MatrixClientBuilder, MatrixClientConfig};
pub use error::MatrixError;
