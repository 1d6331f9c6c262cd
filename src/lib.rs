//! # Letta-Matrix Bridge
//!
//! Makes every agent hosted on a [Letta](https://docs.letta.com) server appear
//! as a first-class user on a Matrix homeserver, each with its own private
//! room. Messages sent into an agent's room are relayed to Letta; the
//! agent's reply is relayed back. Agents created or deleted on the Letta
//! side are provisioned or retired on the Matrix side automatically.
//!
//! ## Components
//!
//! - [`letta`] — a minimal Letta API client (list agents, send messages).
//! - [`matrix`] — a minimal Matrix Client-Server API client (login, sync,
//!   room management, sending events).
//! - [`store`] — the sqlite-backed state store mapping agents to rooms and
//!   deduplicating inbound Matrix events.
//! - [`provisioner`] — reconciles the Letta agent roster against Matrix
//!   identities and rooms.
//! - [`sync_loop`] and [`ingress`] — long-poll `/sync` against the bridge's
//!   own Matrix account and turn raw events into a filtered, deduplicated
//!   stream of inbound messages.
//! - [`router`] — relays inbound messages to the correct agent and its
//!   reply back to Matrix, with per-agent serialization.
//! - [`contextualizer`] — rewrites inter-agent messages so the receiving
//!   agent knows it's hearing from another agent, not a human.
//! - [`drift`] — periodically reconciles persisted state against live
//!   Matrix room membership, healing drift.
//! - [`config`] — process configuration, loaded from the environment.
//! - [`health`] — the `/health` and `/metrics` HTTP surface.
//!
//! ## Quick Start
//!
//! ```no_run
//! use letta_matrix_bridge::config::Config;
//! use letta_matrix_bridge::context::BridgeContext;
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     let config = Config::parse();
//!     let ctx = BridgeContext::new(config).await?;
//!     ctx.run().await
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, BridgeError>`](crate::error::BridgeError),
//! which carries rich diagnostics via [`miette`] and maps onto the error
//! taxonomy described in the bridge's design (Transient / Auth / Forbidden /
//! Conflict / NotFound / Fatal).

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod contextualizer;
pub mod drift;
pub mod error;
pub mod health;
pub mod ingress;
pub mod matrix;
pub mod pagination;
pub mod provisioner;
pub mod retry;
pub mod router;
pub mod store;
pub mod sync_loop;
pub mod types;
pub mod utils;

// Re-export main types for convenience.
pub use client::{ClientBuilder, ClientConfig, LettaClient};
pub use error::{BridgeError, BridgeResult, LettaError, LettaResult};

/// Maximum number of retries for API calls.
pub const MAX_RETRIES: u32 = 3;
