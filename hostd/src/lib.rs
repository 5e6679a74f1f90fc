//! hostd - strawman host control-plane daemon.
//!
//! Accepts connections on a UNIX socket or TCP, speaks a line-oriented text
//! protocol and mutates an in-memory registry of VM records. The VM backend
//! is a stand-in: no compute or memory is provisioned.
//!
//! ## Architecture
//!
//! - **Registry**: ordered, capacity-bounded VM records owned by one task
//! - **Protocol**: parses a line, runs it, formats a `200 OK`/`400 ERR` line
//! - **Server**: listening socket, accept loop, per-connection line framing
//!
//! Data flows listener → connection handler → dispatcher → registry and
//! back as one response line per request line.

pub mod config;
pub mod daemon;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod shutdown;

/// Daemon version reported by `VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{Config, ListenAddr, ServeMode};
pub use registry::{Registry, RegistryHandle, RegistryService};
pub use server::Server;
pub use shutdown::Shutdown;
