//! routemux is a path-prefix reverse proxy.
//!
//! It listens on one port, picks a backend for each request by matching
//! the request path against configured prefixes (first match in
//! configured order wins, unmatched paths go to a default backend), and
//! relays the backend's status, headers, and body back to the caller.
//! Every backend lives on the local host.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate).
//! - [`config`] -- Configuration model, file sources, and validation via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Core forwarding: prefix routing table, header copying, and
//!   the single-attempt backend call.
//! - [`server`] -- Axum server setup, routing snapshots, and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file formats |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
