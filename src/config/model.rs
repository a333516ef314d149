//! Serde data structures for the routemux configuration file.
//!
//! Contains [`Config`] (the root) and [`Server`] (one backend and the
//! path prefixes that select it). Both derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub listen_port: u16,

    pub default_port: u16,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

impl Config {
    #[must_use]
    pub fn total_prefixes(&self) -> usize {
        self.servers.iter().map(|s| s.path.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Server {
    pub name: String,

    /// Path prefixes, matched in order.
    pub path: Vec<String>,

    pub port: u16,
}
