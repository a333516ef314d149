//! `routemux init`: generate a starter configuration file.
//!
//! Writes a YAML, JSON, or TOML config with one example backend.
//! Refuses to overwrite an existing file.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::RoutemuxError;

pub fn execute(args: &InitArgs) -> Result<(), RoutemuxError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("routemux.{}", args.format.extension())));

    if output.exists() {
        return Err(RoutemuxError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => YAML_TEMPLATE,
        ConfigFormat::Json => JSON_TEMPLATE,
        ConfigFormat::Toml => TOML_TEMPLATE,
    }
}

const YAML_TEMPLATE: &str = r#"# routemux config
#
# Servers are tried in order, and each server's prefixes in order.
# The first prefix the request path starts with wins; anything else
# goes to default_port. Every backend is reached on localhost.

listen_port: 8000
default_port: 3000

servers:
  - name: "api"
    path: ["/api/v1", "/api/v2"]
    port: 9001
"#;

const JSON_TEMPLATE: &str = r#"{
  "listen_port": 8000,
  "default_port": 3000,
  "servers": [
    {
      "name": "api",
      "path": ["/api/v1", "/api/v2"],
      "port": 9001
    }
  ]
}
"#;

const TOML_TEMPLATE: &str = r#"# routemux config
#
# Servers are tried in order, and each server's prefixes in order.
# The first prefix the request path starts with wins; anything else
# goes to default_port. Every backend is reached on localhost.

listen_port = 8000
default_port = 3000

[[servers]]
name = "api"
path = ["/api/v1", "/api/v2"]
port = 9001
"#;
