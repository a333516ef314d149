//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as zero ports, unnamed or duplicate servers, empty prefix
//! lists, and prefixes that do not start with `/`. Returns every
//! [`ValidationError`] found, with per-field suggestions.
//!
//! Overlapping prefixes are not an error: the first configured match wins,
//! and [`shadowed_prefixes`] reports the ones that can never be reached.

use std::collections::HashSet;

use super::model::Config;
use crate::error::ValidationError;
use crate::proxy::routing::DEFAULT_ROUTE_NAME;

/// Validate a single path prefix. Returns `Ok(())` or a human-readable error.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("prefix cannot be empty".into());
    }
    if !prefix.starts_with('/') {
        return Err(format!("prefix '{prefix}' must start with '/'"));
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen_port == 0 {
        errors.push(ValidationError {
            server: "(root)".into(),
            field: "listen_port".into(),
            message: "listen_port must be non-zero".into(),
            suggestion: None,
        });
    }

    if config.default_port == 0 {
        errors.push(ValidationError {
            server: "(root)".into(),
            field: "default_port".into(),
            message: "default_port must be non-zero".into(),
            suggestion: None,
        });
    }

    let mut seen_names = HashSet::new();

    for (i, server) in config.servers.iter().enumerate() {
        let server_id = if server.name.is_empty() {
            format!("servers[{i}]")
        } else {
            server.name.clone()
        };

        if server.name.is_empty() {
            errors.push(ValidationError {
                server: server_id.clone(),
                field: "name".into(),
                message: "name cannot be empty".into(),
                suggestion: None,
            });
        } else if server.name == DEFAULT_ROUTE_NAME {
            errors.push(ValidationError {
                server: server_id.clone(),
                field: "name".into(),
                message: format!("'{DEFAULT_ROUTE_NAME}' is reserved for the fallback backend"),
                suggestion: Some("use default_port to configure the fallback".into()),
            });
        } else if !seen_names.insert(server.name.as_str()) {
            errors.push(ValidationError {
                server: server_id.clone(),
                field: "name".into(),
                message: "duplicate server name".into(),
                suggestion: None,
            });
        }

        if server.port == 0 {
            errors.push(ValidationError {
                server: server_id.clone(),
                field: "port".into(),
                message: "port must be non-zero".into(),
                suggestion: None,
            });
        }

        if server.path.is_empty() {
            errors.push(ValidationError {
                server: server_id.clone(),
                field: "path".into(),
                message: "at least one path prefix must be defined".into(),
                suggestion: None,
            });
        }

        for prefix in &server.path {
            if let Err(msg) = validate_prefix(prefix) {
                errors.push(ValidationError {
                    server: server_id.clone(),
                    field: "path".into(),
                    message: msg,
                    suggestion: if prefix.is_empty() {
                        None
                    } else {
                        Some(format!("did you mean '/{prefix}'?"))
                    },
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A prefix that can never be selected because an earlier one covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowed<'a> {
    pub server: &'a str,
    pub prefix: &'a str,
    pub by_server: &'a str,
    pub by_prefix: &'a str,
}

/// List every (server, prefix) pair made unreachable by an earlier pair.
#[must_use]
pub fn shadowed_prefixes(config: &Config) -> Vec<Shadowed<'_>> {
    let mut earlier: Vec<(&str, &str)> = Vec::new();
    let mut shadowed = Vec::new();

    for server in &config.servers {
        for prefix in &server.path {
            if let Some((by_server, by_prefix)) = earlier
                .iter()
                .find(|(_, p)| prefix.starts_with(*p))
                .copied()
            {
                shadowed.push(Shadowed {
                    server: server.name.as_str(),
                    prefix: prefix.as_str(),
                    by_server,
                    by_prefix,
                });
            }
            earlier.push((server.name.as_str(), prefix.as_str()));
        }
    }

    shadowed
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} servers, {} prefixes, default port {}\n",
        config.servers.len(),
        config.total_prefixes(),
        config.default_port
    )];

    for server in &config.servers {
        lines.push(format!("  {}  -> localhost:{}", server.name, server.port));
        lines.push(format!("    prefixes: {}", server.path.join(", ")));
    }

    for s in shadowed_prefixes(config) {
        lines.push(format!(
            "  note: {} prefix '{}' is shadowed by {} prefix '{}'",
            s.server, s.prefix, s.by_server, s.by_prefix
        ));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
