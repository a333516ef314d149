//! `routemux validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format. The JSON report
//! includes the match order and any shadowed prefixes.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::RoutemuxError;

pub fn execute(args: &ValidateArgs) -> Result<(), RoutemuxError> {
    let path = &args.config;

    if !path.exists() {
        return Err(RoutemuxError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "server": e.server,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(RoutemuxError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            let shadowed: Vec<serde_json::Value> = validation::shadowed_prefixes(&config)
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "server": s.server,
                        "prefix": s.prefix,
                        "shadowed_by": { "server": s.by_server, "prefix": s.by_prefix },
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "listen_port": config.listen_port,
                    "default_port": config.default_port,
                    "servers": config.servers,
                    "shadowed": shadowed,
                })
            );
        }
    }

    Ok(())
}
