//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate a TOML config string.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerMode;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
mode = "development"
basename = "/app"

[listener]
bind_address = "127.0.0.1:4000"

[csrf]
allowed_origins = ["*.example.com"]

[sessions]
backend = "cookie"

[sessions.cookie]
name = "__sid"
secrets = ["s3cr3t"]

[sessions.cookie.options]
http_only = true
same_site = "strict"

[[routes]]
id = "root"
path = "/"
has_loader = true

[[routes]]
id = "users"
path = "users"
parent_id = "root"
has_error_boundary = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.mode, ServerMode::Development);
        assert_eq!(config.basename.as_deref(), Some("/app"));
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.csrf.allowed_origins, vec!["*.example.com"]);
        assert_eq!(config.sessions.cookie.name, "__sid");
        assert_eq!(config.sessions.cookie.options.http_only, Some(true));
        assert_eq!(config.routes.len(), 2);
        assert!(config.routes[0].has_loader);
        assert!(config.routes[1].has_component);
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_invalid_manifest_is_rejected() {
        let err = parse_config(
            r#"
[[routes]]
id = "a"
[[routes]]
id = "a"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert_eq!(err.to_string(), "Validation failed: routes: duplicate route id `a`");
    }

    #[test]
    fn test_missing_file_and_bad_toml() {
        assert!(matches!(
            load_config(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(parse_config("mode = "), Err(ConfigError::Parse(_))));
    }
}
