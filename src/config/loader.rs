//! Configuration resolution: defaults, then the config file, then the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{parse_port, split_list, Config};
use crate::config::validation::{validate_config, ValidationError};

/// Config file used when no explicit path is given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/api-host/api-host.conf";

/// Prefix for environment overrides, e.g. `API_HOSTD_PORT`.
pub const ENV_PREFIX: &str = "API_HOSTD_";

/// Error type for configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to use config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provided config {} is a directory, not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} in environment variable {var}")]
    Env { var: String, value: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Anything the lifecycle controller can ask for a fresh configuration.
pub trait ConfigSource: Send {
    /// Resolve a complete, validated configuration.
    fn resolve(&self) -> Result<Config, ConfigError>;
}

/// Resolves configuration from a file on disk plus the process environment.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path_override: Option<PathBuf>,
    default_path: PathBuf,
}

impl FileConfigSource {
    /// Create a source. An empty override is treated as no override.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        Self {
            path_override: path_override.filter(|p| !p.as_os_str().is_empty()),
            default_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Replace the well-known fallback location.
    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = path.into();
        self
    }

    /// The file a resolution would read right now, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        match &self.path_override {
            Some(path) => Some(path.clone()),
            None if self.default_path.is_file() => Some(self.default_path.clone()),
            None => None,
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn resolve(&self) -> Result<Config, ConfigError> {
        resolve_with(
            self.path_override.as_deref(),
            &self.default_path,
            std::env::vars(),
        )
    }
}

/// Resolve configuration against an explicit fallback path and environment.
///
/// An explicit, non-empty `path_override` must name an existing regular file.
/// Without one, `default_path` is read if it exists, otherwise only defaults
/// and the environment apply.
pub fn resolve_with<I>(
    path_override: Option<&Path>,
    default_path: &Path,
    vars: I,
) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let path_override = path_override.filter(|p| !p.as_os_str().is_empty());

    let mut config = match path_override {
        Some(path) => {
            let meta = fs::metadata(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if !meta.is_file() {
                return Err(ConfigError::NotAFile(path.to_path_buf()));
            }
            load_config(path)?
        }
        None if default_path.is_file() => load_config(default_path)?,
        None => Config::default(),
    };

    apply_env(&mut config, vars)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML config file. Missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `API_HOSTD_*` overrides on top of a file-derived config.
fn apply_env<I>(config: &mut Config, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (var, value) in vars {
        let Some(key) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let invalid = || ConfigError::Env {
            var: var.clone(),
            value: value.clone(),
        };

        match key.to_ascii_lowercase().as_str() {
            "verbosity" => config.verbosity = value.trim().parse().map_err(|_| invalid())?,
            "ip" => config.ip = value.trim().to_string(),
            "port" => config.port = parse_port(&value).ok_or_else(invalid)?,
            "jwt_sign_key" => config.secret = value.clone(),
            "shutdown_timeout_secs" => {
                config.shutdown_timeout_secs = value.trim().parse().map_err(|_| invalid())?
            }
            "cors_allowed_origins" => config.cors.allowed_origins = split_list(&value),
            "cors_allowed_methods" => config.cors.allowed_methods = split_list(&value),
            "cors_allowed_headers" => config.cors.allowed_headers = split_list(&value),
            "cors_exposed_headers" => config.cors.exposed_headers = split_list(&value),
            "cors_allow_credentials" => {
                config.cors.allow_credentials = parse_bool(&value).ok_or_else(invalid)?
            }
            "cors_max_age" => config.cors.max_age = value.trim().parse().map_err(|_| invalid())?,
            "cors_options_pass_through" => {
                config.cors.options_pass_through = parse_bool(&value).ok_or_else(invalid)?
            }
            "cors_debug" => config.cors.debug = parse_bool(&value).ok_or_else(invalid)?,
            _ => tracing::debug!(var = %var, "Ignoring unknown environment override"),
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
