//! Configuration schema definitions.
//!
//! Keys are flat and match the daemon's historical flag names so that an
//! existing config file keeps working. All fields have defaults.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the API host.
///
/// A `Config` is produced fresh by every resolution and is never mutated once
/// handed to a server; a reload builds a new one.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Logging level (0-2 error, 3 warn, 4 info, 5 debug, 6+ trace).
    pub verbosity: u8,

    /// IP address to bind. Empty binds every interface.
    pub ip: String,

    /// Port to listen on. Zero (or an empty string in the file) picks an
    /// ephemeral port.
    #[serde(deserialize_with = "port_from_int_or_str")]
    pub port: u16,

    /// JWT signing key. Never serialized.
    #[serde(rename = "jwt_sign_key", skip_serializing)]
    pub secret: String,

    /// Seconds `stop` waits for in-flight requests before aborting.
    pub shutdown_timeout_secs: u64,

    /// Cross-origin policy handed to the HTTP layer.
    #[serde(flatten)]
    pub cors: CorsConfig,
}

impl Config {
    /// Socket address the server binds, as configured.
    ///
    /// Callers are expected to have validated `ip` already; an unparsable IP
    /// is reported as `None`.
    pub fn bind_address(&self) -> Option<SocketAddr> {
        let ip = if self.ip.trim().is_empty() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            self.ip.trim().parse().ok()?
        };
        Some(SocketAddr::new(ip, self.port))
    }

    /// Graceful drain deadline for `stop`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: 0,
            ip: String::new(),
            port: 0,
            secret: String::new(),
            shutdown_timeout_secs: 30,
            cors: CorsConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("verbosity", &self.verbosity)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .field("cors", &self.cors)
            .finish()
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins a cross-domain request can be executed from.
    #[serde(rename = "cors_allowed_origins", deserialize_with = "list_from_seq_or_str")]
    pub allowed_origins: Vec<String>,

    /// Methods the client is allowed to use with cross-domain requests.
    #[serde(rename = "cors_allowed_methods", deserialize_with = "list_from_seq_or_str")]
    pub allowed_methods: Vec<String>,

    /// Non-simple headers the client is allowed to send.
    #[serde(rename = "cors_allowed_headers", deserialize_with = "list_from_seq_or_str")]
    pub allowed_headers: Vec<String>,

    /// Headers that are safe to expose to the client.
    #[serde(rename = "cors_exposed_headers", deserialize_with = "list_from_seq_or_str")]
    pub exposed_headers: Vec<String>,

    /// Whether requests may include credentials.
    #[serde(rename = "cors_allow_credentials")]
    pub allow_credentials: bool,

    /// How long (seconds) a preflight result can be cached. Zero disables the header.
    #[serde(rename = "cors_max_age")]
    pub max_age: u64,

    /// Let OPTIONS requests through to the handlers instead of answering them.
    #[serde(rename = "cors_options_pass_through")]
    pub options_pass_through: bool,

    /// Log the effective CORS policy when a server starts.
    #[serde(rename = "cors_debug")]
    pub debug: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: split_list("*"),
            allowed_methods: split_list("GET,POST,DELETE"),
            allowed_headers: split_list("origin, content-type, accept, authorization"),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: 0,
            options_pass_through: false,
            debug: false,
        }
    }
}

/// Split a comma-separated list, trimming items and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a port the way the config file and environment spell it.
pub fn parse_port(value: &str) -> Option<u16> {
    let value = value.trim();
    if value.is_empty() {
        return Some(0);
    }
    value.parse().ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrString {
    List(Vec<String>),
    String(String),
}

fn list_from_seq_or_str<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        ListOrString::String(value) => split_list(&value),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    String(String),
}

fn port_from_int_or_str<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(port) => {
            u16::try_from(port).map_err(|_| D::Error::custom(format!("port {port} out of range")))
        }
        IntOrString::String(port) => {
            parse_port(&port).ok_or_else(|| D::Error::custom(format!("invalid port {port:?}")))
        }
    }
}
