//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the bind IP and the CORS lists the HTTP layer will parse
//! - Reject CORS combinations browsers refuse (credentials with wildcards)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;

use crate::config::schema::Config;

/// A single semantic problem with a resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ip {0:?} is not a valid IP address")]
    InvalidIp(String),

    #[error("cors origin {0:?} is not a valid header value")]
    InvalidOrigin(String),

    #[error("cors method {0:?} is not a valid HTTP method")]
    InvalidMethod(String),

    #[error("cors header {0:?} is not a valid header name")]
    InvalidHeader(String),

    #[error("cors_allow_credentials cannot be combined with a wildcard in {0}")]
    CredentialsWithWildcard(&'static str),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let ip = config.ip.trim();
    if !ip.is_empty() && ip.parse::<std::net::IpAddr>().is_err() {
        errors.push(ValidationError::InvalidIp(config.ip.clone()));
    }

    let cors = &config.cors;
    for origin in &cors.allowed_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
    for method in &cors.allowed_methods {
        if method != "*" && Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod(method.clone()));
        }
    }
    for header in cors.allowed_headers.iter().chain(&cors.exposed_headers) {
        if header != "*" && HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeader(header.clone()));
        }
    }

    if cors.allow_credentials {
        let wildcard = |items: &[String]| items.iter().any(|item| item == "*");
        if wildcard(&cors.allowed_origins) {
            errors.push(ValidationError::CredentialsWithWildcard("cors_allowed_origins"));
        }
        if wildcard(&cors.allowed_methods) {
            errors.push(ValidationError::CredentialsWithWildcard("cors_allowed_methods"));
        }
        if wildcard(&cors.allowed_headers) {
            errors.push(ValidationError::CredentialsWithWildcard("cors_allowed_headers"));
        }
        if wildcard(&cors.exposed_headers) {
            errors.push(ValidationError::CredentialsWithWildcard("cors_exposed_headers"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
