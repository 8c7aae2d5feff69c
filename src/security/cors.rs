//! Cross-origin policy.
//!
//! Builds a `tower-http` CORS layer from the config's CORS fields. Values are
//! validated when the config is resolved, so anything unparsable here is
//! skipped rather than reported.
//!
//! `cors_options_pass_through` has no counterpart in `tower-http`: preflight
//! requests are always answered by the layer. The flag is accepted and logged.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;

fn is_wildcard(items: &[String]) -> bool {
    items.iter().any(|item| item == "*")
}

/// Build the CORS layer for a server instance.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if is_wildcard(&config.allowed_origins) {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    let methods = if is_wildcard(&config.allowed_methods) {
        AllowMethods::from(Any)
    } else {
        AllowMethods::list(
            config
                .allowed_methods
                .iter()
                .filter_map(|method| Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()),
        )
    };

    let headers = if is_wildcard(&config.allowed_headers) {
        AllowHeaders::from(Any)
    } else {
        AllowHeaders::list(header_names(&config.allowed_headers))
    };

    let exposed = if is_wildcard(&config.exposed_headers) {
        ExposeHeaders::from(Any)
    } else {
        ExposeHeaders::list(header_names(&config.exposed_headers))
    };

    let mut layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers(exposed)
        .allow_credentials(config.allow_credentials);

    if config.max_age > 0 {
        layer = layer.max_age(Duration::from_secs(config.max_age));
    }

    if config.options_pass_through {
        tracing::warn!("cors_options_pass_through is not supported, preflight requests are answered by the CORS layer");
    }
    if config.debug {
        tracing::info!(cors = ?config, "CORS policy");
    }

    layer
}

fn header_names(items: &[String]) -> Vec<HeaderName> {
    items
        .iter()
        .filter_map(|header| HeaderName::from_bytes(header.as_bytes()).ok())
        .collect()
}
