//! Shared HTTP client construction.
//!
//! Proxy, CA bundle and TLS verification are explicit settings, decided once
//! when a client is built.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::ConfigurationError;

/// Transport settings shared by every outbound client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Proxy for all schemes, e.g. `http://proxy.internal:3128`.
    pub proxy: Option<String>,
    /// PEM file with an additional trusted root (corporate TLS interception).
    pub ca_bundle: Option<PathBuf>,
    pub verify_tls: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            ca_bundle: None,
            verify_tls: true,
        }
    }
}

/// Builds a blocking client with `settings` and a per-request `timeout`.
pub fn build_client(settings: &HttpSettings, timeout: Duration) -> Result<Client, ConfigurationError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!settings.verify_tls);

    // Without an explicit proxy, ignore any proxy variables in the process environment.
    builder = match &settings.proxy {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy).map_err(|e| invalid("proxy", e))?),
        None => builder.no_proxy(),
    };

    if let Some(path) = &settings.ca_bundle {
        let pem = std::fs::read(path).map_err(|e| invalid("ca_bundle", e))?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| invalid("ca_bundle", e))?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().map_err(|e| invalid("http", e))
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
