//! Configuration document parsing and validation
//!
//! The uploaded document is YAML: a top-level refresh interval and a
//! mapping of host name to properties. Parsing is pure (no I/O) and
//! all-or-nothing: any error leaves the previously active registry
//! untouched, so the caller can keep serving the prior configuration.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::registry::{CloudEntry, HostEntry, HostRegistry, Layer, Priority};

/// Errors that can occur while parsing and validating a configuration
/// document
#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("YAML parse error: {0}")]
    Parse(String),

    #[error("host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("host '{0}' is missing required field '{1}'")]
    MissingField(String, &'static str),

    #[error("more than one cloud host configured: '{0}' and '{1}'")]
    DuplicateCloudHost(String, String),

    #[error("configuration defines no hosts")]
    NoHosts,

    #[error("refresh_interval_secs must be greater than zero")]
    InvalidRefreshInterval,
}

/// Top-level shape of the document.
///
/// Hosts stay a raw YAML mapping here: its insertion order is the
/// configured scan order, and per-host decoding errors need to name the
/// offending host.
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    refresh_interval_secs: u64,
    #[serde(default)]
    hosts: serde_yaml::Mapping,
}

/// Properties of one configured host.
///
/// `layer` and `faas_urls` are required for every host; the monitoring
/// endpoint, priority, and resource ceilings are required only for
/// edge/fog hosts, which is checked after decoding.
#[derive(Debug, Clone, Deserialize)]
struct HostProperties {
    layer: Layer,
    faas_urls: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    prometheus_api_url: Option<String>,
    #[serde(default)]
    max_cpu_use: Option<f64>,
    #[serde(default)]
    max_ram_use: Option<f64>,
    /// Cooldown in seconds; defaults to 0 for edge/fog, opt-in for cloud
    #[serde(default)]
    min_request_interval: Option<u64>,
}

/// Parse a configuration document into a registry.
/// This is a pure function - no I/O.
pub fn parse_config(content: &str) -> Result<HostRegistry, ConfigurationError> {
    let document: ConfigDocument =
        serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;

    if document.refresh_interval_secs == 0 {
        return Err(ConfigurationError::InvalidRefreshInterval);
    }
    if document.hosts.is_empty() {
        return Err(ConfigurationError::NoHosts);
    }

    let mut hosts = Vec::new();
    let mut cloud: Option<CloudEntry> = None;

    for (key, value) in document.hosts {
        let name = key
            .as_str()
            .ok_or_else(|| ConfigurationError::Parse("host names must be strings".to_string()))?
            .to_string();

        let properties: HostProperties =
            serde_yaml::from_value(value).map_err(|e| ConfigurationError::InvalidHost {
                host: name.clone(),
                reason: e.to_string(),
            })?;

        match properties.layer {
            Layer::Cloud => {
                if let Some(existing) = &cloud {
                    return Err(ConfigurationError::DuplicateCloudHost(
                        existing.name.clone(),
                        name,
                    ));
                }
                cloud = Some(CloudEntry {
                    name,
                    faas_urls: properties.faas_urls,
                    min_request_interval: properties.min_request_interval.map(Duration::from_secs),
                    last_used_at: None,
                });
            }
            layer => {
                let missing =
                    |field| ConfigurationError::MissingField(name.clone(), field);

                let priority = properties.priority.ok_or_else(|| missing("priority"))?;
                let prometheus_api_url = properties
                    .prometheus_api_url
                    .ok_or_else(|| missing("prometheus_api_url"))?;
                let max_cpu = properties.max_cpu_use.ok_or_else(|| missing("max_cpu_use"))?;
                let max_ram = properties.max_ram_use.ok_or_else(|| missing("max_ram_use"))?;

                hosts.push(HostEntry {
                    name,
                    priority: Priority::new(priority),
                    layer,
                    faas_urls: properties.faas_urls,
                    prometheus_api_url,
                    max_cpu,
                    max_ram,
                    min_request_interval: Duration::from_secs(
                        properties.min_request_interval.unwrap_or(0),
                    ),
                    cpu_use: 0.0,
                    ram_use: 0.0,
                    last_used_at: None,
                });
            }
        }
    }

    Ok(HostRegistry::new(
        Duration::from_secs(document.refresh_interval_secs),
        hosts,
        cloud,
    ))
}
