//! Known Explorer deployments and base-URL normalisation.

use crate::{Error, Result};
use url::Url;

/// Short names for the public Explorer networks
pub const KNOWN_NETWORKS: &[(&str, &str)] = &[
    ("hifisolves", "hifisolves.org"),
    ("neuroscience", "neuroscience.ai"),
    // Aligning Science Across Parkinson's
    ("asap", "cloud.parkinsonsroadmap.org"),
    ("parkinsons", "cloud.parkinsonsroadmap.org"),
    ("biomedical", "biomedical.ai"),
    ("viral", "viral.ai"),
    // Target ALS
    ("targetals", "dataportal.targetals.org"),
];

pub const DEFAULT_NETWORK: &str = "hifisolves";

/// Host for a short network name, if known.
pub fn alias(name: &str) -> Option<&'static str> {
    KNOWN_NETWORKS
        .iter()
        .find(|(short, _)| *short == name)
        .map(|(_, host)| *host)
}

/// Resolve a short name, bare host or full URL into a base URL.
///
/// Bare hosts get `https://`; trailing slashes are dropped.
pub fn resolve(network: &str) -> Result<Url> {
    let network = network.trim();
    if network.is_empty() {
        return Err(Error::Validation("network is required".to_string()));
    }

    let network = alias(network).unwrap_or(network);
    let with_scheme = if network.starts_with("http://") || network.starts_with("https://") {
        network.to_string()
    } else {
        format!("https://{network}")
    };

    let url = Url::parse(with_scheme.trim_end_matches('/'))
        .map_err(|e| Error::Validation(format!("invalid network {network:?}: {e}")))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::Validation(format!("invalid network {network:?}: no host")));
    }

    Ok(url)
}

/// Display form of a base URL, without the trailing slash.
pub fn display(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}
