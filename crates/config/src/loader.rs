// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexGate.
//
// PlexGate is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexGate is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexGate. If not, see <https://www.gnu.org/licenses/>.

//! Config loader with environment variable substitution
//!
//! ## Purpose
//! Loads [`GlobalConfig`] and [`PluginsConfig`] from YAML files with
//! `${VAR_NAME}` or `${VAR_NAME:-default}` substitution applied before
//! parsing, so addresses and secrets can come from the environment.

use regex::Regex;
use thiserror::Error;

use crate::types::{GlobalConfig, PluginsConfig};

/// Config loader errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Environment variable substitution error
    #[error("environment variable substitution failed: {0}")]
    EnvSubstitution(String),
}

/// Loads configuration files, substituting environment variables first.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new() -> Self {
        Self
    }

    /// Load the global configuration file.
    ///
    /// ## Errors
    /// - [`ConfigError::Io`] if the file cannot be read
    /// - [`ConfigError::Yaml`] if parsing fails
    /// - [`ConfigError::EnvSubstitution`] if a referenced variable without a
    ///   default is unset
    pub async fn load_global(&self, path: &str) -> Result<GlobalConfig, ConfigError> {
        let content = read_file(path).await?;
        let substituted = substitute_env_vars(&content)?;
        Ok(serde_yaml::from_str(&substituted)?)
    }

    /// Load the plugin configuration file.
    pub async fn load_plugins(&self, path: &str) -> Result<PluginsConfig, ConfigError> {
        let content = read_file(path).await?;
        let substituted = substitute_env_vars(&content)?;
        Ok(serde_yaml::from_str(&substituted)?)
    }
}

async fn read_file(path: &str) -> Result<String, ConfigError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Io {
            path: path.to_string(),
            source: e,
        })
}

/// Substitute `${VAR}` and `${VAR:-default}` references in raw YAML text.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    // ${VAR_NAME} or ${VAR_NAME:-default}
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::EnvSubstitution(e.to_string()))?;

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in pattern.captures_iter(content) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = &caps[1];
        out.push_str(&content[last..whole.0]);
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => match caps.get(2) {
                Some(default) => out.push_str(default.as_str()),
                None => {
                    return Err(ConfigError::EnvSubstitution(format!(
                        "variable '{name}' is not set and has no default"
                    )))
                }
            },
        }
        last = whole.1;
    }
    out.push_str(&content[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_substitute_with_default() {
        let yaml = "address: ${PLEXGATE_TEST_UNSET_ADDR:-localhost:5432}";
        let out = substitute_env_vars(yaml).unwrap();
        assert_eq!(out, "address: localhost:5432");
    }

    #[test]
    fn test_substitute_from_env() {
        std::env::set_var("PLEXGATE_TEST_ADDR", "db:5433");
        let out = substitute_env_vars("address: ${PLEXGATE_TEST_ADDR}").unwrap();
        assert_eq!(out, "address: db:5433");
        std::env::remove_var("PLEXGATE_TEST_ADDR");
    }

    #[test]
    fn test_unset_without_default_fails() {
        let err = substitute_env_vars("x: ${PLEXGATE_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(err.to_string().contains("PLEXGATE_TEST_DEFINITELY_UNSET"));
    }

    #[tokio::test]
    async fn test_load_global_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
clients:
  default:
    network: tcp
    address: localhost:5432
    receiveChunkSize: 8192
pools:
  default:
    size: 4
proxies:
  default:
    elastic: true
    reuseElasticClients: true
servers:
  default:
    address: 0.0.0.0:15432
    tickIntervalMillis: 1000
"#
        )
        .unwrap();

        let loader = ConfigLoader::new();
        let global = loader
            .load_global(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(global.default_client().receive_chunk_size, 8192);
        assert_eq!(global.default_pool().size, 4);
        assert!(global.default_proxy().elastic);
        assert!(global.default_proxy().reuse_elastic_clients);
        assert_eq!(
            global.default_server().tick_interval(),
            Some(std::time::Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn test_load_plugins_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
verificationPolicy: remove
compatibilityPolicy: strict
acceptancePolicy: reject
terminationPolicy: continue
enableMetricsMerger: false
healthCheckPeriodMillis: 250
plugins:
  - name: plexgate-plugin-cache
    localPath: /usr/local/bin/plexgate-plugin-cache
    checksum: deadbeef
    args: ["--log-level", "debug"]
    env:
      CACHE_SIZE: "1024"
"#
        )
        .unwrap();

        let loader = ConfigLoader::new();
        let plugins = loader
            .load_plugins(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(
            plugins.verification_policy,
            crate::policy::VerificationPolicy::Remove
        );
        assert_eq!(
            plugins.compatibility_policy,
            crate::policy::CompatibilityPolicy::Strict
        );
        assert!(!plugins.enable_metrics_merger);
        assert_eq!(plugins.plugins.len(), 1);
        let spec = &plugins.plugins[0];
        assert!(spec.enabled);
        assert_eq!(spec.env.get("CACHE_SIZE").map(String::as_str), Some("1024"));
    }
}
