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

//! Serde types for the global and plugin configuration files
//!
//! ## Purpose
//! The global file carries named sections (`loggers`, `metrics`, `clients`,
//! `pools`, `proxies`, `servers`, `api`), each a map from a block name to a
//! block; the block named `default` is the one the runtime uses unless told
//! otherwise. The plugin file carries the four policies, the scheduler
//! periods, and the `plugins[]` list.
//!
//! All durations are milliseconds; zero disables the deadline or period.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::policy::{
    AcceptancePolicy, CompatibilityPolicy, TerminationPolicy, VerificationPolicy,
};

fn millis_to_deadline(millis: u64) -> Option<Duration> {
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}

/// One logger block. The runtime maps `level` onto a tracing filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`, `off`.
    pub level: String,
    /// Disable ANSI colors on console output.
    pub no_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            no_color: false,
        }
    }
}

/// The gateway-side metrics endpoint the merged blob is served from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    /// Serve the endpoint at all.
    pub enabled: bool,
    /// Listen address of the endpoint.
    pub address: String,
    /// HTTP path the metrics are served under.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: defaults::DEFAULT_METRICS_ADDRESS.to_string(),
            path: defaults::DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

/// Template for upstream database clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// `tcp` or `unix`.
    pub network: String,
    /// Upstream address (host:port or socket path).
    pub address: String,
    /// Max bytes read from the upstream per receive.
    pub receive_chunk_size: usize,
    /// Receive deadline; zero disables it.
    pub receive_deadline_millis: u64,
    /// Send deadline; zero disables it.
    pub send_deadline_millis: u64,
    /// Dial timeout; zero disables it.
    pub dial_timeout_millis: u64,
    /// Enable TCP keep-alive probes.
    pub tcp_keep_alive: bool,
    /// Keep-alive probe period.
    pub tcp_keep_alive_period_millis: u64,
    /// Dial/receive re-attempts after the first try.
    pub retries: u32,
    /// Initial retry backoff.
    pub backoff_millis: u64,
    /// Backoff growth factor per attempt.
    pub backoff_multiplier: f64,
    /// Ignore the built-in backoff caps.
    pub disable_backoff_caps: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: "tcp".to_string(),
            address: "localhost:5432".to_string(),
            receive_chunk_size: defaults::DEFAULT_CHUNK_SIZE,
            receive_deadline_millis: defaults::DEFAULT_RECEIVE_DEADLINE_MILLIS,
            send_deadline_millis: defaults::DEFAULT_SEND_DEADLINE_MILLIS,
            dial_timeout_millis: defaults::DEFAULT_DIAL_TIMEOUT_MILLIS,
            tcp_keep_alive: false,
            tcp_keep_alive_period_millis: defaults::DEFAULT_TCP_KEEP_ALIVE_PERIOD_MILLIS,
            retries: defaults::DEFAULT_RETRIES,
            backoff_millis: defaults::DEFAULT_BACKOFF_MILLIS,
            backoff_multiplier: defaults::DEFAULT_BACKOFF_MULTIPLIER,
            disable_backoff_caps: false,
        }
    }
}

impl ClientConfig {
    /// Receive deadline, `None` when disabled.
    pub fn receive_deadline(&self) -> Option<Duration> {
        millis_to_deadline(self.receive_deadline_millis)
    }

    /// Send deadline, `None` when disabled.
    pub fn send_deadline(&self) -> Option<Duration> {
        millis_to_deadline(self.send_deadline_millis)
    }

    /// Dial timeout, `None` when disabled.
    pub fn dial_timeout(&self) -> Option<Duration> {
        millis_to_deadline(self.dial_timeout_millis)
    }

    /// Keep-alive probe period.
    pub fn tcp_keep_alive_period(&self) -> Duration {
        Duration::from_millis(self.tcp_keep_alive_period_millis)
    }
}

/// One pool block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Number of upstream clients the pool holds.
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::DEFAULT_POOL_SIZE,
        }
    }
}

impl PoolConfig {
    /// Configured size clamped to the supported minimum.
    pub fn effective_size(&self) -> usize {
        self.size.max(defaults::MINIMUM_POOL_SIZE)
    }
}

/// One proxy block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Dial fresh upstream clients beyond pool capacity on demand.
    pub elastic: bool,
    /// Return released elastic clients to the pool instead of closing them.
    pub reuse_elastic_clients: bool,
}

/// One server block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Listen network; only `tcp` is supported.
    pub network: String,
    /// Listen address.
    pub address: String,
    /// Tick period; zero disables ticking.
    pub tick_interval_millis: u64,
    /// TLS handshake deadline on inbound connections.
    pub handshake_timeout_millis: u64,
    /// Graceful-shutdown wait for in-flight pass-throughs.
    pub shutdown_grace_millis: u64,
    /// PEM certificate chain; TLS is enabled when both files are set.
    pub cert_file: Option<String>,
    /// PEM private key.
    pub key_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: "tcp".to_string(),
            address: "0.0.0.0:15432".to_string(),
            tick_interval_millis: defaults::DEFAULT_TICK_INTERVAL_MILLIS,
            handshake_timeout_millis: defaults::DEFAULT_HANDSHAKE_TIMEOUT_MILLIS,
            shutdown_grace_millis: defaults::DEFAULT_SHUTDOWN_GRACE_MILLIS,
            cert_file: None,
            key_file: None,
        }
    }
}

impl ServerConfig {
    /// Tick period, `None` when ticking is disabled.
    pub fn tick_interval(&self) -> Option<Duration> {
        millis_to_deadline(self.tick_interval_millis)
    }

    /// TLS handshake deadline.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_millis)
    }

    /// Graceful-shutdown wait for in-flight pass-throughs.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_millis)
    }

    /// Whether both TLS files are configured.
    pub fn tls_enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// The gateway admin API block, consumed by the external API layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Serve the admin API at all.
    pub enabled: bool,
    /// Listen address of the API.
    pub address: String,
}

/// The whole global configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    /// Named logger blocks.
    pub loggers: BTreeMap<String, LoggerConfig>,
    /// Named metrics-endpoint blocks.
    pub metrics: BTreeMap<String, MetricsConfig>,
    /// Named upstream client templates.
    pub clients: BTreeMap<String, ClientConfig>,
    /// Named pool blocks.
    pub pools: BTreeMap<String, PoolConfig>,
    /// Named proxy blocks.
    pub proxies: BTreeMap<String, ProxyConfig>,
    /// Named server blocks.
    pub servers: BTreeMap<String, ServerConfig>,
    /// Named admin API blocks.
    pub api: BTreeMap<String, ApiConfig>,
}

impl GlobalConfig {
    /// The `default` logger block, or built-in defaults.
    pub fn default_logger(&self) -> LoggerConfig {
        self.loggers
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }

    /// The `default` metrics block, or built-in defaults.
    pub fn default_metrics(&self) -> MetricsConfig {
        self.metrics
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }

    /// The `default` client template, or built-in defaults.
    pub fn default_client(&self) -> ClientConfig {
        self.clients
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }

    /// The `default` pool block, or built-in defaults.
    pub fn default_pool(&self) -> PoolConfig {
        self.pools
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }

    /// The `default` proxy block, or built-in defaults.
    pub fn default_proxy(&self) -> ProxyConfig {
        self.proxies
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }

    /// The `default` server block, or built-in defaults.
    pub fn default_server(&self) -> ServerConfig {
        self.servers
            .get(defaults::DEFAULT_KEY)
            .cloned()
            .unwrap_or_default()
    }
}

/// One plugin entry in the plugin configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    /// Unique plugin name.
    pub name: String,
    /// Disabled plugins are skipped at load time.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Path to the plugin executable.
    pub local_path: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the subprocess.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Expected SHA-256 of the executable, hex-encoded.
    pub checksum: String,
    /// Where the binary came from, informational only.
    #[serde(default)]
    pub url: String,
}

fn enabled_default() -> bool {
    true
}

/// The whole plugin configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginsConfig {
    /// Hook result verification handling.
    pub verification_policy: VerificationPolicy,
    /// Requirement handling at load time.
    pub compatibility_policy: CompatibilityPolicy,
    /// Hook slot collision handling.
    pub acceptance_policy: AcceptancePolicy,
    /// `terminate=true` handling.
    pub termination_policy: TerminationPolicy,
    /// Scrape and merge plugin metrics.
    pub enable_metrics_merger: bool,
    /// Plugin metrics scrape period.
    pub metrics_merger_period_millis: u64,
    /// Plugin health ping period.
    pub health_check_period_millis: u64,
    /// Re-spawn evicted plugins from their original spec.
    pub reload_on_crash: bool,
    /// Per-plugin hook invocation timeout.
    pub timeout_millis: u64,
    /// Plugin subprocess handshake deadline.
    pub start_timeout_millis: u64,
    /// The plugins to load, in order.
    pub plugins: Vec<PluginSpec>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            verification_policy: VerificationPolicy::default(),
            compatibility_policy: CompatibilityPolicy::default(),
            acceptance_policy: AcceptancePolicy::default(),
            termination_policy: TerminationPolicy::default(),
            enable_metrics_merger: true,
            metrics_merger_period_millis: defaults::DEFAULT_METRICS_MERGER_PERIOD_MILLIS,
            health_check_period_millis: defaults::DEFAULT_HEALTH_CHECK_PERIOD_MILLIS,
            reload_on_crash: false,
            timeout_millis: defaults::DEFAULT_PLUGIN_TIMEOUT_MILLIS,
            start_timeout_millis: defaults::DEFAULT_START_TIMEOUT_MILLIS,
            plugins: Vec::new(),
        }
    }
}

impl PluginsConfig {
    /// Plugin metrics scrape period.
    pub fn metrics_merger_period(&self) -> Duration {
        Duration::from_millis(self.metrics_merger_period_millis)
    }

    /// Plugin health ping period.
    pub fn health_check_period(&self) -> Duration {
        Duration::from_millis(self.health_check_period_millis)
    }

    /// Per-plugin hook invocation timeout.
    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    /// Plugin subprocess handshake deadline.
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_clamped_to_minimum() {
        let pool = PoolConfig { size: 1 };
        assert_eq!(pool.effective_size(), defaults::MINIMUM_POOL_SIZE);
        let pool = PoolConfig { size: 7 };
        assert_eq!(pool.effective_size(), 7);
    }

    #[test]
    fn test_zero_deadlines_are_disabled() {
        let client = ClientConfig::default();
        assert!(client.receive_deadline().is_none());
        assert!(client.send_deadline().is_none());
        assert_eq!(client.dial_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_default_blocks_fall_back() {
        let global = GlobalConfig::default();
        assert_eq!(global.default_client().network, "tcp");
        assert_eq!(global.default_pool().size, defaults::DEFAULT_POOL_SIZE);
        assert!(!global.default_proxy().elastic);
        assert!(!global.default_server().tls_enabled());
    }
}
