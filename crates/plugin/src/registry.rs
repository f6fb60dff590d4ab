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

//! # Plugin registry
//!
//! ## Purpose
//! Owns every plugin record: verifies binaries, spawns and handshakes
//! subprocesses, learns metadata and declared hooks over gRPC, indexes
//! hooks through the [`HookEngine`], health-pings plugins, evicts the
//! unhealthy, and tears everything down in reverse registration order.
//!
//! ## Architecture Context
//! The registry is constructed once at startup, before configuration is
//! final, because plugins may rewrite the config through the
//! `OnConfigLoaded` hook. The proxy and server only ever call
//! [`Registry::run`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use plexgate_config::{
    AcceptancePolicy, CompatibilityPolicy, PluginSpec, TerminationPolicy, VerificationPolicy,
};
use plexgate_metrics::{GatewayMetrics, Merger};
use plexgate_proto::{Envelope, HookName, PingRequest, PluginServiceClient, Struct};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tonic::transport::Channel;
use tonic::Code;
use tracing::{debug, error, info, warn};

use crate::error::PluginError;
use crate::hooks::HookEngine;
use crate::identifier::{PluginIdentifier, RequirementSpec};
use crate::invoker::{GrpcInvoker, HookInvoker};
use crate::supervisor::{connect_channel, PluginProcess, TERMINATE_GRACE};

/// Config key a plugin uses to pick its hook priority.
pub const PRIORITY_CONFIG_KEY: &str = "priority";

/// Config key toggling metrics scraping for a plugin.
pub const METRICS_ENABLED_CONFIG_KEY: &str = "metricsEnabled";

/// Config key naming the plugin's metrics unix socket.
pub const METRICS_SOCKET_CONFIG_KEY: &str = "metricsUnixDomainSocket";

/// Hook priority used when a plugin does not pick one.
pub const DEFAULT_HOOK_PRIORITY: u32 = 1000;

/// Consecutive ping failures before a plugin is evicted.
const PING_FAILURE_LIMIT: u32 = 2;

/// Everything the registry tracks per loaded plugin.
pub struct PluginRecord {
    /// Reported identity.
    pub identifier: PluginIdentifier,
    /// The spec the plugin was loaded from (kept for reload-on-crash).
    pub spec: PluginSpec,
    /// Plugin-local settings, opaque to the core.
    pub config: BTreeMap<String, String>,
    /// Hooks the plugin registered.
    pub hooks: Vec<HookName>,
    /// Declared requirements.
    pub requires: Vec<RequirementSpec>,
    /// Whether the last health ping succeeded.
    pub last_ping_ok: bool,
    ping_failures: u32,
    process: PluginProcess,
    channel: Channel,
}

/// Construction parameters for [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Requirement handling at load time.
    pub compatibility: CompatibilityPolicy,
    /// Hook result verification handling.
    pub verification: VerificationPolicy,
    /// Hook slot collision handling.
    pub acceptance: AcceptancePolicy,
    /// `terminate=true` handling.
    pub termination: TerminationPolicy,
    /// Per-plugin hook invocation timeout.
    pub plugin_timeout: Duration,
    /// Subprocess handshake deadline.
    pub start_timeout: Duration,
    /// Health ping period; the ping deadline is half of it.
    pub health_check_period: Duration,
    /// Re-spawn evicted plugins from their original spec.
    pub reload_on_crash: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityPolicy::default(),
            verification: VerificationPolicy::default(),
            acceptance: AcceptancePolicy::default(),
            termination: TerminationPolicy::default(),
            plugin_timeout: Duration::from_secs(30),
            start_timeout: Duration::from_secs(60),
            health_check_period: Duration::from_secs(5),
            reload_on_crash: false,
        }
    }
}

/// Owner of all plugin records and the hook table.
pub struct Registry {
    options: RegistryOptions,
    engine: HookEngine,
    /// Records in registration order; shutdown walks this in reverse.
    records: RwLock<Vec<PluginRecord>>,
    merger: Option<Arc<Merger>>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl Registry {
    /// Create a registry with the given policies.
    pub fn new(options: RegistryOptions) -> Self {
        let engine = HookEngine::new(
            options.verification,
            options.termination,
            options.acceptance,
            options.plugin_timeout,
        );
        Self {
            options,
            engine,
            records: RwLock::new(Vec::new()),
            merger: None,
            metrics: None,
        }
    }

    /// Attach the metrics merger notified on load and eviction.
    pub fn with_merger(mut self, merger: Arc<Merger>) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Attach gateway metrics.
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.engine = self.engine.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Load every enabled plugin, aborting on the first fatal error.
    ///
    /// ## Errors
    /// - [`PluginError::ChecksumMismatch`]: binary digest differs from the
    ///   configured value; nothing is spawned for that plugin
    /// - [`PluginError::HandshakeFailed`], [`PluginError::Connect`]
    /// - [`PluginError::IncompatiblePlugin`] under strict compatibility
    pub async fn load_plugins(&self, specs: &[PluginSpec]) -> Result<(), PluginError> {
        for spec in specs {
            if !spec.enabled {
                debug!(plugin = %spec.name, "skipping disabled plugin");
                continue;
            }
            self.load_one(spec).await?;
        }
        Ok(())
    }

    async fn load_one(&self, spec: &PluginSpec) -> Result<(), PluginError> {
        if self.is_loaded(&spec.name).await {
            return Err(PluginError::DuplicatePlugin {
                name: spec.name.clone(),
            });
        }

        // The checksum gate runs before anything is spawned.
        verify_checksum(&spec.name, Path::new(&spec.local_path), &spec.checksum).await?;

        let (mut process, handshake) =
            PluginProcess::spawn(spec, self.options.start_timeout).await?;

        let channel = match connect_channel(&handshake).await {
            Ok(channel) => channel,
            Err(e) => {
                process.terminate(TERMINATE_GRACE).await;
                return Err(PluginError::Connect {
                    name: spec.name.clone(),
                    source: e,
                });
            }
        };

        let mut client = PluginServiceClient::new(channel.clone());
        let plugin_config = match tokio::time::timeout(
            self.options.start_timeout,
            client.get_plugin_config(Struct::default()),
        )
        .await
        {
            Ok(Ok(response)) => response.into_inner(),
            Ok(Err(status)) => {
                process.terminate(TERMINATE_GRACE).await;
                return Err(PluginError::InvalidConfig {
                    name: spec.name.clone(),
                    reason: format!("GetPluginConfig failed: {status}"),
                });
            }
            Err(_) => {
                process.terminate(TERMINATE_GRACE).await;
                return Err(PluginError::PluginNotReady {
                    name: spec.name.clone(),
                });
            }
        };

        let identifier = plugin_config
            .id
            .clone()
            .map(PluginIdentifier::from)
            .unwrap_or_else(|| PluginIdentifier {
                name: spec.name.clone(),
                version: String::new(),
                remote_url: spec.url.clone(),
                checksum: spec.checksum.clone(),
            });

        let mut requires = Vec::with_capacity(plugin_config.requires.len());
        for requirement in &plugin_config.requires {
            match RequirementSpec::parse(requirement) {
                Ok(parsed) => requires.push(parsed),
                Err(e) => {
                    process.terminate(TERMINATE_GRACE).await;
                    return Err(PluginError::InvalidConfig {
                        name: spec.name.clone(),
                        reason: format!(
                            "bad requirement constraint {:?}: {e}",
                            requirement.constraint
                        ),
                    });
                }
            }
        }

        if let Err(unmatched) = self.check_compatibility(&requires).await {
            match self.options.compatibility {
                CompatibilityPolicy::Strict => {
                    process.terminate(TERMINATE_GRACE).await;
                    return Err(PluginError::IncompatiblePlugin {
                        name: spec.name.clone(),
                        requirement: unmatched.to_string(),
                    });
                }
                CompatibilityPolicy::Loose => {
                    warn!(
                        plugin = %spec.name,
                        requirement = %unmatched,
                        "requirement unmatched, loading anyway (loose compatibility)"
                    );
                }
            }
        }

        let priority = plugin_config
            .config
            .get(PRIORITY_CONFIG_KEY)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_HOOK_PRIORITY);
        let invoker: Arc<dyn HookInvoker> = Arc::new(GrpcInvoker::new(channel.clone()));
        let mut registered = Vec::new();
        for hook in plugin_config.hooks() {
            if hook == HookName::Unspecified {
                continue;
            }
            if self
                .engine
                .add_hook(&identifier.name, hook, priority, invoker.clone())
                .await
            {
                registered.push(hook);
            }
        }

        if let Some(merger) = &self.merger {
            let metrics_enabled = plugin_config
                .config
                .get(METRICS_ENABLED_CONFIG_KEY)
                .map(|v| v == "true")
                .unwrap_or(false);
            if metrics_enabled {
                if let Some(socket) = plugin_config.config.get(METRICS_SOCKET_CONFIG_KEY) {
                    merger.add(identifier.name.clone(), socket.clone()).await;
                }
            }
        }

        info!(
            plugin = %identifier.name,
            version = %identifier.version,
            hooks = registered.len(),
            "plugin loaded"
        );

        self.records.write().await.push(PluginRecord {
            identifier,
            spec: spec.clone(),
            config: plugin_config.config.into_iter().collect(),
            hooks: registered,
            requires,
            last_ping_ok: true,
            ping_failures: 0,
            process,
            channel,
        });
        if let Some(metrics) = &self.metrics {
            metrics.plugins_loaded.inc();
        }
        Ok(())
    }

    /// First requirement no loaded plugin satisfies, if any.
    async fn check_compatibility(
        &self,
        requires: &[RequirementSpec],
    ) -> Result<(), RequirementSpec> {
        let records = self.records.read().await;
        for requirement in requires {
            let satisfied = records
                .iter()
                .any(|record| requirement.matches(&record.identifier));
            if !satisfied {
                return Err(requirement.clone());
            }
        }
        Ok(())
    }

    /// Register an invoker directly, bypassing plugin metadata.
    ///
    /// This is the seam in-process hooks (tests, embedders) use; plugin
    /// loads go through the same path internally.
    pub async fn add_hook(
        &self,
        plugin: &str,
        hook: HookName,
        priority: u32,
        invoker: Arc<dyn HookInvoker>,
    ) -> bool {
        self.engine.add_hook(plugin, hook, priority, invoker).await
    }

    /// Run all hooks registered under `hook`; see [`HookEngine::run`].
    pub async fn run(&self, hook: HookName, args: Envelope) -> Envelope {
        self.engine.run(hook, args).await
    }

    /// Ping every plugin; evict those failing twice in a row or fatally.
    pub async fn ping_all(&self) {
        let deadline = self.options.health_check_period / 2;
        let targets: Vec<(String, Channel)> = {
            let records = self.records.read().await;
            records
                .iter()
                .map(|r| (r.identifier.name.clone(), r.channel.clone()))
                .collect()
        };

        let mut evictions = Vec::new();
        for (name, channel) in targets {
            let mut client = PluginServiceClient::new(channel);
            let outcome = tokio::time::timeout(deadline, client.ping(PingRequest {})).await;

            let mut records = self.records.write().await;
            let Some(record) = records
                .iter_mut()
                .find(|r| r.identifier.name == name)
            else {
                continue;
            };
            match outcome {
                Ok(Ok(_)) => {
                    record.last_ping_ok = true;
                    record.ping_failures = 0;
                }
                Ok(Err(status)) if status.code() == Code::Unavailable => {
                    // Transport-level fatal: the subprocess is gone.
                    record.last_ping_ok = false;
                    evictions.push(name.clone());
                }
                _ => {
                    record.last_ping_ok = false;
                    record.ping_failures += 1;
                    if record.ping_failures >= PING_FAILURE_LIMIT {
                        evictions.push(name.clone());
                    }
                }
            }
        }

        for name in evictions {
            error!(plugin = %name, "plugin failed health checks, evicting");
            let spec = self.evict(&name).await;
            if self.options.reload_on_crash {
                if let Some(spec) = spec {
                    info!(plugin = %name, "reloading evicted plugin");
                    if let Err(e) = self.load_one(&spec).await {
                        error!(plugin = %name, error = %e, "failed to reload plugin");
                    }
                }
            }
        }
    }

    /// Remove a plugin by name: cancel hooks, drop the channel, terminate
    /// the subprocess, and notify the merger. Returns the original spec.
    pub async fn remove(&self, name: &str) -> Option<PluginSpec> {
        self.evict(name).await
    }

    async fn evict(&self, name: &str) -> Option<PluginSpec> {
        let record = {
            let mut records = self.records.write().await;
            let index = records.iter().position(|r| r.identifier.name == name)?;
            Some(records.remove(index))
        }?;

        self.engine.remove_plugin_hooks(name).await;
        if let Some(merger) = &self.merger {
            merger.remove(name).await;
        }
        if let Some(metrics) = &self.metrics {
            metrics.plugins_loaded.dec();
            metrics.plugin_evictions_total.inc();
        }

        let mut process = record.process;
        drop(record.channel);
        process.terminate(TERMINATE_GRACE).await;
        Some(record.spec)
    }

    /// Names of loaded plugins in registration order.
    pub async fn plugin_names(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.identifier.name.clone())
            .collect()
    }

    /// Whether a plugin with this name is loaded.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.records
            .read()
            .await
            .iter()
            .any(|r| r.identifier.name == name)
    }

    /// Number of loaded plugins.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no plugins are loaded.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Tear down every plugin in reverse registration order.
    ///
    /// In-flight hook runs are cancelled first; each subprocess gets the
    /// SIGTERM grace before being killed, and a hanging plugin cannot stall
    /// the rest.
    pub async fn shutdown(&self) {
        self.engine.cancel();
        let mut records = {
            let mut guard = self.records.write().await;
            std::mem::take(&mut *guard)
        };
        while let Some(record) = records.pop() {
            let name = record.identifier.name.clone();
            self.engine.remove_plugin_hooks(&name).await;
            if let Some(merger) = &self.merger {
                merger.remove(&name).await;
            }
            let mut process = record.process;
            drop(record.channel);
            process.terminate(TERMINATE_GRACE).await;
            info!(plugin = %name, "plugin stopped");
        }
        if let Some(metrics) = &self.metrics {
            metrics.plugins_loaded.set(0);
        }
    }
}

/// Compare the binary's SHA-256 against the configured digest.
async fn verify_checksum(
    name: &str,
    path: &Path,
    expected: &str,
) -> Result<(), PluginError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| PluginError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let actual = hex::encode(hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(PluginError::ChecksumMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
