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

//! # Gateway runtime assembly
//!
//! ## Purpose
//! Wires configuration, plugin registry, metrics merger, pool, proxy and
//! server into one running gateway, in the startup order plugins rely on:
//! plugins load first (so `OnConfigLoaded` can rewrite the config), then
//! the pool fills, then proxy and server come up, each announced through
//! its lifecycle hook.
//!
//! ## Design Notes
//! - One [`Gateway`] object owns every long-lived handle; nothing reads
//!   process globals.
//! - Background tasks (health pings, metrics endpoint) stop through a
//!   shared watch channel on shutdown.

use std::sync::Arc;

use plexgate_config::{ConfigError, GlobalConfig, PluginsConfig};
use plexgate_metrics::{metrics_router, GatewayMetrics, Merger};
use plexgate_network::{Client, Proxy, Server, ServerError};
use plexgate_plugin::{PluginError, Registry, RegistryOptions};
use plexgate_pool::Pool;
use plexgate_proto::{Envelope, FieldValue, HookName};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Process exit codes.
pub mod exit {
    /// Clean shutdown.
    pub const SUCCESS: i32 = 0;
    /// Unspecified failure.
    pub const GENERIC: i32 = 1;
    /// The connection pool could not be filled.
    pub const FAILED_TO_INITIALIZE_POOL: i32 = 2;
    /// The server failed to start.
    pub const FAILED_TO_START_SERVER: i32 = 3;
    /// A plugin was rejected at load time.
    pub const INCOMPATIBLE_PLUGIN: i32 = 4;
}

/// Fatal gateway errors, each mapping to a process exit code.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Gateway metrics registration failed.
    #[error("metrics initialization failed: {0}")]
    Metrics(String),

    /// Fewer clients connected than the pool requires.
    #[error("failed to initialize the pool: {actual} of {expected} clients connected")]
    FailedToInitializePool {
        /// Configured pool size.
        expected: usize,
        /// Clients that actually connected.
        actual: usize,
    },

    /// Plugin loading failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The server could not start.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A background task failed unexpectedly.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewayError::FailedToInitializePool { .. } => exit::FAILED_TO_INITIALIZE_POOL,
            GatewayError::Server(_) => exit::FAILED_TO_START_SERVER,
            GatewayError::Plugin(
                PluginError::IncompatiblePlugin { .. } | PluginError::ChecksumMismatch { .. },
            ) => exit::INCOMPATIBLE_PLUGIN,
            _ => exit::GENERIC,
        }
    }
}

/// A fully wired gateway instance.
pub struct Gateway {
    registry: Arc<Registry>,
    merger: Option<Arc<Merger>>,
    metrics: Arc<GatewayMetrics>,
    proxy: Arc<Proxy>,
    server: Arc<Server>,
    tasks_shutdown: watch::Sender<bool>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Build the gateway from loaded configuration.
    ///
    /// Reproduces the startup control flow: registry construction with
    /// the configured policies, plugin load, merger and health-check
    /// start, `OnConfigLoaded` (whose verified result replaces the
    /// in-memory global config), `OnNewLogger`, pool fill with
    /// `OnNewClient` per client, then proxy and server construction with
    /// their announcement hooks.
    pub async fn bootstrap(
        global: GlobalConfig,
        plugin_cfg: PluginsConfig,
    ) -> Result<Self, GatewayError> {
        let metrics = Arc::new(
            GatewayMetrics::new().map_err(|e| GatewayError::Metrics(e.to_string()))?,
        );
        let (tasks_shutdown, _) = watch::channel(false);
        let mut background_tasks = Vec::new();

        let merger = if plugin_cfg.enable_metrics_merger {
            Some(Arc::new(Merger::new(plugin_cfg.metrics_merger_period())))
        } else {
            None
        };

        let mut registry = Registry::new(RegistryOptions {
            compatibility: plugin_cfg.compatibility_policy,
            verification: plugin_cfg.verification_policy,
            acceptance: plugin_cfg.acceptance_policy,
            termination: plugin_cfg.termination_policy,
            plugin_timeout: plugin_cfg.plugin_timeout(),
            start_timeout: plugin_cfg.start_timeout(),
            health_check_period: plugin_cfg.health_check_period(),
            reload_on_crash: plugin_cfg.reload_on_crash,
        })
        .with_metrics(metrics.clone());
        if let Some(merger) = &merger {
            registry = registry.with_merger(merger.clone());
        }
        let registry = Arc::new(registry);

        registry.load_plugins(&plugin_cfg.plugins).await?;

        if let Some(merger) = &merger {
            merger.start().await;
        }

        let health_period = plugin_cfg.health_check_period();
        if !health_period.is_zero() {
            let registry_handle = registry.clone();
            let mut shutdown_rx = tasks_shutdown.subscribe();
            background_tasks.push(tokio::spawn(async move {
                // The first ping waits a full period so plugins finish
                // their own startup.
                let start = tokio::time::Instant::now() + health_period;
                let mut ticker = tokio::time::interval_at(start, health_period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => registry_handle.ping_all().await,
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }));
        }

        // Plugins may rewrite the global config before anything else is
        // built from it.
        let global = match global_to_envelope(&global) {
            Ok(config_envelope) => {
                let updated = registry.run(HookName::OnConfigLoaded, config_envelope).await;
                merge_global_config(global, updated)
            }
            Err(e) => {
                warn!(error = %e, "config could not be offered to OnConfigLoaded hooks");
                global
            }
        };

        match section_envelope(&global.loggers) {
            Ok(loggers) => {
                registry.run(HookName::OnNewLogger, loggers).await;
            }
            Err(e) => warn!(error = %e, "loggers section could not be offered to hooks"),
        }

        // Fill the pool.
        let pool_size = global.default_pool().effective_size();
        let client_cfg = global.default_client();
        let pool = Pool::new(pool_size);
        for _ in 0..pool_size {
            match Client::connect(&client_cfg).await {
                Ok(client) => {
                    metrics.client_connections.inc();
                    let mut envelope = Envelope::new();
                    envelope.insert("id", client.id.clone());
                    envelope.insert("network", client.network.clone());
                    envelope.insert("address", client.address.clone());
                    envelope.insert("receiveChunkSize", client.receive_chunk_size);
                    registry.run(HookName::OnNewClient, envelope).await;
                    if let Err(e) = pool.put(client.id.clone(), client).await {
                        error!(error = %e, "failed to add client to the pool");
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to connect upstream client");
                }
            }
        }

        let filled = pool.size().await;
        info!(count = filled, "clients available in the pool");
        if filled != pool_size {
            error!(
                "the pool is short, either the clients cannot connect or \
                 the upstream is not running, exiting"
            );
            registry.shutdown().await;
            return Err(GatewayError::FailedToInitializePool {
                expected: pool_size,
                actual: filled,
            });
        }

        let mut envelope = Envelope::new();
        envelope.insert("size", pool_size);
        registry.run(HookName::OnNewPool, envelope).await;

        // Proxy.
        let proxy_cfg = global.default_proxy();
        let proxy = Arc::new(
            Proxy::new(
                pool,
                registry.clone(),
                proxy_cfg.elastic,
                proxy_cfg.reuse_elastic_clients,
                client_cfg,
            )
            .with_metrics(metrics.clone()),
        );
        let mut envelope = Envelope::new();
        envelope.insert("elastic", proxy_cfg.elastic);
        envelope.insert("reuseElasticClients", proxy_cfg.reuse_elastic_clients);
        registry.run(HookName::OnNewProxy, envelope).await;

        // Server.
        let server_cfg = global.default_server();
        let server = Arc::new(
            Server::new(server_cfg.clone(), proxy.clone())?.with_metrics(metrics.clone()),
        );
        let mut envelope = Envelope::new();
        envelope.insert("network", server_cfg.network.clone());
        envelope.insert("address", server_cfg.address.clone());
        registry.run(HookName::OnNewServer, envelope).await;

        // Metrics endpoint; failures here are logged, not fatal.
        let metrics_cfg = global.default_metrics();
        if metrics_cfg.enabled {
            let merged_slot = merger
                .as_ref()
                .map(|m| m.output())
                .unwrap_or_else(|| Arc::new(tokio::sync::RwLock::new(Vec::new())));
            let router = metrics_router(&metrics_cfg.path, merged_slot, metrics.clone());
            let address = metrics_cfg.address.clone();
            let mut shutdown_rx = tasks_shutdown.subscribe();
            background_tasks.push(tokio::spawn(async move {
                let listener = match tokio::net::TcpListener::bind(&address).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(address = %address, error = %e, "failed to bind metrics endpoint");
                        return;
                    }
                };
                info!(address = %address, "metrics are exposed");
                let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                });
                if let Err(e) = serve.await {
                    error!(error = %e, "metrics endpoint failed");
                }
            }));
        }

        Ok(Self {
            registry,
            merger,
            metrics,
            proxy,
            server,
            tasks_shutdown,
            background_tasks,
        })
    }

    /// Run the server until a termination signal or a fatal error.
    pub async fn run(&self) -> Result<(), GatewayError> {
        self.registry.run(HookName::OnRun, Envelope::new()).await;

        let server = self.server.clone();
        let mut server_task = tokio::spawn(async move { server.run().await });

        tokio::select! {
            signal = wait_for_signal() => {
                let mut envelope = Envelope::new();
                envelope.insert("signal", signal);
                self.registry.run(HookName::OnSignal, envelope).await;
                info!(signal, "stopping gateway");
                self.shutdown().await;
                let _ = (&mut server_task).await;
                Ok(())
            }
            finished = &mut server_task => {
                match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        self.shutdown().await;
                        Err(e.into())
                    }
                    Err(e) => Err(GatewayError::Internal(format!("server task failed: {e}"))),
                }
            }
        }
    }

    /// Stop every component: scheduler tasks, merger, server (with its
    /// grace period), and finally the plugin registry.
    pub async fn shutdown(&self) {
        let _ = self.tasks_shutdown.send(true);
        if let Some(merger) = &self.merger {
            merger.stop().await;
            info!("stopped metrics merger");
        }
        self.server.shutdown().await;
        info!("stopped server");
        self.registry.shutdown().await;
        info!("stopped plugin registry");
    }

    /// Wait for background tasks to finish after shutdown.
    pub async fn join_background_tasks(self) {
        for task in self.background_tasks {
            let _ = task.await;
        }
    }

    /// Gateway metrics handle.
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Plugin registry handle.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Proxy handle.
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    /// Server handle.
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    async fn recv_or_pending(sig: std::io::Result<tokio::signal::unix::Signal>) {
        match sig {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = recv_or_pending(signal(SignalKind::terminate())) => "SIGTERM",
        _ = recv_or_pending(signal(SignalKind::hangup())) => "SIGHUP",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

/// Offer the whole global config to hooks as an envelope.
fn global_to_envelope(global: &GlobalConfig) -> Result<Envelope, serde_yaml::Error> {
    section_envelope(global)
}

/// Serialize any config section into an envelope.
fn section_envelope<T: serde::Serialize>(section: &T) -> Result<Envelope, serde_yaml::Error> {
    let value = serde_yaml::to_value(section)?;
    let field = yaml_to_field(value);
    match field {
        FieldValue::Map(map) => Ok(map.into_iter().collect()),
        other => {
            let mut envelope = Envelope::new();
            envelope.insert("value", other);
            Ok(envelope)
        }
    }
}

/// Fold a (verified) `OnConfigLoaded` result back into the config.
fn merge_global_config(original: GlobalConfig, updated: Envelope) -> GlobalConfig {
    let mapping: serde_yaml::Value = serde_yaml::Value::Mapping(
        updated
            .iter()
            .map(|(k, v)| {
                (
                    serde_yaml::Value::String(k.to_string()),
                    field_to_yaml(v.clone()),
                )
            })
            .collect(),
    );
    match serde_yaml::from_value(mapping) {
        Ok(merged) => merged,
        Err(e) => {
            warn!(error = %e, "plugins returned an unusable config, keeping the original");
            original
        }
    }
}

fn yaml_to_field(value: serde_yaml::Value) -> FieldValue {
    match value {
        serde_yaml::Value::Null => FieldValue::Null,
        serde_yaml::Value::Bool(b) => FieldValue::Bool(b),
        serde_yaml::Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(0.0)),
        serde_yaml::Value::String(s) => FieldValue::Text(s),
        serde_yaml::Value::Sequence(values) => {
            FieldValue::List(values.into_iter().map(yaml_to_field).collect())
        }
        serde_yaml::Value::Mapping(mapping) => FieldValue::Map(
            mapping
                .into_iter()
                .filter_map(|(k, v)| {
                    k.as_str().map(|key| (key.to_string(), yaml_to_field(v)))
                })
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_field(tagged.value),
    }
}

fn field_to_yaml(field: FieldValue) -> serde_yaml::Value {
    match field {
        FieldValue::Null => serde_yaml::Value::Null,
        FieldValue::Bool(b) => serde_yaml::Value::Bool(b),
        FieldValue::Number(n) => {
            // Envelopes carry every number as f64; restore integers so
            // integer config fields deserialize again.
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                serde_yaml::Value::Number(serde_yaml::Number::from(n as i64))
            } else {
                serde_yaml::Value::Number(serde_yaml::Number::from(n))
            }
        }
        FieldValue::Text(s) => serde_yaml::Value::String(s),
        FieldValue::Bytes(b) => serde_yaml::Value::Sequence(
            b.into_iter()
                .map(|byte| serde_yaml::Value::Number(serde_yaml::Number::from(byte)))
                .collect(),
        ),
        FieldValue::List(values) => {
            serde_yaml::Value::Sequence(values.into_iter().map(field_to_yaml).collect())
        }
        FieldValue::Map(map) => serde_yaml::Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (serde_yaml::Value::String(k), field_to_yaml(v)))
                .collect(),
        ),
    }
}
