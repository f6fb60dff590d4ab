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

//! # Gateway Prometheus metrics
//!
//! ## Purpose
//! The gateway's own counters and gauges, registered into a registry the
//! struct owns. The struct is constructed once at startup and passed
//! explicitly to the proxy, server and plugin registry; nothing in the
//! core reads the process-global default registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Gateway-side metrics, owned by one registry handed around explicitly.
pub struct GatewayMetrics {
    registry: Registry,

    /// Upstream clients currently alive (pooled or busy).
    pub client_connections: IntGauge,
    /// Inbound connections currently open.
    pub server_connections: IntGauge,
    /// Completed pass-through cycles.
    pub passthroughs_total: IntCounter,
    /// Upstream reconnects triggered by EOF or write failure.
    pub upstream_reconnects_total: IntCounter,
    /// Inbound connections refused because the fixed pool was empty.
    pub pool_exhaustions_total: IntCounter,
    /// Bytes read from inbound connections.
    pub bytes_from_clients_total: IntCounter,
    /// Bytes written to inbound connections.
    pub bytes_to_clients_total: IntCounter,
    /// Hook invocations, labelled by hook name.
    pub hook_runs_total: IntCounterVec,
    /// Hook invocations that failed verification or transport, by hook name.
    pub hook_failures_total: IntCounterVec,
    /// Plugins currently loaded.
    pub plugins_loaded: IntGauge,
    /// Plugins evicted after failed health checks.
    pub plugin_evictions_total: IntCounter,
}

impl GatewayMetrics {
    /// Build the metric set and register it into a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let client_connections = IntGauge::with_opts(Opts::new(
            "plexgate_client_connections",
            "Number of upstream client connections currently alive",
        ))?;
        registry.register(Box::new(client_connections.clone()))?;

        let server_connections = IntGauge::with_opts(Opts::new(
            "plexgate_server_connections",
            "Number of inbound connections currently open",
        ))?;
        registry.register(Box::new(server_connections.clone()))?;

        let passthroughs_total = IntCounter::with_opts(Opts::new(
            "plexgate_passthroughs_total",
            "Completed request/response pass-through cycles",
        ))?;
        registry.register(Box::new(passthroughs_total.clone()))?;

        let upstream_reconnects_total = IntCounter::with_opts(Opts::new(
            "plexgate_upstream_reconnects_total",
            "Upstream reconnects triggered by EOF or write failure",
        ))?;
        registry.register(Box::new(upstream_reconnects_total.clone()))?;

        let pool_exhaustions_total = IntCounter::with_opts(Opts::new(
            "plexgate_pool_exhaustions_total",
            "Inbound connections refused because the fixed pool was empty",
        ))?;
        registry.register(Box::new(pool_exhaustions_total.clone()))?;

        let bytes_from_clients_total = IntCounter::with_opts(Opts::new(
            "plexgate_bytes_from_clients_total",
            "Bytes read from inbound connections",
        ))?;
        registry.register(Box::new(bytes_from_clients_total.clone()))?;

        let bytes_to_clients_total = IntCounter::with_opts(Opts::new(
            "plexgate_bytes_to_clients_total",
            "Bytes written to inbound connections",
        ))?;
        registry.register(Box::new(bytes_to_clients_total.clone()))?;

        let hook_runs_total = IntCounterVec::new(
            Opts::new("plexgate_hook_runs_total", "Hook invocations by hook name"),
            &["hook"],
        )?;
        registry.register(Box::new(hook_runs_total.clone()))?;

        let hook_failures_total = IntCounterVec::new(
            Opts::new(
                "plexgate_hook_failures_total",
                "Hook invocations that failed verification or transport",
            ),
            &["hook"],
        )?;
        registry.register(Box::new(hook_failures_total.clone()))?;

        let plugins_loaded = IntGauge::with_opts(Opts::new(
            "plexgate_plugins_loaded",
            "Plugins currently loaded",
        ))?;
        registry.register(Box::new(plugins_loaded.clone()))?;

        let plugin_evictions_total = IntCounter::with_opts(Opts::new(
            "plexgate_plugin_evictions_total",
            "Plugins evicted after failed health checks",
        ))?;
        registry.register(Box::new(plugin_evictions_total.clone()))?;

        Ok(Self {
            registry,
            client_connections,
            server_connections,
            passthroughs_total,
            upstream_reconnects_total,
            pool_exhaustions_total,
            bytes_from_clients_total,
            bytes_to_clients_total,
            hook_runs_total,
            hook_failures_total,
            plugins_loaded,
            plugin_evictions_total,
        })
    }

    /// Export the gateway's own metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
