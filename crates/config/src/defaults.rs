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

//! Default values for every tunable the configuration surface exposes.
//!
//! All durations are carried as milliseconds in config files; zero means
//! the deadline or period is disabled.

/// Name of the configuration block used when none is selected explicitly.
pub const DEFAULT_KEY: &str = "default";

/// Seed folded into client fingerprints.
pub const DEFAULT_SEED: u64 = 1000;

/// Upstream receive chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Number of upstream clients a pool holds when unconfigured.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Smallest pool the gateway will run with; smaller configs are clamped.
pub const MINIMUM_POOL_SIZE: usize = 2;

/// Upstream dial timeout.
pub const DEFAULT_DIAL_TIMEOUT_MILLIS: u64 = 60_000;

/// Upstream receive deadline; zero disables it.
pub const DEFAULT_RECEIVE_DEADLINE_MILLIS: u64 = 0;

/// Upstream send deadline; zero disables it.
pub const DEFAULT_SEND_DEADLINE_MILLIS: u64 = 0;

/// TCP keep-alive probe period when keep-alive is enabled.
pub const DEFAULT_TCP_KEEP_ALIVE_PERIOD_MILLIS: u64 = 30_000;

/// Upstream dial/receive retry attempts.
pub const DEFAULT_RETRIES: u32 = 3;

/// Initial retry backoff.
pub const DEFAULT_BACKOFF_MILLIS: u64 = 1_000;

/// Retry backoff growth factor per attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Server tick interval.
pub const DEFAULT_TICK_INTERVAL_MILLIS: u64 = 5_000;

/// TLS handshake deadline on inbound connections.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MILLIS: u64 = 5_000;

/// How long graceful shutdown waits for in-flight pass-throughs.
pub const DEFAULT_SHUTDOWN_GRACE_MILLIS: u64 = 5_000;

/// Per-plugin hook invocation timeout.
pub const DEFAULT_PLUGIN_TIMEOUT_MILLIS: u64 = 30_000;

/// Plugin subprocess handshake deadline.
pub const DEFAULT_START_TIMEOUT_MILLIS: u64 = 60_000;

/// Plugin health ping period.
pub const DEFAULT_HEALTH_CHECK_PERIOD_MILLIS: u64 = 5_000;

/// Plugin metrics scrape/merge period.
pub const DEFAULT_METRICS_MERGER_PERIOD_MILLIS: u64 = 5_000;

/// Address the metrics endpoint binds when enabled.
pub const DEFAULT_METRICS_ADDRESS: &str = "localhost:2112";

/// Path the merged metrics are served under.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default log level when the loggers section is silent.
pub const DEFAULT_LOG_LEVEL: &str = "info";
