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

//! Plugin registry, hook engine, and subprocess supervisor for PlexGate
//!
//! Plugins are out-of-process gRPC servers the gateway spawns, handshakes
//! over stdio, health-pings, and invokes at named hook points. The
//! [`Registry`] owns every record; the [`HookEngine`] runs registered
//! invokers in priority order under the configured policies.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hooks;
mod identifier;
mod invoker;
mod registry;
mod supervisor;

pub use error::PluginError;
pub use hooks::{HookEngine, TERMINATE_FIELD};
pub use identifier::{PluginIdentifier, RequirementSpec};
pub use invoker::{GrpcInvoker, HookInvoker, InvokeError, LocalInvoker};
pub use registry::{
    PluginRecord, Registry, RegistryOptions, DEFAULT_HOOK_PRIORITY, METRICS_ENABLED_CONFIG_KEY,
    METRICS_SOCKET_CONFIG_KEY, PRIORITY_CONFIG_KEY,
};
pub use supervisor::{
    connect_channel, HandshakeInfo, PluginProcess, CORE_PROTOCOL_VERSION, MAGIC_COOKIE_KEY,
    MAGIC_COOKIE_KEY_ENV, MAGIC_COOKIE_VALUE, MAGIC_COOKIE_VALUE_ENV, TERMINATE_GRACE,
    WIRE_PROTOCOL,
};
