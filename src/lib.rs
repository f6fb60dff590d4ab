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

//! PlexGate: a pluggable database gateway
//!
//! A level-7 reverse proxy that terminates client connections, forwards
//! traffic to an upstream database, and invokes out-of-process gRPC
//! plugins at lifecycle and traffic points so they can observe,
//! transform, or short-circuit the byte stream.
//!
//! The member crates carry the moving parts; this crate wires them into
//! a running [`Gateway`]:
//! - [`proto`]: plugin SDK wire protocol and the in-memory envelope
//! - [`config`]: YAML configuration surface and policies
//! - [`pool`]: bounded keyed container of idle upstream clients
//! - [`network`]: upstream client, retry, proxy, and server
//! - [`plugin`]: plugin registry, hook engine, subprocess supervisor
//! - [`metrics`]: gateway Prometheus metrics and the plugin merger

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Independent crates - re-export them here
pub use plexgate_config as config;
pub use plexgate_metrics as metrics;
pub use plexgate_network as network;
pub use plexgate_plugin as plugin;
pub use plexgate_pool as pool;
pub use plexgate_proto as proto;

mod runtime;
mod tracing_setup;

pub use runtime::{exit, Gateway, GatewayError};
pub use tracing_setup::init_tracing;
