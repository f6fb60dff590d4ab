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

//! PlexGate plugin SDK protocol buffers
//!
//! Generated protobuf definitions for the PlexGate plugin wire protocol,
//! plus the in-memory [`Envelope`] bag the gateway core works with.

// Allow clippy warnings for generated code
#![allow(clippy::doc_lazy_continuation)]
#![allow(clippy::large_enum_variant)]

// Re-export prost_types for test usage
pub use prost_types;

// Include generated modules - these match the buf generated file names
pub mod sdk {
    /// Version 1 of the plugin SDK wire protocol.
    pub mod v1 {
        include!("generated/plexgate.sdk.v1.rs");
    }
}

mod envelope;

pub use envelope::{Envelope, FieldValue};
pub use sdk::v1::plugin_service_client::PluginServiceClient;
pub use sdk::v1::{
    HookName, PingRequest, PingResponse, PluginConfig, PluginId, Requirement, Struct, Value,
};
