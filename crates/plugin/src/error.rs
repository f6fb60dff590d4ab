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

//! Plugin subsystem errors.

use thiserror::Error;

/// Errors raised while loading, supervising, or talking to plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No loaded plugin carries this name.
    #[error("plugin {name} not found")]
    PluginNotFound {
        /// Requested plugin name.
        name: String,
    },

    /// The plugin is loaded but its channel is not usable yet.
    #[error("plugin {name} is not ready")]
    PluginNotReady {
        /// Plugin name.
        name: String,
    },

    /// The binary on disk does not match the configured SHA-256.
    #[error("checksum mismatch for plugin {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Plugin name.
        name: String,
        /// Configured digest.
        expected: String,
        /// Digest computed from the binary.
        actual: String,
    },

    /// The stdio handshake did not complete.
    #[error("handshake with plugin {name} failed: {reason}")]
    HandshakeFailed {
        /// Plugin name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A strict-mode requirement could not be matched against loaded plugins.
    #[error("plugin {name} is incompatible: requires {requirement}")]
    IncompatiblePlugin {
        /// Plugin name.
        name: String,
        /// The unmatched requirement, rendered.
        requirement: String,
    },

    /// A plugin with this name is already loaded.
    #[error("a plugin named {name} is already loaded")]
    DuplicatePlugin {
        /// Plugin name.
        name: String,
    },

    /// Spawning the subprocess failed.
    #[error("failed to spawn plugin {name}: {source}")]
    Spawn {
        /// Plugin name.
        name: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Reading the plugin binary for checksum verification failed.
    #[error("failed to read plugin binary {path}: {source}")]
    Io {
        /// Binary path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Opening the gRPC channel failed.
    #[error("failed to connect to plugin {name}: {source}")]
    Connect {
        /// Plugin name.
        name: String,
        /// Underlying error.
        source: tonic::transport::Error,
    },

    /// The plugin reported unusable metadata.
    #[error("plugin {name} reported an invalid config: {reason}")]
    InvalidConfig {
        /// Plugin name.
        name: String,
        /// What was wrong.
        reason: String,
    },
}
