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

//! # Plugin subprocess lifecycle
//!
//! ## Purpose
//! Spawns plugin executables with the magic-cookie environment, performs
//! the stdio handshake, opens the gRPC channel the handshake advertises,
//! and terminates subprocesses with SIGTERM before SIGKILL.
//!
//! ## Handshake
//! A plugin must print exactly one line to stdout before serving RPCs:
//!
//! ```text
//! <core-version>|<app-version>|<network>|<address>|grpc
//! ```
//!
//! e.g. `1|1|unix|/tmp/plugin-cache.sock|grpc`. Anything else, a wrong
//! core version, a wrong cookie (the plugin is expected to exit), or
//! silence past the start timeout is a handshake failure.

use std::time::Duration;

use plexgate_config::PluginSpec;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::{debug, info, warn};

use crate::error::PluginError;

/// Environment variable carrying the cookie key.
pub const MAGIC_COOKIE_KEY_ENV: &str = "MAGIC_COOKIE_KEY";

/// Environment variable carrying the cookie value.
pub const MAGIC_COOKIE_VALUE_ENV: &str = "MAGIC_COOKIE_VALUE";

/// Cookie key the core hands to every plugin.
pub const MAGIC_COOKIE_KEY: &str = "PLEXGATE_PLUGIN";

/// Cookie value; a plugin seeing a different value must exit immediately.
pub const MAGIC_COOKIE_VALUE: &str = "f1b2ad7f-bd91-4b1c-92f8-ba1d5f6cd0f1";

/// Handshake protocol version this core speaks.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Wire protocol the handshake must advertise.
pub const WIRE_PROTOCOL: &str = "grpc";

/// Grace between SIGTERM and SIGKILL on termination.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// What a plugin advertised during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Handshake protocol version the plugin speaks.
    pub core_version: u32,
    /// Plugin application protocol version.
    pub app_version: u32,
    /// `tcp` or `unix`.
    pub network: String,
    /// Host:port or socket path of the plugin's gRPC server.
    pub address: String,
}

/// A running plugin subprocess.
#[derive(Debug)]
pub struct PluginProcess {
    child: Child,
    name: String,
}

impl PluginProcess {
    /// Spawn the plugin and complete the stdio handshake.
    ///
    /// ## Errors
    /// - [`PluginError::Spawn`] when the executable cannot start
    /// - [`PluginError::HandshakeFailed`] on a malformed or missing
    ///   handshake line, a version mismatch, or the start timeout
    pub async fn spawn(
        spec: &PluginSpec,
        start_timeout: Duration,
    ) -> Result<(Self, HandshakeInfo), PluginError> {
        let mut command = Command::new(&spec.local_path);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .env(MAGIC_COOKIE_KEY_ENV, MAGIC_COOKIE_KEY)
            .env(MAGIC_COOKIE_VALUE_ENV, MAGIC_COOKIE_VALUE)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| PluginError::Spawn {
            name: spec.name.clone(),
            source: e,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| PluginError::HandshakeFailed {
            name: spec.name.clone(),
            reason: "plugin stdout was not captured".to_string(),
        })?;

        let mut process = Self {
            child,
            name: spec.name.clone(),
        };

        let info = match read_handshake(stdout, start_timeout, &spec.name).await {
            Ok(info) => info,
            Err(e) => {
                process.terminate(TERMINATE_GRACE).await;
                return Err(e);
            }
        };

        info!(
            plugin = %spec.name,
            pid = process.pid().unwrap_or(0),
            network = %info.network,
            address = %info.address,
            "plugin subprocess handshake complete"
        );
        Ok((process, info))
    }

    /// PID of the subprocess, if it is still running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the subprocess has exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Terminate with SIGTERM, escalating to SIGKILL after `grace`.
    pub async fn terminate(&mut self, grace: Duration) {
        let Some(pid) = self.child.id() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(plugin = %self.name, pid, %status, "plugin terminated");
            }
            Ok(Err(e)) => {
                warn!(plugin = %self.name, pid, error = %e, "error waiting for plugin exit");
            }
            Err(_) => {
                warn!(plugin = %self.name, pid, "plugin ignored SIGTERM, killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

async fn read_handshake(
    stdout: tokio::process::ChildStdout,
    start_timeout: Duration,
    name: &str,
) -> Result<HandshakeInfo, PluginError> {
    let mut line = String::new();
    let mut reader = BufReader::new(stdout);

    let read = tokio::time::timeout(start_timeout, reader.read_line(&mut line)).await;
    let failed = |reason: String| PluginError::HandshakeFailed {
        name: name.to_string(),
        reason,
    };

    match read {
        Ok(Ok(0)) => Err(failed("plugin exited before the handshake".to_string())),
        Ok(Ok(_)) => parse_handshake_line(line.trim()).map_err(failed),
        Ok(Err(e)) => Err(failed(format!("failed to read handshake: {e}"))),
        Err(_) => Err(failed(format!(
            "no handshake within {start_timeout:?}"
        ))),
    }
}

fn parse_handshake_line(line: &str) -> Result<HandshakeInfo, String> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() != 5 {
        return Err(format!("malformed handshake line: {line:?}"));
    }
    let core_version: u32 = parts[0]
        .parse()
        .map_err(|_| format!("bad core version: {:?}", parts[0]))?;
    if core_version != CORE_PROTOCOL_VERSION {
        return Err(format!(
            "core protocol version mismatch: plugin speaks {core_version}, core speaks {CORE_PROTOCOL_VERSION}"
        ));
    }
    let app_version: u32 = parts[1]
        .parse()
        .map_err(|_| format!("bad app version: {:?}", parts[1]))?;
    if parts[4] != WIRE_PROTOCOL {
        return Err(format!("unsupported wire protocol: {:?}", parts[4]));
    }
    let network = parts[2].to_string();
    if network != "tcp" && network != "unix" {
        return Err(format!("unsupported handshake network: {network:?}"));
    }
    Ok(HandshakeInfo {
        core_version,
        app_version,
        network,
        address: parts[3].to_string(),
    })
}

/// Open the gRPC channel a handshake advertised.
pub async fn connect_channel(info: &HandshakeInfo) -> Result<Channel, tonic::transport::Error> {
    match info.network.as_str() {
        "unix" => {
            let path = info.address.clone();
            // The URI is ignored by the connector; tonic requires one anyway.
            Endpoint::try_from("http://plugin.sock")?
                .connect_with_connector(tower::service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(
                            UnixStream::connect(path).await?,
                        ))
                    }
                }))
                .await
        }
        _ => {
            Endpoint::try_from(format!("http://{}", info.address))?
                .connect()
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn spec(name: &str, path: &str, args: &[&str]) -> PluginSpec {
        PluginSpec {
            name: name.to_string(),
            enabled: true,
            local_path: path.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
            checksum: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn test_parse_handshake_line() {
        let info = parse_handshake_line("1|3|unix|/tmp/p.sock|grpc").unwrap();
        assert_eq!(
            info,
            HandshakeInfo {
                core_version: 1,
                app_version: 3,
                network: "unix".to_string(),
                address: "/tmp/p.sock".to_string(),
            }
        );

        assert!(parse_handshake_line("").is_err());
        assert!(parse_handshake_line("1|1|tcp|localhost:9000").is_err());
        assert!(parse_handshake_line("9|1|tcp|localhost:9000|grpc").is_err());
        assert!(parse_handshake_line("1|1|tcp|localhost:9000|netrpc").is_err());
        assert!(parse_handshake_line("1|1|sctp|localhost:9000|grpc").is_err());
    }

    #[tokio::test]
    async fn test_spawn_completes_handshake() {
        let (mut process, info) = PluginProcess::spawn(
            &spec(
                "fake",
                "/bin/sh",
                &["-c", "echo '1|1|tcp|127.0.0.1:19999|grpc'; sleep 5"],
            ),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(info.network, "tcp");
        assert_eq!(info.address, "127.0.0.1:19999");
        process.terminate(Duration::from_millis(500)).await;
        assert!(process.has_exited());
    }

    #[tokio::test]
    async fn test_early_exit_is_handshake_failure() {
        let err = PluginProcess::spawn(
            &spec("quitter", "/bin/sh", &["-c", "exit 1"]),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

        match err {
            PluginError::HandshakeFailed { name, reason } => {
                assert_eq!(name, "quitter");
                assert!(reason.contains("before the handshake"), "{reason}");
            }
            other => panic!("expected HandshakeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_line_is_handshake_failure() {
        let err = PluginProcess::spawn(
            &spec("garbage", "/bin/sh", &["-c", "echo hello; sleep 5"]),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PluginError::HandshakeFailed { .. }));
    }

    #[tokio::test]
    async fn test_silent_plugin_times_out() {
        let err = PluginProcess::spawn(
            &spec("silent", "/bin/sh", &["-c", "sleep 5"]),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        match err {
            PluginError::HandshakeFailed { reason, .. } => {
                assert!(reason.contains("no handshake"), "{reason}");
            }
            other => panic!("expected HandshakeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cookie_env_is_set() {
        // The fake plugin echoes the cookie back as its address field.
        let (mut process, info) = PluginProcess::spawn(
            &spec(
                "env-check",
                "/bin/sh",
                &["-c", "echo \"1|1|tcp|$MAGIC_COOKIE_VALUE|grpc\"; sleep 5"],
            ),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(info.address, MAGIC_COOKIE_VALUE);
        process.terminate(Duration::from_millis(500)).await;
    }
}
