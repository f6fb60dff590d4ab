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

//! # Upstream database client
//!
//! ## Purpose
//! One live connection to the upstream database: framed send/receive with
//! deadlines, dial retry with backoff, and a deterministic fingerprint
//! derived from the local address tuple at dial time.
//!
//! ## Failure semantics
//! A write error or a clean EOF marks the client terminal; the owner must
//! replace it through the proxy's reconnect path. Close is idempotent and
//! zeroes the record so it cannot be reused.

use std::time::Duration;

use plexgate_config::{defaults, ClientConfig};
use plexgate_pool::Poolable;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UnixStream};
use tracing::{debug, warn};

use crate::retry::Retry;

/// Upstream client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Only `tcp` and `unix` are dialable.
    #[error("network {0} is not supported")]
    NetworkUnsupported(String),

    /// The dial failed at the socket layer.
    #[error("failed to dial upstream: {0}")]
    Dial(#[source] std::io::Error),

    /// The dial exceeded the configured timeout.
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// Operation on a closed or never-connected client.
    #[error("client is not connected")]
    NotConnected,

    /// The upstream closed the connection cleanly.
    #[error("upstream closed the connection")]
    UpstreamEof,

    /// Writing to the upstream failed; the client is terminal.
    #[error("failed to write to upstream: {0}")]
    UpstreamWriteFailed(#[source] std::io::Error),

    /// The send deadline elapsed before the buffer was flushed.
    #[error("send deadline exceeded")]
    SendTimeout,

    /// Reading from the upstream failed.
    #[error("failed to read from upstream: {0}")]
    Receive(#[source] std::io::Error),

    /// The receive deadline elapsed with no data.
    #[error("receive deadline exceeded")]
    ReceiveTimeout,
}

enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

/// One live upstream connection.
pub struct Client {
    /// Deterministic fingerprint of the local address tuple plus seed.
    pub id: String,
    /// `tcp` or `unix`.
    pub network: String,
    /// Resolved (or literal) upstream address.
    pub address: String,
    /// Max bytes read per receive call.
    pub receive_chunk_size: usize,
    receive_deadline: Option<Duration>,
    send_deadline: Option<Duration>,
    stream: Option<Stream>,
    terminal: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("network", &self.network)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Dial the upstream described by `config`.
    ///
    /// The address is resolved first, falling back to the literal form
    /// when resolution fails. The dial is bounded by the configured
    /// timeout and retried with backoff.
    ///
    /// ## Errors
    /// - [`ClientError::NetworkUnsupported`]
    /// - [`ClientError::Dial`] / [`ClientError::DialTimeout`] after all
    ///   retry attempts
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let retry = Retry::from_config(config);
        match config.network.as_str() {
            "tcp" => {
                let address = resolve(&config.address).await;
                let dial_timeout = config.dial_timeout();
                let stream = retry
                    .retry(|| dial_tcp(&address, dial_timeout))
                    .await?;

                if config.tcp_keep_alive {
                    if let Err(e) = apply_keep_alive(&stream, config.tcp_keep_alive_period()) {
                        warn!(address = %address, error = %e, "failed to enable TCP keep-alive");
                    }
                }

                let local = stream
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                let id = fingerprint("tcp", &local, defaults::DEFAULT_SEED);
                debug!(id = %id, address = %address, "upstream client connected");
                Ok(Self {
                    id,
                    network: "tcp".to_string(),
                    address,
                    receive_chunk_size: effective_chunk_size(config),
                    receive_deadline: config.receive_deadline(),
                    send_deadline: config.send_deadline(),
                    stream: Some(Stream::Tcp(stream)),
                    terminal: false,
                })
            }
            "unix" => {
                let address = config.address.clone();
                let dial_timeout = config.dial_timeout();
                let stream = retry
                    .retry(|| dial_unix(&address, dial_timeout))
                    .await?;

                // Unix sockets have unnamed local addresses; the file
                // descriptor disambiguates concurrent connections.
                let local = {
                    use std::os::fd::AsRawFd;
                    format!("fd:{}", stream.as_raw_fd())
                };
                let id = fingerprint("unix", &local, defaults::DEFAULT_SEED);
                debug!(id = %id, address = %address, "upstream client connected");
                Ok(Self {
                    id,
                    network: "unix".to_string(),
                    address,
                    receive_chunk_size: effective_chunk_size(config),
                    receive_deadline: config.receive_deadline(),
                    send_deadline: config.send_deadline(),
                    stream: Some(Stream::Unix(stream)),
                    terminal: false,
                })
            }
            other => Err(ClientError::NetworkUnsupported(other.to_string())),
        }
    }

    /// Flush the whole buffer to the upstream under the send deadline.
    pub async fn send(&mut self, data: &[u8]) -> Result<usize, ClientError> {
        let deadline = self.send_deadline;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let write = async {
            match stream {
                Stream::Tcp(s) => s.write_all(data).await,
                Stream::Unix(s) => s.write_all(data).await,
            }
        };
        let outcome = match deadline {
            Some(t) => match tokio::time::timeout(t, write).await {
                Ok(result) => result.map_err(ClientError::UpstreamWriteFailed),
                Err(_) => Err(ClientError::SendTimeout),
            },
            None => write.await.map_err(ClientError::UpstreamWriteFailed),
        };

        match outcome {
            Ok(()) => {
                debug!(bytes = data.len(), address = %self.address, "sent to upstream");
                Ok(data.len())
            }
            Err(e) => {
                self.terminal = true;
                Err(e)
            }
        }
    }

    /// Read up to one chunk from the upstream under the receive deadline.
    ///
    /// Returns the byte count and a freshly allocated buffer. A clean
    /// upstream close yields [`ClientError::UpstreamEof`] and marks the
    /// client terminal; a deadline expiry does not.
    pub async fn receive(&mut self) -> Result<(usize, Vec<u8>), ClientError> {
        let deadline = self.receive_deadline;
        let chunk_size = self.receive_chunk_size;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let mut buffer = vec![0u8; chunk_size];
        let read = async {
            match stream {
                Stream::Tcp(s) => s.read(&mut buffer).await,
                Stream::Unix(s) => s.read(&mut buffer).await,
            }
        };
        let outcome = match deadline {
            Some(t) => match tokio::time::timeout(t, read).await {
                Ok(result) => result.map_err(ClientError::Receive),
                Err(_) => return Err(ClientError::ReceiveTimeout),
            },
            None => read.await.map_err(ClientError::Receive),
        };

        match outcome {
            Ok(0) => {
                self.terminal = true;
                Err(ClientError::UpstreamEof)
            }
            Ok(n) => {
                debug!(bytes = n, address = %self.address, "received from upstream");
                Ok((n, buffer))
            }
            Err(e) => {
                self.terminal = true;
                Err(e)
            }
        }
    }

    /// Close the connection and zero the record. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(id = %self.id, address = %self.address, "closing upstream client");
            let _ = match &mut stream {
                Stream::Tcp(s) => s.shutdown().await,
                Stream::Unix(s) => s.shutdown().await,
            };
        }
        self.id.clear();
        self.address.clear();
        self.network.clear();
        self.receive_chunk_size = 0;
    }

    /// Whether the client still holds a live stream.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether a write error or EOF has retired this client.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

#[async_trait::async_trait]
impl Poolable for Client {
    async fn close(&mut self) {
        Client::close(self).await;
    }
}

/// Resolve an address, falling back to the literal form on failure.
async fn resolve(address: &str) -> String {
    match lookup_host(address).await {
        Ok(mut addrs) => match addrs.next() {
            Some(resolved) => resolved.to_string(),
            None => address.to_string(),
        },
        Err(e) => {
            warn!(address = %address, error = %e, "failed to resolve address, using literal");
            address.to_string()
        }
    }
}

async fn dial_tcp(
    address: &str,
    dial_timeout: Option<Duration>,
) -> Result<TcpStream, ClientError> {
    match dial_timeout {
        Some(t) => tokio::time::timeout(t, TcpStream::connect(address))
            .await
            .map_err(|_| ClientError::DialTimeout(t))?
            .map_err(ClientError::Dial),
        None => TcpStream::connect(address).await.map_err(ClientError::Dial),
    }
}

async fn dial_unix(
    address: &str,
    dial_timeout: Option<Duration>,
) -> Result<UnixStream, ClientError> {
    match dial_timeout {
        Some(t) => tokio::time::timeout(t, UnixStream::connect(address))
            .await
            .map_err(|_| ClientError::DialTimeout(t))?
            .map_err(ClientError::Dial),
        None => UnixStream::connect(address)
            .await
            .map_err(ClientError::Dial),
    }
}

#[cfg(unix)]
fn apply_keep_alive(stream: &TcpStream, period: Duration) -> std::io::Result<()> {
    use nix::sys::socket::{setsockopt, sockopt};

    setsockopt(stream, sockopt::KeepAlive, &true)
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    setsockopt(stream, sockopt::TcpKeepIdle, &(period.as_secs().max(1) as u32))
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let _ = period;
    Ok(())
}

#[cfg(not(unix))]
fn apply_keep_alive(_stream: &TcpStream, _period: Duration) -> std::io::Result<()> {
    Ok(())
}

fn effective_chunk_size(config: &ClientConfig) -> usize {
    if config.receive_chunk_size == 0 {
        defaults::DEFAULT_CHUNK_SIZE
    } else {
        config.receive_chunk_size
    }
}

/// Stable digest of the local address tuple plus a seed.
fn fingerprint(network: &str, local_address: &str, seed: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(network.as_bytes());
    hasher.update(b":");
    hasher.update(local_address.as_bytes());
    hasher.update(seed.to_be_bytes());
    hex::encode(hasher.finalize())
}
