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

//! # Inbound server
//!
//! ## Purpose
//! Accepts inbound connections, completes the optional TLS handshake
//! within its deadline, and dispatches per-connection events into the
//! [`EventHandler`] capability interface; the [`Proxy`] is its sole
//! production implementer. Each connection runs on its own task; the
//! per-connection read loop hands buffered bytes to `on_traffic`, so long
//! operations never block the acceptor.
//!
//! ## Shutdown
//! Graceful shutdown stops the acceptor, waits up to the configured grace
//! for in-flight pass-throughs to finish, then force-closes the
//! remaining connections and fires `on_shutdown`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use plexgate_config::ServerConfig;
use plexgate_metrics::GatewayMetrics;
use plexgate_proto::{Envelope, HookName};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::proxy::{InboundInfo, Proxy, ProxyError};

/// Read buffer per inbound connection.
const READ_BUFFER_SIZE: usize = 8192;

/// A bidirectional inbound stream (plain TCP or TLS-wrapped).
pub trait Conn: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Conn for T {}

/// Per-connection callbacks the server dispatches into.
///
/// Each callback maps onto a proxy method plus a hook run; see the
/// [`Proxy`] implementation. `in_flight` reports pass-throughs currently
/// processing, which graceful shutdown waits on.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// The listener is bound; fired once before accepting.
    async fn on_boot(&self);

    /// A connection completed its (optional) TLS handshake. An error
    /// closes the connection immediately.
    async fn on_open(&self, info: &InboundInfo) -> Result<(), ProxyError>;

    /// Bytes arrived from the inbound. `request` holds what the reactor
    /// buffered; the handler writes any response to `conn`.
    async fn on_traffic(
        &self,
        conn: &mut dyn Conn,
        request: &[u8],
        info: &InboundInfo,
    ) -> Result<(), ProxyError>;

    /// The connection is going away.
    async fn on_close(&self, info: &InboundInfo);

    /// Periodic tick while the server runs.
    async fn on_tick(&self);

    /// The server is shutting down.
    async fn on_shutdown(&self);

    /// Pass-throughs currently in flight.
    fn in_flight(&self) -> usize {
        0
    }
}

#[async_trait]
impl EventHandler for Proxy {
    async fn on_boot(&self) {
        self.registry().run(HookName::OnBooting, Envelope::new()).await;
        self.registry().run(HookName::OnBooted, Envelope::new()).await;
    }

    async fn on_open(&self, info: &InboundInfo) -> Result<(), ProxyError> {
        let envelope = self.connection_envelope(info, None);
        self.registry().run(HookName::OnOpening, envelope).await;
        self.connect(info).await
    }

    async fn on_traffic(
        &self,
        mut conn: &mut dyn Conn,
        request: &[u8],
        info: &InboundInfo,
    ) -> Result<(), ProxyError> {
        let envelope = self.connection_envelope(info, None);
        self.registry().run(HookName::OnTraffic, envelope).await;
        self.pass_through(&mut conn, request, info).await
    }

    async fn on_close(&self, info: &InboundInfo) {
        if let Err(e) = self.disconnect(info).await {
            debug!(conn = info.id, error = %e, "disconnect after close failed");
        }
    }

    async fn on_tick(&self) {
        self.registry().run(HookName::OnTick, Envelope::new()).await;
    }

    async fn on_shutdown(&self) {
        self.registry().run(HookName::OnShutdown, Envelope::new()).await;
        self.shutdown().await;
    }

    fn in_flight(&self) -> usize {
        self.in_flight_count()
    }
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Only `tcp` listeners are supported.
    #[error("listen network {0} is not supported")]
    NetworkUnsupported(String),

    /// Binding the listen socket failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Configured listen address.
        address: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Certificate or key loading/parsing failed.
    #[error("failed to load TLS material: {0}")]
    Tls(String),
}

/// Accepts inbound connections and drives the [`EventHandler`].
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn EventHandler>,
    tls: Option<TlsAcceptor>,
    metrics: Option<Arc<GatewayMetrics>>,
    running: AtomicBool,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    next_conn_id: AtomicU64,
    open_connections: Arc<AtomicUsize>,
    local_addr: std::sync::Mutex<Option<std::net::SocketAddr>>,
    /// Per-connection task handles, so shutdown can force-close stragglers.
    conn_tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// Create a server; TLS material is loaded eagerly when configured.
    pub fn new(config: ServerConfig, handler: Arc<dyn EventHandler>) -> Result<Self, ServerError> {
        let tls = match (&config.cert_file, &config.key_file) {
            (Some(cert), Some(key)) => Some(build_tls_acceptor(cert, key)?),
            _ => None,
        };
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Ok(Self {
            config,
            handler,
            tls,
            metrics: None,
            running: AtomicBool::new(false),
            shutdown_tx,
            next_conn_id: AtomicU64::new(1),
            open_connections: Arc::new(AtomicUsize::new(0)),
            local_addr: std::sync::Mutex::new(None),
            conn_tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Attach gateway metrics.
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether the acceptor is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bind, fire `on_boot`, and accept until shutdown.
    ///
    /// ## Errors
    /// - [`ServerError::NetworkUnsupported`] for a non-TCP listener
    /// - [`ServerError::Bind`] when the listen socket cannot be bound
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.config.network != "tcp" {
            return Err(ServerError::NetworkUnsupported(self.config.network.clone()));
        }
        let listener = TcpListener::bind(&self.config.address)
            .await
            .map_err(|e| ServerError::Bind {
                address: self.config.address.clone(),
                source: e,
            })?;

        if let Ok(bound) = listener.local_addr() {
            *self.local_addr.lock().unwrap_or_else(|e| e.into_inner()) = Some(bound);
        }
        self.handler.on_boot().await;
        self.running.store(true, Ordering::Release);
        info!(address = %self.config.address, "gateway server is running");

        let tick_task = self.config.tick_interval().map(|interval| {
            let handler = self.handler.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            debug!("gateway server tick");
                            handler.on_tick().await;
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
            })
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let info = InboundInfo {
                                id: self.next_conn_id.fetch_add(1, Ordering::Relaxed),
                                local_addr: self.config.address.clone(),
                                peer_addr: peer.to_string(),
                            };
                            let handler = self.handler.clone();
                            let tls = self.tls.clone();
                            let handshake_timeout = self.config.handshake_timeout();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let open = self.open_connections.clone();
                            let metrics = self.metrics.clone();
                            let task = tokio::spawn(async move {
                                // The guard keeps the counters honest even
                                // when the task is aborted at shutdown.
                                let _guard = OpenConnGuard::enter(open, metrics);
                                handle_connection(
                                    handler,
                                    socket,
                                    tls,
                                    handshake_timeout,
                                    info,
                                    shutdown_rx,
                                )
                                .await;
                            });
                            let mut tasks = self
                                .conn_tasks
                                .lock()
                                .unwrap_or_else(|e| e.into_inner());
                            tasks.retain(|t| !t.is_finished());
                            tasks.push(task);
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept inbound connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        self.running.store(false, Ordering::Release);
        if let Some(task) = tick_task {
            let _ = task.await;
        }
        info!("gateway server stopped accepting");
        Ok(())
    }

    /// Graceful shutdown: stop accepting, wait up to the grace period for
    /// in-flight pass-throughs, force-close whatever is left, then fire
    /// `on_shutdown`.
    pub async fn shutdown(&self) {
        info!("gateway server is shutting down");
        let _ = self.shutdown_tx.send(true);

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace();
        while self.handler.in_flight() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if self.handler.in_flight() > 0 {
            warn!(
                remaining = self.handler.in_flight(),
                "grace period elapsed, force-closing remaining connections"
            );
        }

        // Abort any connection task that outlived the grace period;
        // aborting drops its socket, closing the connection.
        let stragglers: Vec<tokio::task::JoinHandle<()>> = {
            let mut tasks = self.conn_tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        let mut forced = 0_usize;
        for task in &stragglers {
            if !task.is_finished() {
                task.abort();
                forced += 1;
            }
        }
        for task in stragglers {
            let _ = task.await;
        }
        if forced > 0 {
            warn!(count = forced, "force-closed connections at shutdown");
        }

        self.handler.on_shutdown().await;
        self.running.store(false, Ordering::Release);
    }

    /// Inbound connections currently open.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    /// Address the listener actually bound, once running.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct OpenConnGuard {
    open: Arc<AtomicUsize>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl OpenConnGuard {
    fn enter(open: Arc<AtomicUsize>, metrics: Option<Arc<GatewayMetrics>>) -> Self {
        open.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &metrics {
            metrics.server_connections.inc();
        }
        Self { open, metrics }
    }
}

impl Drop for OpenConnGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.server_connections.dec();
        }
    }
}

async fn handle_connection(
    handler: Arc<dyn EventHandler>,
    socket: tokio::net::TcpStream,
    tls: Option<TlsAcceptor>,
    handshake_timeout: Duration,
    info: InboundInfo,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    match tls {
        Some(acceptor) => {
            match tokio::time::timeout(handshake_timeout, acceptor.accept(socket)).await {
                Ok(Ok(stream)) => drive_connection(handler, stream, info, shutdown_rx).await,
                Ok(Err(e)) => {
                    warn!(peer = %info.peer_addr, error = %e, "TLS handshake failed");
                }
                Err(_) => {
                    warn!(peer = %info.peer_addr, "TLS handshake timed out");
                }
            }
        }
        None => drive_connection(handler, socket, info, shutdown_rx).await,
    }
}

async fn drive_connection<S: Conn>(
    handler: Arc<dyn EventHandler>,
    mut stream: S,
    info: InboundInfo,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    if let Err(e) = handler.on_open(&info).await {
        warn!(conn = info.id, peer = %info.peer_addr, error = %e, "rejecting inbound connection");
        return;
    }
    debug!(conn = info.id, peer = %info.peer_addr, "inbound connection open");

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        // Wait for data outside the handler so shutdown can interrupt
        // idle connections without cancelling an in-flight pass-through.
        let read = tokio::select! {
            read = stream.read(&mut buffer) => read,
            _ = shutdown_rx.changed() => break,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                let request = &buffer[..n];
                if let Err(e) = handler.on_traffic(&mut stream, request, &info).await {
                    debug!(conn = info.id, error = %e, "closing connection after traffic error");
                    break;
                }
            }
            Err(e) => {
                debug!(conn = info.id, error = %e, "inbound read failed");
                break;
            }
        }
    }

    handler.on_close(&info).await;
    debug!(conn = info.id, "inbound connection closed");
}

fn build_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, ServerError> {
    let cert_file = std::fs::File::open(cert_path)
        .map_err(|e| ServerError::Tls(format!("open {cert_path}: {e}")))?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_file))
        .collect::<Result<_, _>>()
        .map_err(|e| ServerError::Tls(format!("parse {cert_path}: {e}")))?;

    let key_file = std::fs::File::open(key_path)
        .map_err(|e| ServerError::Tls(format!("open {key_path}: {e}")))?;
    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_file))
        .map_err(|e| ServerError::Tls(format!("parse {key_path}: {e}")))?
        .ok_or_else(|| ServerError::Tls(format!("no private key in {key_path}")))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_force_closes_hung_connections() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Handler whose pass-through never finishes; the grace period must
        // expire and the connection be force-closed.
        struct HangingHandler {
            in_flight: Arc<AtomicUsize>,
        }
        #[async_trait]
        impl EventHandler for HangingHandler {
            async fn on_boot(&self) {}
            async fn on_open(&self, _info: &InboundInfo) -> Result<(), ProxyError> {
                Ok(())
            }
            async fn on_traffic(
                &self,
                _conn: &mut dyn Conn,
                _request: &[u8],
                _info: &InboundInfo,
            ) -> Result<(), ProxyError> {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            async fn on_close(&self, _info: &InboundInfo) {}
            async fn on_tick(&self) {}
            async fn on_shutdown(&self) {}
            fn in_flight(&self) -> usize {
                self.in_flight.load(Ordering::SeqCst)
            }
        }

        let in_flight = Arc::new(AtomicUsize::new(0));
        let config = ServerConfig {
            address: "127.0.0.1:0".to_string(),
            tick_interval_millis: 0,
            shutdown_grace_millis: 100,
            ..ServerConfig::default()
        };
        let server = Arc::new(
            Server::new(
                config,
                Arc::new(HangingHandler {
                    in_flight: in_flight.clone(),
                }),
            )
            .unwrap(),
        );

        let runner = server.clone();
        tokio::spawn(async move { runner.run().await });
        for _ in 0..200 {
            if server.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let address = server.local_addr().expect("bound address");

        let mut conn = tokio::net::TcpStream::connect(address).await.unwrap();
        conn.write_all(b"stuck").await.unwrap();
        for _ in 0..200 {
            if in_flight.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);

        // Shutdown returns once the grace elapses, not after 60 seconds.
        let started = tokio::time::Instant::now();
        server.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(server.open_connections(), 0);

        // The aborted task dropped the socket: the inbound sees it closed.
        let mut buf = [0u8; 8];
        let closed = tokio::time::timeout(Duration::from_secs(2), conn.read(&mut buf))
            .await
            .expect("connection should be closed promptly");
        assert!(matches!(closed, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_non_tcp_listener_is_rejected() {
        struct NoopHandler;
        #[async_trait]
        impl EventHandler for NoopHandler {
            async fn on_boot(&self) {}
            async fn on_open(&self, _info: &InboundInfo) -> Result<(), ProxyError> {
                Ok(())
            }
            async fn on_traffic(
                &self,
                _conn: &mut dyn Conn,
                _request: &[u8],
                _info: &InboundInfo,
            ) -> Result<(), ProxyError> {
                Ok(())
            }
            async fn on_close(&self, _info: &InboundInfo) {}
            async fn on_tick(&self) {}
            async fn on_shutdown(&self) {}
        }

        let config = ServerConfig {
            network: "udp".to_string(),
            ..ServerConfig::default()
        };
        let server = Server::new(config, Arc::new(NoopHandler)).unwrap();
        let err = server.run().await.unwrap_err();
        assert!(matches!(err, ServerError::NetworkUnsupported(n) if n == "udp"));
    }

    #[test]
    fn test_missing_tls_material_fails_construction() {
        struct NoopHandler;
        #[async_trait]
        impl EventHandler for NoopHandler {
            async fn on_boot(&self) {}
            async fn on_open(&self, _info: &InboundInfo) -> Result<(), ProxyError> {
                Ok(())
            }
            async fn on_traffic(
                &self,
                _conn: &mut dyn Conn,
                _request: &[u8],
                _info: &InboundInfo,
            ) -> Result<(), ProxyError> {
                Ok(())
            }
            async fn on_close(&self, _info: &InboundInfo) {}
            async fn on_tick(&self) {}
            async fn on_shutdown(&self) {}
        }

        let config = ServerConfig {
            cert_file: Some("/nonexistent/cert.pem".to_string()),
            key_file: Some("/nonexistent/key.pem".to_string()),
            ..ServerConfig::default()
        };
        let err = Server::new(config, Arc::new(NoopHandler)).unwrap_err();
        assert!(matches!(err, ServerError::Tls(_)));
    }
}
