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

//! # Proxy
//!
//! ## Purpose
//! Pairs each inbound connection with one upstream client and ferries
//! bytes through the four traffic hook points. Reconnects the upstream on
//! EOF or write failure, replacing the busy-map entry; the in-flight
//! request is dropped and the inbound gets a generic upstream-closed
//! frame (protocol framing is the plugins' concern).
//!
//! ## Invariants
//! - A client id never appears in `available` and `busy` simultaneously;
//!   during a pass-through the client is held by the call itself.
//! - Fixed mode never dials beyond the initial pool; elastic mode dials on
//!   demand, and `reuse_elastic_clients` decides whether released elastic
//!   clients return to the pool or are closed.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use plexgate_config::ClientConfig;
use plexgate_metrics::GatewayMetrics;
use plexgate_plugin::Registry;
use plexgate_pool::{Pool, PoolError};
use plexgate_proto::{Envelope, FieldValue, HookName};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{Client, ClientError};

/// Identifier the server assigns to each inbound connection.
pub type ConnId = u64;

/// Frame written to the inbound when the upstream goes away mid-request.
pub const UPSTREAM_CLOSED_FRAME: &[u8] = b"upstream connection closed";

/// Descriptors of one inbound connection, carried into hook envelopes.
#[derive(Debug, Clone)]
pub struct InboundInfo {
    /// Server-assigned connection id.
    pub id: ConnId,
    /// Local (listening) address.
    pub local_addr: String,
    /// Remote peer address.
    pub peer_addr: String,
}

/// Proxy errors.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Fixed mode and the pool is empty.
    #[error("connection pool is exhausted")]
    PoolExhausted,

    /// No upstream client is assigned to this inbound connection.
    #[error("no upstream client assigned to this connection")]
    ClientNotFound,

    /// New connections are refused during shutdown.
    #[error("proxy is shutting down")]
    Shutdown,

    /// Upstream client failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Reading from or writing to the inbound failed.
    #[error("inbound I/O failed: {0}")]
    Inbound(#[source] std::io::Error),

    /// Returning a client to the pool failed.
    #[error("failed to return client to the pool: {0}")]
    Pool(#[from] PoolError),
}

/// Brokers upstream clients for inbound connections.
pub struct Proxy {
    available: Pool<Client>,
    busy: Mutex<HashMap<ConnId, Client>>,
    elastic: bool,
    reuse_elastic_clients: bool,
    client_config: ClientConfig,
    registry: Arc<Registry>,
    metrics: Option<Arc<GatewayMetrics>>,
    shutting_down: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Proxy {
    /// Create a proxy over a pre-filled pool.
    pub fn new(
        available: Pool<Client>,
        registry: Arc<Registry>,
        elastic: bool,
        reuse_elastic_clients: bool,
        client_config: ClientConfig,
    ) -> Self {
        Self {
            available,
            busy: Mutex::new(HashMap::new()),
            elastic,
            reuse_elastic_clients,
            client_config,
            registry,
            metrics: None,
            shutting_down: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attach gateway metrics.
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether the proxy dials beyond the pool on demand.
    pub fn is_elastic(&self) -> bool {
        self.elastic
    }

    /// Number of clients waiting in the pool.
    pub async fn available_size(&self) -> usize {
        self.available.size().await
    }

    /// Number of clients assigned to inbound connections.
    pub async fn busy_size(&self) -> usize {
        self.busy.lock().await.len()
    }

    /// Hook registry handle.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Pass-throughs currently processing a request.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Reserve an upstream client for `info` and fire `OnOpened`.
    ///
    /// ## Errors
    /// - [`ProxyError::PoolExhausted`] in fixed mode with an empty pool
    /// - [`ProxyError::Client`] when an elastic dial fails
    /// - [`ProxyError::Shutdown`] once shutdown has begun
    pub async fn connect(&self, info: &InboundInfo) -> Result<(), ProxyError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(ProxyError::Shutdown);
        }

        let client = match self.available.pop_any().await {
            Some((_, client)) => client,
            None if self.elastic => {
                let client = Client::connect(&self.client_config).await?;
                if let Some(metrics) = &self.metrics {
                    metrics.client_connections.inc();
                }
                debug!(id = %client.id, "dialed elastic upstream client");
                client
            }
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.pool_exhaustions_total.inc();
                }
                return Err(ProxyError::PoolExhausted);
            }
        };

        debug!(
            conn = info.id,
            client = %client.id,
            peer = %info.peer_addr,
            "assigned upstream client to inbound connection"
        );
        let envelope = self.connection_envelope(info, Some(&client));
        self.busy.lock().await.insert(info.id, client);
        self.registry.run(HookName::OnOpened, envelope).await;
        Ok(())
    }

    /// Release the client for `info`, firing `OnClosing` and `OnClosed`.
    ///
    /// Fixed mode and elastic-with-reuse refresh the client and return it
    /// to the pool; plain elastic mode closes it.
    pub async fn disconnect(&self, info: &InboundInfo) -> Result<(), ProxyError> {
        let envelope = self.connection_envelope(info, None);
        self.registry.run(HookName::OnClosing, envelope.clone()).await;

        let client = self.busy.lock().await.remove(&info.id);
        let Some(client) = client else {
            self.registry.run(HookName::OnClosed, envelope).await;
            return Err(ProxyError::ClientNotFound);
        };

        if !self.elastic || self.reuse_elastic_clients {
            match self.reconnect(client).await {
                Ok(fresh) => {
                    let id = fresh.id.clone();
                    if let Err(e) = self.available.put(id, fresh).await {
                        warn!(error = %e, "failed to return client to the pool");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to refresh released client");
                }
            }
        } else {
            let mut client = client;
            client.close().await;
            if let Some(metrics) = &self.metrics {
                metrics.client_connections.dec();
            }
        }

        self.registry.run(HookName::OnClosed, envelope).await;
        Ok(())
    }

    /// One request/response cycle through the four traffic hooks.
    ///
    /// Takes the bytes the server read from the inbound, runs
    /// `OnTrafficFromClient` and `OnTrafficToServer`, sends upstream,
    /// receives, runs `OnTrafficFromServer` and `OnTrafficToClient`, and
    /// writes the response back to the inbound.
    pub async fn pass_through<S>(
        &self,
        conn: &mut S,
        request: &[u8],
        info: &InboundInfo,
    ) -> Result<(), ProxyError>
    where
        S: AsyncWrite + Unpin + Send,
    {
        let mut client = self
            .busy
            .lock()
            .await
            .remove(&info.id)
            .ok_or(ProxyError::ClientNotFound)?;
        let _in_flight = InFlightGuard::enter(&self.in_flight);

        if let Some(metrics) = &self.metrics {
            metrics.bytes_from_clients_total.inc_by(request.len() as u64);
        }

        let mut request = request.to_vec();
        for hook in [HookName::OnTrafficFromClient, HookName::OnTrafficToServer] {
            let envelope = self.traffic_envelope(info, &client, "request", &request, "");
            let result = self.registry.run(hook, envelope).await;
            if let Some(rewritten) = result.get_bytes("request") {
                request = rewritten.to_vec();
            }
        }

        if let Err(e) = client.send(&request).await {
            warn!(conn = info.id, error = %e, "upstream write failed, reconnecting");
            return self.recover_upstream(conn, info, client).await;
        }

        let (size, response) = match client.receive().await {
            Ok((size, response)) => (size, response),
            Err(ClientError::UpstreamEof) => {
                warn!(conn = info.id, "upstream closed mid-request, reconnecting");
                return self.recover_upstream(conn, info, client).await;
            }
            Err(e) => {
                // Not a connection loss: surface the error through the
                // egress hooks with an empty payload.
                let error_text = e.to_string();
                let written = self
                    .write_response(conn, info, &client, Vec::new(), &error_text)
                    .await;
                self.busy.lock().await.insert(info.id, client);
                return written;
            }
        };

        let response = response[..size].to_vec();
        let written = self.write_response(conn, info, &client, response, "").await;
        if written.is_ok() {
            if let Some(metrics) = &self.metrics {
                metrics.passthroughs_total.inc();
            }
        }
        self.busy.lock().await.insert(info.id, client);
        written
    }

    /// Run the egress hooks and write the final response to the inbound.
    async fn write_response<S>(
        &self,
        conn: &mut S,
        info: &InboundInfo,
        client: &Client,
        mut response: Vec<u8>,
        error_text: &str,
    ) -> Result<(), ProxyError>
    where
        S: AsyncWrite + Unpin + Send,
    {
        for hook in [HookName::OnTrafficFromServer, HookName::OnTrafficToClient] {
            let envelope = self.traffic_envelope(info, client, "response", &response, error_text);
            let result = self.registry.run(hook, envelope).await;
            if let Some(rewritten) = result.get_bytes("response") {
                response = rewritten.to_vec();
            }
        }

        conn.write_all(&response).await.map_err(ProxyError::Inbound)?;
        if let Some(metrics) = &self.metrics {
            metrics.bytes_to_clients_total.inc_by(response.len() as u64);
        }
        Ok(())
    }

    /// Replace a lost upstream: reconnect, swap the busy entry, signal the
    /// inbound. The in-flight request is dropped.
    async fn recover_upstream<S>(
        &self,
        conn: &mut S,
        info: &InboundInfo,
        old: Client,
    ) -> Result<(), ProxyError>
    where
        S: AsyncWrite + Unpin + Send,
    {
        if let Some(metrics) = &self.metrics {
            metrics.upstream_reconnects_total.inc();
        }
        let fresh = self.reconnect(old).await?;
        debug!(conn = info.id, client = %fresh.id, "upstream reconnected");
        self.busy.lock().await.insert(info.id, fresh);
        let _ = conn.write_all(UPSTREAM_CLOSED_FRAME).await;
        Ok(())
    }

    /// Close the old client if it is still open and dial a fresh one from
    /// the same template.
    pub async fn reconnect(&self, mut old: Client) -> Result<Client, ProxyError> {
        if old.is_connected() {
            old.close().await;
        }
        Ok(Client::connect(&self.client_config).await?)
    }

    /// Stop accepting connects, close all busy clients, drain the pool.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let busy: Vec<(ConnId, Client)> = {
            let mut busy = self.busy.lock().await;
            busy.drain().collect()
        };
        for (conn, mut client) in busy {
            debug!(conn, client = %client.id, "closing busy client on shutdown");
            client.close().await;
        }
        self.available.shutdown().await;
    }

    fn traffic_envelope(
        &self,
        info: &InboundInfo,
        client: &Client,
        payload_key: &str,
        payload: &[u8],
        error_text: &str,
    ) -> Envelope {
        let mut envelope = self.connection_envelope(info, Some(client));
        envelope.insert(payload_key, payload);
        envelope.insert("error", error_text);
        envelope
    }

    pub(crate) fn connection_envelope(&self, info: &InboundInfo, client: Option<&Client>) -> Envelope {
        let mut client_map = BTreeMap::new();
        client_map.insert(
            "address".to_string(),
            FieldValue::Text(info.peer_addr.clone()),
        );
        if let Some(client) = client {
            client_map.insert("id".to_string(), FieldValue::Text(client.id.clone()));
        }

        let server_address = client
            .map(|c| c.address.clone())
            .unwrap_or_else(|| self.client_config.address.clone());
        let server_map = BTreeMap::from([(
            "address".to_string(),
            FieldValue::Text(server_address),
        )]);

        let mut envelope = Envelope::new();
        envelope.insert("client", FieldValue::Map(client_map));
        envelope.insert("server", FieldValue::Map(server_map));
        envelope.insert("error", "");
        envelope
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use plexgate_plugin::{LocalInvoker, Registry, RegistryOptions};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::postgres::{
        create_pg_startup_packet, create_postgresql_packet, scram_auth_request_body,
    };

    /// Echo upstream that answers every read with the same bytes.
    async fn spawn_echo_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        if socket.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        address
    }

    /// Upstream that answers any request with a fixed SCRAM auth packet.
    async fn spawn_pg_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        let reply =
                            create_postgresql_packet(b'R', &scram_auth_request_body());
                        if socket.write_all(&reply).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        address
    }

    fn client_config(address: &str) -> ClientConfig {
        ClientConfig {
            address: address.to_string(),
            retries: 0,
            dial_timeout_millis: 1_000,
            receive_deadline_millis: 2_000,
            ..ClientConfig::default()
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new(RegistryOptions::default()))
    }

    async fn fixed_proxy(address: &str, pool_size: usize, registry: Arc<Registry>) -> Proxy {
        let config = client_config(address);
        let pool = Pool::new(pool_size.max(1));
        for _ in 0..pool_size {
            let client = Client::connect(&config).await.unwrap();
            pool.put(client.id.clone(), client).await.unwrap();
        }
        Proxy::new(pool, registry, false, false, config)
    }

    fn info(id: ConnId) -> InboundInfo {
        InboundInfo {
            id,
            local_addr: "127.0.0.1:15432".to_string(),
            peer_addr: format!("127.0.0.1:4{id:04}"),
        }
    }

    #[tokio::test]
    async fn test_pass_through_forwards_bytes_verbatim_with_no_plugins() {
        let upstream = spawn_echo_upstream().await;
        let proxy = fixed_proxy(&upstream, 1, registry()).await;
        let info = info(1);
        proxy.connect(&info).await.unwrap();

        let (mut inbound, mut gateway_side) = tokio::io::duplex(8192);
        proxy
            .pass_through(&mut gateway_side, b"SELECT 1", &info)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = inbound.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"SELECT 1");
    }

    #[tokio::test]
    async fn test_identity_plugin_chain_is_byte_identical() {
        let upstream = spawn_echo_upstream().await;
        let registry = registry();
        for priority in [1_u32, 2, 3] {
            for hook in [
                HookName::OnTrafficFromClient,
                HookName::OnTrafficToServer,
                HookName::OnTrafficFromServer,
                HookName::OnTrafficToClient,
            ] {
                registry
                    .add_hook(
                        &format!("identity-{priority}"),
                        hook,
                        priority,
                        Arc::new(LocalInvoker::new(Ok)),
                    )
                    .await;
            }
        }
        let proxy = fixed_proxy(&upstream, 1, registry).await;
        let info = info(2);
        proxy.connect(&info).await.unwrap();

        let (mut inbound, mut gateway_side) = tokio::io::duplex(8192);
        proxy
            .pass_through(&mut gateway_side, b"payload bytes", &info)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = inbound.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"payload bytes");
    }

    #[tokio::test]
    async fn test_postgres_startup_envelope_reaches_hooks() {
        let upstream = spawn_pg_upstream().await;
        let registry = registry();
        let seen_request = Arc::new(StdMutex::new(None));
        let seen_clone = seen_request.clone();
        registry
            .add_hook(
                "observer",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(move |envelope| {
                    assert_eq!(envelope.get_text("error"), Some(""));
                    *seen_clone.lock().unwrap() =
                        envelope.get_bytes("request").map(|b| b.to_vec());
                    Ok(envelope)
                })),
            )
            .await;
        let seen_response = Arc::new(StdMutex::new(None));
        let seen_clone = seen_response.clone();
        registry
            .add_hook(
                "observer",
                HookName::OnTrafficFromServer,
                1,
                Arc::new(LocalInvoker::new(move |envelope| {
                    *seen_clone.lock().unwrap() =
                        envelope.get_bytes("response").map(|b| b.to_vec());
                    Ok(envelope)
                })),
            )
            .await;

        let proxy = fixed_proxy(&upstream, 1, registry).await;
        let info = info(3);
        proxy.connect(&info).await.unwrap();

        let (mut inbound, mut gateway_side) = tokio::io::duplex(8192);
        let startup = create_pg_startup_packet();
        proxy
            .pass_through(&mut gateway_side, &startup, &info)
            .await
            .unwrap();

        assert_eq!(seen_request.lock().unwrap().as_deref(), Some(startup.as_slice()));

        let expected = create_postgresql_packet(b'R', &scram_auth_request_body());
        assert_eq!(
            seen_response.lock().unwrap().as_deref(),
            Some(expected.as_slice())
        );

        let mut buf = [0u8; 64];
        let n = inbound.read(&mut buf).await.unwrap();
        assert_eq!(n, 24);
        assert_eq!(&buf[..n], expected.as_slice());
        assert_eq!(buf[0], 0x52);
    }

    #[tokio::test]
    async fn test_fixed_pool_exhaustion() {
        let upstream = spawn_echo_upstream().await;
        let proxy = fixed_proxy(&upstream, 2, registry()).await;

        proxy.connect(&info(1)).await.unwrap();
        proxy.connect(&info(2)).await.unwrap();
        let err = proxy.connect(&info(3)).await.unwrap_err();
        assert!(matches!(err, ProxyError::PoolExhausted));
        assert_eq!(proxy.busy_size().await, 2);
        assert_eq!(proxy.available_size().await, 0);
    }

    #[tokio::test]
    async fn test_upstream_eof_reconnects_with_new_id() {
        // Upstream reads the request, then slams the connection shut.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            // First connection: read and drop. Later connections are kept
            // open so the reconnect succeeds.
            let (mut first, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let _ = first.read(&mut buf).await;
            drop(first);
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                // Hold the socket open.
                tokio::spawn(async move {
                    let mut socket = socket;
                    let mut buf = [0u8; 256];
                    let _ = socket.read(&mut buf).await;
                });
            }
        });

        let proxy = fixed_proxy(&address, 1, registry()).await;
        let info = info(7);
        proxy.connect(&info).await.unwrap();
        let old_id = {
            let busy = proxy.busy.lock().await;
            busy.get(&info.id).unwrap().id.clone()
        };

        let (mut inbound, mut gateway_side) = tokio::io::duplex(8192);
        proxy
            .pass_through(&mut gateway_side, b"doomed request", &info)
            .await
            .unwrap();

        // The busy entry now points at a fresh client with a new id.
        let new_id = {
            let busy = proxy.busy.lock().await;
            busy.get(&info.id).unwrap().id.clone()
        };
        assert_ne!(old_id, new_id);

        // The inbound got the generic goodbye frame.
        let mut buf = [0u8; 64];
        let n = inbound.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], UPSTREAM_CLOSED_FRAME);
    }

    #[tokio::test]
    async fn test_disconnect_returns_refreshed_client_in_fixed_mode() {
        let upstream = spawn_echo_upstream().await;
        let proxy = fixed_proxy(&upstream, 1, registry()).await;
        let info = info(4);

        proxy.connect(&info).await.unwrap();
        assert_eq!(proxy.available_size().await, 0);
        assert_eq!(proxy.busy_size().await, 1);

        proxy.disconnect(&info).await.unwrap();
        assert_eq!(proxy.available_size().await, 1);
        assert_eq!(proxy.busy_size().await, 0);
    }

    #[tokio::test]
    async fn test_elastic_without_reuse_closes_released_clients() {
        let upstream = spawn_echo_upstream().await;
        let config = client_config(&upstream);
        let proxy = Proxy::new(Pool::new(1), registry(), true, false, config);
        let info = info(5);

        // Pool is empty; elastic mode dials on demand.
        proxy.connect(&info).await.unwrap();
        assert_eq!(proxy.busy_size().await, 1);

        proxy.disconnect(&info).await.unwrap();
        assert_eq!(proxy.busy_size().await, 0);
        assert_eq!(proxy.available_size().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_connections() {
        let upstream = spawn_echo_upstream().await;
        let proxy = fixed_proxy(&upstream, 1, registry()).await;
        proxy.shutdown().await;
        let err = proxy.connect(&info(9)).await.unwrap_err();
        assert!(matches!(err, ProxyError::Shutdown));
        assert_eq!(proxy.available_size().await, 0);
    }

    #[tokio::test]
    async fn test_sequential_reuse_of_a_single_client() {
        // Pool of one client survives many sequential connections.
        let upstream = spawn_echo_upstream().await;
        let proxy = fixed_proxy(&upstream, 1, registry()).await;

        for round in 0..100_u64 {
            let info = info(round);
            proxy.connect(&info).await.unwrap();
            proxy.disconnect(&info).await.unwrap();
        }
        assert_eq!(proxy.available_size().await, 1);
    }
}
