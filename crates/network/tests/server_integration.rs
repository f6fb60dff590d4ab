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

//! End-to-end server tests: a full accept → hooks → upstream → response
//! cycle against a mock PostgreSQL upstream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plexgate_config::{ClientConfig, ServerConfig};
use plexgate_network::postgres::{
    create_pg_startup_packet, create_postgresql_packet, scram_auth_request_body,
};
use plexgate_network::{Client, Proxy, Server};
use plexgate_plugin::{HookInvoker, LocalInvoker, Registry, RegistryOptions};
use plexgate_pool::Pool;
use plexgate_proto::HookName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Mock upstream that answers every request with the SASL auth packet.
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
                    let reply = create_postgresql_packet(b'R', &scram_auth_request_body());
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

fn server_config() -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        tick_interval_millis: 100,
        shutdown_grace_millis: 1_000,
        ..ServerConfig::default()
    }
}

async fn build_proxy(
    upstream: &str,
    pool_size: usize,
    registry: Arc<Registry>,
) -> Arc<Proxy> {
    let config = client_config(upstream);
    let pool = Pool::new(pool_size);
    for _ in 0..pool_size {
        let client = Client::connect(&config).await.unwrap();
        pool.put(client.id.clone(), client).await.unwrap();
    }
    Arc::new(Proxy::new(pool, registry, false, false, config))
}

async fn start_server(server: Arc<Server>) -> std::net::SocketAddr {
    let runner = server.clone();
    tokio::spawn(async move { runner.run().await });
    for _ in 0..200 {
        if server.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(server.is_running(), "server never started");
    server.local_addr().expect("bound address")
}

#[tokio::test]
async fn test_full_round_trip_with_traffic_hooks() {
    let upstream = spawn_pg_upstream().await;
    let registry = Arc::new(Registry::new(RegistryOptions::default()));

    let startup = create_pg_startup_packet();
    let expected_reply = create_postgresql_packet(b'R', &scram_auth_request_body());

    // Observers on all four traffic hook points, mirroring what a real
    // plugin would see.
    let ingress_seen = Arc::new(Mutex::new(Vec::new()));
    for hook in [HookName::OnTrafficFromClient, HookName::OnTrafficToServer] {
        let expected = startup.clone();
        let seen = ingress_seen.clone();
        let invoker: Arc<dyn HookInvoker> = Arc::new(LocalInvoker::new(move |envelope| {
            assert_eq!(envelope.get_text("error"), Some(""), "error must be empty");
            let request = envelope.get_bytes("request").expect("request is bytes");
            assert_eq!(request, expected.as_slice());
            seen.lock().unwrap().push(hook);
            Ok(envelope)
        }));
        registry.add_hook("observer", hook, 1, invoker).await;
    }
    let egress_seen = Arc::new(Mutex::new(Vec::new()));
    for hook in [HookName::OnTrafficFromServer, HookName::OnTrafficToClient] {
        let expected = expected_reply.clone();
        let seen = egress_seen.clone();
        let invoker: Arc<dyn HookInvoker> = Arc::new(LocalInvoker::new(move |envelope| {
            assert_eq!(envelope.get_text("error"), Some(""));
            let response = envelope.get_bytes("response").expect("response is bytes");
            assert_eq!(response, expected.as_slice());
            seen.lock().unwrap().push(hook);
            Ok(envelope)
        }));
        registry.add_hook("observer", hook, 1, invoker).await;
    }

    let proxy = build_proxy(&upstream, 3, registry).await;
    let server = Arc::new(Server::new(server_config(), proxy.clone()).unwrap());
    let address = start_server(server.clone()).await;

    let mut conn = TcpStream::connect(address).await.unwrap();
    conn.write_all(&startup).await.unwrap();

    let mut buf = [0u8; 64];
    let n = conn.read(&mut buf).await.unwrap();

    // The inbound receives the exact 24-byte R-typed packet.
    assert_eq!(n, 24);
    assert_eq!(buf[0], 0x52);
    let packet_size =
        (buf[1] as usize) << 24 | (buf[2] as usize) << 16 | (buf[3] as usize) << 8 | buf[4] as usize;
    assert_eq!(packet_size, 23);
    assert_eq!(&buf[..n], expected_reply.as_slice());

    // One client is assigned, two remain pooled.
    assert_eq!(proxy.available_size().await, 2);
    assert_eq!(proxy.busy_size().await, 1);

    // All four hook points fired, in order.
    assert_eq!(
        *ingress_seen.lock().unwrap(),
        vec![HookName::OnTrafficFromClient, HookName::OnTrafficToServer]
    );
    assert_eq!(
        *egress_seen.lock().unwrap(),
        vec![HookName::OnTrafficFromServer, HookName::OnTrafficToClient]
    );

    // Closing the inbound returns a refreshed client to the pool.
    drop(conn);
    for _ in 0..200 {
        if proxy.busy_size().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(proxy.busy_size().await, 0);
    assert_eq!(proxy.available_size().await, 3);

    server.shutdown().await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_third_concurrent_connection_is_refused_on_fixed_pool() {
    let upstream = spawn_pg_upstream().await;
    let registry = Arc::new(Registry::new(RegistryOptions::default()));
    let proxy = build_proxy(&upstream, 2, registry).await;
    let server = Arc::new(Server::new(server_config(), proxy.clone()).unwrap());
    let address = start_server(server.clone()).await;

    // Two connections exchange traffic and hold their clients.
    let mut first = TcpStream::connect(address).await.unwrap();
    first.write_all(b"q1").await.unwrap();
    let mut buf = [0u8; 64];
    assert!(first.read(&mut buf).await.unwrap() > 0);

    let mut second = TcpStream::connect(address).await.unwrap();
    second.write_all(b"q2").await.unwrap();
    assert!(second.read(&mut buf).await.unwrap() > 0);

    assert_eq!(proxy.busy_size().await, 2);
    assert_eq!(proxy.available_size().await, 0);

    // The third is closed by the server: the pool is exhausted.
    let mut third = TcpStream::connect(address).await.unwrap();
    let n = tokio::time::timeout(Duration::from_secs(2), third.read(&mut buf))
        .await
        .expect("server should close the connection")
        .unwrap();
    assert_eq!(n, 0, "third connection must be closed without data");

    server.shutdown().await;
}

#[tokio::test]
async fn test_sequential_connections_never_fail_on_pool_of_one() {
    let upstream = spawn_pg_upstream().await;
    let registry = Arc::new(Registry::new(RegistryOptions::default()));
    let proxy = build_proxy(&upstream, 1, registry).await;
    let server = Arc::new(Server::new(server_config(), proxy.clone()).unwrap());
    let address = start_server(server.clone()).await;

    for round in 0..20 {
        let mut conn = TcpStream::connect(address).await.unwrap();
        conn.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).await.unwrap();
        assert!(n > 0, "round {round} got no response");
        drop(conn);
        // Wait for the server to release the client back to the pool.
        for _ in 0..200 {
            if proxy.available_size().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(proxy.available_size().await, 1, "round {round}");
    }

    server.shutdown().await;
}
