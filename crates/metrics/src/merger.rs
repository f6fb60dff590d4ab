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

//! # Plugin metrics merger
//!
//! ## Purpose
//! Periodically scrapes each plugin's metrics endpoint over its unix
//! domain socket, merges the text blobs, and publishes the result to an
//! in-memory slot the HTTP handler reads.
//!
//! ## Design Notes
//! - Scrapes run concurrently per round; a failing plugin is logged and
//!   omitted from that round only.
//! - The request is HTTP/1.0, so exporters reply unchunked and close the
//!   connection, which keeps the response framing trivial.
//! - The scheduler is a watch-signalled tokio task, stopped by
//!   [`Merger::stop`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::merge::merge_metrics_text;

/// Scrape errors for a single plugin socket.
#[derive(Debug, Error)]
pub enum MergerError {
    /// Could not reach the plugin socket.
    #[error("failed to connect to metrics socket {path}: {source}")]
    Connect {
        /// Socket path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The request or response transfer failed.
    #[error("metrics request failed: {0}")]
    Request(#[from] std::io::Error),

    /// The endpoint answered with something other than a 200 text body.
    #[error("unexpected metrics response: {0}")]
    BadResponse(String),
}

/// Periodic scraper/merger of plugin metrics.
pub struct Merger {
    sockets: Arc<RwLock<BTreeMap<String, PathBuf>>>,
    period: Duration,
    output: Arc<RwLock<Vec<u8>>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Merger {
    /// Create a merger scraping every `period`.
    pub fn new(period: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            sockets: Arc::new(RwLock::new(BTreeMap::new())),
            period,
            output: Arc::new(RwLock::new(Vec::new())),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Register a plugin's metrics socket.
    pub async fn add(&self, plugin: impl Into<String>, socket_path: impl Into<PathBuf>) {
        self.sockets
            .write()
            .await
            .insert(plugin.into(), socket_path.into());
    }

    /// Discard a plugin's socket; its series stop appearing next round.
    pub async fn remove(&self, plugin: &str) {
        self.sockets.write().await.remove(plugin);
    }

    /// Handle to the published blob, shared with the HTTP handler.
    pub fn output(&self) -> Arc<RwLock<Vec<u8>>> {
        self.output.clone()
    }

    /// Current merged blob.
    pub async fn read_output(&self) -> Vec<u8> {
        self.output.read().await.clone()
    }

    /// Start the scrape scheduler.
    pub async fn start(&self) {
        let sockets = self.sockets.clone();
        let output = self.output.clone();
        let period = self.period;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot: Vec<(String, PathBuf)> = sockets
                            .read()
                            .await
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        let merged = scrape_round(&snapshot).await;
                        *output.write().await = merged.into_bytes();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("metrics merger stopped");
        });

        *self.task.lock().await = Some(handle);
    }

    /// Stop the scheduler and wait for it to exit.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// One scrape+merge round, usable without the scheduler (tests, warmup).
    pub async fn merge_once(&self) -> Vec<u8> {
        let snapshot: Vec<(String, PathBuf)> = self
            .sockets
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let merged = scrape_round(&snapshot).await;
        let bytes = merged.into_bytes();
        *self.output.write().await = bytes.clone();
        bytes
    }
}

/// Scrape every socket concurrently; failures are logged and omitted.
async fn scrape_round(sockets: &[(String, PathBuf)]) -> String {
    let scrapes = sockets.iter().map(|(plugin, path)| async move {
        match scrape_socket(path).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(plugin = %plugin, error = %e, "skipping plugin metrics this round");
                None
            }
        }
    });
    let bodies: Vec<String> = futures::future::join_all(scrapes)
        .await
        .into_iter()
        .flatten()
        .collect();
    merge_metrics_text(&bodies)
}

/// GET the metrics document over a unix socket.
async fn scrape_socket(path: &PathBuf) -> Result<String, MergerError> {
    let mut stream = UnixStream::connect(path)
        .await
        .map_err(|e| MergerError::Connect {
            path: path.display().to_string(),
            source: e,
        })?;

    stream
        .write_all(b"GET /metrics HTTP/1.0\r\nHost: plugin\r\n\r\n")
        .await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    let response = String::from_utf8_lossy(&response).into_owned();

    let Some((head, body)) = response.split_once("\r\n\r\n") else {
        return Err(MergerError::BadResponse(
            "missing header/body separator".to_string(),
        ));
    };
    let status_line = head.lines().next().unwrap_or_default();
    if !status_line.contains(" 200") {
        return Err(MergerError::BadResponse(status_line.to_string()));
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use tokio::net::UnixListener;

    use super::*;

    async fn serve_metrics(path: PathBuf, body: &'static str) {
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\n{body}"
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
    }

    #[tokio::test]
    async fn test_scrape_and_merge_two_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let sock_a = dir.path().join("a.sock");
        let sock_b = dir.path().join("b.sock");
        serve_metrics(
            sock_a.clone(),
            "# TYPE requests_total counter\nrequests_total 2\n",
        )
        .await;
        serve_metrics(
            sock_b.clone(),
            "# TYPE requests_total counter\nrequests_total 3\n",
        )
        .await;

        let merger = Merger::new(Duration::from_secs(60));
        merger.add("a", sock_a).await;
        merger.add("b", sock_b).await;

        let merged = String::from_utf8(merger.merge_once().await).unwrap();
        assert!(merged.contains("requests_total 5"));
    }

    #[tokio::test]
    async fn test_failed_scrape_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let sock_ok = dir.path().join("ok.sock");
        serve_metrics(sock_ok.clone(), "up 1\n").await;

        let merger = Merger::new(Duration::from_secs(60));
        merger.add("ok", sock_ok).await;
        merger.add("gone", dir.path().join("missing.sock")).await;

        let merged = String::from_utf8(merger.merge_once().await).unwrap();
        assert!(merged.contains("up 1"));
    }

    #[tokio::test]
    async fn test_removed_plugin_stops_contributing() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("p.sock");
        serve_metrics(sock.clone(), "up 1\n").await;

        let merger = Merger::new(Duration::from_secs(60));
        merger.add("p", sock).await;
        assert!(!merger.merge_once().await.is_empty());

        merger.remove("p").await;
        assert!(merger.merge_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_start_stop() {
        let merger = Merger::new(Duration::from_millis(10));
        merger.start().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        merger.stop().await;
    }
}
