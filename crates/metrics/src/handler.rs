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

//! HTTP handler serving the merged metrics blob
//!
//! The router appends the gateway's own encoded registry to whatever the
//! merger last published, so one scrape covers core and plugins alike.

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;

use crate::gateway::GatewayMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Build the metrics router for the given path (usually `/metrics`).
pub fn metrics_router(
    path: &str,
    merged: Arc<RwLock<Vec<u8>>>,
    gateway: Arc<GatewayMetrics>,
) -> Router {
    Router::new().route(
        path,
        get(move || {
            let merged = merged.clone();
            let gateway = gateway.clone();
            async move {
                let mut body = merged.read().await.clone();
                match gateway.encode() {
                    Ok(own) => body.extend_from_slice(own.as_bytes()),
                    Err(e) => tracing::error!(error = %e, "failed to encode gateway metrics"),
                }
                ([(CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_handler_serves_merged_and_gateway_metrics() {
        let gateway = Arc::new(GatewayMetrics::new().unwrap());
        gateway.passthroughs_total.inc();
        let merged = Arc::new(RwLock::new(b"plugin_up 1\n".to_vec()));

        let router = metrics_router("/metrics", merged, gateway);
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("plugin_up 1"));
        assert!(text.contains("plexgate_passthroughs_total 1"));
    }
}
