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

//! Hook invoker seam
//!
//! ## Purpose
//! An invoker is the callable registered per `(hook, priority)` slot. In
//! production it is a gRPC method on a plugin subprocess; in tests and
//! embeddings it can be any local function. The hook engine only sees the
//! [`HookInvoker`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use plexgate_proto::{Envelope, HookName, PluginServiceClient, Struct};
use thiserror::Error;
use tonic::transport::Channel;

/// Why a single hook invocation failed.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The per-plugin timeout elapsed.
    #[error("hook invocation timed out")]
    Timeout,

    /// The engine is shutting down; the in-flight call was abandoned.
    #[error("hook invocation was cancelled")]
    Cancelled,

    /// The RPC failed at the transport or application layer.
    #[error("hook transport error: {0}")]
    Transport(#[from] tonic::Status),

    /// The invoker cannot serve this hook.
    #[error("hook {0:?} is not supported by this invoker")]
    Unsupported(HookName),

    /// A local invoker refused the envelope.
    #[error("hook failed: {0}")]
    Failed(String),
}

/// A callable that transforms an envelope at one hook point.
#[async_trait]
pub trait HookInvoker: Send + Sync {
    /// Invoke the hook with `args`, returning the transformed envelope.
    async fn invoke(&self, hook: HookName, args: Envelope) -> Result<Envelope, InvokeError>;
}

/// Invoker backed by the gRPC channel of a loaded plugin.
///
/// Dispatches each [`HookName`] onto the matching `PluginService` method;
/// tonic clients clone cheaply, so each call clones the shared client.
#[derive(Clone)]
pub struct GrpcInvoker {
    client: PluginServiceClient<Channel>,
}

impl GrpcInvoker {
    /// Wrap an open plugin channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            client: PluginServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl HookInvoker for GrpcInvoker {
    async fn invoke(&self, hook: HookName, args: Envelope) -> Result<Envelope, InvokeError> {
        let mut client = self.client.clone();
        let request = Struct::from(args);
        let response = match hook {
            HookName::OnConfigLoaded => client.on_config_loaded(request).await?,
            HookName::OnNewLogger => client.on_new_logger(request).await?,
            HookName::OnNewPool => client.on_new_pool(request).await?,
            HookName::OnNewProxy => client.on_new_proxy(request).await?,
            HookName::OnNewServer => client.on_new_server(request).await?,
            HookName::OnSignal => client.on_signal(request).await?,
            HookName::OnRun => client.on_run(request).await?,
            HookName::OnBooting => client.on_booting(request).await?,
            HookName::OnBooted => client.on_booted(request).await?,
            HookName::OnOpening => client.on_opening(request).await?,
            HookName::OnOpened => client.on_opened(request).await?,
            HookName::OnClosing => client.on_closing(request).await?,
            HookName::OnClosed => client.on_closed(request).await?,
            HookName::OnTraffic => client.on_traffic(request).await?,
            HookName::OnTrafficFromClient => client.on_traffic_from_client(request).await?,
            HookName::OnTrafficToServer => client.on_traffic_to_server(request).await?,
            HookName::OnTrafficFromServer => client.on_traffic_from_server(request).await?,
            HookName::OnTrafficToClient => client.on_traffic_to_client(request).await?,
            HookName::OnShutdown => client.on_shutdown(request).await?,
            HookName::OnTick => client.on_tick(request).await?,
            HookName::OnNewClient => client.on_new_client(request).await?,
            HookName::Unspecified => return Err(InvokeError::Unsupported(hook)),
        };
        Ok(Envelope::from(response.into_inner()))
    }
}

/// Invoker backed by a local function.
///
/// Used by in-process hooks in tests and by embedders that do not need a
/// subprocess round-trip.
#[derive(Clone)]
pub struct LocalInvoker {
    callback: Arc<dyn Fn(Envelope) -> Result<Envelope, InvokeError> + Send + Sync>,
}

impl LocalInvoker {
    /// Wrap a function as an invoker.
    pub fn new(
        callback: impl Fn(Envelope) -> Result<Envelope, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl HookInvoker for LocalInvoker {
    async fn invoke(&self, _hook: HookName, args: Envelope) -> Result<Envelope, InvokeError> {
        (self.callback)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_invoker_passes_envelope_through() {
        let invoker = LocalInvoker::new(|mut envelope| {
            envelope.insert("error", "seen");
            Ok(envelope)
        });

        let mut args = Envelope::new();
        args.insert("error", "");
        let result = invoker.invoke(HookName::OnTraffic, args).await.unwrap();
        assert_eq!(result.get_text("error"), Some("seen"));
    }
}
