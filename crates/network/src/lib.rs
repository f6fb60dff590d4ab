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

//! Networking data path for PlexGate
//!
//! The upstream [`Client`], the [`Retry`] wrapper it dials with, the
//! [`Proxy`] that brokers clients for inbound connections, and the
//! [`Server`] that accepts them and dispatches [`EventHandler`]
//! callbacks.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
pub mod postgres;
mod proxy;
mod retry;
mod server;

pub use client::{Client, ClientError};
pub use proxy::{ConnId, InboundInfo, Proxy, ProxyError, UPSTREAM_CLOSED_FRAME};
pub use retry::{Retry, BACKOFF_CAP, BACKOFF_DURATION_CAP};
pub use server::{Conn, EventHandler, Server, ServerError};
