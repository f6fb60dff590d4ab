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

//! Gateway metrics and the plugin metrics merger for PlexGate
//!
//! [`GatewayMetrics`] owns the gateway's Prometheus registry and is passed
//! explicitly to every component that records. [`Merger`] scrapes plugin
//! metrics over unix sockets and publishes one merged blob, which
//! [`metrics_router`] serves together with the gateway's own series.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod gateway;
mod handler;
mod merge;
mod merger;

pub use gateway::GatewayMetrics;
pub use handler::metrics_router;
pub use merge::merge_metrics_text;
pub use merger::{Merger, MergerError};
