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

//! Keyed pool of idle upstream clients
//!
//! ## Purpose
//! A thread-safe, bounded container holding at most `capacity` items by id.
//! An item is either in the pool or assigned to exactly one inbound
//! connection, never both.
//!
//! ## Design Notes
//! - Items live in a `BTreeMap`, so [`Pool::pop_any`] extracts in stable
//!   (smallest-id-first) order, which keeps tests deterministic.
//! - Shutdown flips an atomic flag before draining, so late `put`s race
//!   safely: they are rejected rather than leaked.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// An item the pool can hold and close on shutdown.
#[async_trait]
pub trait Poolable: Send + Sync {
    /// Release the underlying resource. Must be idempotent.
    async fn close(&mut self);
}

/// Pool operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// An item with this id is already pooled.
    #[error("client {id} is already in the pool")]
    DuplicateClient {
        /// Offending id.
        id: String,
    },

    /// The pool already holds `capacity` items.
    #[error("pool is at capacity ({capacity})")]
    CapacityExceeded {
        /// Configured capacity.
        capacity: usize,
    },

    /// The pool has been shut down; no further inserts are accepted.
    #[error("pool has been shut down")]
    Shutdown,
}

/// Bounded keyed container of idle items.
pub struct Pool<T: Poolable> {
    items: RwLock<BTreeMap<String, T>>,
    capacity: usize,
    shutdown: AtomicBool,
}

impl<T: Poolable> Pool<T> {
    /// Create an empty pool with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            capacity,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Insert an item under `id`.
    ///
    /// ## Errors
    /// - [`PoolError::Shutdown`] after [`Pool::shutdown`]
    /// - [`PoolError::DuplicateClient`] when `id` is already present
    /// - [`PoolError::CapacityExceeded`] when the pool is full
    pub async fn put(&self, id: impl Into<String>, item: T) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::Shutdown);
        }
        let id = id.into();
        let mut items = self.items.write().await;
        if items.contains_key(&id) {
            return Err(PoolError::DuplicateClient { id });
        }
        if items.len() >= self.capacity {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        items.insert(id, item);
        Ok(())
    }

    /// Extract the item stored under `id`, if any.
    pub async fn pop(&self, id: &str) -> Option<T> {
        self.items.write().await.remove(id)
    }

    /// Extract one item, smallest id first. `None` when empty or shut down.
    pub async fn pop_any(&self) -> Option<(String, T)> {
        let mut items = self.items.write().await;
        let id = items.keys().next().cloned()?;
        let item = items.remove(&id)?;
        Some((id, item))
    }

    /// Number of items currently pooled.
    pub async fn size(&self) -> usize {
        self.items.read().await.len()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the pool holds no items.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Ids of all pooled items in stable order.
    pub async fn ids(&self) -> Vec<String> {
        self.items.read().await.keys().cloned().collect()
    }

    /// Whether [`Pool::shutdown`] has run.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Transition to the terminal state and close every held item.
    ///
    /// Each item is closed exactly once; calling this twice is a no-op, and
    /// subsequent pops return `None`.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<(String, T)> = {
            let mut items = self.items.write().await;
            std::mem::take(&mut *items).into_iter().collect()
        };
        for (id, mut item) in drained {
            debug!(id = %id, "closing pooled client on shutdown");
            item.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    struct FakeClient {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Poolable for FakeClient {
        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fake(closes: &Arc<AtomicUsize>) -> FakeClient {
        FakeClient {
            closes: closes.clone(),
        }
    }

    #[tokio::test]
    async fn test_put_pop_round_trip() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(4);
        pool.put("a", fake(&closes)).await.unwrap();
        pool.put("b", fake(&closes)).await.unwrap();
        assert_eq!(pool.size().await, 2);

        assert!(pool.pop("a").await.is_some());
        assert!(pool.pop("a").await.is_none());
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn test_pop_any_is_deterministic() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(4);
        pool.put("zed", fake(&closes)).await.unwrap();
        pool.put("alpha", fake(&closes)).await.unwrap();

        let (id, _) = pool.pop_any().await.unwrap();
        assert_eq!(id, "alpha");
        let (id, _) = pool.pop_any().await.unwrap();
        assert_eq!(id, "zed");
        assert!(pool.pop_any().await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_put_rejected() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(4);
        pool.put("a", fake(&closes)).await.unwrap();
        let err = pool.put("a", fake(&closes)).await.unwrap_err();
        assert_eq!(
            err,
            PoolError::DuplicateClient {
                id: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(1);
        pool.put("a", fake(&closes)).await.unwrap();
        let err = pool.put("b", fake(&closes)).await.unwrap_err();
        assert_eq!(err, PoolError::CapacityExceeded { capacity: 1 });
    }

    #[tokio::test]
    async fn test_shutdown_closes_each_item_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(4);
        pool.put("a", fake(&closes)).await.unwrap();
        pool.put("b", fake(&closes)).await.unwrap();

        pool.shutdown().await;
        assert_eq!(closes.load(Ordering::SeqCst), 2);

        // Second shutdown is a no-op.
        pool.shutdown().await;
        assert_eq!(closes.load(Ordering::SeqCst), 2);

        // Terminal state: no pops, no puts.
        assert!(pool.pop_any().await.is_none());
        assert_eq!(
            pool.put("c", fake(&closes)).await.unwrap_err(),
            PoolError::Shutdown
        );
    }
}
