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

//! Generic retry with exponential backoff
//!
//! ## Purpose
//! Wraps upstream dial and receive with bounded re-attempts. `retries = 0`
//! means exactly one call and no sleeping. Backoff grows as
//! `backoff × multiplier^attempt`, capped per interval and in total unless
//! caps are disabled. The operation's own error is returned unchanged on
//! final failure.

use std::future::Future;
use std::time::Duration;

use plexgate_config::ClientConfig;
use tracing::debug;

/// Per-interval backoff cap.
pub const BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Cap on the total time spent sleeping across one retry sequence.
pub const BACKOFF_DURATION_CAP: Duration = Duration::from_secs(5 * 60);

/// Retry policy for a fallible async operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Retry {
    /// Re-attempts after the first call; zero disables retrying.
    pub retries: u32,
    /// Initial backoff interval.
    pub backoff: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Ignore [`BACKOFF_CAP`] and [`BACKOFF_DURATION_CAP`].
    pub disable_backoff_caps: bool,
}

impl Retry {
    /// Create a retry policy.
    pub fn new(
        retries: u32,
        backoff: Duration,
        backoff_multiplier: f64,
        disable_backoff_caps: bool,
    ) -> Self {
        Self {
            retries,
            backoff,
            backoff_multiplier,
            disable_backoff_caps,
        }
    }

    /// Derive the policy from a client template.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_millis),
            backoff_multiplier: config.backoff_multiplier,
            disable_backoff_caps: config.disable_backoff_caps,
        }
    }

    /// Run `operation`, re-attempting up to `retries` times.
    pub async fn retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut slept = Duration::ZERO;
        for attempt in 0..=self.retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt == self.retries {
                        return Err(error);
                    }
                    let mut delay = self.delay_for(attempt);
                    if !self.disable_backoff_caps {
                        let remaining = BACKOFF_DURATION_CAP.saturating_sub(slept);
                        delay = delay.min(remaining);
                    }
                    debug!(
                        attempt = attempt + 1,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed, backing off"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                        slept += delay;
                    }
                }
            }
        }
        unreachable!("the final attempt either returned or erred")
    }

    /// Backoff before re-attempt number `attempt + 1`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = (self.backoff.as_millis() as f64 * factor).max(0.0);
        // Saturate instead of overflowing for absurd multipliers.
        let delay = Duration::from_millis(millis.min(u64::MAX as f64) as u64);
        if self.disable_backoff_caps {
            delay
        } else {
            delay.min(BACKOFF_CAP)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_zero_retries_calls_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let retry = Retry::new(0, Duration::from_millis(1), 2.0, false);

        let result: Result<(), &str> = retry
            .retry(|| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "nope");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let retry = Retry::new(3, Duration::from_millis(1), 1.0, false);

        let result: Result<usize, &str> = retry
            .retry(|| {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_returned_unchanged_after_final_attempt() {
        let retry = Retry::new(2, Duration::from_millis(1), 1.0, false);
        let result: Result<(), String> = retry
            .retry(|| async { Err("the original error".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "the original error");
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = Retry::new(10, Duration::from_millis(500), 2.0, false);
        assert_eq!(retry.delay_for(0), Duration::from_millis(500));
        assert_eq!(retry.delay_for(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2000));
        // 4000ms capped at the 2s interval cap.
        assert_eq!(retry.delay_for(3), BACKOFF_CAP);
        assert_eq!(retry.delay_for(9), BACKOFF_CAP);
    }

    #[test]
    fn test_disabled_caps_grow_unbounded() {
        let retry = Retry::new(10, Duration::from_millis(500), 2.0, true);
        assert_eq!(retry.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_from_config_mirrors_client_knobs() {
        let config = ClientConfig {
            retries: 7,
            backoff_millis: 250,
            backoff_multiplier: 3.0,
            disable_backoff_caps: true,
            ..ClientConfig::default()
        };
        let retry = Retry::from_config(&config);
        assert_eq!(retry.retries, 7);
        assert_eq!(retry.backoff, Duration::from_millis(250));
        assert_eq!(retry.backoff_multiplier, 3.0);
        assert!(retry.disable_backoff_caps);
    }
}
