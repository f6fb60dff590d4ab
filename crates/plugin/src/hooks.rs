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

//! # Hook table and invocation engine
//!
//! ## Purpose
//! Indexes registered invokers by `(hook, priority)` and runs them in
//! ascending priority order, threading the envelope through mutating hooks
//! and applying the verification/termination policies to misbehaving ones.
//!
//! ## Invariants
//! - An in-flight run observes a stable snapshot of the table; concurrent
//!   registration or removal affects later runs only.
//! - A result is accepted only when its keys are a subset of the input
//!   keys (the reserved `terminate` field excluded).
//! - No lock is held across a plugin invocation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use plexgate_config::{AcceptancePolicy, TerminationPolicy, VerificationPolicy};
use plexgate_metrics::GatewayMetrics;
use plexgate_proto::{Envelope, HookName};
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use crate::invoker::{HookInvoker, InvokeError};

/// Reserved envelope field a hook sets to stop the remaining chain.
///
/// The engine consumes it: it is stripped before verification and never
/// passed downstream.
pub const TERMINATE_FIELD: &str = "terminate";

struct RegisteredHook {
    plugin: String,
    invoker: Arc<dyn HookInvoker>,
}

/// Priority-indexed hook table plus the invocation engine.
pub struct HookEngine {
    hooks: RwLock<HashMap<HookName, BTreeMap<u32, RegisteredHook>>>,
    verification: VerificationPolicy,
    termination: TerminationPolicy,
    acceptance: AcceptancePolicy,
    timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl HookEngine {
    /// Create an engine with the given policies and per-plugin timeout.
    pub fn new(
        verification: VerificationPolicy,
        termination: TerminationPolicy,
        acceptance: AcceptancePolicy,
        timeout: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            hooks: RwLock::new(HashMap::new()),
            verification,
            termination,
            acceptance,
            timeout,
            shutdown_tx,
            metrics: None,
        }
    }

    /// Attach gateway metrics for per-hook counters.
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cancel every in-flight and future invocation.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Register `invoker` at `(hook, priority)` on behalf of `plugin`.
    ///
    /// A slot occupied by another plugin is refused under
    /// [`AcceptancePolicy::Reject`] and overwritten under `Accept`; either
    /// way the collision is logged. Returns whether the hook was inserted.
    pub async fn add_hook(
        &self,
        plugin: &str,
        hook: HookName,
        priority: u32,
        invoker: Arc<dyn HookInvoker>,
    ) -> bool {
        let mut hooks = self.hooks.write().await;
        let slots = hooks.entry(hook).or_default();
        if let Some(existing) = slots.get(&priority) {
            if existing.plugin != plugin {
                match self.acceptance {
                    AcceptancePolicy::Reject => {
                        warn!(
                            hook = hook.as_str_name(),
                            priority,
                            holder = %existing.plugin,
                            candidate = %plugin,
                            "hook slot already taken, rejecting registration"
                        );
                        return false;
                    }
                    AcceptancePolicy::Accept => {
                        warn!(
                            hook = hook.as_str_name(),
                            priority,
                            evicted = %existing.plugin,
                            candidate = %plugin,
                            "hook slot already taken, overwriting"
                        );
                    }
                }
            }
        }
        slots.insert(
            priority,
            RegisteredHook {
                plugin: plugin.to_string(),
                invoker,
            },
        );
        true
    }

    /// Drop every hook registered by `plugin`.
    pub async fn remove_plugin_hooks(&self, plugin: &str) {
        let mut hooks = self.hooks.write().await;
        for slots in hooks.values_mut() {
            slots.retain(|_, registered| registered.plugin != plugin);
        }
        hooks.retain(|_, slots| !slots.is_empty());
    }

    /// Priorities currently registered for `hook`, ascending.
    pub async fn registered_priorities(&self, hook: HookName) -> Vec<u32> {
        self.hooks
            .read()
            .await
            .get(&hook)
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Run every invoker registered for `hook` in priority order.
    ///
    /// Implements the policy algorithm: the result of each verified hook
    /// becomes the input of the next; a result introducing keys absent
    /// from the original `args` fails verification and is handled per
    /// [`VerificationPolicy`]. Timeouts and transport errors count as
    /// verification failures, except that cancellation never triggers
    /// `Remove`. An empty hook set returns `args` unchanged.
    ///
    /// ## Panics
    /// A verification failure on `OnConfigLoaded` panics: it runs before
    /// the logger exists and a misbehaving plugin there must abort startup.
    pub async fn run(&self, hook: HookName, args: Envelope) -> Envelope {
        let snapshot: Vec<(u32, String, Arc<dyn HookInvoker>)> = {
            let hooks = self.hooks.read().await;
            hooks
                .get(&hook)
                .map(|slots| {
                    slots
                        .iter()
                        .map(|(p, h)| (*p, h.plugin.clone(), h.invoker.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut acc = args.clone();
        let mut remove_list: Vec<u32> = Vec::new();

        for (idx, (priority, plugin, invoker)) in snapshot.iter().enumerate() {
            if let Some(metrics) = &self.metrics {
                metrics
                    .hook_runs_total
                    .with_label_values(&[hook.as_str_name()])
                    .inc();
            }

            match self.invoke_bounded(invoker.as_ref(), hook, acc.clone()).await {
                Ok(mut result) => {
                    let terminate = result.get_bool(TERMINATE_FIELD).unwrap_or(false);
                    result.remove(TERMINATE_FIELD);

                    if verify(&args, &result) {
                        acc = result;
                        if terminate && self.termination == TerminationPolicy::Stop {
                            debug!(
                                hook = hook.as_str_name(),
                                priority, plugin = %plugin,
                                "hook requested termination, stopping chain"
                            );
                            break;
                        }
                        continue;
                    }

                    self.count_failure(hook);
                    if hook == HookName::OnConfigLoaded {
                        // No logger is available this early in startup.
                        panic!(
                            "hook {} (priority {priority}) returned an invalid envelope",
                            hook.as_str_name()
                        );
                    }
                    warn!(
                        hook = hook.as_str_name(),
                        priority, plugin = %plugin,
                        policy = %self.verification,
                        "hook returned an invalid envelope"
                    );
                    match self.verification {
                        VerificationPolicy::PassDown => {}
                        VerificationPolicy::Ignore => {
                            if idx == 0 {
                                acc = args.clone();
                            }
                        }
                        VerificationPolicy::Abort => {
                            return if idx == 0 { args } else { acc };
                        }
                        VerificationPolicy::Remove => {
                            remove_list.push(*priority);
                            if idx == 0 {
                                acc = args.clone();
                            }
                        }
                    }
                }
                Err(error) => {
                    self.count_failure(hook);
                    warn!(
                        hook = hook.as_str_name(),
                        priority, plugin = %plugin, error = %error,
                        policy = %self.verification,
                        "hook invocation failed"
                    );
                    let cancelled = matches!(error, InvokeError::Cancelled);
                    match self.verification {
                        VerificationPolicy::PassDown => {}
                        VerificationPolicy::Ignore => {
                            if idx == 0 {
                                acc = args.clone();
                            }
                        }
                        VerificationPolicy::Abort => {
                            return if idx == 0 { args } else { acc };
                        }
                        VerificationPolicy::Remove => {
                            // Cancellation is not plugin misbehavior.
                            if !cancelled {
                                remove_list.push(*priority);
                            }
                            if idx == 0 {
                                acc = args.clone();
                            }
                        }
                    }
                }
            }
        }

        if !remove_list.is_empty() {
            let mut hooks = self.hooks.write().await;
            if let Some(slots) = hooks.get_mut(&hook) {
                for priority in &remove_list {
                    slots.remove(priority);
                }
                if slots.is_empty() {
                    hooks.remove(&hook);
                }
            }
        }

        acc
    }

    async fn invoke_bounded(
        &self,
        invoker: &dyn HookInvoker,
        hook: HookName,
        args: Envelope,
    ) -> Result<Envelope, InvokeError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return Err(InvokeError::Cancelled);
        }
        tokio::select! {
            result = tokio::time::timeout(self.timeout, invoker.invoke(hook, args)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(InvokeError::Timeout),
                }
            }
            _ = shutdown_rx.changed() => Err(InvokeError::Cancelled),
        }
    }

    fn count_failure(&self, hook: HookName) {
        if let Some(metrics) = &self.metrics {
            metrics
                .hook_failures_total
                .with_label_values(&[hook.as_str_name()])
                .inc();
        }
    }
}

/// A result is valid when every key it carries already existed in `args`.
fn verify(args: &Envelope, result: &Envelope) -> bool {
    result.keys().all(|key| args.contains_key(key))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use plexgate_proto::FieldValue;

    use super::*;
    use crate::invoker::LocalInvoker;

    fn engine(verification: VerificationPolicy) -> HookEngine {
        HookEngine::new(
            verification,
            TerminationPolicy::Stop,
            AcceptancePolicy::Accept,
            Duration::from_secs(1),
        )
    }

    fn args() -> Envelope {
        let mut envelope = Envelope::new();
        envelope.insert("request", b"x".as_slice());
        envelope.insert("error", "");
        envelope
    }

    fn identity() -> Arc<dyn HookInvoker> {
        Arc::new(LocalInvoker::new(Ok))
    }

    #[tokio::test]
    async fn test_empty_hook_set_returns_input_unchanged() {
        let engine = engine(VerificationPolicy::PassDown);
        let input = args();
        let output = engine.run(HookName::OnTraffic, input.clone()).await;
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_hooks_run_in_priority_order() {
        let engine = engine(VerificationPolicy::PassDown);
        let order = Arc::new(Mutex::new(Vec::new()));
        for priority in [30_u32, 10, 20] {
            let order = order.clone();
            engine
                .add_hook(
                    &format!("p{priority}"),
                    HookName::OnTraffic,
                    priority,
                    Arc::new(LocalInvoker::new(move |envelope| {
                        order.lock().unwrap().push(priority);
                        Ok(envelope)
                    })),
                )
                .await;
        }

        engine.run(HookName::OnTraffic, args()).await;
        assert_eq!(*order.lock().unwrap(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_verified_result_feeds_next_hook() {
        let engine = engine(VerificationPolicy::PassDown);
        engine
            .add_hook(
                "rewriter",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("request", b"rewritten".as_slice());
                    Ok(envelope)
                })),
            )
            .await;
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        engine
            .add_hook(
                "observer",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(move |envelope| {
                    *seen_clone.lock().unwrap() =
                        envelope.get_bytes("request").map(|b| b.to_vec());
                    Ok(envelope)
                })),
            )
            .await;

        let output = engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(output.get_bytes("request"), Some(b"rewritten".as_slice()));
        assert_eq!(seen.lock().unwrap().as_deref(), Some(b"rewritten".as_slice()));
    }

    #[tokio::test]
    async fn test_verify_ignore_passes_original_args_downstream() {
        let engine = engine(VerificationPolicy::Ignore);
        engine
            .add_hook(
                "bad",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("extra", 1_i64);
                    Ok(envelope)
                })),
            )
            .await;
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        engine
            .add_hook(
                "good",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(move |envelope| {
                    *seen_clone.lock().unwrap() = Some(envelope.clone());
                    Ok(envelope)
                })),
            )
            .await;

        let input = args();
        let output = engine.run(HookName::OnTrafficFromClient, input.clone()).await;
        // The second hook saw the original args, not the invalid result.
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&input));
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_verify_remove_unregisters_offender() {
        let engine = engine(VerificationPolicy::Remove);
        let bad_calls = Arc::new(AtomicUsize::new(0));
        let bad_calls_clone = bad_calls.clone();
        engine
            .add_hook(
                "bad",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(move |mut envelope| {
                    bad_calls_clone.fetch_add(1, Ordering::SeqCst);
                    envelope.insert("extra", 1_i64);
                    Ok(envelope)
                })),
            )
            .await;
        let good_calls = Arc::new(AtomicUsize::new(0));
        let good_calls_clone = good_calls.clone();
        engine
            .add_hook(
                "good",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(move |envelope| {
                    good_calls_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(envelope)
                })),
            )
            .await;

        engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(
            engine
                .registered_priorities(HookName::OnTrafficFromClient)
                .await,
            vec![2]
        );

        // The next run invokes only the surviving hook.
        engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(bad_calls.load(Ordering::SeqCst), 1);
        assert_eq!(good_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_verify_abort_returns_last_good_accumulator() {
        let engine = engine(VerificationPolicy::Abort);
        engine
            .add_hook(
                "rewriter",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("request", b"good".as_slice());
                    Ok(envelope)
                })),
            )
            .await;
        engine
            .add_hook(
                "bad",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("extra", 1_i64);
                    Ok(envelope)
                })),
            )
            .await;
        let unreached = Arc::new(AtomicUsize::new(0));
        let unreached_clone = unreached.clone();
        engine
            .add_hook(
                "late",
                HookName::OnTrafficFromClient,
                3,
                Arc::new(LocalInvoker::new(move |envelope| {
                    unreached_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(envelope)
                })),
            )
            .await;

        let output = engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(output.get_bytes("request"), Some(b"good".as_slice()));
        assert_eq!(unreached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminate_stops_chain_under_stop_policy() {
        let engine = engine(VerificationPolicy::PassDown);
        engine
            .add_hook(
                "terminator",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("request", b"short-circuit".as_slice());
                    envelope.insert(TERMINATE_FIELD, true);
                    Ok(envelope)
                })),
            )
            .await;
        let late = Arc::new(AtomicUsize::new(0));
        let late_clone = late.clone();
        engine
            .add_hook(
                "late",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(move |envelope| {
                    late_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(envelope)
                })),
            )
            .await;

        let output = engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(output.get_bytes("request"), Some(b"short-circuit".as_slice()));
        // The reserved field never leaks downstream.
        assert!(!output.contains_key(TERMINATE_FIELD));
    }

    #[tokio::test]
    async fn test_terminate_ignored_under_continue_policy() {
        let engine = HookEngine::new(
            VerificationPolicy::PassDown,
            TerminationPolicy::Continue,
            AcceptancePolicy::Accept,
            Duration::from_secs(1),
        );
        engine
            .add_hook(
                "terminator",
                HookName::OnTrafficFromClient,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert(TERMINATE_FIELD, true);
                    Ok(envelope)
                })),
            )
            .await;
        let late = Arc::new(AtomicUsize::new(0));
        let late_clone = late.clone();
        engine
            .add_hook(
                "late",
                HookName::OnTrafficFromClient,
                2,
                Arc::new(LocalInvoker::new(move |envelope| {
                    late_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(envelope)
                })),
            )
            .await;

        engine.run(HookName::OnTrafficFromClient, args()).await;
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reject_policy_refuses_occupied_slot() {
        let engine = HookEngine::new(
            VerificationPolicy::PassDown,
            TerminationPolicy::Stop,
            AcceptancePolicy::Reject,
            Duration::from_secs(1),
        );
        assert!(engine.add_hook("first", HookName::OnTraffic, 1, identity()).await);
        assert!(!engine.add_hook("second", HookName::OnTraffic, 1, identity()).await);
        // Same plugin may re-register its own slot.
        assert!(engine.add_hook("first", HookName::OnTraffic, 1, identity()).await);
        // A different priority is fine.
        assert!(engine.add_hook("second", HookName::OnTraffic, 2, identity()).await);
    }

    #[tokio::test]
    async fn test_remove_plugin_hooks_clears_all_slots() {
        let engine = engine(VerificationPolicy::PassDown);
        engine.add_hook("p", HookName::OnTraffic, 1, identity()).await;
        engine.add_hook("p", HookName::OnTick, 5, identity()).await;
        engine.add_hook("q", HookName::OnTick, 7, identity()).await;

        engine.remove_plugin_hooks("p").await;
        assert!(engine.registered_priorities(HookName::OnTraffic).await.is_empty());
        assert_eq!(engine.registered_priorities(HookName::OnTick).await, vec![7]);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_verification_failure() {
        let engine = HookEngine::new(
            VerificationPolicy::Remove,
            TerminationPolicy::Stop,
            AcceptancePolicy::Accept,
            Duration::from_millis(20),
        );
        struct SlowInvoker;
        #[async_trait::async_trait]
        impl HookInvoker for SlowInvoker {
            async fn invoke(
                &self,
                _hook: HookName,
                args: Envelope,
            ) -> Result<Envelope, InvokeError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(args)
            }
        }
        engine
            .add_hook("slow", HookName::OnTraffic, 1, Arc::new(SlowInvoker))
            .await;

        let input = args();
        let output = engine.run(HookName::OnTraffic, input.clone()).await;
        assert_eq!(output, input);
        // Remove applies to timeouts.
        assert!(engine.registered_priorities(HookName::OnTraffic).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_removed() {
        let engine = Arc::new(HookEngine::new(
            VerificationPolicy::Remove,
            TerminationPolicy::Stop,
            AcceptancePolicy::Accept,
            Duration::from_secs(30),
        ));
        struct HangingInvoker;
        #[async_trait::async_trait]
        impl HookInvoker for HangingInvoker {
            async fn invoke(
                &self,
                _hook: HookName,
                args: Envelope,
            ) -> Result<Envelope, InvokeError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(args)
            }
        }
        engine
            .add_hook("hanging", HookName::OnTraffic, 1, Arc::new(HangingInvoker))
            .await;

        let runner = engine.clone();
        let run = tokio::spawn(async move { runner.run(HookName::OnTraffic, args()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.cancel();
        let output = run.await.unwrap();
        assert_eq!(output, args());
        // Cancellation is not plugin misbehavior: the hook stays registered.
        assert_eq!(engine.registered_priorities(HookName::OnTraffic).await, vec![1]);
    }

    #[tokio::test]
    #[should_panic(expected = "HOOK_NAME_ON_CONFIG_LOADED")]
    async fn test_on_config_loaded_verification_failure_panics() {
        let engine = engine(VerificationPolicy::Ignore);
        engine
            .add_hook(
                "bad",
                HookName::OnConfigLoaded,
                1,
                Arc::new(LocalInvoker::new(|mut envelope| {
                    envelope.insert("injected", FieldValue::Null);
                    Ok(envelope)
                })),
            )
            .await;

        let mut input = Envelope::new();
        input.insert("loggers", "console");
        engine.run(HookName::OnConfigLoaded, input).await;
    }
}
