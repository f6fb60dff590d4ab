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

//! Policy enumerations tuning the plugin registry and hook engine
//!
//! ## Purpose
//! Four small enums decide how the registry and hook engine react to
//! misbehaving plugins:
//! - [`VerificationPolicy`]: what to do when a hook result fails key-closure
//!   verification,
//! - [`CompatibilityPolicy`]: whether unmet plugin requirements reject the
//!   plugin,
//! - [`AcceptancePolicy`]: whether a hook may land on an already-occupied
//!   `(hook, priority)` slot,
//! - [`TerminationPolicy`]: whether a hook returning `terminate=true` stops
//!   the remaining chain.
//!
//! Config files spell them in lowercase (`passdown`, `strict`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reaction to a hook result that fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationPolicy {
    /// Keep the accumulator unchanged and continue down the chain.
    #[default]
    PassDown,
    /// Log and continue; the offending result is discarded.
    Ignore,
    /// Log and return the last good accumulator immediately.
    Abort,
    /// Log, discard, and unregister the offending hook after the run.
    Remove,
}

impl FromStr for VerificationPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passdown" => Ok(Self::PassDown),
            "ignore" => Ok(Self::Ignore),
            "abort" => Ok(Self::Abort),
            "remove" => Ok(Self::Remove),
            other => Err(UnknownPolicy::new("verificationPolicy", other)),
        }
    }
}

/// Whether unmet plugin requirements reject the plugin at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityPolicy {
    /// Unmatched requirements fail the load with `IncompatiblePlugin`.
    Strict,
    /// Unmatched requirements are logged and tolerated.
    #[default]
    Loose,
}

impl FromStr for CompatibilityPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loose" => Ok(Self::Loose),
            other => Err(UnknownPolicy::new("compatibilityPolicy", other)),
        }
    }
}

/// Whether a hook may claim a `(hook, priority)` slot another plugin holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptancePolicy {
    /// The newer registration overwrites the occupied slot.
    #[default]
    Accept,
    /// The newer registration is refused and logged.
    Reject,
}

impl FromStr for AcceptancePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(UnknownPolicy::new("acceptancePolicy", other)),
        }
    }
}

/// Whether `terminate=true` in a verified hook result stops the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationPolicy {
    /// Stop the remaining hooks for this invocation.
    #[default]
    Stop,
    /// Run the full chain regardless.
    Continue,
}

impl FromStr for TerminationPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "continue" => Ok(Self::Continue),
            other => Err(UnknownPolicy::new("terminationPolicy", other)),
        }
    }
}

/// Error for a policy string no enum variant matches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value: {value}")]
pub struct UnknownPolicy {
    field: &'static str,
    value: String,
}

impl UnknownPolicy {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PassDown => "passdown",
            Self::Ignore => "ignore",
            Self::Abort => "abort",
            Self::Remove => "remove",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "passdown".parse::<VerificationPolicy>().unwrap(),
            VerificationPolicy::PassDown
        );
        assert_eq!(
            "Remove".parse::<VerificationPolicy>().unwrap(),
            VerificationPolicy::Remove
        );
        assert_eq!(
            "strict".parse::<CompatibilityPolicy>().unwrap(),
            CompatibilityPolicy::Strict
        );
        assert_eq!(
            "reject".parse::<AcceptancePolicy>().unwrap(),
            AcceptancePolicy::Reject
        );
        assert_eq!(
            "continue".parse::<TerminationPolicy>().unwrap(),
            TerminationPolicy::Continue
        );
        assert!("abort-all".parse::<VerificationPolicy>().is_err());
    }

    #[test]
    fn test_policy_defaults() {
        assert_eq!(VerificationPolicy::default(), VerificationPolicy::PassDown);
        assert_eq!(CompatibilityPolicy::default(), CompatibilityPolicy::Loose);
        assert_eq!(AcceptancePolicy::default(), AcceptancePolicy::Accept);
        assert_eq!(TerminationPolicy::default(), TerminationPolicy::Stop);
    }
}
