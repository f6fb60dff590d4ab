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

//! Plugin identity and requirement matching
//!
//! Requirements are `{name, semver constraint}` pairs resolved against the
//! identifiers of already-loaded plugins.

use plexgate_proto::{PluginId, Requirement};
use semver::{Version, VersionReq};

/// Identity of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentifier {
    /// Unique plugin name; two plugins with the same name cannot coexist.
    pub name: String,
    /// Reported version string.
    pub version: String,
    /// Where the binary came from, informational only.
    pub remote_url: String,
    /// SHA-256 of the binary, hex encoded.
    pub checksum: String,
}

impl From<PluginId> for PluginIdentifier {
    fn from(id: PluginId) -> Self {
        Self {
            name: id.name,
            version: id.version,
            remote_url: id.remote_url,
            checksum: id.checksum,
        }
    }
}

/// A declared dependency on another plugin.
#[derive(Debug, Clone)]
pub struct RequirementSpec {
    /// Name of the required plugin.
    pub name: String,
    /// Version constraint, e.g. `>=1.2, <2`.
    pub constraint: VersionReq,
}

impl RequirementSpec {
    /// Parse a wire requirement. An empty constraint matches any version.
    pub fn parse(requirement: &Requirement) -> Result<Self, semver::Error> {
        let constraint = if requirement.constraint.trim().is_empty() {
            VersionReq::STAR
        } else {
            VersionReq::parse(&requirement.constraint)?
        };
        Ok(Self {
            name: requirement.name.clone(),
            constraint,
        })
    }

    /// Whether a loaded plugin satisfies this requirement.
    ///
    /// An unparseable version on the candidate never matches; the candidate
    /// cannot prove compatibility.
    pub fn matches(&self, candidate: &PluginIdentifier) -> bool {
        if candidate.name != self.name {
            return false;
        }
        match Version::parse(&candidate.version) {
            Ok(version) => self.constraint.matches(&version),
            Err(_) => false,
        }
    }
}

impl std::fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, version: &str) -> PluginIdentifier {
        PluginIdentifier {
            name: name.to_string(),
            version: version.to_string(),
            remote_url: String::new(),
            checksum: String::new(),
        }
    }

    #[test]
    fn test_requirement_matches_in_range() {
        let req = RequirementSpec::parse(&Requirement {
            name: "auth".to_string(),
            constraint: ">=1.2, <2".to_string(),
        })
        .unwrap();

        assert!(req.matches(&ident("auth", "1.4.0")));
        assert!(!req.matches(&ident("auth", "2.0.0")));
        assert!(!req.matches(&ident("cache", "1.4.0")));
    }

    #[test]
    fn test_empty_constraint_matches_any_version() {
        let req = RequirementSpec::parse(&Requirement {
            name: "auth".to_string(),
            constraint: "".to_string(),
        })
        .unwrap();
        assert!(req.matches(&ident("auth", "0.0.1")));
    }

    #[test]
    fn test_unparseable_candidate_version_never_matches() {
        let req = RequirementSpec::parse(&Requirement {
            name: "auth".to_string(),
            constraint: ">=1".to_string(),
        })
        .unwrap();
        assert!(!req.matches(&ident("auth", "not-a-version")));
    }
}
