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

//! Prometheus text-exposition parsing and merging
//!
//! ## Purpose
//! Each plugin exposes its own metrics in Prometheus text format. The
//! merger folds all scraped blobs into one:
//! - one HELP/TYPE pair per family (first scrape wins),
//! - counters with identical name and label set are summed,
//! - gauges and untyped series take the latest value,
//! - families render sorted by name, so output is deterministic.
//!
//! Malformed lines are skipped rather than failing the round; a plugin
//! with broken output degrades to whatever parsed.

use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    name: String,
    /// Rendered label block including braces, empty for unlabelled series.
    labels: String,
    value: f64,
}

#[derive(Debug, Default, Clone)]
struct Family {
    help: Option<String>,
    kind: Option<String>,
    /// Keyed by `name{labels}` for dedup; BTreeMap keeps output stable.
    samples: BTreeMap<String, Sample>,
}

/// Merge several Prometheus text blobs into one.
pub fn merge_metrics_text(inputs: &[String]) -> String {
    let mut families: BTreeMap<String, Family> = BTreeMap::new();

    for input in inputs {
        parse_into(input, &mut families);
    }

    let mut out = String::new();
    for (name, family) in &families {
        if let Some(help) = &family.help {
            let _ = writeln!(out, "# HELP {name} {help}");
        }
        if let Some(kind) = &family.kind {
            let _ = writeln!(out, "# TYPE {name} {kind}");
        }
        for sample in family.samples.values() {
            let _ = writeln!(out, "{}{} {}", sample.name, sample.labels, sample.value);
        }
    }
    out
}

fn parse_into(input: &str, families: &mut BTreeMap<String, Family>) {
    let mut current_family: Option<String> = None;

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("# HELP ") {
            if let Some((name, help)) = rest.split_once(' ') {
                let family = families.entry(name.to_string()).or_default();
                if family.help.is_none() {
                    family.help = Some(help.to_string());
                }
                current_family = Some(name.to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("# TYPE ") {
            if let Some((name, kind)) = rest.split_once(' ') {
                let family = families.entry(name.to_string()).or_default();
                if family.kind.is_none() {
                    family.kind = Some(kind.trim().to_string());
                }
                current_family = Some(name.to_string());
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let Some(sample) = parse_sample(line) else {
            continue;
        };

        // Histograms/summaries emit `<family>_bucket` etc.; attribute the
        // sample to the announced family when the name extends it.
        let family_name = match &current_family {
            Some(name) if sample.name.starts_with(name.as_str()) => name.clone(),
            _ => sample.name.clone(),
        };
        let family = families.entry(family_name).or_default();
        let is_counter = family.kind.as_deref() == Some("counter");

        let key = format!("{}{}", sample.name, sample.labels);
        family
            .samples
            .entry(key)
            .and_modify(|existing| {
                if is_counter {
                    existing.value += sample.value;
                } else {
                    existing.value = sample.value;
                }
            })
            .or_insert(sample);
    }
}

/// Parse `name{label="v",...} value [timestamp]`; `None` on malformed input.
fn parse_sample(line: &str) -> Option<Sample> {
    let (name_and_labels, rest) = match line.find('{') {
        Some(open) => {
            let close = line.rfind('}')?;
            if close < open {
                return None;
            }
            (&line[..=close], line[close + 1..].trim_start())
        }
        None => {
            let space = line.find(char::is_whitespace)?;
            (&line[..space], line[space..].trim_start())
        }
    };

    let (name, labels) = match name_and_labels.find('{') {
        Some(open) => (
            name_and_labels[..open].to_string(),
            normalize_labels(&name_and_labels[open..])?,
        ),
        None => (name_and_labels.to_string(), String::new()),
    };
    if name.is_empty() {
        return None;
    }

    // Drop an optional trailing timestamp.
    let value_token = rest.split_whitespace().next()?;
    let value: f64 = value_token.parse().ok()?;

    Some(Sample {
        name,
        labels,
        value,
    })
}

/// Re-render a label block with labels sorted, so identical label sets
/// written in different orders still merge.
fn normalize_labels(block: &str) -> Option<String> {
    let inner = block.strip_prefix('{')?.strip_suffix('}')?;
    if inner.trim().is_empty() {
        return Some(String::new());
    }

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    let mut chars = inner.chars().peekable();
    loop {
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        chars.next()?; // consume '='
        if chars.next()? != '"' {
            return None;
        }
        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => value.push('\n'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    other => value.push(other),
                },
                '"' => break,
                c => value.push(c),
            }
        }
        labels.insert(key.trim().to_string(), value);
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }

    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| {
            let escaped = v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
            format!("{k}=\"{escaped}\"")
        })
        .collect();
    Some(format!("{{{}}}", rendered.join(",")))
}
