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

//! In-memory envelope exchanged with plugin hooks
//!
//! ## Purpose
//! The wire format for hook arguments is the schemaless [`Struct`] message.
//! In memory the gateway works with [`Envelope`], a tagged-value tree with
//! typed accessors, so call sites never touch raw protobuf `oneof`s.
//!
//! ## Design Notes
//! - Keys are held in a `BTreeMap`: iteration order is stable, which keeps
//!   hook runs deterministic for identical inputs.
//! - Conversions to/from [`Struct`] are lossless; unknown/empty `Value`s
//!   map to [`FieldValue::Null`].

use std::collections::BTreeMap;

use crate::sdk::v1::{value, ListValue, NullValue, Struct, Value};

/// A dynamically typed envelope field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Double-precision number (protobuf `Struct` carries all numbers as f64).
    Number(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, used for traffic payloads.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    List(Vec<FieldValue>),
    /// Nested envelope.
    Map(BTreeMap<String, FieldValue>),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Number(f64::from(v))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

/// The dynamic key/value bag exchanged with every plugin hook invocation.
///
/// ## Examples
/// ```rust
/// use plexgate_proto::Envelope;
///
/// let mut args = Envelope::new();
/// args.insert("request", b"SELECT 1".as_slice());
/// args.insert("error", "");
/// assert_eq!(args.get_bytes("request"), Some(b"SELECT 1".as_slice()));
/// assert!(args.contains_key("error"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    fields: BTreeMap<String, FieldValue>,
}

impl Envelope {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove a field, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Whether the envelope carries the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate over keys in stable (lexicographic) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over entries in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the envelope is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text accessor; `None` when absent or not text.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Bytes accessor; `None` when absent or not bytes.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.fields.get(key) {
            Some(FieldValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Bool accessor; `None` when absent or not a bool.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.fields.get(key) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Number accessor; `None` when absent or not a number.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(FieldValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Nested-map accessor; `None` when absent or not a map.
    pub fn get_map(&self, key: &str) -> Option<&BTreeMap<String, FieldValue>> {
        match self.fields.get(key) {
            Some(FieldValue::Map(m)) => Some(m),
            _ => None,
        }
    }
}

impl FromIterator<(String, FieldValue)> for Envelope {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn value_to_field(value: Value) -> FieldValue {
    match value.kind {
        None | Some(value::Kind::NullValue(_)) => FieldValue::Null,
        Some(value::Kind::NumberValue(n)) => FieldValue::Number(n),
        Some(value::Kind::StringValue(s)) => FieldValue::Text(s),
        Some(value::Kind::BoolValue(b)) => FieldValue::Bool(b),
        Some(value::Kind::BytesValue(b)) => FieldValue::Bytes(b),
        Some(value::Kind::ListValue(list)) => {
            FieldValue::List(list.values.into_iter().map(value_to_field).collect())
        }
        Some(value::Kind::StructValue(st)) => FieldValue::Map(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_field(v)))
                .collect(),
        ),
    }
}

fn field_to_value(field: FieldValue) -> Value {
    let kind = match field {
        FieldValue::Null => value::Kind::NullValue(NullValue::NullValue as i32),
        FieldValue::Bool(b) => value::Kind::BoolValue(b),
        FieldValue::Number(n) => value::Kind::NumberValue(n),
        FieldValue::Text(s) => value::Kind::StringValue(s),
        FieldValue::Bytes(b) => value::Kind::BytesValue(b),
        FieldValue::List(values) => value::Kind::ListValue(ListValue {
            values: values.into_iter().map(field_to_value).collect(),
        }),
        FieldValue::Map(map) => value::Kind::StructValue(Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, field_to_value(v)))
                .collect(),
        }),
    };
    Value { kind: Some(kind) }
}

impl From<Struct> for Envelope {
    fn from(st: Struct) -> Self {
        Self {
            fields: st
                .fields
                .into_iter()
                .map(|(k, v)| (k, value_to_field(v)))
                .collect(),
        }
    }
}

impl From<Envelope> for Struct {
    fn from(envelope: Envelope) -> Self {
        Struct {
            fields: envelope
                .fields
                .into_iter()
                .map(|(k, v)| (k, field_to_value(v)))
                .collect(),
        }
    }
}
