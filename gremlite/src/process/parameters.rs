// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deferred key/value arguments of mutating steps
//!
//! Entries are either literal values or child traversals. A traversal entry
//! is evaluated for each traverser at the moment the step runs, seeded with
//! that traverser, and its first result becomes the argument.

use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::process::execution::ExecContext;
use crate::process::traversal::Traversal;
use crate::process::traverser::Traverser;
use crate::structure::{Value, Vertex, T};

/// Parameter key: a reserved token or a property name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Id,
    Label,
    From,
    To,
    Property(String),
}

impl ParamKey {
    pub fn property(key: impl Into<String>) -> Self {
        ParamKey::Property(key.into())
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            ParamKey::Property(key) => Some(key),
            _ => None,
        }
    }
}

impl From<T> for ParamKey {
    fn from(token: T) -> Self {
        match token {
            T::Id => ParamKey::Id,
            T::Label => ParamKey::Label,
        }
    }
}

impl From<&str> for ParamKey {
    fn from(key: &str) -> Self {
        ParamKey::Property(key.to_string())
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Id => write!(f, "id"),
            ParamKey::Label => write!(f, "label"),
            ParamKey::From => write!(f, "from"),
            ParamKey::To => write!(f, "to"),
            ParamKey::Property(key) => write!(f, "{}", key),
        }
    }
}

/// Literal or per-traverser computed argument
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Traversal(Traversal),
}

macro_rules! literal_param_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_param_value!(&str, String, i64, i32, f64, bool, Vertex);

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Literal(value)
    }
}

impl From<Traversal> for ParamValue {
    fn from(traversal: Traversal) -> Self {
        ParamValue::Traversal(traversal)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Literal(value) => write!(f, "{}", value),
            ParamValue::Traversal(traversal) => write!(f, "{}", traversal),
        }
    }
}

/// Ordered multimap of step arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    entries: Vec<(ParamKey, Vec<ParamValue>)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a value under `key`
    pub fn set(&mut self, key: ParamKey, value: impl Into<ParamValue>) -> TraversalResult<()> {
        if let ParamKey::Property(name) = &key {
            if name.is_empty() {
                return Err(TraversalError::IllegalArgument(
                    "The key of a parameter can not be empty".to_string(),
                ));
            }
        }
        let value = value.into();
        if let ParamValue::Literal(Value::Null) = value {
            return Err(TraversalError::IllegalArgument(format!(
                "The value of a parameter can not be null: {}",
                key
            )));
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
        Ok(())
    }

    pub fn contains(&self, key: &ParamKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Whether `key` holds the literal `value`
    pub fn contains_value(&self, key: &ParamKey, value: &Value) -> bool {
        self.raw(key)
            .iter()
            .any(|v| matches!(v, ParamValue::Literal(literal) if literal == value))
    }

    /// Unresolved entries under `key`
    pub fn raw(&self, key: &ParamKey) -> &[ParamValue] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, key: &ParamKey) -> Vec<ParamValue> {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => self.entries.remove(index).1,
            None => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Resolve the values of `key` for `traverser`, calling `default` when the key is absent
    pub fn get(
        &self,
        traverser: &Traverser,
        key: &ParamKey,
        ctx: &ExecContext,
        default: impl FnOnce() -> Vec<Value>,
    ) -> TraversalResult<Vec<Value>> {
        match self.entries.iter().find(|(k, _)| k == key) {
            Some((_, values)) => values
                .iter()
                .map(|value| resolve(value, traverser, ctx))
                .collect(),
            None => Ok(default()),
        }
    }

    /// Every resolved key/value pair, in insertion order, skipping `exclude`
    pub fn get_key_values(
        &self,
        traverser: &Traverser,
        ctx: &ExecContext,
        exclude: &[ParamKey],
    ) -> TraversalResult<Vec<(ParamKey, Value)>> {
        let mut key_values = Vec::new();
        for (key, values) in &self.entries {
            if exclude.contains(key) {
                continue;
            }
            for value in values {
                key_values.push((key.clone(), resolve(value, traverser, ctx)?));
            }
        }
        Ok(key_values)
    }

    pub fn traversals(&self) -> impl Iterator<Item = &Traversal> {
        self.entries
            .iter()
            .flat_map(|(_, values)| values.iter())
            .filter_map(|value| match value {
                ParamValue::Traversal(t) => Some(t),
                ParamValue::Literal(_) => None,
            })
    }

    pub fn traversals_mut(&mut self) -> impl Iterator<Item = &mut Traversal> {
        self.entries
            .iter_mut()
            .flat_map(|(_, values)| values.iter_mut())
            .filter_map(|value| match value {
                ParamValue::Traversal(t) => Some(t),
                ParamValue::Literal(_) => None,
            })
    }
}

fn resolve(value: &ParamValue, traverser: &Traverser, ctx: &ExecContext) -> TraversalResult<Value> {
    match value {
        ParamValue::Literal(literal) => Ok(literal.clone()),
        ParamValue::Traversal(traversal) => {
            ctx.first_value(traversal, traverser)?.ok_or_else(|| {
                TraversalError::ParameterResolution(format!(
                    "The provided traverser does not map to a value: {}->{}",
                    traverser.get(),
                    traversal
                ))
            })
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, values)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}=[", key)?;
            for (j, value) in values.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}
