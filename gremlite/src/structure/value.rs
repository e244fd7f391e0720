// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for traverser payloads and element properties
//!
//! Supports:
//! - Basic types: Null, Boolean, Integer, Float, String
//! - Collections: List, Map (insertion ordered)
//! - Graph types: Vertex, Edge, Path

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::element::{Edge, Vertex};
use crate::process::traverser::Path;

/// Values flowing through a traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Vertex(Vertex),
    Edge(Edge),
    Path(Path),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral value; floats qualify only when whole and within `i64` range
    pub fn as_i64(&self) -> Option<i64> {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && *f >= -LIMIT && *f < LIMIT => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Value::Vertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Value::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Value::Vertex(_) | Value::Edge(_))
    }

    /// Look up a key in a map value
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Vertex(_) => "vertex",
            Value::Edge(_) => "edge",
            Value::Path(_) => "path",
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
            Value::Vertex(_) => 6,
            Value::Edge(_) => 7,
            Value::Path(_) => 8,
        }
    }

    /// Compare two values of compatible types; `None` when they are unrelated
    ///
    /// Integers and floats compare numerically with each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(_), Value::Float(_))
            | (Value::Float(_), Value::Integer(_))
            | (Value::Float(_), Value::Float(_)) => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Vertex(a), Value::Vertex(b)) => Some(a.id.cmp(&b.id)),
            (Value::Edge(a), Value::Edge(b)) => Some(a.id.cmp(&b.id)),
            _ => None,
        }
    }

    /// Equality as used by predicates: numbers compare by magnitude
    pub fn loose_eq(&self, other: &Value) -> bool {
        if self.is_number() && other.is_number() {
            return self.compare(other) == Some(Ordering::Equal);
        }
        self == other
    }

    /// Total order used for sorting mixed values: by type rank, then by value
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.compare(other).unwrap_or(Ordering::Equal))
    }

    /// Numeric addition, keeping integers integral
    pub fn add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_add(*b))),
            _ => Some(Value::Float(self.as_f64()? + other.as_f64()?)),
        }
    }

    /// Numeric multiplication, keeping integers integral
    pub fn mul(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_mul(*b))),
            _ => Some(Value::Float(self.as_f64()? * other.as_f64()?)),
        }
    }

    /// Multiply by a bulk count
    pub fn scale(&self, bulk: u64) -> Option<Value> {
        self.mul(&Value::Integer(bulk as i64))
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0.hash(state),
            Value::Boolean(b) => {
                1.hash(state);
                b.hash(state);
            }
            Value::Integer(i) => {
                2.hash(state);
                i.hash(state);
            }
            Value::Float(n) => {
                3.hash(state);
                // Handle NaN consistently
                if n.is_nan() {
                    "NaN".hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            Value::String(s) => {
                4.hash(state);
                s.hash(state);
            }
            Value::List(list) => {
                5.hash(state);
                list.len().hash(state);
                for item in list {
                    item.hash(state);
                }
            }
            Value::Map(entries) => {
                6.hash(state);
                entries.len().hash(state);
                for (key, value) in entries {
                    key.hash(state);
                    value.hash(state);
                }
            }
            Value::Vertex(v) => {
                7.hash(state);
                v.hash(state);
            }
            Value::Edge(e) => {
                8.hash(state);
                e.hash(state);
            }
            Value::Path(path) => {
                9.hash(state);
                path.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Vertex(v) => write!(f, "{}", v),
            Value::Edge(e) => write!(f, "{}", e),
            Value::Path(p) => write!(f, "{}", p),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vertex> for Value {
    fn from(v: Vertex) -> Self {
        Value::Vertex(v)
    }
}

impl From<Edge> for Value {
    fn from(e: Edge) -> Self {
        Value::Edge(e)
    }
}

impl From<Path> for Value {
    fn from(p: Path) -> Self {
        Value::Path(p)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_numeric_comparison_across_types() {
        assert_eq!(
            Value::Integer(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert!(Value::Integer(2).loose_eq(&Value::Float(2.0)));
        assert_ne!(Value::Integer(2), Value::Float(2.0));
        assert_eq!(Value::from("a").compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_total_order_ranks_types() {
        let mut values = vec![
            Value::from("b"),
            Value::Integer(3),
            Value::Null,
            Value::Float(1.5),
            Value::from("a"),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_hash_set_dedups_structurally() {
        let mut set = HashSet::new();
        set.insert(Value::from(vec![1, 2]));
        set.insert(Value::from(vec![1, 2]));
        set.insert(Value::Float(f64::NAN));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_as_i64_rejects_lossy_floats() {
        assert_eq!(Value::Float(3.0).as_i64(), Some(3));
        assert_eq!(Value::Float(-2.0).as_i64(), Some(-2));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert_eq!(Value::Float(1e19).as_i64(), None);
        assert_eq!(Value::Float(-1e19).as_i64(), None);
        assert_eq!(Value::Float(f64::NAN).as_i64(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_i64(), None);
        assert_eq!(Value::from("3").as_i64(), None);
    }

    #[test]
    fn test_arithmetic_keeps_integers() {
        assert_eq!(
            Value::Integer(2).add(&Value::Integer(3)),
            Some(Value::Integer(5))
        );
        assert_eq!(
            Value::Integer(2).mul(&Value::Float(0.5)),
            Some(Value::Float(1.0))
        );
        assert_eq!(Value::from("x").add(&Value::Integer(1)), None);
    }
}
