// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Predicate algebra
//!
//! `P` is a closed set of comparison predicates plus `And`/`Or` connectives.
//! Connectives are kept as left-flattened lists, so `a.and(b.and(c))` and
//! `a.and(b).and(c)` produce the same tree. Negation pushes through
//! connectives by De Morgan's law, so a negated predicate is again a plain `P`.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::structure::Value;

/// Anything that can test a value
///
/// Only [`P`] can be combined with `and`/`or`; other implementations are
/// rejected at combination time.
pub trait Predicate: Any + fmt::Debug + Send + Sync {
    fn test(&self, value: &Value) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compare {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Compare {
    pub fn test(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Compare::Eq => actual.loose_eq(expected),
            Compare::Neq => !actual.loose_eq(expected),
            Compare::Lt => actual.compare(expected) == Some(Ordering::Less),
            Compare::Lte => matches!(
                actual.compare(expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Compare::Gt => actual.compare(expected) == Some(Ordering::Greater),
            Compare::Gte => matches!(
                actual.compare(expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }

    pub fn negate(&self) -> Compare {
        match self {
            Compare::Eq => Compare::Neq,
            Compare::Neq => Compare::Eq,
            Compare::Lt => Compare::Gte,
            Compare::Lte => Compare::Gt,
            Compare::Gt => Compare::Lte,
            Compare::Gte => Compare::Lt,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compare::Eq => "eq",
            Compare::Neq => "neq",
            Compare::Lt => "lt",
            Compare::Lte => "lte",
            Compare::Gt => "gt",
            Compare::Gte => "gte",
        }
    }
}

/// Collection membership operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contains {
    Within,
    Without,
}

impl Contains {
    pub fn test(&self, actual: &Value, values: &[Value]) -> bool {
        let found = values.iter().any(|v| actual.loose_eq(v));
        match self {
            Contains::Within => found,
            Contains::Without => !found,
        }
    }

    pub fn negate(&self) -> Contains {
        match self {
            Contains::Within => Contains::Without,
            Contains::Without => Contains::Within,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Contains::Within => "within",
            Contains::Without => "without",
        }
    }
}

/// Composable predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum P {
    Compare { op: Compare, value: Value },
    Contains { op: Contains, values: Vec<Value> },
    And(Vec<P>),
    Or(Vec<P>),
}

impl P {
    pub fn eq(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Eq,
            value: value.into(),
        }
    }

    pub fn neq(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Neq,
            value: value.into(),
        }
    }

    pub fn lt(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Lt,
            value: value.into(),
        }
    }

    pub fn lte(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Lte,
            value: value.into(),
        }
    }

    pub fn gt(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Gt,
            value: value.into(),
        }
    }

    pub fn gte(value: impl Into<Value>) -> P {
        P::Compare {
            op: Compare::Gte,
            value: value.into(),
        }
    }

    /// `first <= x < second`
    pub fn between(first: impl Into<Value>, second: impl Into<Value>) -> P {
        P::gte(first).and(P::lt(second))
    }

    /// `first < x < second`
    pub fn inside(first: impl Into<Value>, second: impl Into<Value>) -> P {
        P::gt(first).and(P::lt(second))
    }

    /// `x <= first || x >= second`
    pub fn outside(first: impl Into<Value>, second: impl Into<Value>) -> P {
        P::lte(first).or(P::gte(second))
    }

    pub fn within<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> P {
        P::Contains {
            op: Contains::Within,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn without<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> P {
        P::Contains {
            op: Contains::Without,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not(predicate: P) -> P {
        predicate.negate()
    }

    pub fn test(&self, value: &Value) -> bool {
        match self {
            P::Compare { op, value: expected } => op.test(value, expected),
            P::Contains { op, values } => op.test(value, values),
            P::And(predicates) => predicates.iter().all(|p| p.test(value)),
            P::Or(predicates) => predicates.iter().any(|p| p.test(value)),
        }
    }

    pub fn negate(self) -> P {
        match self {
            P::Compare { op, value } => P::Compare {
                op: op.negate(),
                value,
            },
            P::Contains { op, values } => P::Contains {
                op: op.negate(),
                values,
            },
            P::And(predicates) => P::Or(predicates.into_iter().map(P::negate).collect()),
            P::Or(predicates) => P::And(predicates.into_iter().map(P::negate).collect()),
        }
    }

    pub fn and(self, other: P) -> P {
        match self {
            P::And(mut predicates) => {
                append_flattened(&mut predicates, other, true);
                P::And(predicates)
            }
            first => {
                let mut predicates = vec![first];
                append_flattened(&mut predicates, other, true);
                P::And(predicates)
            }
        }
    }

    pub fn or(self, other: P) -> P {
        match self {
            P::Or(mut predicates) => {
                append_flattened(&mut predicates, other, false);
                P::Or(predicates)
            }
            first => {
                let mut predicates = vec![first];
                append_flattened(&mut predicates, other, false);
                P::Or(predicates)
            }
        }
    }

    /// Conjunction with an arbitrary predicate; only `P` is accepted
    pub fn try_and(self, other: &dyn Predicate) -> TraversalResult<P> {
        match other.as_any().downcast_ref::<P>() {
            Some(p) => Ok(self.and(p.clone())),
            None => Err(TraversalError::IllegalArgument(
                "Only P predicates can be and'd together".to_string(),
            )),
        }
    }

    /// Disjunction with an arbitrary predicate; only `P` is accepted
    pub fn try_or(self, other: &dyn Predicate) -> TraversalResult<P> {
        match other.as_any().downcast_ref::<P>() {
            Some(p) => Ok(self.or(p.clone())),
            None => Err(TraversalError::IllegalArgument(
                "Only P predicates can be or'd together".to_string(),
            )),
        }
    }

    /// The operand of a leaf predicate; connectives report their children's values
    pub fn value(&self) -> Value {
        match self {
            P::Compare { value, .. } => value.clone(),
            P::Contains { values, .. } => Value::List(values.clone()),
            P::And(predicates) | P::Or(predicates) => {
                Value::List(predicates.iter().map(P::value).collect())
            }
        }
    }

    /// Replace the operand of a leaf predicate; no-op on connectives
    pub fn set_value(&mut self, new_value: Value) {
        match self {
            P::Compare { value, .. } => *value = new_value,
            P::Contains { values, .. } => {
                *values = match new_value {
                    Value::List(items) => items,
                    other => vec![other],
                }
            }
            P::And(_) | P::Or(_) => {}
        }
    }

    /// Values the predicate accepts when it is a pure equality test:
    /// `eq`, `within`, or an `or` of those
    pub fn equality_values(&self) -> Option<Vec<Value>> {
        match self {
            P::Compare {
                op: Compare::Eq,
                value,
            } => Some(vec![value.clone()]),
            P::Contains {
                op: Contains::Within,
                values,
            } => Some(values.clone()),
            P::Or(predicates) => {
                let mut values = Vec::new();
                for p in predicates {
                    values.extend(p.equality_values()?);
                }
                Some(values)
            }
            _ => None,
        }
    }
}

fn append_flattened(predicates: &mut Vec<P>, other: P, conjunction: bool) {
    match other {
        P::And(children) if conjunction => predicates.extend(children),
        P::Or(children) if !conjunction => predicates.extend(children),
        other => predicates.push(other),
    }
}

impl Predicate for P {
    fn test(&self, value: &Value) -> bool {
        P::test(self, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for P {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            P::Compare { op, value } => write!(f, "{}({})", op.name(), value),
            P::Contains { op, values } => {
                write!(f, "{}({})", op.name(), Value::List(values.clone()))
            }
            P::And(predicates) | P::Or(predicates) => {
                let name = if matches!(self, P::And(_)) { "and" } else { "or" };
                write!(f, "{}(", name)?;
                for (i, p) in predicates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CustomPredicate;

    impl Predicate for CustomPredicate {
        fn test(&self, _value: &Value) -> bool {
            false
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn cases() -> Vec<(P, Value, bool)> {
        vec![
            (P::eq(0), Value::from(0), true),
            (P::eq(0), Value::from(1), false),
            (P::neq(0), Value::from(0), false),
            (P::neq(0), Value::from(1), true),
            (P::gt(0), Value::from(-1), false),
            (P::gt(0), Value::from(0), false),
            (P::gt(0), Value::from(1), true),
            (P::lt(0), Value::from(-1), true),
            (P::lt(0), Value::from(0), false),
            (P::lt(0), Value::from(1), false),
            (P::gte(0), Value::from(-1), false),
            (P::gte(0), Value::from(0), true),
            (P::gte(0), Value::from(1), true),
            (P::lte(0), Value::from(-1), true),
            (P::lte(0), Value::from(0), true),
            (P::lte(0), Value::from(1), false),
            (P::between(1, 10), Value::from(0), false),
            (P::between(1, 10), Value::from(1), true),
            (P::between(1, 10), Value::from(9), true),
            (P::between(1, 10), Value::from(10), false),
            (P::inside(1, 10), Value::from(0), false),
            (P::inside(1, 10), Value::from(1), false),
            (P::inside(1, 10), Value::from(9), true),
            (P::inside(1, 10), Value::from(10), false),
            (P::outside(1, 10), Value::from(0), true),
            (P::outside(1, 10), Value::from(1), true),
            (P::outside(1, 10), Value::from(5), false),
            (P::outside(1, 10), Value::from(10), true),
            (P::within(vec![1, 2, 3]), Value::from(0), false),
            (P::within(vec![1, 2, 3]), Value::from(1), true),
            (P::without(vec![1, 2, 3]), Value::from(0), true),
            (P::without(vec![1, 2, 3]), Value::from(1), false),
            (
                P::between("m", "n").and(P::neq("marko")),
                Value::from("marko"),
                false,
            ),
            (
                P::between("m", "n").and(P::neq("marko")),
                Value::from("matthias"),
                true,
            ),
            (
                P::between("m", "n").or(P::eq("daniel")),
                Value::from("marko"),
                true,
            ),
            (
                P::between("m", "n").or(P::eq("daniel")),
                Value::from("daniel"),
                true,
            ),
            (
                P::between("m", "n").or(P::eq("daniel")),
                Value::from("stephen"),
                false,
            ),
        ]
    }

    #[test]
    fn test_predicates_and_their_negations() {
        for (predicate, value, expected) in cases() {
            assert_eq!(predicate.test(&value), expected, "{} on {}", predicate, value);
            assert_eq!(
                predicate.clone().negate().test(&value),
                !expected,
                "negate {} on {}",
                predicate,
                value
            );
            assert_eq!(P::not(predicate.clone()).test(&value), !expected);
        }
    }

    #[test]
    fn test_foreign_predicates_are_rejected() {
        for (predicate, _, _) in cases() {
            let err = predicate.clone().try_and(&CustomPredicate).unwrap_err();
            assert_eq!(
                err,
                TraversalError::IllegalArgument(
                    "Only P predicates can be and'd together".to_string()
                )
            );
            let err = predicate.try_or(&CustomPredicate).unwrap_err();
            assert!(err.to_string().contains("Only P predicates can be or'd together"));
        }
        assert!(P::eq(1).try_and(&P::eq(2)).is_ok());
    }

    #[test]
    fn test_connectives_flatten_left() {
        let a = || P::gt(1);
        let b = || P::lt(10);
        let c = || P::neq(5);
        assert_eq!(a().and(b().and(c())), a().and(b()).and(c()));
        assert_eq!(a().and(b()).and(c()), P::And(vec![a(), b(), c()]));
        assert_eq!(a().or(b().or(c())), P::Or(vec![a(), b(), c()]));
        // mixed connectives nest rather than flatten
        assert_eq!(
            P::eq(10).or(P::gt(20).and(P::lt(100))),
            P::Or(vec![P::eq(10), P::And(vec![P::gt(20), P::lt(100)])])
        );
    }

    #[test]
    fn test_value_round_trip() {
        let mut p = P::eq("marko");
        assert_eq!(p.value(), Value::from("marko"));
        p.set_value(Value::Float(0.5));
        assert_eq!(p.value(), Value::Float(0.5));
        assert!(p.test(&Value::Float(0.5)));
    }

    #[test]
    fn test_equality_values() {
        assert_eq!(
            P::eq("knows").or(P::eq("created")).equality_values(),
            Some(vec![Value::from("knows"), Value::from("created")])
        );
        assert_eq!(P::eq("knows").or(P::gt("created")).equality_values(), None);
        assert_eq!(P::within(vec!["a", "b"]).equality_values().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(P::eq("marko").or(P::eq("bob")).to_string(), "or(eq(marko), eq(bob))");
        assert_eq!(P::within(vec![1, 2]).to_string(), "within([1, 2])");
    }
}
