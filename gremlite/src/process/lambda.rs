// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Host closures held by steps
//!
//! A [`Lambda`] is opaque to the engine: strategies can see that a step holds
//! one but can not look inside it, and bytecode export refuses it. Two lambdas
//! are equal only when they share the same closure allocation.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::process::traverser::Traverser;
use crate::structure::Value;

/// Shared, opaque closure
pub struct Lambda<F: ?Sized> {
    function: Arc<F>,
}

impl<F: ?Sized> Lambda<F> {
    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<F: ?Sized> Clone for Lambda<F> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
        }
    }
}

impl<F: ?Sized> PartialEq for Lambda<F> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
    }
}

impl<F: ?Sized> fmt::Debug for Lambda<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lambda")
    }
}

impl<F: ?Sized> fmt::Display for Lambda<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lambda")
    }
}

pub type FilterLambda = Lambda<dyn Fn(&Traverser) -> bool + Send + Sync>;
pub type MapLambda = Lambda<dyn Fn(&Traverser) -> Value + Send + Sync>;
pub type FlatMapLambda = Lambda<dyn Fn(&Traverser) -> Vec<Value> + Send + Sync>;
pub type ConsumerLambda = Lambda<dyn Fn(&Traverser) + Send + Sync>;
/// Projection used by `by()` modulators
pub type FunctionLambda = Lambda<dyn Fn(&Value) -> Value + Send + Sync>;
pub type ComparatorLambda = Lambda<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

impl FilterLambda {
    pub fn new(f: impl Fn(&Traverser) -> bool + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}

impl MapLambda {
    pub fn new(f: impl Fn(&Traverser) -> Value + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}

impl FlatMapLambda {
    pub fn new(f: impl Fn(&Traverser) -> Vec<Value> + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}

impl ConsumerLambda {
    pub fn new(f: impl Fn(&Traverser) + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}

impl FunctionLambda {
    pub fn new(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}

impl ComparatorLambda {
    pub fn new(f: impl Fn(&Value, &Value) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(f),
        }
    }
}
