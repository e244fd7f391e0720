// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Traversal compilation and execution
//!
//! This module provides:
//! - The predicate algebra and the traverser model
//! - Steps, traversals and the fluent builder
//! - The strategy engine and the built-in strategies
//! - Lazy pull-based execution with side effects and sacks
//! - Mutation events, explanations and bytecode

pub mod bytecode;
pub mod event;
pub mod execution;
pub mod explanation;
pub mod lambda;
pub mod parameters;
pub mod predicate;
pub mod step;
pub mod strategy;
pub mod traversal;
pub mod traverser;

pub use bytecode::{Argument, Bytecode, Instruction};
pub use event::{
    CallbackRegistry, DefaultEventQueue, Event, EventCallback, EventQueue, MutationListener,
    TransactionalEventQueue,
};
pub use execution::{SackConfig, SideEffects};
pub use explanation::{StrategySnapshot, TraversalExplanation, DEFAULT_EXPLAIN_WIDTH};
pub use parameters::{ParamKey, ParamValue, Parameters};
pub use predicate::{Compare, Contains, Predicate, P};
pub use step::{By, Capabilities, ElementType, HasContainer, Operator, Order, Step, StepKind};
pub use strategy::{StrategyCategory, TraversalStrategies, TraversalStrategy};
pub use traversal::{GraphTraversalSource, Ids, IntoPredicate, Labels, Traversal, __};
pub use traverser::{Path, Requirements, Traverser, TraverserGenerator, TraverserRequirement};
