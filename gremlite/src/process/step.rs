// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pipeline steps
//!
//! A [`Step`] is a [`StepKind`] plus the labels attached to it with `as()`.
//! The set of kinds is closed; what a step can do (filter, map, branch,
//! mutate...) is reported by [`Step::capabilities`] so strategies can query
//! behaviour without matching on every variant.
//!
//! Steps own their child traversals. Cloning a step deep-copies them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::process::event::CallbackRegistry;
use crate::process::lambda::{
    ComparatorLambda, ConsumerLambda, FilterLambda, FlatMapLambda, FunctionLambda, MapLambda,
};
use crate::process::parameters::Parameters;
use crate::process::predicate::P;
use crate::process::traversal::Traversal;
use crate::process::traverser::{Requirements, TraverserRequirement};
use crate::structure::{Direction, Element, Graph, Value, T};

/// What a graph or vertex step emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Vertex,
    Edge,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Vertex => write!(f, "vertex"),
            ElementType::Edge => write!(f, "edge"),
        }
    }
}

/// A single `key` + predicate condition of a has step
#[derive(Debug, Clone, PartialEq)]
pub struct HasContainer {
    pub key: String,
    pub predicate: P,
}

impl HasContainer {
    pub fn new(key: impl Into<String>, predicate: P) -> Self {
        Self {
            key: key.into(),
            predicate,
        }
    }

    pub fn is_label(&self) -> bool {
        T::from_accessor(&self.key) == Some(T::Label)
    }

    pub fn is_id(&self) -> bool {
        T::from_accessor(&self.key) == Some(T::Id)
    }

    /// Test an element; anything that is not an element fails the condition
    pub fn test(&self, value: &Value, graph: &dyn Graph) -> TraversalResult<bool> {
        let element = match Element::from_value(value) {
            Some(element) => element,
            None => return Ok(false),
        };
        match T::from_accessor(&self.key) {
            Some(T::Label) => Ok(self.predicate.test(&Value::from(element.label()))),
            Some(T::Id) => Ok(self.predicate.test(&element.id().to_value())),
            None => Ok(graph
                .property(&element, &self.key)?
                .map(|v| self.predicate.test(&v))
                .unwrap_or(false)),
        }
    }
}

impl fmt::Display for HasContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.key, self.predicate)
    }
}

/// Projection applied by a `by()` modulator
#[derive(Debug, Clone, PartialEq)]
pub enum By {
    Identity,
    Key(String),
    Token(T),
    Traversal(Traversal),
    Function(FunctionLambda),
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            By::Identity => write!(f, "identity"),
            By::Key(key) => write!(f, "value({})", key),
            By::Token(token) => write!(f, "{}", token),
            By::Traversal(traversal) => write!(f, "{}", traversal),
            By::Function(lambda) => write!(f, "{}", lambda),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    Incr,
    Decr,
    Shuffle,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Incr => write!(f, "incr"),
            Order::Decr => write!(f, "decr"),
            Order::Shuffle => write!(f, "shuffle"),
        }
    }
}

/// How two projected values are ordered
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Order(Order),
    Lambda(ComparatorLambda),
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Order(order) => write!(f, "{}", order),
            Comparator::Lambda(lambda) => write!(f, "{}", lambda),
        }
    }
}

/// One `by()` clause of `order()`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub by: By,
    pub comparator: Comparator,
}

/// Binary operators for sacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Sum,
    Minus,
    Mult,
    Div,
    Min,
    Max,
    Assign,
}

impl Operator {
    pub fn apply(&self, a: &Value, b: &Value) -> TraversalResult<Value> {
        let numeric = || {
            TraversalError::Execution(format!(
                "The {} operator requires numbers: {} and {}",
                self, a, b
            ))
        };
        match self {
            Operator::Sum => a.add(b).ok_or_else(numeric),
            Operator::Minus => match (a, b) {
                (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x.wrapping_sub(*y))),
                _ => Ok(Value::Float(
                    a.as_f64().ok_or_else(numeric)? - b.as_f64().ok_or_else(numeric)?,
                )),
            },
            Operator::Mult => a.mul(b).ok_or_else(numeric),
            Operator::Div => match (a, b) {
                (Value::Integer(_), Value::Integer(0)) => Err(TraversalError::Execution(
                    "Division by zero".to_string(),
                )),
                (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x / y)),
                _ => Ok(Value::Float(
                    a.as_f64().ok_or_else(numeric)? / b.as_f64().ok_or_else(numeric)?,
                )),
            },
            Operator::Min => Ok(if b.total_cmp(a).is_lt() { b.clone() } else { a.clone() }),
            Operator::Max => Ok(if b.total_cmp(a).is_gt() { b.clone() } else { a.clone() }),
            Operator::Assign => Ok(b.clone()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Sum => "sum",
            Operator::Minus => "minus",
            Operator::Mult => "mult",
            Operator::Div => "div",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Assign => "assign",
        };
        write!(f, "{}", name)
    }
}

/// Condition selecting the branch of `choose()`
#[derive(Debug, Clone, PartialEq)]
pub enum ChooseCondition {
    Traversal(Traversal),
    Lambda(FilterLambda),
}

/// Capability flags of a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub filter: bool,
    pub map: bool,
    pub flat_map: bool,
    pub side_effect: bool,
    pub branch: bool,
    pub barrier: bool,
    pub scoping: bool,
    pub mutating: bool,
    pub parameterizing: bool,
    pub lambda_holder: bool,
}

/// The closed set of step behaviours
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// `V()` / `E()`
    Graph { returns: ElementType, ids: Vec<Value> },
    Inject(Vec<Value>),
    Identity,
    /// `out()`, `inE()`, `both()`...
    Vertex {
        direction: Direction,
        edge_labels: Vec<String>,
        returns: ElementType,
    },
    /// `outV()`, `inV()`, `bothV()`
    EdgeVertex(Direction),
    /// `otherV()`
    EdgeOtherVertex,
    Has(Vec<HasContainer>),
    TraversalFilter(Traversal),
    LambdaFilter(FilterLambda),
    And(Vec<Traversal>),
    Or(Vec<Traversal>),
    Not(Traversal),
    Is(P),
    Dedup,
    Range { low: u64, high: Option<u64> },
    Tail(u64),
    Coin(f64),
    Id,
    Label,
    Values(Vec<String>),
    Constant(Value),
    Path,
    Select(Vec<String>),
    Sack,
    SackOperator { operator: Operator, by: Option<String> },
    Loops,
    Unfold,
    LambdaMap(MapLambda),
    LambdaFlatMap(FlatMapLambda),
    LambdaSideEffect(ConsumerLambda),
    Count,
    Sum,
    Mean,
    Fold,
    GroupCount(By),
    Order(Vec<OrderBy>),
    Aggregate(String),
    Store(String),
    Cap(String),
    Barrier,
    Union(Vec<Traversal>),
    Choose {
        condition: ChooseCondition,
        true_branch: Traversal,
        false_branch: Traversal,
    },
    Repeat {
        body: Traversal,
        times: Option<u32>,
        until: Option<Traversal>,
        emit: bool,
    },
    AddVertex {
        parameters: Parameters,
        callbacks: CallbackRegistry,
    },
    AddEdge {
        parameters: Parameters,
        callbacks: CallbackRegistry,
    },
    AddProperty {
        parameters: Parameters,
        callbacks: CallbackRegistry,
    },
}

/// A labeled pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    labels: BTreeSet<String>,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            labels: BTreeSet::new(),
        }
    }

    pub fn labeled(kind: StepKind, label: impl Into<String>) -> Self {
        let mut step = Self::new(kind);
        step.add_label(label);
        step
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }

    pub fn remove_label(&mut self, label: &str) {
        self.labels.remove(label);
    }

    /// Detach all labels, e.g. to move them onto another step
    pub fn take_labels(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.labels)
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, StepKind::Graph { .. } | StepKind::Inject(_))
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::default();
        match &self.kind {
            StepKind::Graph { .. } | StepKind::Inject(_) => caps.flat_map = true,
            StepKind::Identity => caps.filter = true,
            StepKind::Vertex { .. } | StepKind::EdgeVertex(_) | StepKind::Values(_) => {
                caps.flat_map = true
            }
            StepKind::Unfold => caps.flat_map = true,
            StepKind::EdgeOtherVertex
            | StepKind::Id
            | StepKind::Label
            | StepKind::Constant(_)
            | StepKind::Path
            | StepKind::Sack
            | StepKind::Loops => caps.map = true,
            StepKind::Select(_) => {
                caps.map = true;
                caps.scoping = true;
            }
            StepKind::Has(_)
            | StepKind::Is(_)
            | StepKind::Dedup
            | StepKind::Range { .. }
            | StepKind::Tail(_)
            | StepKind::Coin(_) => caps.filter = true,
            StepKind::TraversalFilter(_)
            | StepKind::And(_)
            | StepKind::Or(_)
            | StepKind::Not(_) => {
                caps.filter = true;
                caps.branch = true;
            }
            StepKind::LambdaFilter(_) => {
                caps.filter = true;
                caps.lambda_holder = true;
            }
            StepKind::LambdaMap(_) => {
                caps.map = true;
                caps.lambda_holder = true;
            }
            StepKind::LambdaFlatMap(_) => {
                caps.flat_map = true;
                caps.lambda_holder = true;
            }
            StepKind::LambdaSideEffect(_) => {
                caps.side_effect = true;
                caps.lambda_holder = true;
            }
            StepKind::SackOperator { .. } => caps.side_effect = true,
            StepKind::Count | StepKind::Sum | StepKind::Mean | StepKind::Fold => {
                caps.map = true;
                caps.barrier = true;
            }
            StepKind::GroupCount(by) => {
                caps.map = true;
                caps.barrier = true;
                caps.branch = matches!(by, By::Traversal(_));
                caps.lambda_holder = matches!(by, By::Function(_));
            }
            StepKind::Order(bys) => {
                caps.barrier = true;
                caps.branch = bys.iter().any(|o| matches!(o.by, By::Traversal(_)));
                caps.lambda_holder = bys.iter().any(|o| {
                    matches!(o.by, By::Function(_)) || matches!(o.comparator, Comparator::Lambda(_))
                });
            }
            StepKind::Aggregate(_) => {
                caps.side_effect = true;
                caps.barrier = true;
            }
            StepKind::Store(_) => caps.side_effect = true,
            StepKind::Cap(_) => {
                caps.map = true;
                caps.barrier = true;
            }
            StepKind::Barrier => caps.barrier = true,
            StepKind::Union(_) | StepKind::Repeat { .. } => caps.branch = true,
            StepKind::Choose { condition, .. } => {
                caps.branch = true;
                caps.lambda_holder = matches!(condition, ChooseCondition::Lambda(_));
            }
            StepKind::AddVertex { .. } | StepKind::AddEdge { .. } => {
                caps.map = true;
                caps.mutating = true;
                caps.parameterizing = true;
            }
            StepKind::AddProperty { .. } => {
                caps.side_effect = true;
                caps.mutating = true;
                caps.parameterizing = true;
            }
        }
        caps
    }

    /// Requirements of this step alone; children are accounted for by the traversal
    pub fn requirements(&self) -> Requirements {
        use TraverserRequirement as R;
        let mut requirements = Requirements::of(&[R::Object]);
        match &self.kind {
            StepKind::Path | StepKind::EdgeOtherVertex => requirements.insert(R::Path),
            StepKind::Select(_) => requirements.insert(R::LabeledPath),
            StepKind::Sack | StepKind::SackOperator { .. } => requirements.insert(R::Sack),
            StepKind::Loops | StepKind::Repeat { .. } => requirements.insert(R::SingleLoop),
            StepKind::Aggregate(_)
            | StepKind::Store(_)
            | StepKind::Cap(_)
            | StepKind::LambdaSideEffect(_) => requirements.insert(R::SideEffects),
            _ => {}
        }
        if self.capabilities().barrier
            || matches!(self.kind, StepKind::Range { .. } | StepKind::Tail(_))
        {
            requirements.insert(R::Bulk);
        }
        requirements
    }

    /// Child traversals in declaration order
    pub fn children(&self) -> Vec<&Traversal> {
        match &self.kind {
            StepKind::TraversalFilter(t) | StepKind::Not(t) => vec![t],
            StepKind::And(ts) | StepKind::Or(ts) | StepKind::Union(ts) => ts.iter().collect(),
            StepKind::GroupCount(By::Traversal(t)) => vec![t],
            StepKind::Order(bys) => bys
                .iter()
                .filter_map(|o| match &o.by {
                    By::Traversal(t) => Some(t),
                    _ => None,
                })
                .collect(),
            StepKind::Choose {
                condition,
                true_branch,
                false_branch,
            } => {
                let mut children = Vec::new();
                if let ChooseCondition::Traversal(t) = condition {
                    children.push(t);
                }
                children.push(true_branch);
                children.push(false_branch);
                children
            }
            StepKind::Repeat { body, until, .. } => {
                let mut children = vec![body];
                children.extend(until.iter());
                children
            }
            StepKind::AddVertex { parameters, .. }
            | StepKind::AddEdge { parameters, .. }
            | StepKind::AddProperty { parameters, .. } => parameters.traversals().collect(),
            _ => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Traversal> {
        match &mut self.kind {
            StepKind::TraversalFilter(t) | StepKind::Not(t) => vec![t],
            StepKind::And(ts) | StepKind::Or(ts) | StepKind::Union(ts) => ts.iter_mut().collect(),
            StepKind::GroupCount(By::Traversal(t)) => vec![t],
            StepKind::Order(bys) => bys
                .iter_mut()
                .filter_map(|o| match &mut o.by {
                    By::Traversal(t) => Some(t),
                    _ => None,
                })
                .collect(),
            StepKind::Choose {
                condition,
                true_branch,
                false_branch,
            } => {
                let mut children = Vec::new();
                if let ChooseCondition::Traversal(t) = condition {
                    children.push(t);
                }
                children.push(true_branch);
                children.push(false_branch);
                children
            }
            StepKind::Repeat { body, until, .. } => {
                let mut children = vec![body];
                children.extend(until.iter_mut());
                children
            }
            StepKind::AddVertex { parameters, .. }
            | StepKind::AddEdge { parameters, .. }
            | StepKind::AddProperty { parameters, .. } => parameters.traversals_mut().collect(),
            _ => Vec::new(),
        }
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        match &self.kind {
            StepKind::AddVertex { parameters, .. }
            | StepKind::AddEdge { parameters, .. }
            | StepKind::AddProperty { parameters, .. } => Some(parameters),
            _ => None,
        }
    }

    pub fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        match &mut self.kind {
            StepKind::AddVertex { parameters, .. }
            | StepKind::AddEdge { parameters, .. }
            | StepKind::AddProperty { parameters, .. } => Some(parameters),
            _ => None,
        }
    }

    /// Event callbacks of a mutating step
    pub fn callbacks(&self) -> Option<&CallbackRegistry> {
        match &self.kind {
            StepKind::AddVertex { callbacks, .. }
            | StepKind::AddEdge { callbacks, .. }
            | StepKind::AddProperty { callbacks, .. } => Some(callbacks),
            _ => None,
        }
    }

    pub fn callbacks_mut(&mut self) -> Option<&mut CallbackRegistry> {
        match &mut self.kind {
            StepKind::AddVertex { callbacks, .. }
            | StepKind::AddEdge { callbacks, .. }
            | StepKind::AddProperty { callbacks, .. } => Some(callbacks),
            _ => None,
        }
    }

    /// Name used in traversal renderings
    pub fn name(&self) -> &'static str {
        match &self.kind {
            StepKind::Graph { .. } => "GraphStep",
            StepKind::Inject(_) => "InjectStep",
            StepKind::Identity => "IdentityStep",
            StepKind::Vertex { .. } => "VertexStep",
            StepKind::EdgeVertex(_) => "EdgeVertexStep",
            StepKind::EdgeOtherVertex => "EdgeOtherVertexStep",
            StepKind::Has(_) => "HasStep",
            StepKind::TraversalFilter(_) => "TraversalFilterStep",
            StepKind::LambdaFilter(_) => "LambdaFilterStep",
            StepKind::And(_) => "AndStep",
            StepKind::Or(_) => "OrStep",
            StepKind::Not(_) => "NotStep",
            StepKind::Is(_) => "IsStep",
            StepKind::Dedup => "DedupGlobalStep",
            StepKind::Range { .. } => "RangeGlobalStep",
            StepKind::Tail(_) => "TailGlobalStep",
            StepKind::Coin(_) => "CoinStep",
            StepKind::Id => "IdStep",
            StepKind::Label => "LabelStep",
            StepKind::Values(_) => "PropertiesStep",
            StepKind::Constant(_) => "ConstantStep",
            StepKind::Path => "PathStep",
            StepKind::Select(labels) if labels.len() == 1 => "SelectOneStep",
            StepKind::Select(_) => "SelectStep",
            StepKind::Sack => "SackStep",
            StepKind::SackOperator { .. } => "SackValueStep",
            StepKind::Loops => "LoopsStep",
            StepKind::Unfold => "UnfoldStep",
            StepKind::LambdaMap(_) => "LambdaMapStep",
            StepKind::LambdaFlatMap(_) => "LambdaFlatMapStep",
            StepKind::LambdaSideEffect(_) => "LambdaSideEffectStep",
            StepKind::Count => "CountGlobalStep",
            StepKind::Sum => "SumGlobalStep",
            StepKind::Mean => "MeanGlobalStep",
            StepKind::Fold => "FoldStep",
            StepKind::GroupCount(_) => "GroupCountStep",
            StepKind::Order(_) => "OrderGlobalStep",
            StepKind::Aggregate(_) => "AggregateStep",
            StepKind::Store(_) => "StoreStep",
            StepKind::Cap(_) => "SideEffectCapStep",
            StepKind::Barrier => "NoOpBarrierStep",
            StepKind::Union(_) => "UnionStep",
            StepKind::Choose { .. } => "ChooseStep",
            StepKind::Repeat { .. } => "RepeatStep",
            StepKind::AddVertex { .. } => "AddVertexStep",
            StepKind::AddEdge { .. } => "AddEdgeStep",
            StepKind::AddProperty { .. } => "AddPropertyStep",
        }
    }

    fn arguments(&self) -> Option<String> {
        let joined = |items: Vec<String>| items.join(", ");
        let arguments = match &self.kind {
            StepKind::Graph { returns, ids } => format!(
                "{},[{}]",
                returns,
                joined(ids.iter().map(|v| v.to_string()).collect())
            ),
            StepKind::Inject(values) => joined(values.iter().map(|v| v.to_string()).collect()),
            StepKind::Vertex {
                direction,
                edge_labels,
                returns,
            } => {
                if edge_labels.is_empty() {
                    format!("{},{}", direction, returns)
                } else {
                    format!("{},{},{}", direction, render_strings(edge_labels), returns)
                }
            }
            StepKind::EdgeVertex(direction) => direction.to_string(),
            StepKind::Has(containers) => format!(
                "[{}]",
                joined(containers.iter().map(|c| c.to_string()).collect())
            ),
            StepKind::TraversalFilter(t) | StepKind::Not(t) => t.to_string(),
            StepKind::LambdaFilter(l) => l.to_string(),
            StepKind::LambdaMap(l) => l.to_string(),
            StepKind::LambdaFlatMap(l) => l.to_string(),
            StepKind::LambdaSideEffect(l) => l.to_string(),
            StepKind::And(ts) | StepKind::Or(ts) | StepKind::Union(ts) => render_traversals(ts),
            StepKind::Is(p) => p.to_string(),
            StepKind::Range { low, high } => format!(
                "{},{}",
                low,
                high.map(|h| h as i64).unwrap_or(-1)
            ),
            StepKind::Tail(n) => n.to_string(),
            StepKind::Coin(p) => p.to_string(),
            StepKind::Values(keys) => format!("{},value", render_strings(keys)),
            StepKind::Constant(v) => v.to_string(),
            StepKind::Select(labels) if labels.len() == 1 => labels[0].clone(),
            StepKind::Select(labels) => render_strings(labels),
            StepKind::SackOperator { operator, by } => match by {
                Some(key) => format!("{},value({})", operator, key),
                None => operator.to_string(),
            },
            StepKind::GroupCount(by) => by.to_string(),
            StepKind::Order(bys) => format!(
                "[{}]",
                joined(
                    bys.iter()
                        .map(|o| format!("[{}, {}]", o.by, o.comparator))
                        .collect()
                )
            ),
            StepKind::Aggregate(key) | StepKind::Store(key) => key.clone(),
            StepKind::Cap(key) => format!("[{}]", key),
            StepKind::Choose {
                condition,
                true_branch,
                false_branch,
            } => {
                let condition = match condition {
                    ChooseCondition::Traversal(t) => t.to_string(),
                    ChooseCondition::Lambda(l) => l.to_string(),
                };
                format!("{},{},{}", condition, true_branch, false_branch)
            }
            StepKind::Repeat {
                body,
                times,
                until,
                emit,
            } => {
                let mut parts = vec![body.to_string()];
                if let Some(n) = times {
                    parts.push(format!("times({})", n));
                }
                if let Some(until) = until {
                    parts.push(format!("until({})", until));
                }
                if *emit {
                    parts.push("emit(true)".to_string());
                }
                parts.join(",")
            }
            StepKind::AddVertex { parameters, .. }
            | StepKind::AddEdge { parameters, .. }
            | StepKind::AddProperty { parameters, .. } => parameters.to_string(),
            StepKind::Identity
            | StepKind::EdgeOtherVertex
            | StepKind::Dedup
            | StepKind::Id
            | StepKind::Label
            | StepKind::Path
            | StepKind::Sack
            | StepKind::Loops
            | StepKind::Unfold
            | StepKind::Count
            | StepKind::Sum
            | StepKind::Mean
            | StepKind::Fold
            | StepKind::Barrier => return None,
        };
        Some(arguments)
    }
}

fn render_traversals(traversals: &[Traversal]) -> String {
    let rendered: Vec<String> = traversals.iter().map(|t| t.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

fn render_strings(strings: &[String]) -> String {
    format!("[{}]", strings.join(", "))
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(arguments) = self.arguments() {
            write!(f, "({})", arguments)?;
        }
        if !self.labels.is_empty() {
            let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
            write!(f, "@[{}]", labels.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::traversal::__;

    #[test]
    fn test_display_matches_pipeline_rendering() {
        let step = Step::labeled(
            StepKind::Vertex {
                direction: Direction::Out,
                edge_labels: vec!["knows".to_string()],
                returns: ElementType::Edge,
            },
            "a",
        );
        assert_eq!(step.to_string(), "VertexStep(OUT,[knows],edge)@[a]");

        let has = Step::new(StepKind::Has(vec![HasContainer::new("name", P::eq("marko"))]));
        assert_eq!(has.to_string(), "HasStep([name.eq(marko)])");
        assert_eq!(Step::new(StepKind::Identity).to_string(), "IdentityStep");
    }

    #[test]
    fn test_capabilities() {
        let filter = Step::new(StepKind::LambdaFilter(FilterLambda::new(|_| true)));
        let caps = filter.capabilities();
        assert!(caps.filter && caps.lambda_holder);
        assert!(!caps.mutating);

        let add = Step::new(StepKind::AddVertex {
            parameters: Parameters::new(),
            callbacks: CallbackRegistry::new(),
        });
        assert!(add.capabilities().mutating);
        assert!(add.callbacks().is_some());

        let order = Step::new(StepKind::Order(vec![OrderBy {
            by: By::Key("age".to_string()),
            comparator: Comparator::Lambda(ComparatorLambda::new(|a, b| a.total_cmp(b))),
        }]));
        assert!(order.capabilities().lambda_holder);
    }

    #[test]
    fn test_children_follow_declaration_order() {
        let step = Step::new(StepKind::Choose {
            condition: ChooseCondition::Traversal(__::out(())),
            true_branch: __::values("name"),
            false_branch: __::identity(),
        });
        let children: Vec<String> = step.children().iter().map(|t| t.to_string()).collect();
        assert_eq!(
            children,
            vec![
                "[VertexStep(OUT,vertex)]",
                "[PropertiesStep([name],value)]",
                "[IdentityStep]",
            ]
        );
    }

    #[test]
    fn test_requirements() {
        let path = Step::new(StepKind::Path);
        assert!(path.requirements().contains(TraverserRequirement::Path));
        let count = Step::new(StepKind::Count);
        assert!(count.requirements().contains(TraverserRequirement::Bulk));
        assert!(!Step::new(StepKind::Id)
            .requirements()
            .contains(TraverserRequirement::Bulk));
    }

    #[test]
    fn test_sack_operators() {
        let a = Value::from(1.0);
        let b = Value::from(0.5);
        assert_eq!(Operator::Mult.apply(&a, &b).unwrap(), Value::Float(0.5));
        assert_eq!(Operator::Minus.apply(&Value::from(3), &Value::from(1)).unwrap(), Value::from(2));
        assert_eq!(Operator::Max.apply(&a, &b).unwrap(), a);
        assert!(Operator::Div.apply(&Value::from(1), &Value::from(0)).is_err());
        assert!(Operator::Sum.apply(&Value::from("x"), &b).is_err());
    }
}
