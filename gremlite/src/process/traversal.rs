// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Traversals and the fluent builder
//!
//! A [`Traversal`] is an ordered list of [`Step`]s plus everything needed to
//! run it: the graph, the strategies, the sack configuration and the side
//! effects. Root traversals are spawned from a [`GraphTraversalSource`];
//! anonymous child traversals come from the [`__`] module.
//!
//! Builder methods never fail. Misuse (a `by()` with nothing to modulate, an
//! out-of-range argument...) is recorded and reported on the first attempt to
//! apply strategies or iterate.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::process::event::CallbackRegistry;
use crate::process::execution::{root_stream, ExecContext, SackConfig, SideEffects, TraverserStream};
use crate::process::lambda::{
    ComparatorLambda, ConsumerLambda, FilterLambda, FlatMapLambda, FunctionLambda, MapLambda,
};
use crate::process::parameters::{ParamKey, ParamValue, Parameters};
use crate::process::predicate::P;
use crate::process::step::{
    By, ChooseCondition, Comparator, ElementType, HasContainer, Operator, Order, OrderBy, Step,
    StepKind,
};
use crate::process::strategy::{TraversalStrategies, TraversalStrategy};
use crate::process::traverser::{Requirements, Traverser, TraverserGenerator, TraverserRequirement};
use crate::structure::{Direction, Graph, Value, T};

/// Step labels, edge labels or property keys given to a builder method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels(pub Vec<String>);

impl From<()> for Labels {
    fn from(_: ()) -> Self {
        Labels(Vec::new())
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels(vec![label.to_string()])
    }
}

impl From<String> for Labels {
    fn from(label: String) -> Self {
        Labels(vec![label])
    }
}

impl From<Vec<&str>> for Labels {
    fn from(labels: Vec<&str>) -> Self {
        Labels(labels.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Labels(labels)
    }
}

impl<const N: usize> From<[&str; N]> for Labels {
    fn from(labels: [&str; N]) -> Self {
        Labels(labels.iter().map(|s| s.to_string()).collect())
    }
}

/// Element ids given to `V()`, `E()` and `hasId()`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ids(pub Vec<Value>);

impl From<()> for Ids {
    fn from(_: ()) -> Self {
        Ids(Vec::new())
    }
}

impl From<i64> for Ids {
    fn from(id: i64) -> Self {
        Ids(vec![Value::Integer(id)])
    }
}

impl From<i32> for Ids {
    fn from(id: i32) -> Self {
        Ids(vec![Value::from(id)])
    }
}

impl From<&str> for Ids {
    fn from(id: &str) -> Self {
        Ids(vec![Value::from(id)])
    }
}

impl From<Value> for Ids {
    fn from(id: Value) -> Self {
        Ids(vec![id])
    }
}

impl<V: Into<Value>> From<Vec<V>> for Ids {
    fn from(ids: Vec<V>) -> Self {
        Ids(ids.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Ids {
    fn from(ids: [V; N]) -> Self {
        Ids(ids.into_iter().map(Into::into).collect())
    }
}

/// Anything `has()` and `is()` accept: a predicate, or a literal meaning `eq(literal)`
pub trait IntoPredicate {
    fn into_predicate(self) -> P;
}

impl IntoPredicate for P {
    fn into_predicate(self) -> P {
        self
    }
}

macro_rules! literal_predicate {
    ($($ty:ty),*) => {
        $(
            impl IntoPredicate for $ty {
                fn into_predicate(self) -> P {
                    P::eq(self)
                }
            }
        )*
    };
}

literal_predicate!(&str, String, i64, i32, f64, bool, Value);

/// A pipeline of steps, its strategies and its iteration state
pub struct Traversal {
    steps: Vec<Step>,
    strategies: TraversalStrategies,
    graph: Option<Arc<dyn Graph>>,
    sack: Option<SackConfig>,
    bulking: bool,
    side_effects: SideEffects,
    locked: bool,
    results: Option<TraverserStream>,
    peeked: Option<Traverser>,
    /// Traverser being unrolled by `next()` and how many copies remain
    pending: Option<(Traverser, u64)>,
    failed: bool,
    build_error: Option<TraversalError>,
}

impl Traversal {
    /// Empty anonymous traversal
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            strategies: TraversalStrategies::new(),
            graph: None,
            sack: None,
            bulking: true,
            side_effects: SideEffects::new(),
            locked: false,
            results: None,
            peeked: None,
            pending: None,
            failed: false,
            build_error: None,
        }
    }

    fn spawn(source: &GraphTraversalSource) -> Self {
        let mut traversal = Self::new();
        traversal.graph = Some(Arc::clone(&source.graph));
        traversal.strategies = source.strategies.clone();
        traversal.sack = source.sack.clone();
        traversal.bulking = source.bulking;
        traversal
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut Vec<Step> {
        &mut self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn strategies(&self) -> &TraversalStrategies {
        &self.strategies
    }

    pub fn set_strategies(&mut self, strategies: TraversalStrategies) {
        self.strategies = strategies;
    }

    pub fn graph(&self) -> Option<&Arc<dyn Graph>> {
        self.graph.as_ref()
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    pub fn sack_config(&self) -> Option<&SackConfig> {
        self.sack.as_ref()
    }

    pub fn is_bulking(&self) -> bool {
        self.bulking
    }

    /// Whether strategies have been applied
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The first builder misuse, if any
    pub fn error(&self) -> Option<&TraversalError> {
        self.build_error.as_ref()
    }

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn insert_step(&mut self, index: usize, step: Step) {
        self.steps.insert(index, step);
    }

    pub fn remove_step(&mut self, index: usize) -> Step {
        self.steps.remove(index)
    }

    /// Visit this traversal and every child traversal, parents before children
    pub fn apply_recursively(
        &mut self,
        f: &mut dyn FnMut(&mut Traversal) -> TraversalResult<()>,
    ) -> TraversalResult<()> {
        f(self)?;
        for step in &mut self.steps {
            for child in step.children_mut() {
                child.apply_recursively(f)?;
            }
        }
        Ok(())
    }

    /// Whether any step in this traversal or its children satisfies `test`
    pub fn any_step(&self, test: &dyn Fn(&Step) -> bool) -> bool {
        self.steps
            .iter()
            .any(|step| test(step) || step.children().iter().any(|child| child.any_step(test)))
    }

    /// Run every registered strategy and lock the traversal
    pub fn apply_strategies(&mut self) -> TraversalResult<()> {
        if let Some(error) = &self.build_error {
            return Err(error.clone());
        }
        if self.locked {
            log::warn!("Strategies are being re-applied to a locked traversal: {}", self);
        }
        let strategies = self.strategies.clone();
        strategies.apply(self)?;
        self.locked = true;
        Ok(())
    }

    /// Union of the requirements of every step, including children
    pub fn requirements(&self) -> Requirements {
        use TraverserRequirement as R;
        let mut requirements = collect_requirements(&self.steps, false);
        if self.sack.is_some() {
            requirements.insert(R::Sack);
        }
        if !self.bulking {
            requirements.remove(R::Bulk);
            requirements.insert(R::OneBulk);
        }
        requirements
    }

    fn start(&mut self) -> TraversalResult<()> {
        if self.results.is_some() {
            return Ok(());
        }
        if !self.locked {
            self.apply_strategies()?;
        }
        let generator = TraverserGenerator::select(self.requirements())?;
        log::debug!("Traversal {} uses traverser generator {}", self, generator.name());
        let ctx = ExecContext::new(
            self.graph.clone(),
            self.side_effects.clone(),
            generator,
            self.sack.clone(),
            self.bulking,
        );
        self.results = Some(root_stream(&self.steps, &ctx));
        Ok(())
    }

    fn pull(&mut self) -> TraversalResult<Option<Traverser>> {
        if self.failed {
            return Ok(None);
        }
        if let Some(traverser) = self.peeked.take() {
            return Ok(Some(traverser));
        }
        let pulled = match self.start() {
            Ok(()) => match self.results.as_mut().and_then(Iterator::next) {
                Some(result) => result.map(Some),
                None => Ok(None),
            },
            Err(e) => Err(e),
        };
        if pulled.is_err() {
            self.failed = true;
        }
        pulled
    }

    /// Next traverser, with its bulk
    pub fn next_traverser(&mut self) -> TraversalResult<Option<Traverser>> {
        if let Some((mut traverser, remaining)) = self.pending.take() {
            traverser.set_bulk(remaining);
            return Ok(Some(traverser));
        }
        self.pull()
    }

    pub fn has_next(&mut self) -> TraversalResult<bool> {
        if self.pending.is_some() || self.peeked.is_some() {
            return Ok(true);
        }
        match self.pull()? {
            Some(traverser) => {
                self.peeked = Some(traverser);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next result value; a traverser with bulk `n` yields its value `n` times
    pub fn next(&mut self) -> TraversalResult<Option<Value>> {
        let (traverser, remaining) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.pull()? {
                Some(traverser) => {
                    let bulk = traverser.bulk();
                    (traverser, bulk)
                }
                None => return Ok(None),
            },
        };
        let value = traverser.get().clone();
        if remaining > 1 {
            self.pending = Some((traverser, remaining - 1));
        }
        Ok(Some(value))
    }

    /// Iterator over the remaining traversers
    pub fn iter(&mut self) -> Traversers<'_> {
        Traversers { traversal: self }
    }

    /// All remaining values with bulk unrolled
    pub fn to_list(&mut self) -> TraversalResult<Vec<Value>> {
        let mut values = Vec::new();
        while let Some(value) = self.next()? {
            values.push(value);
        }
        Ok(values)
    }

    /// Drain the traversal for its side effects
    pub fn iterate(&mut self) -> TraversalResult<()> {
        while self.next_traverser()?.is_some() {}
        Ok(())
    }

    // --- builder -------------------------------------------------------

    fn push(mut self, kind: StepKind) -> Self {
        self.steps.push(Step::new(kind));
        self
    }

    fn fail(mut self, error: TraversalError) -> Self {
        if self.build_error.is_none() {
            self.build_error = Some(error);
        }
        self
    }

    fn absorb(&mut self, child: &Traversal) {
        if self.build_error.is_none() {
            self.build_error = child.build_error.clone();
        }
    }

    fn with_children(mut self, children: &[Traversal]) -> Self {
        for child in children {
            self.absorb(child);
        }
        self
    }

    pub fn v(self, ids: impl Into<Ids>) -> Self {
        self.push(StepKind::Graph {
            returns: ElementType::Vertex,
            ids: ids.into().0,
        })
    }

    pub fn e(self, ids: impl Into<Ids>) -> Self {
        self.push(StepKind::Graph {
            returns: ElementType::Edge,
            ids: ids.into().0,
        })
    }

    pub fn inject<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        self.push(StepKind::Inject(values.into_iter().map(Into::into).collect()))
    }

    pub fn identity(self) -> Self {
        self.push(StepKind::Identity)
    }

    fn vertex_step(self, direction: Direction, labels: Labels, returns: ElementType) -> Self {
        self.push(StepKind::Vertex {
            direction,
            edge_labels: labels.0,
            returns,
        })
    }

    pub fn out(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::Out, labels.into(), ElementType::Vertex)
    }

    pub fn in_(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::In, labels.into(), ElementType::Vertex)
    }

    pub fn both(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::Both, labels.into(), ElementType::Vertex)
    }

    pub fn out_e(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::Out, labels.into(), ElementType::Edge)
    }

    pub fn in_e(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::In, labels.into(), ElementType::Edge)
    }

    pub fn both_e(self, labels: impl Into<Labels>) -> Self {
        self.vertex_step(Direction::Both, labels.into(), ElementType::Edge)
    }

    pub fn out_v(self) -> Self {
        self.push(StepKind::EdgeVertex(Direction::Out))
    }

    pub fn in_v(self) -> Self {
        self.push(StepKind::EdgeVertex(Direction::In))
    }

    pub fn both_v(self) -> Self {
        self.push(StepKind::EdgeVertex(Direction::Both))
    }

    pub fn other_v(self) -> Self {
        self.push(StepKind::EdgeOtherVertex)
    }

    /// Append a condition, merging into a preceding unlabeled has step
    fn has_container(mut self, container: HasContainer) -> Self {
        if let Some(step) = self.steps.last_mut() {
            if step.labels().is_empty() {
                if let StepKind::Has(containers) = &mut step.kind {
                    containers.push(container);
                    return self;
                }
            }
        }
        self.push(StepKind::Has(vec![container]))
    }

    pub fn has(self, key: &str, predicate: impl IntoPredicate) -> Self {
        if key.is_empty() {
            return self.fail(TraversalError::IllegalArgument(
                "The key of a has() step can not be empty".to_string(),
            ));
        }
        self.has_container(HasContainer::new(key, predicate.into_predicate()))
    }

    pub fn has_t(self, token: T, predicate: impl IntoPredicate) -> Self {
        self.has_container(HasContainer::new(token.accessor(), predicate.into_predicate()))
    }

    pub fn has_label(self, labels: impl Into<Labels>) -> Self {
        let labels = labels.into().0;
        let predicate = match labels.as_slice() {
            [] => {
                return self.fail(TraversalError::IllegalArgument(
                    "hasLabel() requires at least one label".to_string(),
                ))
            }
            [label] => P::eq(label.as_str()),
            _ => P::within(labels),
        };
        self.has_t(T::Label, predicate)
    }

    pub fn has_id(self, ids: impl Into<Ids>) -> Self {
        let ids = ids.into().0;
        let predicate = match ids.as_slice() {
            [] => {
                return self.fail(TraversalError::IllegalArgument(
                    "hasId() requires at least one id".to_string(),
                ))
            }
            [id] => P::eq(id.clone()),
            _ => P::within(ids),
        };
        self.has_t(T::Id, predicate)
    }

    /// Elements that have a value for `key`
    pub fn has_key(self, key: &str) -> Self {
        self.push(StepKind::TraversalFilter(__::values(key)))
    }

    /// Elements that have no value for `key`
    pub fn has_not(self, key: &str) -> Self {
        self.push(StepKind::Not(__::values(key)))
    }

    pub fn filter(self, child: Traversal) -> Self {
        self.with_children(std::slice::from_ref(&child))
            .push(StepKind::TraversalFilter(child))
    }

    pub fn filter_fn(self, f: impl Fn(&Traverser) -> bool + Send + Sync + 'static) -> Self {
        self.push(StepKind::LambdaFilter(FilterLambda::new(f)))
    }

    pub fn and(self, children: Vec<Traversal>) -> Self {
        self.with_children(&children).push(StepKind::And(children))
    }

    pub fn or(self, children: Vec<Traversal>) -> Self {
        self.with_children(&children).push(StepKind::Or(children))
    }

    pub fn not(self, child: Traversal) -> Self {
        self.with_children(std::slice::from_ref(&child))
            .push(StepKind::Not(child))
    }

    pub fn is(self, predicate: impl IntoPredicate) -> Self {
        self.push(StepKind::Is(predicate.into_predicate()))
    }

    pub fn dedup(self) -> Self {
        self.push(StepKind::Dedup)
    }

    pub fn limit(self, limit: u64) -> Self {
        self.push(StepKind::Range {
            low: 0,
            high: Some(limit),
        })
    }

    /// `high` of `-1` leaves the range unbounded
    pub fn range(self, low: u64, high: i64) -> Self {
        let high = match high {
            -1 => None,
            h if h >= 0 && (h as u64) >= low => Some(h as u64),
            h => {
                return self.fail(TraversalError::IllegalArgument(format!(
                    "Not a legal range: [{}, {}]",
                    low, h
                )))
            }
        };
        self.push(StepKind::Range { low, high })
    }

    pub fn tail(self, limit: u64) -> Self {
        self.push(StepKind::Tail(limit))
    }

    pub fn coin(self, probability: f64) -> Self {
        if !(0.0..=1.0).contains(&probability) {
            return self.fail(TraversalError::IllegalArgument(format!(
                "The coin probability must be between 0 and 1: {}",
                probability
            )));
        }
        self.push(StepKind::Coin(probability))
    }

    pub fn id(self) -> Self {
        self.push(StepKind::Id)
    }

    pub fn label(self) -> Self {
        self.push(StepKind::Label)
    }

    pub fn values(self, keys: impl Into<Labels>) -> Self {
        self.push(StepKind::Values(keys.into().0))
    }

    pub fn constant(self, value: impl Into<Value>) -> Self {
        self.push(StepKind::Constant(value.into()))
    }

    pub fn path(self) -> Self {
        self.push(StepKind::Path)
    }

    pub fn select(self, labels: impl Into<Labels>) -> Self {
        let labels = labels.into().0;
        if labels.is_empty() {
            return self.fail(TraversalError::IllegalArgument(
                "select() requires at least one label".to_string(),
            ));
        }
        self.push(StepKind::Select(labels))
    }

    pub fn sack(self) -> Self {
        self.push(StepKind::Sack)
    }

    /// `sack(operator)`; follow with `by(key)` to combine with a property instead of the value
    pub fn sack_op(self, operator: Operator) -> Self {
        self.push(StepKind::SackOperator { operator, by: None })
    }

    pub fn loops(self) -> Self {
        self.push(StepKind::Loops)
    }

    pub fn unfold(self) -> Self {
        self.push(StepKind::Unfold)
    }

    pub fn map_fn(self, f: impl Fn(&Traverser) -> Value + Send + Sync + 'static) -> Self {
        self.push(StepKind::LambdaMap(MapLambda::new(f)))
    }

    pub fn flat_map_fn(self, f: impl Fn(&Traverser) -> Vec<Value> + Send + Sync + 'static) -> Self {
        self.push(StepKind::LambdaFlatMap(FlatMapLambda::new(f)))
    }

    pub fn side_effect_fn(self, f: impl Fn(&Traverser) + Send + Sync + 'static) -> Self {
        self.push(StepKind::LambdaSideEffect(ConsumerLambda::new(f)))
    }

    pub fn count(self) -> Self {
        self.push(StepKind::Count)
    }

    pub fn sum(self) -> Self {
        self.push(StepKind::Sum)
    }

    pub fn mean(self) -> Self {
        self.push(StepKind::Mean)
    }

    pub fn fold(self) -> Self {
        self.push(StepKind::Fold)
    }

    pub fn group_count(self) -> Self {
        self.push(StepKind::GroupCount(By::Identity))
    }

    pub fn order(self) -> Self {
        self.push(StepKind::Order(Vec::new()))
    }

    /// Modulate the last step with a projection
    pub fn by(self, by: impl Into<By>) -> Self {
        self.modulate(by.into(), None)
    }

    /// Modulate an `order()` with a projection and direction
    pub fn by_order(self, by: impl Into<By>, order: Order) -> Self {
        self.modulate(by.into(), Some(Comparator::Order(order)))
    }

    /// Modulate an `order()` with a projection and a comparator closure
    pub fn by_comparator(
        self,
        by: impl Into<By>,
        f: impl Fn(&Value, &Value) -> std::cmp::Ordering + Send + Sync + 'static,
    ) -> Self {
        self.modulate(by.into(), Some(Comparator::Lambda(ComparatorLambda::new(f))))
    }

    fn modulate(mut self, by: By, comparator: Option<Comparator>) -> Self {
        if let By::Traversal(child) = &by {
            self.absorb(child);
        }
        let accepted = match self.steps.last_mut().map(|step| &mut step.kind) {
            Some(StepKind::Order(bys)) => {
                bys.push(OrderBy {
                    by,
                    comparator: comparator.unwrap_or(Comparator::Order(Order::Incr)),
                });
                true
            }
            Some(StepKind::GroupCount(current)) if comparator.is_none() => {
                *current = by;
                true
            }
            Some(StepKind::SackOperator { by: current, .. }) if comparator.is_none() => {
                match by {
                    By::Key(key) => {
                        *current = Some(key);
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if accepted {
            self
        } else {
            let step = self
                .steps
                .last()
                .map(|s| s.name())
                .unwrap_or("the empty traversal");
            let error = TraversalError::IllegalArgument(format!(
                "The by() modulator is not supported by {}",
                step
            ));
            self.fail(error)
        }
    }

    pub fn aggregate(self, key: &str) -> Self {
        self.push(StepKind::Aggregate(key.to_string()))
    }

    pub fn store(self, key: &str) -> Self {
        self.push(StepKind::Store(key.to_string()))
    }

    pub fn cap(self, key: &str) -> Self {
        self.push(StepKind::Cap(key.to_string()))
    }

    pub fn barrier(self) -> Self {
        self.push(StepKind::Barrier)
    }

    pub fn union(self, children: Vec<Traversal>) -> Self {
        self.with_children(&children).push(StepKind::Union(children))
    }

    pub fn choose(self, condition: Traversal, true_branch: Traversal, false_branch: Traversal) -> Self {
        let children = [condition, true_branch, false_branch];
        let mut traversal = self.with_children(&children);
        let [condition, true_branch, false_branch] = children;
        traversal.steps.push(Step::new(StepKind::Choose {
            condition: ChooseCondition::Traversal(condition),
            true_branch,
            false_branch,
        }));
        traversal
    }

    pub fn choose_fn(
        self,
        f: impl Fn(&Traverser) -> bool + Send + Sync + 'static,
        true_branch: Traversal,
        false_branch: Traversal,
    ) -> Self {
        let children = [true_branch, false_branch];
        let mut traversal = self.with_children(&children);
        let [true_branch, false_branch] = children;
        traversal.steps.push(Step::new(StepKind::Choose {
            condition: ChooseCondition::Lambda(FilterLambda::new(f)),
            true_branch,
            false_branch,
        }));
        traversal
    }

    pub fn repeat(self, body: Traversal) -> Self {
        if body.is_empty() {
            return self.fail(TraversalError::IllegalArgument(
                "The repeat() body can not be empty".to_string(),
            ));
        }
        self.with_children(std::slice::from_ref(&body))
            .push(StepKind::Repeat {
                body,
                times: None,
                until: None,
                emit: false,
            })
    }

    fn modify_repeat(mut self, modulator: &str, f: impl FnOnce(&mut StepKind)) -> Self {
        match self.steps.last_mut() {
            Some(step) if matches!(step.kind, StepKind::Repeat { .. }) => {
                f(&mut step.kind);
                self
            }
            _ => self.fail(TraversalError::IllegalArgument(format!(
                "{}() must follow a repeat() step",
                modulator
            ))),
        }
    }

    pub fn times(self, n: u32) -> Self {
        self.modify_repeat("times", |kind| {
            if let StepKind::Repeat { times, .. } = kind {
                *times = Some(n);
            }
        })
    }

    pub fn until(mut self, condition: Traversal) -> Self {
        self.absorb(&condition);
        self.modify_repeat("until", |kind| {
            if let StepKind::Repeat { until, .. } = kind {
                *until = Some(condition);
            }
        })
    }

    pub fn emit(self) -> Self {
        self.modify_repeat("emit", |kind| {
            if let StepKind::Repeat { emit, .. } = kind {
                *emit = true;
            }
        })
    }

    pub fn add_v(self, label: impl Into<Labels>) -> Self {
        let mut parameters = Parameters::new();
        let result = match label.into().0.as_slice() {
            [] => Ok(()),
            [label] => parameters.set(ParamKey::Label, label.as_str()),
            labels => Err(TraversalError::IllegalArgument(format!(
                "addV() takes a single label: {:?}",
                labels
            ))),
        };
        match result {
            Ok(()) => self.push(StepKind::AddVertex {
                parameters,
                callbacks: CallbackRegistry::new(),
            }),
            Err(e) => self.fail(e),
        }
    }

    pub fn add_e(self, label: &str) -> Self {
        let mut parameters = Parameters::new();
        match parameters.set(ParamKey::Label, label) {
            Ok(()) => self.push(StepKind::AddEdge {
                parameters,
                callbacks: CallbackRegistry::new(),
            }),
            Err(e) => self.fail(e),
        }
    }

    fn add_edge_end(mut self, key: ParamKey, value: ParamValue) -> Self {
        if let ParamValue::Traversal(child) = &value {
            self.absorb(child);
        }
        let result = match self.steps.last_mut().map(|step| &mut step.kind) {
            Some(StepKind::AddEdge { parameters, .. }) => parameters.set(key.clone(), value),
            _ => Err(TraversalError::IllegalArgument(format!(
                "{}() must follow an addE() step",
                key
            ))),
        };
        match result {
            Ok(()) => self,
            Err(e) => self.fail(e),
        }
    }

    /// Out vertex of the edge being added: a vertex, an id or a traversal
    pub fn from(self, vertex: impl Into<ParamValue>) -> Self {
        self.add_edge_end(ParamKey::From, vertex.into())
    }

    pub fn to(self, vertex: impl Into<ParamValue>) -> Self {
        self.add_edge_end(ParamKey::To, vertex.into())
    }

    /// Out vertex given by a step label
    pub fn from_label(self, label: &str) -> Self {
        self.from(__::select(label))
    }

    pub fn to_label(self, label: &str) -> Self {
        self.to(__::select(label))
    }

    /// Set a property; folds into a directly preceding `addV()`/`addE()`
    pub fn property(mut self, key: impl Into<ParamKey>, value: impl Into<ParamValue>) -> Self {
        let key = key.into();
        let value = value.into();
        if let ParamValue::Traversal(child) = &value {
            self.absorb(child);
        }
        let folds = matches!(
            self.steps.last(),
            Some(step) if step.labels().is_empty()
                && matches!(step.kind, StepKind::AddVertex { .. } | StepKind::AddEdge { .. })
        );
        if folds {
            let result = match self.steps.last_mut().and_then(Step::parameters_mut) {
                Some(parameters) => parameters.set(key, value),
                None => Ok(()),
            };
            return match result {
                Ok(()) => self,
                Err(e) => self.fail(e),
            };
        }
        let mut parameters = Parameters::new();
        match parameters.set(key, value) {
            Ok(()) => self.push(StepKind::AddProperty {
                parameters,
                callbacks: CallbackRegistry::new(),
            }),
            Err(e) => self.fail(e),
        }
    }

    /// Label the last step
    pub fn as_(mut self, label: &str) -> Self {
        match self.steps.last_mut() {
            Some(step) => {
                step.add_label(label);
                self
            }
            None => self.fail(TraversalError::IllegalArgument(format!(
                "as({}) requires a preceding step",
                label
            ))),
        }
    }
}

fn collect_requirements(steps: &[Step], in_repeat: bool) -> Requirements {
    use TraverserRequirement as R;
    let mut requirements = Requirements::empty();
    for step in steps {
        requirements = requirements.union(step.requirements());
        if !step.labels().is_empty() {
            requirements.insert(R::LabeledPath);
        }
        let is_repeat = matches!(step.kind, StepKind::Repeat { .. });
        if is_repeat && in_repeat {
            requirements.insert(R::NestedLoop);
        }
        for child in step.children() {
            requirements = requirements.union(collect_requirements(child.steps(), in_repeat || is_repeat));
        }
    }
    requirements.insert(R::Object);
    requirements
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Traversal {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            strategies: self.strategies.clone(),
            graph: self.graph.clone(),
            sack: self.sack.clone(),
            bulking: self.bulking,
            side_effects: self.side_effects.deep_clone(),
            locked: self.locked,
            results: None,
            peeked: None,
            pending: None,
            failed: false,
            build_error: self.build_error.clone(),
        }
    }
}

impl PartialEq for Traversal {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("steps", &self.steps)
            .field("locked", &self.locked)
            .finish()
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", step)?;
        }
        write!(f, "]")
    }
}

/// Iterator over the traversers a traversal produces
pub struct Traversers<'a> {
    traversal: &'a mut Traversal,
}

impl Iterator for Traversers<'_> {
    type Item = TraversalResult<Traverser>;

    fn next(&mut self) -> Option<Self::Item> {
        self.traversal.next_traverser().transpose()
    }
}

impl From<&str> for By {
    fn from(key: &str) -> Self {
        By::Key(key.to_string())
    }
}

impl From<T> for By {
    fn from(token: T) -> Self {
        By::Token(token)
    }
}

impl From<Traversal> for By {
    fn from(traversal: Traversal) -> Self {
        By::Traversal(traversal)
    }
}

impl From<FunctionLambda> for By {
    fn from(lambda: FunctionLambda) -> Self {
        By::Function(lambda)
    }
}

impl From<()> for By {
    fn from(_: ()) -> Self {
        By::Identity
    }
}

/// Anonymous traversals for use as children
#[allow(non_snake_case)]
pub mod __ {
    use super::*;

    macro_rules! anonymous {
        ($($name:ident($($arg:ident: $ty:ty),*);)*) => {
            $(
                pub fn $name($($arg: $ty),*) -> Traversal {
                    Traversal::new().$name($($arg),*)
                }
            )*
        };
    }

    anonymous! {
        identity();
        out(labels: impl Into<Labels>);
        in_(labels: impl Into<Labels>);
        both(labels: impl Into<Labels>);
        out_e(labels: impl Into<Labels>);
        in_e(labels: impl Into<Labels>);
        both_e(labels: impl Into<Labels>);
        out_v();
        in_v();
        both_v();
        other_v();
        has(key: &str, predicate: impl IntoPredicate);
        has_t(token: T, predicate: impl IntoPredicate);
        has_label(labels: impl Into<Labels>);
        has_id(ids: impl Into<Ids>);
        has_key(key: &str);
        has_not(key: &str);
        filter(child: Traversal);
        and(children: Vec<Traversal>);
        or(children: Vec<Traversal>);
        not(child: Traversal);
        is(predicate: impl IntoPredicate);
        dedup();
        limit(limit: u64);
        tail(limit: u64);
        id();
        label();
        values(keys: impl Into<Labels>);
        constant(value: impl Into<Value>);
        path();
        select(labels: impl Into<Labels>);
        sack();
        sack_op(operator: Operator);
        loops();
        unfold();
        count();
        sum();
        mean();
        fold();
        range(low: u64, high: i64);
        coin(probability: f64);
        group_count();
        order();
        aggregate(key: &str);
        store(key: &str);
        cap(key: &str);
        barrier();
        union(children: Vec<Traversal>);
        choose(condition: Traversal, true_branch: Traversal, false_branch: Traversal);
        repeat(body: Traversal);
        add_v(label: impl Into<Labels>);
        add_e(label: &str);
        property(key: impl Into<ParamKey>, value: impl Into<ParamValue>);
        as_(label: &str);
    }

    pub fn v(ids: impl Into<Ids>) -> Traversal {
        Traversal::new().v(ids)
    }

    pub fn inject<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Traversal {
        Traversal::new().inject(values)
    }

    pub fn filter_fn(f: impl Fn(&Traverser) -> bool + Send + Sync + 'static) -> Traversal {
        Traversal::new().filter_fn(f)
    }

    pub fn map_fn(f: impl Fn(&Traverser) -> Value + Send + Sync + 'static) -> Traversal {
        Traversal::new().map_fn(f)
    }
}

/// Spawns root traversals bound to a graph
#[derive(Clone)]
pub struct GraphTraversalSource {
    graph: Arc<dyn Graph>,
    strategies: TraversalStrategies,
    sack: Option<SackConfig>,
    bulking: bool,
}

impl GraphTraversalSource {
    /// Source with the standard strategy set
    pub fn new(graph: Arc<dyn Graph>) -> Self {
        Self {
            graph,
            strategies: TraversalStrategies::standard(),
            sack: None,
            bulking: true,
        }
    }

    pub fn with_config(graph: Arc<dyn Graph>, config: &EngineConfig) -> TraversalResult<Self> {
        Ok(Self {
            graph,
            strategies: TraversalStrategies::from_config(config)?,
            sack: None,
            bulking: config.bulking,
        })
    }

    pub fn with_strategy(mut self, strategy: impl TraversalStrategy) -> TraversalResult<Self> {
        self.strategies.add(strategy)?;
        Ok(self)
    }

    pub fn with_strategies(mut self, strategies: TraversalStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn without_strategy<S: TraversalStrategy>(mut self) -> Self {
        self.strategies.remove::<S>();
        self
    }

    pub fn with_sack(mut self, initial: impl Into<Value>) -> Self {
        self.sack = Some(SackConfig {
            initial: initial.into(),
            merge: None,
        });
        self
    }

    /// Sack whose values are combined with `merge` when traversers merge
    pub fn with_sack_merge(mut self, initial: impl Into<Value>, merge: Operator) -> Self {
        self.sack = Some(SackConfig {
            initial: initial.into(),
            merge: Some(merge),
        });
        self
    }

    pub fn with_bulk(mut self, bulking: bool) -> Self {
        self.bulking = bulking;
        self
    }

    pub fn graph(&self) -> &Arc<dyn Graph> {
        &self.graph
    }

    pub fn strategies(&self) -> &TraversalStrategies {
        &self.strategies
    }

    /// Empty root traversal
    pub fn traversal(&self) -> Traversal {
        Traversal::spawn(self)
    }

    /// Root traversal with the steps of `anonymous`
    pub fn bind(&self, anonymous: Traversal) -> Traversal {
        let mut traversal = Traversal::spawn(self);
        traversal.build_error = anonymous.build_error.clone();
        traversal.steps = anonymous.steps.clone();
        traversal
    }

    pub fn v(&self, ids: impl Into<Ids>) -> Traversal {
        self.traversal().v(ids)
    }

    pub fn e(&self, ids: impl Into<Ids>) -> Traversal {
        self.traversal().e(ids)
    }

    pub fn inject<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Traversal {
        self.traversal().inject(values)
    }

    pub fn add_v(&self, label: impl Into<Labels>) -> Traversal {
        self.traversal().add_v(label)
    }

    pub fn add_e(&self, label: &str) -> Traversal {
        self.traversal().add_e(label)
    }
}

impl fmt::Debug for GraphTraversalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTraversalSource")
            .field("graph", &self.graph)
            .field("strategies", &self.strategies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::MemoryGraph;

    fn g() -> GraphTraversalSource {
        GraphTraversalSource::new(Arc::new(MemoryGraph::modern()))
            .with_strategies(TraversalStrategies::new())
    }

    #[test]
    fn test_builder_renders_steps() {
        let traversal = __::out("knows").as_("a").values("name");
        assert_eq!(
            traversal.to_string(),
            "[VertexStep(OUT,[knows],vertex)@[a], PropertiesStep([name],value)]"
        );
    }

    #[test]
    fn test_consecutive_has_merge() {
        let traversal = __::has("name", "marko").has("age", P::gt(20));
        assert_eq!(traversal.steps().len(), 1);
        assert_eq!(
            traversal.to_string(),
            "[HasStep([name.eq(marko), age.gt(20)])]"
        );

        let labeled = __::has("name", "marko").as_("a").has("age", P::gt(20));
        assert_eq!(labeled.steps().len(), 2);
    }

    #[test]
    fn test_builder_misuse_surfaces_on_iteration() {
        let mut traversal = g().v(()).by("name");
        assert!(traversal.error().is_some());
        assert!(matches!(
            traversal.to_list(),
            Err(TraversalError::IllegalArgument(_))
        ));

        let mut child_error = g().v(()).filter(__::identity().times(2));
        assert!(child_error.to_list().is_err());
    }

    #[test]
    fn test_sack_config_and_sack_step() {
        let mut traversal = g().with_sack(1.0).v(1).sack();
        assert_eq!(
            traversal.sack_config().map(|s| s.initial.clone()),
            Some(Value::from(1.0))
        );
        assert_eq!(traversal.to_string(), "[GraphStep(vertex,[1]), SackStep]");
        assert_eq!(traversal.to_list().unwrap(), vec![Value::from(1.0)]);
        assert!(g().v(1).sack_config().is_none());
    }

    #[test]
    fn test_next_unrolls_bulk() {
        let mut traversal = g().inject([1, 1, 2]).barrier();
        assert_eq!(traversal.next().unwrap(), Some(Value::from(1)));
        assert!(traversal.has_next().unwrap());
        assert_eq!(traversal.next().unwrap(), Some(Value::from(1)));
        assert_eq!(traversal.next().unwrap(), Some(Value::from(2)));
        assert!(!traversal.has_next().unwrap());
        assert_eq!(traversal.next().unwrap(), None);
    }

    #[test]
    fn test_property_folds_into_add_v() {
        let traversal = __::add_v("person").property("name", "stephen");
        assert_eq!(traversal.steps().len(), 1);
        assert_eq!(
            traversal.to_string(),
            "[AddVertexStep({label=[person], name=[stephen]})]"
        );
        let separate = __::v(1).property("name", "marko");
        assert_eq!(separate.steps().len(), 2);
    }

    #[test]
    fn test_requirements_reflect_labels_and_bulking() {
        use TraverserRequirement as R;
        let traversal = g().v(()).as_("a").out(()).select("a");
        let requirements = traversal.requirements();
        assert!(requirements.contains(R::LabeledPath));
        assert!(!requirements.contains(R::Path));

        let nested = __::repeat(__::repeat(__::out(())).times(1)).times(2);
        assert!(nested.requirements().contains(R::NestedLoop));

        let one_bulk = g().with_bulk(false).v(()).count();
        let requirements = one_bulk.requirements();
        assert!(requirements.contains(R::OneBulk));
        assert!(!requirements.contains(R::Bulk));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = g().v(()).values("name");
        let mut copy = original.clone();
        assert_eq!(original, copy);
        assert_eq!(original.to_list().unwrap().len(), 6);
        assert_eq!(copy.to_list().unwrap().len(), 6);
        assert!(original.is_locked());
    }
}
