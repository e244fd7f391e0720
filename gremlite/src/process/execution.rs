// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lazy pipeline interpreter
//!
//! Every step becomes an iterator adapter over the stream of its upstream
//! step, so pulling one result from the end of the pipeline pulls just enough
//! traversers through the stages before it. Barrier steps drain their
//! upstream on the first pull. Child traversals run as fresh sub-pipelines
//! seeded with the traverser being processed.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{TraversalError, TraversalResult};
use crate::process::event::{detach_edge, detach_vertex, Event};
use crate::process::parameters::{ParamKey, Parameters};
use crate::process::step::{
    By, ChooseCondition, Comparator, ElementType, Operator, Order, OrderBy, Step, StepKind,
};
use crate::process::traversal::Traversal;
use crate::process::traverser::{Path, Traverser, TraverserGenerator};
use crate::structure::{Direction, Element, ElementId, Graph, Value, Vertex, T};

pub(crate) type TraverserStream = Box<dyn Iterator<Item = TraversalResult<Traverser>> + Send>;

/// Value, path, loops and sack; traversers with equal keys merge
type MergeKey = (Value, Option<Path>, Vec<u32>, Option<Value>);

/// Named state shared by a traversal and all of its children
#[derive(Clone, Default)]
pub struct SideEffects {
    values: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.lock().insert(key.into(), value);
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Independent copy of the current contents
    pub fn deep_clone(&self) -> SideEffects {
        SideEffects {
            values: Arc::new(Mutex::new(self.values.lock().clone())),
        }
    }

    pub(crate) fn ensure_list(&self, key: &str) {
        self.values
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
    }

    /// Append `value` to the list under `key`, once per unit of bulk
    pub(crate) fn append(&self, key: &str, value: &Value, bulk: u64) {
        let mut values = self.values.lock();
        let entry = values
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match entry {
            Value::List(items) => {
                for _ in 0..bulk {
                    items.push(value.clone());
                }
            }
            other => {
                let mut items = vec![other.clone()];
                for _ in 0..bulk {
                    items.push(value.clone());
                }
                *other = Value::List(items);
            }
        }
    }
}

impl fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffects")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Sack configuration of a traversal source
#[derive(Debug, Clone, PartialEq)]
pub struct SackConfig {
    pub initial: Value,
    /// Combines sacks when equivalent traversers merge; without it they stay apart
    pub merge: Option<Operator>,
}

/// Everything a running pipeline shares
#[derive(Clone)]
pub struct ExecContext {
    graph: Option<Arc<dyn Graph>>,
    side_effects: SideEffects,
    generator: &'static TraverserGenerator,
    sack: Option<SackConfig>,
    bulking: bool,
}

impl ExecContext {
    pub(crate) fn new(
        graph: Option<Arc<dyn Graph>>,
        side_effects: SideEffects,
        generator: &'static TraverserGenerator,
        sack: Option<SackConfig>,
        bulking: bool,
    ) -> Self {
        Self {
            graph,
            side_effects,
            generator,
            sack,
            bulking,
        }
    }

    pub fn graph(&self) -> TraversalResult<&dyn Graph> {
        self.graph.as_deref().ok_or_else(|| {
            TraversalError::Configuration("The traversal is not bound to a graph".to_string())
        })
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    /// A new traverser, as created by a start or reducing step
    pub fn generate(&self, value: Value, bulk: u64) -> Traverser {
        self.generator.generate(
            value,
            &BTreeSet::new(),
            bulk,
            self.sack.as_ref().map(|s| s.initial.clone()),
            self.side_effects.clone(),
        )
    }

    /// Run `child` with `seed` as its only start
    pub fn child_stream(&self, child: &Traversal, seed: Traverser) -> TraverserStream {
        build_pipeline(child.steps(), Box::new(std::iter::once(Ok(seed))), self)
    }

    /// First value `child` produces for `seed`
    pub fn first_value(&self, child: &Traversal, seed: &Traverser) -> TraversalResult<Option<Value>> {
        match self.child_stream(child, seed.clone()).next() {
            Some(result) => result.map(|t| Some(t.into_value())),
            None => Ok(None),
        }
    }

    /// Whether `child` produces anything for `seed`
    pub fn has_result(&self, child: &Traversal, seed: &Traverser) -> TraversalResult<bool> {
        match self.child_stream(child, seed.clone()).next() {
            Some(result) => result.map(|_| true),
            None => Ok(false),
        }
    }

    /// Apply a `by()` projection; `None` when the projection has no value
    pub fn project(&self, by: &By, traverser: &Traverser) -> TraversalResult<Option<Value>> {
        let value = traverser.get();
        match by {
            By::Identity => Ok(Some(value.clone())),
            By::Key(key) => match Element::from_value(value) {
                Some(element) => Ok(self.graph()?.property(&element, key)?),
                None => Ok(value.map_get(&Value::from(key.as_str())).cloned()),
            },
            By::Token(token) => Ok(Element::from_value(value).map(|element| match token {
                T::Id => element.id().to_value(),
                T::Label => Value::from(element.label()),
            })),
            By::Traversal(child) => self.first_value(child, traverser),
            By::Function(lambda) => Ok(Some((lambda.function())(value))),
        }
    }

    /// Merge equivalent traversers, summing bulk
    fn merge(&self, traversers: Vec<Traverser>) -> TraversalResult<Vec<Traverser>> {
        if !self.bulking {
            return Ok(traversers);
        }
        let merge_operator = self.sack.as_ref().and_then(|s| s.merge);
        let mut merged: Vec<Traverser> = Vec::with_capacity(traversers.len());
        let mut index: HashMap<MergeKey, usize> = HashMap::new();
        for traverser in traversers {
            let key = traverser.merge_key(merge_operator.is_some());
            match index.get(&key) {
                Some(&i) => {
                    let existing: &mut Traverser = &mut merged[i];
                    existing.set_bulk(existing.bulk() + traverser.bulk());
                    if let (Some(op), Some(a), Some(b)) =
                        (merge_operator, existing.sack().cloned(), traverser.sack())
                    {
                        existing.set_sack(op.apply(&a, b)?);
                    }
                }
                None => {
                    index.insert(key, merged.len());
                    merged.push(traverser);
                }
            }
        }
        Ok(merged)
    }
}

/// Chain `steps` onto `upstream`
pub(crate) fn build_pipeline(
    steps: &[Step],
    upstream: TraverserStream,
    ctx: &ExecContext,
) -> TraverserStream {
    steps
        .iter()
        .fold(upstream, |stream, step| attach(step.clone(), stream, ctx.clone()))
}

/// Pipeline of a root traversal: start steps generate traversers from nothing
pub(crate) fn root_stream(steps: &[Step], ctx: &ExecContext) -> TraverserStream {
    let (first, rest) = match steps.split_first() {
        Some(split) => split,
        None => return Box::new(std::iter::empty()),
    };
    let upstream = match &first.kind {
        StepKind::Graph { .. } | StepKind::Inject(_) => {
            with_labels(first.labels().clone(), start_stream(first.clone(), ctx.clone()))
        }
        StepKind::AddVertex { .. } => {
            let seed = ctx.generate(Value::Null, 1);
            attach(first.clone(), Box::new(std::iter::once(Ok(seed))), ctx.clone())
        }
        _ => return build_pipeline(steps, Box::new(std::iter::empty()), ctx),
    };
    build_pipeline(rest, upstream, ctx)
}

fn start_stream(step: Step, ctx: ExecContext) -> TraverserStream {
    match step.kind {
        StepKind::Graph { returns, ids } => deferred(move || {
            let elements = fetch_elements(ctx.graph()?, returns, &ids)?;
            Ok(elements
                .into_iter()
                .map(|element| ctx.generate(element, 1))
                .collect())
        }),
        StepKind::Inject(values) => Box::new(
            values
                .into_iter()
                .map(move |value| Ok(ctx.generate(value, 1)))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        _ => Box::new(std::iter::empty()),
    }
}

fn fetch_elements(graph: &dyn Graph, returns: ElementType, ids: &[Value]) -> TraversalResult<Vec<Value>> {
    let ids: Vec<ElementId> = ids
        .iter()
        .map(|id| {
            ElementId::from_value(id).ok_or_else(|| {
                TraversalError::IllegalArgument(format!("Not a valid element id: {}", id))
            })
        })
        .collect::<TraversalResult<_>>()?;
    Ok(match returns {
        ElementType::Vertex => graph.vertices(&ids)?.into_iter().map(Value::Vertex).collect(),
        ElementType::Edge => graph.edges(&ids)?.into_iter().map(Value::Edge).collect(),
    })
}

fn with_labels(labels: BTreeSet<String>, stream: TraverserStream) -> TraverserStream {
    if labels.is_empty() {
        return stream;
    }
    Box::new(stream.map(move |item| {
        item.map(|mut t| {
            t.add_labels(&labels);
            t
        })
    }))
}

fn attach(step: Step, upstream: TraverserStream, ctx: ExecContext) -> TraverserStream {
    let labels = step.labels().clone();
    with_labels(labels, attach_kind(step.kind, upstream, ctx))
}

/// Per-traverser transform that may drop the traverser
fn step_map<F>(upstream: TraverserStream, mut f: F) -> TraverserStream
where
    F: FnMut(Traverser) -> TraversalResult<Option<Traverser>> + Send + 'static,
{
    Box::new(upstream.filter_map(move |item| match item.and_then(&mut f) {
        Ok(Some(t)) => Some(Ok(t)),
        Ok(None) => None,
        Err(e) => Some(Err(e)),
    }))
}

fn step_filter<F>(upstream: TraverserStream, mut test: F) -> TraverserStream
where
    F: FnMut(&Traverser) -> TraversalResult<bool> + Send + 'static,
{
    step_map(upstream, move |t| Ok(if test(&t)? { Some(t) } else { None }))
}

fn step_map_value<F>(upstream: TraverserStream, mut f: F) -> TraverserStream
where
    F: FnMut(&Traverser) -> TraversalResult<Value> + Send + 'static,
{
    step_map(upstream, move |t| {
        let value = f(&t)?;
        Ok(Some(t.split(value)))
    })
}

/// Per-traverser expansion into any number of traversers
fn step_flat_map<F>(upstream: TraverserStream, mut f: F) -> TraverserStream
where
    F: FnMut(Traverser) -> TraversalResult<Vec<Traverser>> + Send + 'static,
{
    Box::new(upstream.flat_map(move |item| {
        let expanded: Vec<TraversalResult<Traverser>> = match item.and_then(&mut f) {
            Ok(traversers) => traversers.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        expanded
    }))
}

fn step_flat_map_values<F>(upstream: TraverserStream, mut f: F) -> TraverserStream
where
    F: FnMut(&Traverser) -> TraversalResult<Vec<Value>> + Send + 'static,
{
    step_flat_map(upstream, move |t| {
        Ok(f(&t)?.into_iter().map(|value| t.split(value)).collect())
    })
}

/// Stream produced once, on first pull
fn deferred<F>(produce: F) -> TraverserStream
where
    F: FnOnce() -> TraversalResult<Vec<Traverser>> + Send + 'static,
{
    let mut pending = Some(produce);
    let mut output = Vec::new().into_iter();
    Box::new(std::iter::from_fn(move || {
        if let Some(produce) = pending.take() {
            match produce() {
                Ok(traversers) => output = traversers.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
        output.next().map(Ok)
    }))
}

/// Drain `upstream` on first pull and emit what `reduce` makes of it
fn step_barrier<F>(upstream: TraverserStream, reduce: F) -> TraverserStream
where
    F: FnOnce(Vec<Traverser>) -> TraversalResult<Vec<Traverser>> + Send + 'static,
{
    deferred(move || {
        let collected = upstream.collect::<TraversalResult<Vec<_>>>()?;
        reduce(collected)
    })
}

struct RangeIter {
    upstream: TraverserStream,
    low: u64,
    high: Option<u64>,
    seen: u64,
}

impl Iterator for RangeIter {
    type Item = TraversalResult<Traverser>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.high, Some(high) if self.seen >= high) {
                return None;
            }
            let mut traverser = match self.upstream.next()? {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            let start = self.seen;
            let end = start + traverser.bulk();
            self.seen = end;
            let from = start.max(self.low);
            let to = self.high.map_or(end, |high| end.min(high));
            if to > from {
                traverser.set_bulk(to - from);
                return Some(Ok(traverser));
            }
        }
    }
}

fn expect_vertex(value: &Value) -> TraversalResult<&Vertex> {
    value.as_vertex().ok_or_else(|| {
        TraversalError::Execution(format!("Expected a vertex but found {}: {}", value.type_name(), value))
    })
}

fn expect_element(value: &Value) -> TraversalResult<Element> {
    Element::from_value(value).ok_or_else(|| {
        TraversalError::Execution(format!(
            "Expected an element but found {}: {}",
            value.type_name(),
            value
        ))
    })
}

fn attach_kind(kind: StepKind, upstream: TraverserStream, ctx: ExecContext) -> TraverserStream {
    match kind {
        StepKind::Graph { returns, ids } => step_flat_map_values(upstream, move |_| {
            fetch_elements(ctx.graph()?, returns, &ids)
        }),
        StepKind::Inject(values) => {
            let injected = start_stream(Step::new(StepKind::Inject(values)), ctx);
            Box::new(upstream.chain(injected))
        }
        StepKind::Identity => upstream,
        StepKind::Vertex {
            direction,
            edge_labels,
            returns,
        } => step_flat_map_values(upstream, move |t| {
            let vertex = expect_vertex(t.get())?;
            let edges = ctx.graph()?.adjacent_edges(vertex, direction, &edge_labels)?;
            Ok(edges
                .into_iter()
                .map(|edge| match returns {
                    ElementType::Edge => Value::Edge(edge),
                    ElementType::Vertex => Value::Vertex(match direction {
                        Direction::Out => edge.in_v,
                        Direction::In => edge.out_v,
                        Direction::Both => edge.other_vertex(vertex).clone(),
                    }),
                })
                .collect())
        }),
        StepKind::EdgeVertex(direction) => step_flat_map_values(upstream, move |t| {
            let edge = t.get().as_edge().ok_or_else(|| {
                TraversalError::Execution(format!("Expected an edge but found {}", t.get()))
            })?;
            Ok(match direction {
                Direction::Out => vec![Value::Vertex(edge.out_v.clone())],
                Direction::In => vec![Value::Vertex(edge.in_v.clone())],
                Direction::Both => vec![
                    Value::Vertex(edge.out_v.clone()),
                    Value::Vertex(edge.in_v.clone()),
                ],
            })
        }),
        StepKind::EdgeOtherVertex => step_map_value(upstream, move |t| {
            let edge = t.get().as_edge().ok_or_else(|| {
                TraversalError::Execution(format!("Expected an edge but found {}", t.get()))
            })?;
            let previous = t.path().and_then(|path| {
                let objects = path.objects();
                objects[..objects.len().saturating_sub(1)]
                    .iter()
                    .rev()
                    .find_map(|v| v.as_vertex().filter(|v| *v == &edge.out_v || *v == &edge.in_v))
            });
            Ok(Value::Vertex(match previous {
                Some(vertex) => edge.other_vertex(vertex).clone(),
                None => edge.in_v.clone(),
            }))
        }),
        StepKind::Has(containers) => step_filter(upstream, move |t| {
            let graph = ctx.graph()?;
            for container in &containers {
                if !container.test(t.get(), graph)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }),
        StepKind::TraversalFilter(child) => {
            step_filter(upstream, move |t| ctx.has_result(&child, t))
        }
        StepKind::LambdaFilter(lambda) => {
            step_filter(upstream, move |t| Ok((lambda.function())(t)))
        }
        StepKind::And(children) => step_filter(upstream, move |t| {
            for child in &children {
                if !ctx.has_result(child, t)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }),
        StepKind::Or(children) => step_filter(upstream, move |t| {
            for child in &children {
                if ctx.has_result(child, t)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }),
        StepKind::Not(child) => step_filter(upstream, move |t| Ok(!ctx.has_result(&child, t)?)),
        StepKind::Is(predicate) => step_filter(upstream, move |t| Ok(predicate.test(t.get()))),
        StepKind::Dedup => {
            let mut seen = HashSet::new();
            step_map(upstream, move |mut t| {
                if seen.insert(t.get().clone()) {
                    t.set_bulk(1);
                    Ok(Some(t))
                } else {
                    Ok(None)
                }
            })
        }
        StepKind::Range { low, high } => Box::new(RangeIter {
            upstream,
            low,
            high,
            seen: 0,
        }),
        StepKind::Tail(limit) => step_barrier(upstream, move |traversers| {
            let mut remaining = limit;
            let mut kept = Vec::new();
            for mut t in traversers.into_iter().rev() {
                if remaining == 0 {
                    break;
                }
                let take = t.bulk().min(remaining);
                remaining -= take;
                t.set_bulk(take);
                kept.push(t);
            }
            kept.reverse();
            Ok(kept)
        }),
        StepKind::Coin(probability) => step_map(upstream, move |mut t| {
            let hits = (0..t.bulk()).filter(|_| fastrand::f64() < probability).count() as u64;
            if hits == 0 {
                return Ok(None);
            }
            t.set_bulk(hits);
            Ok(Some(t))
        }),
        StepKind::Id => step_map_value(upstream, |t| Ok(expect_element(t.get())?.id().to_value())),
        StepKind::Label => {
            step_map_value(upstream, |t| Ok(Value::from(expect_element(t.get())?.label())))
        }
        StepKind::Values(keys) => step_flat_map_values(upstream, move |t| match t.get() {
            Value::Map(_) => Ok(keys
                .iter()
                .filter_map(|key| t.get().map_get(&Value::from(key.as_str())).cloned())
                .collect()),
            value => {
                let element = expect_element(value)?;
                Ok(ctx
                    .graph()?
                    .properties(&element, &keys)?
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect())
            }
        }),
        StepKind::Constant(value) => step_map_value(upstream, move |_| Ok(value.clone())),
        StepKind::Path => step_map_value(upstream, |t| {
            t.path().cloned().map(Value::Path).ok_or_else(|| {
                TraversalError::Execution("The traverser does not track its path".to_string())
            })
        }),
        StepKind::Select(labels) => step_flat_map_values(upstream, move |t| {
            let lookup = |label: &str| {
                t.path()
                    .and_then(|path| path.get(label).cloned())
                    .or_else(|| t.side_effects().get(label))
            };
            if let [label] = labels.as_slice() {
                return Ok(lookup(label).into_iter().collect());
            }
            let mut selected = Vec::new();
            for label in &labels {
                match lookup(label) {
                    Some(value) => selected.push((Value::from(label.as_str()), value)),
                    None => return Ok(Vec::new()),
                }
            }
            Ok(vec![Value::Map(selected)])
        }),
        StepKind::Sack => step_map_value(upstream, |t| {
            t.sack().cloned().ok_or_else(|| {
                TraversalError::Execution("The traversal was not configured with a sack".to_string())
            })
        }),
        StepKind::SackOperator { operator, by } => step_map(upstream, move |mut t| {
            let argument = match &by {
                Some(key) => ctx.project(&By::Key(key.clone()), &t)?.ok_or_else(|| {
                    TraversalError::Execution(format!(
                        "The property does not exist as the key has no associated value: {}",
                        key
                    ))
                })?,
                None => t.get().clone(),
            };
            let current = t.sack().cloned().ok_or_else(|| {
                TraversalError::Execution("The traversal was not configured with a sack".to_string())
            })?;
            t.set_sack(operator.apply(&current, &argument)?);
            Ok(Some(t))
        }),
        StepKind::Loops => step_map_value(upstream, |t| Ok(Value::Integer(t.loops() as i64))),
        StepKind::Unfold => step_flat_map_values(upstream, |t| {
            Ok(match t.get() {
                Value::List(items) => items.clone(),
                Value::Map(entries) => entries
                    .iter()
                    .map(|entry| Value::Map(vec![entry.clone()]))
                    .collect(),
                other => vec![other.clone()],
            })
        }),
        StepKind::LambdaMap(lambda) => step_map_value(upstream, move |t| Ok((lambda.function())(t))),
        StepKind::LambdaFlatMap(lambda) => {
            step_flat_map_values(upstream, move |t| Ok((lambda.function())(t)))
        }
        StepKind::LambdaSideEffect(lambda) => step_map(upstream, move |t| {
            (lambda.function())(&t);
            Ok(Some(t))
        }),
        StepKind::Count => step_barrier(upstream, move |traversers| {
            let count: u64 = traversers.iter().map(Traverser::bulk).sum();
            Ok(vec![ctx.generate(Value::Integer(count as i64), 1)])
        }),
        StepKind::Sum => step_barrier(upstream, move |traversers| {
            let mut total = Value::Integer(0);
            for t in &traversers {
                total = t
                    .get()
                    .scale(t.bulk())
                    .and_then(|v| total.add(&v))
                    .ok_or_else(|| {
                        TraversalError::Execution(format!("sum() requires numbers: {}", t.get()))
                    })?;
            }
            Ok(vec![ctx.generate(total, 1)])
        }),
        StepKind::Mean => step_barrier(upstream, move |traversers| {
            if traversers.is_empty() {
                return Ok(Vec::new());
            }
            let mut total = 0.0;
            let mut count = 0u64;
            for t in &traversers {
                let n = t.get().as_f64().ok_or_else(|| {
                    TraversalError::Execution(format!("mean() requires numbers: {}", t.get()))
                })?;
                total += n * t.bulk() as f64;
                count += t.bulk();
            }
            Ok(vec![ctx.generate(Value::Float(total / count as f64), 1)])
        }),
        StepKind::Fold => step_barrier(upstream, move |traversers| {
            let mut items = Vec::new();
            for t in traversers {
                let bulk = t.bulk();
                let value = t.into_value();
                for _ in 0..bulk {
                    items.push(value.clone());
                }
            }
            Ok(vec![ctx.generate(Value::List(items), 1)])
        }),
        StepKind::GroupCount(by) => step_barrier(upstream, move |traversers| {
            let mut counts: Vec<(Value, u64)> = Vec::new();
            let mut index: HashMap<Value, usize> = HashMap::new();
            for t in &traversers {
                let key = match ctx.project(&by, t)? {
                    Some(key) => key,
                    None => continue,
                };
                match index.get(&key) {
                    Some(&i) => counts[i].1 += t.bulk(),
                    None => {
                        index.insert(key.clone(), counts.len());
                        counts.push((key, t.bulk()));
                    }
                }
            }
            let map = counts
                .into_iter()
                .map(|(k, n)| (k, Value::Integer(n as i64)))
                .collect();
            Ok(vec![ctx.generate(Value::Map(map), 1)])
        }),
        StepKind::Order(bys) => step_barrier(upstream, move |traversers| {
            let merged = ctx.merge(traversers)?;
            sort_traversers(merged, &bys, &ctx)
        }),
        StepKind::Aggregate(key) => step_barrier(upstream, move |traversers| {
            ctx.side_effects().ensure_list(&key);
            for t in &traversers {
                ctx.side_effects().append(&key, t.get(), t.bulk());
            }
            ctx.merge(traversers)
        }),
        StepKind::Store(key) => {
            ctx.side_effects().ensure_list(&key);
            step_map(upstream, move |t| {
                ctx.side_effects().append(&key, t.get(), t.bulk());
                Ok(Some(t))
            })
        }
        StepKind::Cap(key) => step_barrier(upstream, move |traversers| {
            drop(traversers);
            let value = ctx
                .side_effects()
                .get(&key)
                .unwrap_or(Value::List(Vec::new()));
            Ok(vec![ctx.generate(value, 1)])
        }),
        StepKind::Barrier => step_barrier(upstream, move |traversers| ctx.merge(traversers)),
        StepKind::Union(children) => step_flat_map(upstream, move |t| {
            let mut output = Vec::new();
            for child in &children {
                for result in ctx.child_stream(child, t.clone()) {
                    output.push(result?);
                }
            }
            Ok(output)
        }),
        StepKind::Choose {
            condition,
            true_branch,
            false_branch,
        } => step_flat_map(upstream, move |t| {
            let chosen = match &condition {
                ChooseCondition::Traversal(child) => ctx.has_result(child, &t)?,
                ChooseCondition::Lambda(lambda) => (lambda.function())(&t),
            };
            let branch = if chosen { &true_branch } else { &false_branch };
            ctx.child_stream(branch, t).collect()
        }),
        StepKind::Repeat {
            body,
            times,
            until,
            emit,
        } => step_flat_map(upstream, move |t| {
            repeat(t, &body, times, until.as_ref(), emit, &ctx)
        }),
        StepKind::AddVertex {
            parameters,
            callbacks,
        } => step_map(upstream, move |t| {
            let graph = ctx.graph()?;
            let label = resolve_label(&parameters, &t, &ctx, "vertex")?;
            let id = resolve_id(&parameters, &t, &ctx)?;
            let properties = resolve_properties(&parameters, &t, &ctx)?;
            let vertex = graph.add_vertex(&label, id, &properties)?;
            if !callbacks.is_empty() {
                callbacks.notify(&Event::VertexAdded(detach_vertex(graph, &vertex)?))?;
            }
            Ok(Some(t.split(Value::Vertex(vertex))))
        }),
        StepKind::AddEdge {
            parameters,
            callbacks,
        } => step_map(upstream, move |t| {
            let graph = ctx.graph()?;
            let from = resolve_vertex(&parameters, ParamKey::From, &t, &ctx)?;
            let to = resolve_vertex(&parameters, ParamKey::To, &t, &ctx)?;
            let label = resolve_label(&parameters, &t, &ctx, "edge")?;
            let id = resolve_id(&parameters, &t, &ctx)?;
            let properties = resolve_properties(&parameters, &t, &ctx)?;
            let edge = graph.add_edge(&label, &from, &to, id, &properties)?;
            if !callbacks.is_empty() {
                callbacks.notify(&Event::EdgeAdded(detach_edge(graph, &edge)?))?;
            }
            Ok(Some(t.split(Value::Edge(edge))))
        }),
        StepKind::AddProperty {
            parameters,
            callbacks,
        } => step_map(upstream, move |t| {
            let graph = ctx.graph()?;
            let element = expect_element(t.get())?;
            for (key, value) in resolve_properties(&parameters, &t, &ctx)? {
                let old_value = graph.set_property(&element, &key, value.clone())?;
                if callbacks.is_empty() {
                    continue;
                }
                let event = match &element {
                    Element::Vertex(vertex) => Event::VertexPropertyChanged {
                        vertex: detach_vertex(graph, vertex)?,
                        key,
                        old_value,
                        new_value: value,
                    },
                    Element::Edge(edge) => Event::EdgePropertyChanged {
                        edge: detach_edge(graph, edge)?,
                        key,
                        old_value,
                        new_value: value,
                    },
                };
                callbacks.notify(&event)?;
            }
            Ok(Some(t))
        }),
    }
}

fn repeat(
    seed: Traverser,
    body: &Traversal,
    times: Option<u32>,
    until: Option<&Traversal>,
    emit: bool,
    ctx: &ExecContext,
) -> TraversalResult<Vec<Traverser>> {
    let mut output = Vec::new();
    let mut start = seed;
    start.init_loop();
    let mut frontier = vec![start];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for traverser in frontier {
            for result in ctx.child_stream(body, traverser) {
                let mut t = result?;
                t.incr_loops();
                let done = times.map_or(false, |n| t.loops() >= n)
                    || match until {
                        Some(condition) => ctx.has_result(condition, &t)?,
                        None => false,
                    };
                if done {
                    t.reset_loops();
                    output.push(t);
                } else {
                    if emit {
                        let mut emitted = t.clone();
                        emitted.reset_loops();
                        output.push(emitted);
                    }
                    next.push(t);
                }
            }
        }
        frontier = next;
    }
    Ok(output)
}

fn sort_traversers(
    traversers: Vec<Traverser>,
    bys: &[OrderBy],
    ctx: &ExecContext,
) -> TraversalResult<Vec<Traverser>> {
    if bys.len() == 1 && bys[0].comparator == Comparator::Order(Order::Shuffle) {
        let mut shuffled = traversers;
        fastrand::shuffle(&mut shuffled);
        return Ok(shuffled);
    }
    let default_by = [OrderBy {
        by: By::Identity,
        comparator: Comparator::Order(Order::Incr),
    }];
    let bys = if bys.is_empty() { &default_by[..] } else { bys };

    let mut keyed = Vec::with_capacity(traversers.len());
    for t in traversers {
        let mut keys = Vec::with_capacity(bys.len());
        for order_by in bys {
            keys.push(ctx.project(&order_by.by, &t)?.unwrap_or(Value::Null));
        }
        keyed.push((keys, t));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, order_by) in bys.iter().enumerate() {
            let ordering = match &order_by.comparator {
                Comparator::Order(Order::Incr) => a[i].total_cmp(&b[i]),
                Comparator::Order(Order::Decr) => b[i].total_cmp(&a[i]),
                Comparator::Order(Order::Shuffle) => std::cmp::Ordering::Equal,
                Comparator::Lambda(lambda) => (lambda.function())(&a[i], &b[i]),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, t)| t).collect())
}

fn resolve_label(
    parameters: &Parameters,
    t: &Traverser,
    ctx: &ExecContext,
    default: &str,
) -> TraversalResult<String> {
    let labels = parameters.get(t, &ParamKey::Label, ctx, || vec![Value::from(default)])?;
    Ok(match labels.into_iter().next() {
        Some(Value::String(label)) => label,
        Some(other) => other.to_string(),
        None => default.to_string(),
    })
}

fn resolve_id(
    parameters: &Parameters,
    t: &Traverser,
    ctx: &ExecContext,
) -> TraversalResult<Option<ElementId>> {
    match parameters.get(t, &ParamKey::Id, ctx, Vec::new)?.first() {
        Some(value) => ElementId::from_value(value)
            .map(Some)
            .ok_or_else(|| TraversalError::IllegalArgument(format!("Not a valid element id: {}", value))),
        None => Ok(None),
    }
}

fn resolve_properties(
    parameters: &Parameters,
    t: &Traverser,
    ctx: &ExecContext,
) -> TraversalResult<Vec<(String, Value)>> {
    let excluded = [ParamKey::Id, ParamKey::Label, ParamKey::From, ParamKey::To];
    Ok(parameters
        .get_key_values(t, ctx, &excluded)?
        .into_iter()
        .filter_map(|(key, value)| key.as_property().map(|k| (k.to_string(), value)))
        .collect())
}

/// The vertex an `addE()` end refers to; defaults to the current traverser
fn resolve_vertex(
    parameters: &Parameters,
    key: ParamKey,
    t: &Traverser,
    ctx: &ExecContext,
) -> TraversalResult<Vertex> {
    let values = parameters.get(t, &key, ctx, || vec![t.get().clone()])?;
    let value = values.into_iter().next().unwrap_or(Value::Null);
    match value {
        Value::Vertex(vertex) => Ok(vertex),
        other => {
            let id = ElementId::from_value(&other).ok_or_else(|| {
                TraversalError::Execution(format!(
                    "The '{}' end of the edge does not map to a vertex: {}",
                    key, other
                ))
            })?;
            ctx.graph()?
                .vertices(&[id.clone()])?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    TraversalError::Execution(format!(
                        "The '{}' end of the edge does not map to a vertex: {}",
                        key, id
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::traverser::{Requirements, TraverserRequirement};

    fn context(bulking: bool) -> ExecContext {
        let generator = TraverserGenerator::select(Requirements::of(&[
            TraverserRequirement::Object,
            TraverserRequirement::Bulk,
        ]))
        .unwrap();
        ExecContext::new(None, SideEffects::new(), generator, None, bulking)
    }

    fn stream(ctx: &ExecContext, values: Vec<(i64, u64)>) -> TraverserStream {
        let traversers: Vec<TraversalResult<Traverser>> = values
            .into_iter()
            .map(|(v, bulk)| Ok(ctx.generate(Value::Integer(v), bulk)))
            .collect();
        Box::new(traversers.into_iter())
    }

    fn drain(stream: TraverserStream) -> Vec<(Value, u64)> {
        stream
            .map(|r| {
                let t = r.unwrap();
                (t.get().clone(), t.bulk())
            })
            .collect()
    }

    #[test]
    fn test_range_splits_bulk_at_boundaries() {
        let ctx = context(true);
        let upstream = stream(&ctx, vec![(1, 3), (2, 3), (3, 3)]);
        let ranged = attach(
            Step::new(StepKind::Range {
                low: 2,
                high: Some(5),
            }),
            upstream,
            ctx,
        );
        assert_eq!(
            drain(ranged),
            vec![(Value::Integer(1), 1), (Value::Integer(2), 2)]
        );
    }

    #[test]
    fn test_barrier_merges_equal_traversers() {
        let ctx = context(true);
        let upstream = stream(&ctx, vec![(1, 1), (2, 1), (1, 2)]);
        let merged = attach(Step::new(StepKind::Barrier), upstream, ctx);
        assert_eq!(
            drain(merged),
            vec![(Value::Integer(1), 3), (Value::Integer(2), 1)]
        );

        let ctx = context(false);
        let upstream = stream(&ctx, vec![(1, 1), (1, 1)]);
        assert_eq!(drain(attach(Step::new(StepKind::Barrier), upstream, ctx)).len(), 2);
    }

    #[test]
    fn test_reducing_steps_weight_by_bulk() {
        let ctx = context(true);
        let counted = attach(Step::new(StepKind::Count), stream(&ctx, vec![(5, 2), (7, 3)]), ctx.clone());
        assert_eq!(drain(counted), vec![(Value::Integer(5), 1)]);

        let summed = attach(Step::new(StepKind::Sum), stream(&ctx, vec![(5, 2), (7, 3)]), ctx.clone());
        assert_eq!(drain(summed), vec![(Value::Integer(31), 1)]);

        let mean = attach(Step::new(StepKind::Mean), stream(&ctx, vec![(1, 1), (4, 2)]), ctx.clone());
        assert_eq!(drain(mean), vec![(Value::Float(3.0), 1)]);

        let empty_mean = attach(Step::new(StepKind::Mean), stream(&ctx, vec![]), ctx);
        assert!(drain(empty_mean).is_empty());
    }

    #[test]
    fn test_group_count_weights_by_bulk() {
        let ctx = context(true);
        let grouped = attach(
            Step::new(StepKind::GroupCount(By::Identity)),
            stream(&ctx, vec![(1, 2), (2, 1), (1, 3)]),
            ctx,
        );
        assert_eq!(
            drain(grouped),
            vec![(
                Value::Map(vec![
                    (Value::Integer(1), Value::Integer(5)),
                    (Value::Integer(2), Value::Integer(1)),
                ]),
                1
            )]
        );
    }

    #[test]
    fn test_tail_keeps_last_bulk_units() {
        let ctx = context(true);
        let tail = attach(Step::new(StepKind::Tail(2)), stream(&ctx, vec![(1, 1), (2, 3)]), ctx);
        assert_eq!(drain(tail), vec![(Value::Integer(2), 2)]);
    }

    #[test]
    fn test_dedup_emits_single_bulk() {
        let ctx = context(true);
        let dedup = attach(Step::new(StepKind::Dedup), stream(&ctx, vec![(1, 4), (1, 1), (2, 2)]), ctx);
        assert_eq!(
            drain(dedup),
            vec![(Value::Integer(1), 1), (Value::Integer(2), 1)]
        );
    }

    #[test]
    fn test_graph_steps_require_a_graph() {
        let ctx = context(true);
        let steps = vec![Step::new(StepKind::Graph {
            returns: ElementType::Vertex,
            ids: Vec::new(),
        })];
        let mut results = root_stream(&steps, &ctx);
        assert!(matches!(
            results.next(),
            Some(Err(TraversalError::Configuration(_)))
        ));
    }

    #[test]
    fn test_side_effect_lists() {
        let side_effects = SideEffects::new();
        side_effects.append("x", &Value::from(1), 2);
        side_effects.append("x", &Value::from(2), 1);
        assert_eq!(side_effects.get("x"), Some(Value::from(vec![1, 1, 2])));
        let copy = side_effects.deep_clone();
        copy.set("y", Value::Null);
        assert_eq!(side_effects.keys(), vec!["x".to_string()]);
    }
}
