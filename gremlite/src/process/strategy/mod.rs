// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Traversal strategies and the engine that orders and applies them
//!
//! A strategy is a rewrite rule over a [`Traversal`]. Every strategy belongs
//! to one [`StrategyCategory`]; categories run in a fixed order. Inside a
//! category, strategies may declare which other strategies must run before
//! or after them, and the engine sorts them topologically. Constraints that
//! form a cycle are rejected when the strategy is registered.
//!
//! The engine hands each strategy the root traversal. Strategies reach child
//! traversals through [`Traversal::apply_recursively`].

pub mod element_id;
pub mod event;
pub mod identity_removal;
pub mod incident_to_adjacent;
pub mod inline_filter;
pub mod lambda_restriction;
pub mod read_only;

pub use element_id::{ElementIdStrategy, ElementIdStrategyBuilder};
pub use event::{EventStrategy, EventStrategyBuilder};
pub use identity_removal::IdentityRemovalStrategy;
pub use incident_to_adjacent::IncidentToAdjacentStrategy;
pub use inline_filter::InlineFilterStrategy;
pub use lambda_restriction::LambdaRestrictionStrategy;
pub use read_only::ReadOnlyStrategy;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as EdgeDirection;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::process::traversal::Traversal;

/// Strategy categories, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrategyCategory {
    /// Adds application-level behaviour
    Decoration,
    /// Rewrites for efficiency without changing results
    Optimization,
    /// Backend-specific finalization
    Provider,
    /// Rejects traversals that violate an execution precondition
    Verification,
}

impl StrategyCategory {
    pub const ALL: [StrategyCategory; 4] = [
        StrategyCategory::Decoration,
        StrategyCategory::Optimization,
        StrategyCategory::Provider,
        StrategyCategory::Verification,
    ];

    /// Single-letter tag used in explanations
    pub fn tag(&self) -> char {
        match self {
            StrategyCategory::Decoration => 'D',
            StrategyCategory::Optimization => 'O',
            StrategyCategory::Provider => 'P',
            StrategyCategory::Verification => 'V',
        }
    }
}

impl fmt::Display for StrategyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A rewrite rule over traversals
pub trait TraversalStrategy: fmt::Debug + Send + Sync + 'static {
    fn category(&self) -> StrategyCategory;

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()>;

    fn as_any(&self) -> &dyn Any;

    /// Display name; the type name without its module path
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Strategies of the same category that must run before this one
    fn apply_prior(&self) -> Vec<TypeId> {
        Vec::new()
    }

    /// Strategies of the same category that must run after this one
    fn apply_post(&self) -> Vec<TypeId> {
        Vec::new()
    }
}

fn type_of(strategy: &dyn TraversalStrategy) -> TypeId {
    strategy.as_any().type_id()
}

/// An ordered set of strategies, at most one per strategy type
#[derive(Clone, Default)]
pub struct TraversalStrategies {
    strategies: Vec<Arc<dyn TraversalStrategy>>,
}

impl TraversalStrategies {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity removal, inline filter and incident-to-adjacent, already in order
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Arc::new(IdentityRemovalStrategy),
                Arc::new(InlineFilterStrategy),
                Arc::new(IncidentToAdjacentStrategy),
            ],
        }
    }

    /// Strategy set described by `config`
    pub fn from_config(config: &EngineConfig) -> TraversalResult<Self> {
        let toggles = &config.strategies;
        let mut selected: Vec<Arc<dyn TraversalStrategy>> = Vec::new();
        if toggles.identity_removal {
            selected.push(Arc::new(IdentityRemovalStrategy));
        }
        if toggles.inline_filter {
            selected.push(Arc::new(InlineFilterStrategy));
        }
        if toggles.incident_to_adjacent {
            selected.push(Arc::new(IncidentToAdjacentStrategy));
        }
        if toggles.lambda_restriction {
            selected.push(Arc::new(LambdaRestrictionStrategy));
        }
        if toggles.read_only {
            selected.push(Arc::new(ReadOnlyStrategy));
        }
        if let Some(element_id) = &config.element_id {
            selected.push(Arc::new(
                ElementIdStrategy::builder()
                    .id_property_key(element_id.property_key.as_str())
                    .create(),
            ));
        }
        let mut strategies = Self::new();
        strategies.add_all(selected)?;
        Ok(strategies)
    }

    /// Register a strategy, replacing one of the same type
    pub fn add(&mut self, strategy: impl TraversalStrategy) -> TraversalResult<&mut Self> {
        self.add_all(vec![Arc::new(strategy)])
    }

    /// Register several strategies and re-sort once; on error the set is unchanged
    pub fn add_all(
        &mut self,
        strategies: Vec<Arc<dyn TraversalStrategy>>,
    ) -> TraversalResult<&mut Self> {
        let mut candidate = self.strategies.clone();
        for strategy in strategies {
            let id = type_of(strategy.as_ref());
            match candidate.iter().position(|s| type_of(s.as_ref()) == id) {
                Some(index) => candidate[index] = strategy,
                None => candidate.push(strategy),
            }
        }
        self.strategies = sort_strategies(candidate)?;
        Ok(self)
    }

    /// Remove the strategy of type `S`; returns whether one was present
    pub fn remove<S: TraversalStrategy>(&mut self) -> bool {
        let before = self.strategies.len();
        self.strategies
            .retain(|s| type_of(s.as_ref()) != TypeId::of::<S>());
        before != self.strategies.len()
    }

    pub fn contains<S: TraversalStrategy>(&self) -> bool {
        self.get::<S>().is_some()
    }

    pub fn get<S: TraversalStrategy>(&self) -> Option<&S> {
        self.strategies
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<S>())
    }

    /// Strategies in application order
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<dyn TraversalStrategy>> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Apply every strategy in order; the first failure aborts
    pub fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        for strategy in &self.strategies {
            log::debug!(
                "Applying {} [{}] to {}",
                strategy.name(),
                strategy.category(),
                traversal
            );
            strategy.apply(traversal)?;
        }
        Ok(())
    }
}

/// Order by category, then topologically within each category
///
/// Ties are broken by registration order so the result is deterministic.
fn sort_strategies(
    strategies: Vec<Arc<dyn TraversalStrategy>>,
) -> TraversalResult<Vec<Arc<dyn TraversalStrategy>>> {
    let mut sorted = Vec::with_capacity(strategies.len());
    for category in StrategyCategory::ALL {
        let members: Vec<Arc<dyn TraversalStrategy>> = strategies
            .iter()
            .filter(|s| s.category() == category)
            .cloned()
            .collect();
        sorted.extend(sort_category(members)?);
    }
    log::debug!(
        "Strategy order: {}",
        sorted
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(sorted)
}

fn sort_category(
    members: Vec<Arc<dyn TraversalStrategy>>,
) -> TraversalResult<Vec<Arc<dyn TraversalStrategy>>> {
    if members.len() < 2 {
        return Ok(members);
    }
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..members.len()).map(|i| graph.add_node(i)).collect();
    let index: HashMap<TypeId, NodeIndex> = members
        .iter()
        .zip(&nodes)
        .map(|(s, &node)| (type_of(s.as_ref()), node))
        .collect();

    for (strategy, &node) in members.iter().zip(&nodes) {
        for prior in strategy.apply_prior() {
            if let Some(&before) = index.get(&prior) {
                graph.update_edge(before, node, ());
            }
        }
        for post in strategy.apply_post() {
            if let Some(&after) = index.get(&post) {
                graph.update_edge(node, after, ());
            }
        }
    }

    if is_cyclic_directed(&graph) {
        let names: Vec<&str> = members.iter().map(|s| s.name()).collect();
        return Err(TraversalError::Configuration(format!(
            "The provided traversal strategies have cyclic dependencies: [{}]",
            names.join(", ")
        )));
    }

    // Kahn's algorithm, always taking the earliest registered ready node
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, EdgeDirection::Incoming).count())
        .collect();
    let mut done = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let next = match (0..nodes.len()).find(|&i| !done[i] && in_degree[i] == 0) {
            Some(next) => next,
            None => break,
        };
        done[next] = true;
        order.push(next);
        for successor in graph.neighbors_directed(nodes[next], EdgeDirection::Outgoing) {
            in_degree[graph[successor]] -= 1;
        }
    }
    Ok(order.into_iter().map(|i| Arc::clone(&members[i])).collect())
}

impl fmt::Debug for TraversalStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl fmt::Display for TraversalStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        write!(f, "strategies[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct First;
    #[derive(Debug)]
    struct Second;
    #[derive(Debug)]
    struct Cyclic;

    macro_rules! test_strategy {
        ($ty:ty, $category:expr, prior: [$($prior:ty),*], post: [$($post:ty),*]) => {
            impl TraversalStrategy for $ty {
                fn category(&self) -> StrategyCategory {
                    $category
                }

                fn apply(&self, _traversal: &mut Traversal) -> TraversalResult<()> {
                    Ok(())
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn apply_prior(&self) -> Vec<TypeId> {
                    vec![$(TypeId::of::<$prior>()),*]
                }

                fn apply_post(&self) -> Vec<TypeId> {
                    vec![$(TypeId::of::<$post>()),*]
                }
            }
        };
    }

    test_strategy!(First, StrategyCategory::Optimization, prior: [Second], post: []);
    test_strategy!(Second, StrategyCategory::Optimization, prior: [], post: []);
    test_strategy!(Cyclic, StrategyCategory::Optimization, prior: [First], post: [Second]);

    fn names(strategies: &TraversalStrategies) -> Vec<&'static str> {
        strategies.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_categories_then_dependencies() {
        let mut strategies = TraversalStrategies::new();
        strategies.add(LambdaRestrictionStrategy).unwrap();
        strategies.add(First).unwrap();
        strategies.add(Second).unwrap();
        strategies.add(ElementIdStrategy::builder().create()).unwrap();
        assert_eq!(
            names(&strategies),
            vec!["ElementIdStrategy", "Second", "First", "LambdaRestrictionStrategy"]
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let mut a = TraversalStrategies::new();
        a.add(ReadOnlyStrategy).unwrap();
        a.add(LambdaRestrictionStrategy).unwrap();
        let mut b = TraversalStrategies::new();
        b.add(ReadOnlyStrategy).unwrap();
        b.add(LambdaRestrictionStrategy).unwrap();
        assert_eq!(names(&a), names(&b));
        assert_eq!(names(&a), vec!["ReadOnlyStrategy", "LambdaRestrictionStrategy"]);
    }

    #[test]
    fn test_same_type_replaces() {
        let mut strategies = TraversalStrategies::new();
        strategies
            .add(ElementIdStrategy::builder().id_property_key("a").create())
            .unwrap();
        strategies
            .add(ElementIdStrategy::builder().id_property_key("b").create())
            .unwrap();
        assert_eq!(strategies.len(), 1);
        let element_id = strategies.get::<ElementIdStrategy>().unwrap();
        assert_eq!(element_id.id_property_key(), "b");

        assert!(strategies.remove::<ElementIdStrategy>());
        assert!(!strategies.remove::<ElementIdStrategy>());
        assert!(strategies.is_empty());
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut strategies = TraversalStrategies::new();
        strategies.add(First).unwrap();
        strategies.add(Second).unwrap();
        let result = strategies.add(Cyclic);
        assert!(matches!(result, Err(TraversalError::Configuration(_))));
        assert_eq!(names(&strategies), vec!["Second", "First"]);
    }

    #[test]
    fn test_standard_set_is_sorted() {
        let standard = TraversalStrategies::standard();
        let mut resorted = TraversalStrategies::new();
        resorted
            .add_all(standard.iter().rev().cloned().collect())
            .unwrap();
        assert_eq!(names(&standard), names(&resorted));
    }
}
