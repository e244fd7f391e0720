// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Inlines filter children into the parent pipeline
//!
//! Rewrites, applied to each traversal until none matches:
//!
//! - `filter(has(..)...)` becomes the has steps themselves
//! - `and(f1, f2)` whose children are plain filters is spliced into the parent
//! - `or(has(k, p1), has(k, p2))` becomes `has(k, p1.or(p2))`
//! - adjacent has steps merge into one
//! - `outE().hasLabel(l)` becomes `outE(l)`
//!
//! Children are optimized before their parent so nested wrappers collapse
//! from the inside out. Labels of removed wrappers and of merged children
//! land on the step that replaces them.

use std::any::{Any, TypeId};

use super::{IdentityRemovalStrategy, StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::process::predicate::P;
use crate::process::step::{ElementType, HasContainer, Step, StepKind};
use crate::process::traversal::Traversal;
use crate::structure::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineFilterStrategy;

impl InlineFilterStrategy {
    fn optimize(traversal: &mut Traversal) {
        for step in traversal.steps_mut() {
            for child in step.children_mut() {
                Self::optimize(child);
            }
        }
        let steps = traversal.steps_mut();
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..steps.len() {
                if inline_traversal_filter(steps, i)
                    || inline_and(steps, i)
                    || merge_or(steps, i)
                    || merge_has(steps, i)
                    || fold_edge_labels(steps, i)
                {
                    changed = true;
                    break;
                }
            }
        }
    }
}

fn only_has_steps(child: &Traversal) -> bool {
    !child.is_empty()
        && child
            .steps()
            .iter()
            .all(|s| matches!(s.kind, StepKind::Has(_)))
}

/// Filters that behave the same per traverser whether nested or spliced
fn is_inlinable_filter(step: &Step) -> bool {
    match &step.kind {
        StepKind::Has(_) | StepKind::Is(_) => true,
        StepKind::TraversalFilter(_) | StepKind::Not(_) | StepKind::And(_) | StepKind::Or(_) => {
            !step.children().iter().any(|c| {
                c.any_step(&|s| s.capabilities().lambda_holder || s.capabilities().mutating)
            })
        }
        _ => false,
    }
}

fn move_labels(from: &mut Step, to: &mut Step) {
    for label in from.take_labels() {
        to.add_label(label);
    }
}

fn splice(steps: &mut Vec<Step>, i: usize, mut replacement: Vec<Step>) {
    let mut wrapper = steps.remove(i);
    if let Some(last) = replacement.last_mut() {
        move_labels(&mut wrapper, last);
    }
    for (offset, step) in replacement.into_iter().enumerate() {
        steps.insert(i + offset, step);
    }
}

fn inline_traversal_filter(steps: &mut Vec<Step>, i: usize) -> bool {
    let children = match &steps[i].kind {
        StepKind::TraversalFilter(child) if only_has_steps(child) => child.steps().to_vec(),
        _ => return false,
    };
    splice(steps, i, children);
    true
}

fn inline_and(steps: &mut Vec<Step>, i: usize) -> bool {
    let children = match &steps[i].kind {
        StepKind::And(children)
            if !children.is_empty()
                && children
                    .iter()
                    .all(|c| !c.is_empty() && c.steps().iter().all(is_inlinable_filter)) =>
        {
            children
                .iter()
                .flat_map(|c| c.steps().iter().cloned())
                .collect::<Vec<_>>()
        }
        _ => return false,
    };
    splice(steps, i, children);
    true
}

/// Key and conjoined predicate of a child made of one has step over a single key
fn single_key_filter(child: &Traversal) -> Option<(&str, P)> {
    let containers = match child.steps() {
        [step] => match &step.kind {
            StepKind::Has(containers) => containers,
            _ => return None,
        },
        _ => return None,
    };
    let (first, rest) = containers.split_first()?;
    if rest.iter().any(|c| c.key != first.key) {
        return None;
    }
    let predicate = rest
        .iter()
        .fold(first.predicate.clone(), |acc, c| acc.and(c.predicate.clone()));
    Some((first.key.as_str(), predicate))
}

fn merge_or(steps: &mut [Step], i: usize) -> bool {
    let (merged, labels) = match &steps[i].kind {
        StepKind::Or(children) if children.len() > 1 => {
            let filters: Option<Vec<(&str, P)>> = children.iter().map(single_key_filter).collect();
            let filters = match filters {
                Some(filters) if filters.iter().all(|(key, _)| *key == filters[0].0) => filters,
                _ => return false,
            };
            let key = filters[0].0.to_string();
            let predicate = filters
                .into_iter()
                .map(|(_, p)| p)
                .reduce(|acc, p| acc.or(p));
            let labels: Vec<String> = children
                .iter()
                .flat_map(|c| c.steps().iter().flat_map(|s| s.labels().iter().cloned()))
                .collect();
            match predicate {
                Some(predicate) => (HasContainer::new(key, predicate), labels),
                None => return false,
            }
        }
        _ => return false,
    };
    steps[i].kind = StepKind::Has(vec![merged]);
    for label in labels {
        steps[i].add_label(label);
    }
    true
}

fn merge_has(steps: &mut Vec<Step>, i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let (before, after) = steps.split_at_mut(i);
    let (previous, current) = (&mut before[i - 1], &mut after[0]);
    match (&mut previous.kind, &mut current.kind) {
        (StepKind::Has(kept), StepKind::Has(merged)) => {
            kept.append(merged);
        }
        _ => return false,
    }
    move_labels(current, previous);
    steps.remove(i);
    true
}

/// Edge labels a `~label` predicate accepts, when it is a plain equality test on strings
fn label_values(predicate: &P) -> Option<Vec<String>> {
    predicate
        .equality_values()?
        .into_iter()
        .map(|v| match v {
            Value::String(label) => Some(label),
            _ => None,
        })
        .collect()
}

fn fold_edge_labels(steps: &mut Vec<Step>, i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let (before, after) = steps.split_at_mut(i);
    let (previous, current) = (&mut before[i - 1], &mut after[0]);
    let edge_labels = match &mut previous.kind {
        StepKind::Vertex {
            edge_labels,
            returns: ElementType::Edge,
            ..
        } if edge_labels.is_empty() => edge_labels,
        _ => return false,
    };
    let containers = match &mut current.kind {
        StepKind::Has(containers) => containers,
        _ => return false,
    };
    let position = containers.iter().position(|c| c.is_label());
    let (index, labels) = match position.and_then(|p| label_values(&containers[p].predicate).map(|l| (p, l))) {
        Some(found) => found,
        None => return false,
    };
    containers.remove(index);
    *edge_labels = labels;
    if containers.is_empty() {
        move_labels(current, previous);
        steps.remove(i);
    }
    true
}

impl TraversalStrategy for InlineFilterStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Optimization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        Self::optimize(traversal);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn apply_prior(&self) -> Vec<TypeId> {
        vec![TypeId::of::<IdentityRemovalStrategy>()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::traversal::__;

    fn optimize(mut traversal: Traversal) -> String {
        InlineFilterStrategy.apply(&mut traversal).unwrap();
        traversal.to_string()
    }

    #[test]
    fn test_or_of_same_key_becomes_or_predicate() {
        assert_eq!(
            optimize(__::or(vec![__::has("name", "marko"), __::has("name", "bob")])),
            "[HasStep([name.or(eq(marko), eq(bob))])]"
        );
    }

    #[test]
    fn test_or_of_different_keys_is_kept() {
        assert_eq!(
            optimize(__::or(vec![__::has("name", "marko"), __::has("age", 29)])),
            "[OrStep([[HasStep([name.eq(marko)])], [HasStep([age.eq(29)])]])]"
        );
    }

    #[test]
    fn test_filter_and_and_are_inlined() {
        assert_eq!(
            optimize(__::out(()).filter(__::has("age", P::gt(30))).as_("a")),
            "[VertexStep(OUT,vertex), HasStep([age.gt(30)])@[a]]"
        );
        assert_eq!(
            optimize(__::and(vec![__::has("name", "marko"), __::has("age", P::gt(20))])),
            "[HasStep([name.eq(marko), age.gt(20)])]"
        );
    }

    #[test]
    fn test_and_with_lambda_is_kept() {
        let traversal = __::and(vec![__::has("name", "marko"), __::filter_fn(|_| true)]);
        assert_eq!(optimize(traversal).matches("AndStep").count(), 1);
    }

    #[test]
    fn test_edge_label_folding() {
        assert_eq!(
            optimize(__::out_e(()).has_label("knows").in_v()),
            "[VertexStep(OUT,[knows],edge), EdgeVertexStep(IN)]"
        );
        assert_eq!(
            optimize(__::out_e(()).has_label(["knows", "created"]).has("weight", 1.0)),
            "[VertexStep(OUT,[knows, created],edge), HasStep([weight.eq(1.0)])]"
        );
        let already_labeled = optimize(__::out_e("created").has_label("knows"));
        assert!(already_labeled.contains("HasStep"));
    }

    #[test]
    fn test_child_labels_are_kept() {
        assert_eq!(
            optimize(__::filter(__::has("age", P::gt(10)).as_("b")).as_("a")),
            "[HasStep([age.gt(10)])@[a, b]]"
        );
        assert_eq!(
            optimize(__::and(vec![
                __::has("name", "marko").as_("x"),
                __::has("age", P::gt(20)),
            ])),
            "[HasStep([name.eq(marko), age.gt(20)])@[x]]"
        );
        assert_eq!(
            optimize(__::or(vec![
                __::has("name", "marko").as_("a"),
                __::has("name", "bob").as_("b"),
            ])
            .as_("c")),
            "[HasStep([name.or(eq(marko), eq(bob))])@[a, b, c]]"
        );
    }

    #[test]
    fn test_nested_and_inside_or() {
        assert_eq!(
            optimize(__::or(vec![
                __::has("age", 10),
                __::and(vec![__::has("age", P::gt(20)), __::has("age", P::lt(100))]),
            ])),
            "[HasStep([age.or(eq(10), and(gt(20), lt(100)))])]"
        );
        let mixed_keys = optimize(__::or(vec![
            __::has("age", 10),
            __::and(vec![__::has("age", P::gt(20)), __::has("name", "josh")]),
        ]));
        assert!(mixed_keys.starts_with("[OrStep("));
    }

    #[test]
    fn test_or_of_edge_labels_folds_into_edge_step() {
        assert_eq!(
            optimize(
                __::out_e(())
                    .or(vec![
                        __::has_label("knows").as_("a"),
                        __::has_label("created").as_("b"),
                    ])
                    .as_("c")
                    .in_v()
            ),
            "[VertexStep(OUT,[knows, created],edge)@[a, b, c], EdgeVertexStep(IN)]"
        );
    }

    #[test]
    fn test_children_are_optimized() {
        assert_eq!(
            optimize(__::union(vec![__::filter(__::has("name", "josh"))])),
            "[UnionStep([[HasStep([name.eq(josh)])]])]"
        );
    }
}
