// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Replaces edge hops that only lead to the adjacent vertex
//!
//! `outE().inV()`, `inE().outV()` and `bothE().otherV()` walk an edge only to
//! leave it again. When nothing can observe the edge (no label on it, no
//! `path()` and no lambda anywhere in the traversal) the pair collapses into
//! `out()`, `in()` or `both()`.

use std::any::{Any, TypeId};

use super::{IdentityRemovalStrategy, InlineFilterStrategy, StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::process::step::{ElementType, Step, StepKind};
use crate::process::traversal::Traversal;
use crate::structure::Direction;

#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentToAdjacentStrategy;

fn invalidates(step: &Step) -> bool {
    matches!(step.kind, StepKind::Path) || step.capabilities().lambda_holder
}

fn is_adjacent_pair(edge_step: &Step, vertex_step: &Step) -> bool {
    if !edge_step.labels().is_empty() {
        return false;
    }
    match (&edge_step.kind, &vertex_step.kind) {
        (
            StepKind::Vertex {
                direction,
                returns: ElementType::Edge,
                ..
            },
            next,
        ) => matches!(
            (direction, next),
            (Direction::Out, StepKind::EdgeVertex(Direction::In))
                | (Direction::In, StepKind::EdgeVertex(Direction::Out))
                | (Direction::Both, StepKind::EdgeOtherVertex)
        ),
        _ => false,
    }
}

impl IncidentToAdjacentStrategy {
    fn apply_level(traversal: &mut Traversal) {
        let steps = traversal.steps_mut();
        let mut i = 0;
        while i + 1 < steps.len() {
            if !is_adjacent_pair(&steps[i], &steps[i + 1]) {
                i += 1;
                continue;
            }
            let mut vertex_step = steps.remove(i + 1);
            let edge_step = &mut steps[i];
            if let StepKind::Vertex { returns, .. } = &mut edge_step.kind {
                *returns = ElementType::Vertex;
            }
            for label in vertex_step.take_labels() {
                edge_step.add_label(label);
            }
            i += 1;
        }
    }
}

impl TraversalStrategy for IncidentToAdjacentStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Optimization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        if traversal.any_step(&invalidates) {
            return Ok(());
        }
        traversal.apply_recursively(&mut |t| {
            Self::apply_level(t);
            Ok(())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn apply_prior(&self) -> Vec<TypeId> {
        vec![
            TypeId::of::<IdentityRemovalStrategy>(),
            TypeId::of::<InlineFilterStrategy>(),
        ]
    }
}
