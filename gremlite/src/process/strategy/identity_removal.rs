// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Removes `identity()` steps

use std::any::Any;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::process::step::StepKind;
use crate::process::traversal::Traversal;

/// Drops identity steps, moving their labels onto the previous step
///
/// A labeled identity at the head of a traversal has no previous step to
/// take its labels and is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRemovalStrategy;

impl IdentityRemovalStrategy {
    fn apply_level(traversal: &mut Traversal) {
        let steps = traversal.steps_mut();
        let mut i = 0;
        while i < steps.len() && steps.len() > 1 {
            if !matches!(steps[i].kind, StepKind::Identity) {
                i += 1;
                continue;
            }
            if i == 0 {
                if steps[i].labels().is_empty() {
                    steps.remove(i);
                } else {
                    i += 1;
                }
                continue;
            }
            let labels = steps[i].take_labels();
            for label in labels {
                steps[i - 1].add_label(label);
            }
            steps.remove(i);
        }
    }
}

impl TraversalStrategy for IdentityRemovalStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Optimization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        traversal.apply_recursively(&mut |t| {
            Self::apply_level(t);
            Ok(())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::traversal::__;

    fn optimize(mut traversal: Traversal) -> String {
        IdentityRemovalStrategy.apply(&mut traversal).unwrap();
        traversal.to_string()
    }

    #[test]
    fn test_labeled_head_identity_is_kept() {
        assert_eq!(
            optimize(__::identity().as_("a").out(()).identity()),
            "[IdentityStep@[a], VertexStep(OUT,vertex)]"
        );
    }

    #[test]
    fn test_labels_move_to_previous_step() {
        assert_eq!(
            optimize(__::out(()).identity().as_("x").identity().as_("y").values("name")),
            "[VertexStep(OUT,vertex)@[x, y], PropertiesStep([name],value)]"
        );
    }

    #[test]
    fn test_single_identity_survives_and_reaches_children() {
        assert_eq!(optimize(__::identity()), "[IdentityStep]");
        assert_eq!(
            optimize(__::union(vec![__::identity().out(()), __::identity()])),
            "[UnionStep([[VertexStep(OUT,vertex)], [IdentityStep]])]"
        );
    }

    #[test]
    fn test_fixpoint() {
        let mut traversal = __::identity().identity().out(()).identity().as_("a");
        IdentityRemovalStrategy.apply(&mut traversal).unwrap();
        let once = traversal.to_string();
        IdentityRemovalStrategy.apply(&mut traversal).unwrap();
        assert_eq!(traversal.to_string(), once);
        assert_eq!(once, "[VertexStep(OUT,vertex)@[a]]");
    }
}
