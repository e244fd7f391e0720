// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rejects traversals holding host closures

use std::any::Any;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::{TraversalError, TraversalResult};
use crate::process::step::Step;
use crate::process::traversal::Traversal;

/// Fails verification when any step, at any depth, holds a lambda
#[derive(Debug, Clone, Copy, Default)]
pub struct LambdaRestrictionStrategy;

/// First step in `traversal` or its children that satisfies `test`, rendered
pub(crate) fn find_step(traversal: &Traversal, test: &dyn Fn(&Step) -> bool) -> Option<String> {
    traversal.steps().iter().find_map(|step| {
        if test(step) {
            Some(step.to_string())
        } else {
            step.children()
                .into_iter()
                .find_map(|child| find_step(child, test))
        }
    })
}

impl TraversalStrategy for LambdaRestrictionStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Verification
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        match find_step(traversal, &|step| step.capabilities().lambda_holder) {
            Some(step) => Err(TraversalError::Verification(format!(
                "The provided traversal has a lambda step which is not allowed by {}: {}",
                self.name(),
                step
            ))),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::step::Order;
    use crate::process::traversal::__;

    #[test]
    fn test_lambdas_fail_verification() {
        let mut traversal = __::out(()).filter_fn(|_| true);
        let error = LambdaRestrictionStrategy.apply(&mut traversal).unwrap_err();
        assert!(error.is_verification());
        assert!(error.to_string().contains("lambda"));

        let mut nested = __::union(vec![__::map_fn(|t| t.get().clone())]);
        assert!(LambdaRestrictionStrategy.apply(&mut nested).is_err());

        let mut comparator = __::order().by_comparator("age", |a, b| a.total_cmp(b));
        assert!(LambdaRestrictionStrategy.apply(&mut comparator).is_err());
    }

    #[test]
    fn test_declarative_traversals_pass() {
        let mut traversal = __::out(())
            .filter(__::has("name", "marko"))
            .order()
            .by_order("age", Order::Decr)
            .values("name");
        assert!(LambdaRestrictionStrategy.apply(&mut traversal).is_ok());
    }
}
