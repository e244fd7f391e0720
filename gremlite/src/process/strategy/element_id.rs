// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Element ids stored in a property
//!
//! For backends without stable user-visible ids, every created element gets
//! an id written to a dedicated property, and every id lookup or projection
//! is redirected to that property.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::process::parameters::ParamKey;
use crate::process::predicate::P;
use crate::process::step::{HasContainer, Step, StepKind};
use crate::process::traversal::Traversal;
use crate::structure::Value;

pub const DEFAULT_ID_PROPERTY_KEY: &str = "__id";

type IdMaker = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
pub struct ElementIdStrategy {
    id_property_key: String,
    id_maker: IdMaker,
}

impl ElementIdStrategy {
    pub fn builder() -> ElementIdStrategyBuilder {
        ElementIdStrategyBuilder::default()
    }

    pub fn id_property_key(&self) -> &str {
        &self.id_property_key
    }

    /// A freshly made id
    pub fn make_id(&self) -> Value {
        (self.id_maker)()
    }

    fn apply_level(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        let key = self.id_property_key.as_str();
        let steps = traversal.steps_mut();
        let mut i = 0;
        while i < steps.len() {
            match &mut steps[i].kind {
                StepKind::Graph { ids, .. } if !ids.is_empty() => {
                    let ids = std::mem::take(ids);
                    let predicate = match ids.len() {
                        1 => P::eq(ids.into_iter().next().unwrap_or(Value::Null)),
                        _ => P::within(ids),
                    };
                    steps.insert(i + 1, Step::new(StepKind::Has(vec![HasContainer::new(key, predicate)])));
                }
                StepKind::Has(containers) => {
                    for container in containers.iter_mut().filter(|c| c.is_id()) {
                        container.key = key.to_string();
                    }
                }
                StepKind::Id => {
                    steps[i].kind = StepKind::Values(vec![key.to_string()]);
                }
                StepKind::AddVertex { parameters, .. } | StepKind::AddEdge { parameters, .. } => {
                    let property = ParamKey::property(key);
                    if parameters.contains(&ParamKey::Id) {
                        for value in parameters.remove(&ParamKey::Id) {
                            parameters.set(property.clone(), value)?;
                        }
                    } else if !parameters.contains(&property) {
                        parameters.set(property, self.make_id())?;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Ok(())
    }
}

impl fmt::Debug for ElementIdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementIdStrategy")
            .field("id_property_key", &self.id_property_key)
            .finish()
    }
}

impl TraversalStrategy for ElementIdStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Decoration
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        traversal.apply_recursively(&mut |t| self.apply_level(t))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ElementIdStrategyBuilder {
    id_property_key: String,
    id_maker: IdMaker,
}

impl Default for ElementIdStrategyBuilder {
    fn default() -> Self {
        Self {
            id_property_key: DEFAULT_ID_PROPERTY_KEY.to_string(),
            id_maker: Arc::new(|| Value::String(uuid::Uuid::new_v4().to_string())),
        }
    }
}

impl ElementIdStrategyBuilder {
    pub fn id_property_key(mut self, key: impl Into<String>) -> Self {
        self.id_property_key = key.into();
        self
    }

    pub fn id_maker(mut self, maker: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.id_maker = Arc::new(maker);
        self
    }

    pub fn create(self) -> ElementIdStrategy {
        ElementIdStrategy {
            id_property_key: self.id_property_key,
            id_maker: self.id_maker,
        }
    }
}
