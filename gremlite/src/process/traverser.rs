// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Traversers and the generator table
//!
//! A [`Traverser`] is one value in flight together with its bulk, path,
//! sack and loop counters. What a traverser actually records is decided once
//! per traversal by a [`TraverserGenerator`]: the requirement flags of every
//! step are unioned and the first generator in a fixed table whose supported
//! set covers them is used. A pipeline without a `path()` step never pays for
//! path storage.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::process::execution::SideEffects;
use crate::structure::Value;

/// History of the objects a traverser visited, with the labels attached at each position
#[derive(Debug, Clone, Default, PartialEq, Hash, Serialize, Deserialize)]
pub struct Path {
    objects: Vec<Value>,
    labels: Vec<BTreeSet<String>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    pub fn labels(&self) -> &[BTreeSet<String>] {
        &self.labels
    }

    pub fn extend(&mut self, object: Value, labels: &BTreeSet<String>) {
        self.objects.push(object);
        self.labels.push(labels.clone());
    }

    /// Attach labels to the most recent position
    pub fn add_labels(&mut self, labels: &BTreeSet<String>) {
        if let Some(last) = self.labels.last_mut() {
            last.extend(labels.iter().cloned());
        }
    }

    /// The most recent object stored under `label`
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .rposition(|labels| labels.contains(label))
            .map(|i| &self.objects[i])
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|labels| labels.contains(label))
    }
}

impl Eq for Path {}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path[")?;
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", object)?;
        }
        write!(f, "]")
    }
}

/// Capabilities a step needs from the traversers flowing through it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraverserRequirement {
    Bulk,
    LabeledPath,
    NestedLoop,
    Object,
    OneBulk,
    Path,
    Sack,
    SideEffects,
    SingleLoop,
}

impl TraverserRequirement {
    pub const ALL: [TraverserRequirement; 9] = [
        TraverserRequirement::Bulk,
        TraverserRequirement::LabeledPath,
        TraverserRequirement::NestedLoop,
        TraverserRequirement::Object,
        TraverserRequirement::OneBulk,
        TraverserRequirement::Path,
        TraverserRequirement::Sack,
        TraverserRequirement::SideEffects,
        TraverserRequirement::SingleLoop,
    ];

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

/// Set of [`TraverserRequirement`] flags
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Requirements(u16);

impl Requirements {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn of(requirements: &[TraverserRequirement]) -> Self {
        let mut set = Self::empty();
        for r in requirements {
            set.insert(*r);
        }
        set
    }

    pub fn insert(&mut self, requirement: TraverserRequirement) {
        self.0 |= requirement.bit();
    }

    pub fn remove(&mut self, requirement: TraverserRequirement) {
        self.0 &= !requirement.bit();
    }

    pub fn contains(&self, requirement: TraverserRequirement) -> bool {
        self.0 & requirement.bit() != 0
    }

    pub fn union(&self, other: Requirements) -> Requirements {
        Requirements(self.0 | other.0)
    }

    pub fn is_superset(&self, other: &Requirements) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn iter(&self) -> impl Iterator<Item = TraverserRequirement> + '_ {
        TraverserRequirement::ALL
            .iter()
            .copied()
            .filter(move |r| self.contains(*r))
    }
}

impl fmt::Debug for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// How much of the path a traverser keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTracking {
    None,
    /// Only positions that carry a label
    Labeled,
    Full,
}

/// Traverser representation advertising the requirements it satisfies
#[derive(Debug, PartialEq, Eq)]
pub struct TraverserGenerator {
    name: &'static str,
    supports: Requirements,
}

static GENERATORS: Lazy<Vec<TraverserGenerator>> = Lazy::new(|| {
    use TraverserRequirement as R;
    let table: [(&'static str, &[TraverserRequirement]); 10] = [
        ("O", &[R::Object]),
        ("B_O", &[R::Bulk, R::Object]),
        ("B_O_S_SE_SL", &[R::Bulk, R::Object, R::Sack, R::SideEffects, R::SingleLoop]),
        (
            "B_LP_O_S_SE_SL",
            &[R::Bulk, R::LabeledPath, R::Object, R::Sack, R::SideEffects, R::SingleLoop],
        ),
        (
            "B_LP_O_P_S_SE_SL",
            &[R::Bulk, R::LabeledPath, R::Object, R::Path, R::Sack, R::SideEffects, R::SingleLoop],
        ),
        (
            "B_NL_O_S_SE_SL",
            &[R::Bulk, R::NestedLoop, R::Object, R::Sack, R::SideEffects, R::SingleLoop],
        ),
        (
            "B_LP_NL_O_P_S_SE_SL",
            &[
                R::Bulk,
                R::LabeledPath,
                R::NestedLoop,
                R::Object,
                R::Path,
                R::Sack,
                R::SideEffects,
                R::SingleLoop,
            ],
        ),
        ("O_OB_S_SE_SL", &[R::Object, R::OneBulk, R::Sack, R::SideEffects, R::SingleLoop]),
        (
            "LP_O_OB_S_SE_SL",
            &[R::LabeledPath, R::Object, R::OneBulk, R::Sack, R::SideEffects, R::SingleLoop],
        ),
        (
            "LP_O_OB_P_S_SE_SL",
            &[R::LabeledPath, R::Object, R::OneBulk, R::Path, R::Sack, R::SideEffects, R::SingleLoop],
        ),
    ];
    table
        .iter()
        .map(|&(name, flags)| TraverserGenerator {
            name,
            supports: Requirements::of(flags),
        })
        .collect()
});

impl TraverserGenerator {
    /// The cheapest generator covering `requirements`
    pub fn select(requirements: Requirements) -> TraversalResult<&'static TraverserGenerator> {
        let generator = GENERATORS
            .iter()
            .find(|g| g.supports.is_superset(&requirements))
            .ok_or_else(|| {
                TraversalError::Configuration(format!(
                    "The provided traverser requirements are not supported: {:?}",
                    requirements
                ))
            })?;
        log::debug!("Selected traverser generator {} for {:?}", generator.name, requirements);
        Ok(generator)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn supports(&self) -> Requirements {
        self.supports
    }

    pub fn path_tracking(&self) -> PathTracking {
        if self.supports.contains(TraverserRequirement::Path) {
            PathTracking::Full
        } else if self.supports.contains(TraverserRequirement::LabeledPath) {
            PathTracking::Labeled
        } else {
            PathTracking::None
        }
    }

    pub fn one_bulk(&self) -> bool {
        self.supports.contains(TraverserRequirement::OneBulk)
    }

    /// A fresh traverser at a start step
    pub fn generate(
        &'static self,
        value: Value,
        labels: &BTreeSet<String>,
        bulk: u64,
        sack: Option<Value>,
        side_effects: SideEffects,
    ) -> Traverser {
        let mut traverser = Traverser {
            value,
            bulk: if self.one_bulk() { 1 } else { bulk },
            path: match self.path_tracking() {
                PathTracking::None => None,
                _ => Some(Path::new()),
            },
            path_pending: true,
            sack: if self.supports.contains(TraverserRequirement::Sack) {
                sack
            } else {
                None
            },
            loops: Vec::new(),
            side_effects,
            generator: self,
        };
        traverser.record_position(labels);
        traverser
    }
}

/// One value in flight
#[derive(Debug, Clone)]
pub struct Traverser {
    value: Value,
    bulk: u64,
    path: Option<Path>,
    /// The current value has not been written to a labeled-only path yet
    path_pending: bool,
    sack: Option<Value>,
    loops: Vec<u32>,
    side_effects: SideEffects,
    generator: &'static TraverserGenerator,
}

impl Traverser {
    pub fn get(&self) -> &Value {
        &self.value
    }

    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    pub fn set_bulk(&mut self, bulk: u64) {
        if !self.generator.one_bulk() {
            self.bulk = bulk;
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn sack(&self) -> Option<&Value> {
        self.sack.as_ref()
    }

    pub fn set_sack(&mut self, sack: Value) {
        if self.generator.supports.contains(TraverserRequirement::Sack) {
            self.sack = Some(sack);
        }
    }

    /// Iterations completed by the innermost enclosing loop
    pub fn loops(&self) -> u32 {
        self.loops.last().copied().unwrap_or(0)
    }

    pub fn init_loop(&mut self) {
        self.loops.push(0);
    }

    pub fn incr_loops(&mut self) {
        if let Some(count) = self.loops.last_mut() {
            *count += 1;
        }
    }

    pub fn reset_loops(&mut self) {
        self.loops.pop();
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    pub fn generator(&self) -> &'static TraverserGenerator {
        self.generator
    }

    /// Child traverser carrying a new value; bulk, sack and loops are inherited
    pub fn split(&self, value: Value) -> Traverser {
        let mut child = Traverser {
            value,
            bulk: self.bulk,
            path: self.path.clone(),
            path_pending: true,
            sack: self.sack.clone(),
            loops: self.loops.clone(),
            side_effects: self.side_effects.clone(),
            generator: self.generator,
        };
        if self.generator.path_tracking() == PathTracking::Full {
            child.record_position(&BTreeSet::new());
        }
        child
    }

    /// Attach step labels to the current position
    pub fn add_labels(&mut self, labels: &BTreeSet<String>) {
        if labels.is_empty() {
            return;
        }
        match self.generator.path_tracking() {
            PathTracking::None => {}
            PathTracking::Labeled if self.path_pending => self.record_position(labels),
            PathTracking::Labeled | PathTracking::Full => {
                if let Some(path) = self.path.as_mut() {
                    if path.is_empty() {
                        path.extend(self.value.clone(), labels);
                    } else {
                        path.add_labels(labels);
                    }
                }
            }
        }
    }

    fn record_position(&mut self, labels: &BTreeSet<String>) {
        let write = match self.generator.path_tracking() {
            PathTracking::None => false,
            PathTracking::Labeled => !labels.is_empty(),
            PathTracking::Full => true,
        };
        if write {
            if let Some(path) = self.path.as_mut() {
                path.extend(self.value.clone(), labels);
                self.path_pending = false;
            }
        }
    }

    /// Whether two traversers may be merged into one with summed bulk
    pub fn is_equivalent(&self, other: &Traverser, merge_sacks: bool) -> bool {
        self.value == other.value
            && self.path == other.path
            && self.loops == other.loops
            && (merge_sacks || self.sack == other.sack)
    }

    /// Key used to group equivalent traversers
    pub fn merge_key(&self, merge_sacks: bool) -> (Value, Option<Path>, Vec<u32>, Option<Value>) {
        (
            self.value.clone(),
            self.path.clone(),
            self.loops.clone(),
            if merge_sacks { None } else { self.sack.clone() },
        )
    }

    pub(crate) fn into_value(self) -> Value {
        self.value
    }
}
