// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Strategy-by-strategy explanation of a traversal
//!
//! [`TraversalExplanation`] replays the traversal's strategies on a copy, in
//! application order, and records the pipeline after each one. The original
//! traversal is left untouched.

use std::fmt;

use crate::error::{TraversalError, TraversalResult};
use crate::process::strategy::StrategyCategory;
use crate::process::traversal::Traversal;

pub const DEFAULT_EXPLAIN_WIDTH: usize = 100;

const ORIGINAL_TRAVERSAL: &str = "Original Traversal";
const FINAL_TRAVERSAL: &str = "Final Traversal";

/// Pipeline rendering after one strategy ran
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySnapshot {
    pub strategy: String,
    pub category: StrategyCategory,
    pub traversal: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraversalExplanation {
    original: String,
    snapshots: Vec<StrategySnapshot>,
}

impl TraversalExplanation {
    /// Replay every strategy of `traversal`; fails like strategy application would
    pub fn new(traversal: &Traversal) -> TraversalResult<Self> {
        if let Some(error) = traversal.error() {
            return Err(error.clone());
        }
        let original = traversal.to_string();
        let mut working = traversal.clone();
        let mut snapshots = Vec::with_capacity(traversal.strategies().len());
        for strategy in traversal.strategies().iter() {
            strategy.apply(&mut working)?;
            snapshots.push(StrategySnapshot {
                strategy: strategy.name().to_string(),
                category: strategy.category(),
                traversal: working.to_string(),
            });
        }
        Ok(Self {
            original,
            snapshots,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn snapshots(&self) -> &[StrategySnapshot] {
        &self.snapshots
    }

    /// Rendering after the last strategy, or the original when there is none
    pub fn final_traversal(&self) -> &str {
        self.snapshots
            .last()
            .map(|s| s.traversal.as_str())
            .unwrap_or(&self.original)
    }

    /// Column-aligned table wrapped at `max_line_length` characters
    pub fn pretty_print(&self, max_line_length: usize) -> TraversalResult<String> {
        let strategy_column = self
            .snapshots
            .iter()
            .map(|s| s.strategy.chars().count())
            .max()
            .unwrap_or(15);
        let indent = strategy_column + 10;
        if max_line_length <= indent {
            return Err(TraversalError::Configuration(format!(
                "The maximum line length is too small to present the TraversalExplanation: {}",
                max_line_length
            )));
        }
        let traversal_column = max_line_length - indent;

        let largest = std::iter::once(self.original.as_str())
            .chain(self.snapshots.iter().map(|s| s.traversal.as_str()))
            .flat_map(|t| {
                word_wrap(t, traversal_column, indent)
                    .lines()
                    .map(|line| {
                        let line = line.trim();
                        if line.starts_with('[') {
                            line.chars().count()
                        } else {
                            line.chars().count() + 3
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .max()
            .unwrap_or(0);

        let mut out = String::from("Traversal Explanation\n");
        out.push_str(&"=".repeat(strategy_column + 7 + largest));
        out.push('\n');
        out.push_str(ORIGINAL_TRAVERSAL);
        out.push_str(&padding(strategy_column + 7, ORIGINAL_TRAVERSAL.len()));
        out.push_str(&word_wrap(&self.original, traversal_column, indent));
        out.push_str("\n\n");
        for snapshot in &self.snapshots {
            out.push_str(&snapshot.strategy);
            out.push_str(&padding(strategy_column + 1, snapshot.strategy.chars().count()));
            out.push_str(&format!("[{}]   ", snapshot.category.tag()));
            out.push_str(&word_wrap(&snapshot.traversal, traversal_column, indent));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(FINAL_TRAVERSAL);
        out.push_str(&padding(strategy_column + 7, FINAL_TRAVERSAL.len()));
        out.push_str(&word_wrap(self.final_traversal(), traversal_column, indent));
        Ok(out)
    }
}

impl fmt::Display for TraversalExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pretty_print(usize::MAX) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn padding(width: usize, used: usize) -> String {
    " ".repeat(width.saturating_sub(used))
}

/// Hard-wrap every `width` characters, indenting continuation lines
fn word_wrap(text: &str, width: usize, indent: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= width {
        return text.to_string();
    }
    let separator = format!("\n{}", " ".repeat(indent));
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(&separator)
}

impl Traversal {
    /// Explain how the registered strategies rewrite this traversal
    pub fn explain(&self) -> TraversalResult<TraversalExplanation> {
        TraversalExplanation::new(self)
    }
}
