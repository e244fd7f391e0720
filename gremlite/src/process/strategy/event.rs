// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutation notification
//!
//! Attaches one callback to every mutating step. The callback forwards the
//! step's events to the configured [`EventQueue`], which decides when the
//! registered listeners see them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::process::event::{DefaultEventQueue, Event, EventCallback, EventQueue, MutationListener};
use crate::process::traversal::Traversal;

pub struct EventStrategy {
    listeners: Vec<Arc<dyn MutationListener>>,
    queue: Arc<dyn EventQueue>,
    callback: EventCallback,
}

impl EventStrategy {
    pub fn builder() -> EventStrategyBuilder {
        EventStrategyBuilder::default()
    }

    pub fn listeners(&self) -> &[Arc<dyn MutationListener>] {
        &self.listeners
    }

    pub fn event_queue(&self) -> &Arc<dyn EventQueue> {
        &self.queue
    }
}

impl fmt::Debug for EventStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStrategy")
            .field("listeners", &self.listeners.len())
            .field("queue", &self.queue)
            .finish()
    }
}

impl TraversalStrategy for EventStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Decoration
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        traversal.apply_recursively(&mut |t| {
            for step in t.steps_mut() {
                if let Some(callbacks) = step.callbacks_mut() {
                    // Re-applying the strategy must not register twice
                    callbacks.remove_callback(&self.callback);
                    callbacks.add_callback(self.callback.clone());
                }
            }
            Ok(())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct EventStrategyBuilder {
    listeners: Vec<Arc<dyn MutationListener>>,
    queue: Option<Arc<dyn EventQueue>>,
}

impl EventStrategyBuilder {
    pub fn add_listener(mut self, listener: Arc<dyn MutationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Delivery policy; events fire immediately when none is given
    pub fn event_queue(mut self, queue: Arc<dyn EventQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn create(self) -> EventStrategy {
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(DefaultEventQueue::new()) as Arc<dyn EventQueue>);
        queue.set_listeners(self.listeners.clone());
        let sink = queue.clone();
        let callback: EventCallback = Arc::new(move |event: &Event| sink.add_event(event.clone()));
        EventStrategy {
            listeners: self.listeners,
            queue,
            callback,
        }
    }
}
