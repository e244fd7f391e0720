// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutation events
//!
//! Mutating steps hold a [`CallbackRegistry`]. After a successful mutation
//! each callback receives an [`Event`] carrying a detached snapshot of the
//! element. The event strategy registers a callback that hands events to an
//! [`EventQueue`], which either notifies listeners immediately or holds them
//! per thread until the graph transaction commits.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::error::{TraversalError, TraversalResult};
use crate::structure::{
    DetachedEdge, DetachedVertex, Edge, Element, Graph, TransactionStatus, Value, Vertex,
};

/// Snapshot of a committed mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    VertexAdded(DetachedVertex),
    EdgeAdded(DetachedEdge),
    VertexPropertyChanged {
        vertex: DetachedVertex,
        key: String,
        old_value: Option<Value>,
        new_value: Value,
    },
    EdgePropertyChanged {
        edge: DetachedEdge,
        key: String,
        old_value: Option<Value>,
        new_value: Value,
    },
}

impl Event {
    /// Deliver to every listener in registration order
    pub fn fire(&self, listeners: &[Arc<dyn MutationListener>]) {
        for listener in listeners {
            match self {
                Event::VertexAdded(vertex) => listener.vertex_added(vertex),
                Event::EdgeAdded(edge) => listener.edge_added(edge),
                Event::VertexPropertyChanged {
                    vertex,
                    key,
                    old_value,
                    new_value,
                } => listener.vertex_property_changed(vertex, key, old_value.as_ref(), new_value),
                Event::EdgePropertyChanged {
                    edge,
                    key,
                    old_value,
                    new_value,
                } => listener.edge_property_changed(edge, key, old_value.as_ref(), new_value),
            }
        }
    }
}

/// Receives mutation events; every method defaults to doing nothing
pub trait MutationListener: Send + Sync {
    fn vertex_added(&self, _vertex: &DetachedVertex) {}

    fn edge_added(&self, _edge: &DetachedEdge) {}

    fn vertex_property_changed(
        &self,
        _vertex: &DetachedVertex,
        _key: &str,
        _old_value: Option<&Value>,
        _new_value: &Value,
    ) {
    }

    fn edge_property_changed(
        &self,
        _edge: &DetachedEdge,
        _key: &str,
        _old_value: Option<&Value>,
        _new_value: &Value,
    ) {
    }
}

/// Callback attached to a mutating step
pub type EventCallback = Arc<dyn Fn(&Event) -> TraversalResult<()> + Send + Sync>;

/// Ordered set of callbacks held by a mutating step
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: Vec<EventCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback(&mut self, callback: EventCallback) {
        self.callbacks.push(callback);
    }

    pub fn remove_callback(&mut self, callback: &EventCallback) {
        self.callbacks.retain(|c| !Arc::ptr_eq(c, callback));
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    pub fn callbacks(&self) -> &[EventCallback] {
        &self.callbacks
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Run every callback; the first failure stops the fan-out
    pub fn notify(&self, event: &Event) -> TraversalResult<()> {
        for callback in &self.callbacks {
            callback(event)?;
        }
        Ok(())
    }
}

impl PartialEq for CallbackRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.callbacks.len() == other.callbacks.len()
            && self
                .callbacks
                .iter()
                .zip(other.callbacks.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

pub fn detach_vertex(graph: &dyn Graph, vertex: &Vertex) -> TraversalResult<DetachedVertex> {
    let element = Element::Vertex(vertex.clone());
    Ok(DetachedVertex {
        id: vertex.id.clone(),
        label: vertex.label.clone(),
        properties: graph.properties(&element, &[])?.into_iter().collect(),
    })
}

pub fn detach_edge(graph: &dyn Graph, edge: &Edge) -> TraversalResult<DetachedEdge> {
    let element = Element::Edge(edge.clone());
    Ok(DetachedEdge {
        id: edge.id.clone(),
        label: edge.label.clone(),
        out_v: edge.out_v.clone(),
        in_v: edge.in_v.clone(),
        properties: graph.properties(&element, &[])?.into_iter().collect(),
    })
}

/// Delivery policy for events
pub trait EventQueue: Send + Sync + fmt::Debug {
    fn set_listeners(&self, listeners: Vec<Arc<dyn MutationListener>>);

    fn add_event(&self, event: Event) -> TraversalResult<()>;
}

/// Notifies listeners as soon as an event is added
#[derive(Default)]
pub struct DefaultEventQueue {
    listeners: RwLock<Vec<Arc<dyn MutationListener>>>,
}

impl DefaultEventQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for DefaultEventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultEventQueue")
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl EventQueue for DefaultEventQueue {
    fn set_listeners(&self, listeners: Vec<Arc<dyn MutationListener>>) {
        *self.listeners.write() = listeners;
    }

    fn add_event(&self, event: Event) -> TraversalResult<()> {
        let listeners = self.listeners.read().clone();
        event.fire(&listeners);
        Ok(())
    }
}

/// Holds events per thread until the graph transaction closes
///
/// Commit delivers the thread's events in FIFO order, rollback drops them.
pub struct TransactionalEventQueue {
    listeners: RwLock<Vec<Arc<dyn MutationListener>>>,
    queues: Mutex<HashMap<ThreadId, VecDeque<Event>>>,
}

impl TransactionalEventQueue {
    /// Create a queue bound to the transactions of `graph`
    pub fn new(graph: &dyn Graph) -> TraversalResult<Arc<Self>> {
        let tx = match graph.tx() {
            Some(tx) if graph.features().supports_transactions => tx,
            _ => {
                return Err(TraversalError::Configuration(
                    "TransactionalEventQueue requires the graph to support transactions"
                        .to_string(),
                ))
            }
        };
        let queue = Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            queues: Mutex::new(HashMap::new()),
        });
        let weak = Arc::downgrade(&queue);
        tx.add_transaction_listener(Arc::new(move |status| match weak.upgrade() {
            Some(queue) => queue.on_transaction_status(thread::current().id(), status),
            None => Ok(()),
        }));
        Ok(queue)
    }

    pub fn add_event_for(&self, thread_id: ThreadId, event: Event) {
        self.queues
            .lock()
            .entry(thread_id)
            .or_default()
            .push_back(event);
    }

    /// Number of events waiting for `thread_id`'s transaction to close
    pub fn pending(&self, thread_id: ThreadId) -> usize {
        self.queues
            .lock()
            .get(&thread_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn on_transaction_status(
        &self,
        thread_id: ThreadId,
        status: TransactionStatus,
    ) -> TraversalResult<()> {
        match status {
            TransactionStatus::Commit => {
                let events = self.queues.lock().remove(&thread_id).unwrap_or_default();
                let listeners = self.listeners.read().clone();
                log::info!("Flushing {} event(s) on commit", events.len());
                for event in events {
                    event.fire(&listeners);
                }
                Ok(())
            }
            TransactionStatus::Rollback => {
                let dropped = self.queues.lock().remove(&thread_id).map(|q| q.len());
                log::debug!("Discarded {} event(s) on rollback", dropped.unwrap_or(0));
                Ok(())
            }
            other => Err(TraversalError::Event(format!(
                "TransactionalEventQueue is not aware of this status: {}",
                other
            ))),
        }
    }
}

impl fmt::Debug for TransactionalEventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalEventQueue")
            .field("listeners", &self.listeners.read().len())
            .field("threads", &self.queues.lock().len())
            .finish()
    }
}

impl EventQueue for TransactionalEventQueue {
    fn set_listeners(&self, listeners: Vec<Arc<dyn MutationListener>>) {
        *self.listeners.write() = listeners;
    }

    fn add_event(&self, event: Event) -> TraversalResult<()> {
        self.add_event_for(thread::current().id(), event);
        Ok(())
    }
}
