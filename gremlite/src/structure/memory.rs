// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory graph backend
//!
//! Provides vertex/edge maps ordered by id, adjacency lists for navigation,
//! and optional thread-bound transactions. A transaction records one undo
//! operation per mutation; rollback replays them in reverse.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::thread::{self, ThreadId};

use super::element::{Direction, Edge, Element, ElementId, Vertex};
use super::graph::{Graph, GraphFeatures, Transaction, TransactionListener, TransactionStatus};
use super::value::Value;
use crate::error::{GraphError, GraphResult, TraversalError, TraversalResult};

#[derive(Debug, Clone)]
struct VertexRecord {
    label: String,
    properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    label: String,
    out_v: ElementId,
    in_v: ElementId,
    properties: BTreeMap<String, Value>,
}

/// Represents a mutation that can be undone
#[derive(Debug, Clone)]
enum UndoOperation {
    /// A vertex was inserted - to undo, remove it
    InsertVertex { id: ElementId },
    /// An edge was inserted - to undo, remove it
    InsertEdge { id: ElementId },
    /// A property was written - to undo, restore the old value
    SetProperty {
        element: Element,
        key: String,
        old_value: Option<Value>,
    },
}

#[derive(Debug, Default)]
struct GraphData {
    vertices: BTreeMap<ElementId, VertexRecord>,
    edges: BTreeMap<ElementId, EdgeRecord>,
    /// Adjacency list: vertex id -> outgoing edge ids
    adjacency_out: HashMap<ElementId, Vec<ElementId>>,
    /// Adjacency list: vertex id -> incoming edge ids
    adjacency_in: HashMap<ElementId, Vec<ElementId>>,
    next_id: i64,
}

impl GraphData {
    fn allocate_id(&mut self, requested: Option<ElementId>) -> ElementId {
        match requested {
            Some(ElementId::Integer(i)) => {
                self.next_id = self.next_id.max(i + 1);
                ElementId::Integer(i)
            }
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                ElementId::Integer(id)
            }
        }
    }

    fn vertex_ref(&self, id: &ElementId) -> Option<Vertex> {
        self.vertices.get(id).map(|record| Vertex {
            id: id.clone(),
            label: record.label.clone(),
        })
    }

    fn edge_ref(&self, id: &ElementId) -> Option<Edge> {
        let record = self.edges.get(id)?;
        Some(Edge {
            id: id.clone(),
            label: record.label.clone(),
            out_v: self.vertex_ref(&record.out_v)?,
            in_v: self.vertex_ref(&record.in_v)?,
        })
    }

    fn properties_of(&self, element: &Element) -> GraphResult<&BTreeMap<String, Value>> {
        match element {
            Element::Vertex(v) => self
                .vertices
                .get(&v.id)
                .map(|r| &r.properties)
                .ok_or_else(|| GraphError::VertexNotFound(v.id.to_string())),
            Element::Edge(e) => self
                .edges
                .get(&e.id)
                .map(|r| &r.properties)
                .ok_or_else(|| GraphError::EdgeNotFound(e.id.to_string())),
        }
    }

    fn properties_of_mut(
        &mut self,
        element: &Element,
    ) -> GraphResult<&mut BTreeMap<String, Value>> {
        match element {
            Element::Vertex(v) => self
                .vertices
                .get_mut(&v.id)
                .map(|r| &mut r.properties)
                .ok_or_else(|| GraphError::VertexNotFound(v.id.to_string())),
            Element::Edge(e) => self
                .edges
                .get_mut(&e.id)
                .map(|r| &mut r.properties)
                .ok_or_else(|| GraphError::EdgeNotFound(e.id.to_string())),
        }
    }

    fn remove_edge(&mut self, id: &ElementId) {
        if let Some(record) = self.edges.remove(id) {
            if let Some(out) = self.adjacency_out.get_mut(&record.out_v) {
                out.retain(|e| e != id);
            }
            if let Some(inc) = self.adjacency_in.get_mut(&record.in_v) {
                inc.retain(|e| e != id);
            }
        }
    }

    fn undo(&mut self, operation: UndoOperation) {
        match operation {
            UndoOperation::InsertVertex { id } => {
                self.vertices.remove(&id);
                self.adjacency_out.remove(&id);
                self.adjacency_in.remove(&id);
            }
            UndoOperation::InsertEdge { id } => self.remove_edge(&id),
            UndoOperation::SetProperty {
                element,
                key,
                old_value,
            } => {
                if let Ok(properties) = self.properties_of_mut(&element) {
                    match old_value {
                        Some(value) => properties.insert(key, value),
                        None => properties.remove(&key),
                    };
                }
            }
        }
    }
}

/// In-memory graph with optional transactions
pub struct MemoryGraph {
    data: RwLock<GraphData>,
    transactional: bool,
    /// Undo log per thread with an open transaction
    transactions: Mutex<HashMap<ThreadId, Vec<UndoOperation>>>,
    listeners: RwLock<Vec<TransactionListener>>,
}

impl MemoryGraph {
    /// Create a new empty, non-transactional graph
    pub fn new() -> Self {
        Self {
            data: RwLock::new(GraphData::default()),
            transactional: false,
            transactions: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a new empty graph with transaction support
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::new()
        }
    }

    /// The classic six vertex "modern" toy graph
    pub fn modern() -> Self {
        let graph = Self::new();
        graph.load_modern();
        graph
    }

    fn load_modern(&self) {
        let mut data = self.data.write();
        let people = [
            (1, "person", "marko", Some(29), None),
            (2, "person", "vadas", Some(27), None),
            (3, "software", "lop", None, Some("java")),
            (4, "person", "josh", Some(32), None),
            (5, "software", "ripple", None, Some("java")),
            (6, "person", "peter", Some(35), None),
        ];
        for (id, label, name, age, lang) in people {
            let mut properties = BTreeMap::new();
            properties.insert("name".to_string(), Value::from(name));
            if let Some(age) = age {
                properties.insert("age".to_string(), Value::Integer(age));
            }
            if let Some(lang) = lang {
                properties.insert("lang".to_string(), Value::from(lang));
            }
            let id = ElementId::Integer(id);
            data.adjacency_out.insert(id.clone(), Vec::new());
            data.adjacency_in.insert(id.clone(), Vec::new());
            data.vertices.insert(
                id,
                VertexRecord {
                    label: label.to_string(),
                    properties,
                },
            );
        }
        let edges = [
            (7, 1, "knows", 2, 0.5),
            (8, 1, "knows", 4, 1.0),
            (9, 1, "created", 3, 0.4),
            (10, 4, "created", 5, 1.0),
            (11, 4, "created", 3, 0.4),
            (12, 6, "created", 3, 0.2),
        ];
        for (id, out_v, label, in_v, weight) in edges {
            let id = ElementId::Integer(id);
            let out_v = ElementId::Integer(out_v);
            let in_v = ElementId::Integer(in_v);
            let mut properties = BTreeMap::new();
            properties.insert("weight".to_string(), Value::Float(weight));
            data.adjacency_out
                .entry(out_v.clone())
                .or_default()
                .push(id.clone());
            data.adjacency_in
                .entry(in_v.clone())
                .or_default()
                .push(id.clone());
            data.edges.insert(
                id,
                EdgeRecord {
                    label: label.to_string(),
                    out_v,
                    in_v,
                    properties,
                },
            );
        }
        data.next_id = 13;
    }

    pub fn vertex_count(&self) -> usize {
        self.data.read().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.data.read().edges.len()
    }

    /// Record an undo operation for the calling thread's transaction, opening one if needed
    fn log_undo(&self, operation: UndoOperation) {
        if self.transactional {
            self.transactions
                .lock()
                .entry(thread::current().id())
                .or_default()
                .push(operation);
        }
    }

    fn notify(&self, status: TransactionStatus) -> TraversalResult<()> {
        // Listeners may read the graph, so no lock is held while they run
        let listeners: Vec<TransactionListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(status)?;
        }
        Ok(())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("MemoryGraph")
            .field("vertices", &data.vertices.len())
            .field("edges", &data.edges.len())
            .field("transactional", &self.transactional)
            .finish()
    }
}

impl Graph for MemoryGraph {
    fn vertices(&self, ids: &[ElementId]) -> GraphResult<Vec<Vertex>> {
        let data = self.data.read();
        if ids.is_empty() {
            return Ok(data
                .vertices
                .keys()
                .filter_map(|id| data.vertex_ref(id))
                .collect());
        }
        Ok(ids.iter().filter_map(|id| data.vertex_ref(id)).collect())
    }

    fn edges(&self, ids: &[ElementId]) -> GraphResult<Vec<Edge>> {
        let data = self.data.read();
        if ids.is_empty() {
            return Ok(data
                .edges
                .keys()
                .filter_map(|id| data.edge_ref(id))
                .collect());
        }
        Ok(ids.iter().filter_map(|id| data.edge_ref(id)).collect())
    }

    fn add_vertex(
        &self,
        label: &str,
        id: Option<ElementId>,
        properties: &[(String, Value)],
    ) -> GraphResult<Vertex> {
        let mut data = self.data.write();
        if let Some(ref requested) = id {
            if data.vertices.contains_key(requested) {
                return Err(GraphError::VertexAlreadyExists(requested.to_string()));
            }
        }
        let id = data.allocate_id(id);
        data.adjacency_out.insert(id.clone(), Vec::new());
        data.adjacency_in.insert(id.clone(), Vec::new());
        data.vertices.insert(
            id.clone(),
            VertexRecord {
                label: label.to_string(),
                properties: properties.iter().cloned().collect(),
            },
        );
        drop(data);

        self.log_undo(UndoOperation::InsertVertex { id: id.clone() });
        Ok(Vertex::new(id, label))
    }

    fn add_edge(
        &self,
        label: &str,
        out_v: &Vertex,
        in_v: &Vertex,
        id: Option<ElementId>,
        properties: &[(String, Value)],
    ) -> GraphResult<Edge> {
        let mut data = self.data.write();
        if !data.vertices.contains_key(&out_v.id) || !data.vertices.contains_key(&in_v.id) {
            return Err(GraphError::InvalidEdge {
                out_v: out_v.id.to_string(),
                in_v: in_v.id.to_string(),
            });
        }
        if let Some(ref requested) = id {
            if data.edges.contains_key(requested) {
                return Err(GraphError::EdgeAlreadyExists(requested.to_string()));
            }
        }
        let id = data.allocate_id(id);
        data.adjacency_out
            .entry(out_v.id.clone())
            .or_default()
            .push(id.clone());
        data.adjacency_in
            .entry(in_v.id.clone())
            .or_default()
            .push(id.clone());
        data.edges.insert(
            id.clone(),
            EdgeRecord {
                label: label.to_string(),
                out_v: out_v.id.clone(),
                in_v: in_v.id.clone(),
                properties: properties.iter().cloned().collect(),
            },
        );
        drop(data);

        self.log_undo(UndoOperation::InsertEdge { id: id.clone() });
        Ok(Edge::new(id, label, out_v.clone(), in_v.clone()))
    }

    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
        labels: &[String],
    ) -> GraphResult<Vec<Edge>> {
        let data = self.data.read();
        if !data.vertices.contains_key(&vertex.id) {
            return Err(GraphError::VertexNotFound(vertex.id.to_string()));
        }
        let empty = Vec::new();
        let ids: Vec<&ElementId> = match direction {
            Direction::Out => data.adjacency_out.get(&vertex.id).unwrap_or(&empty).iter().collect(),
            Direction::In => data.adjacency_in.get(&vertex.id).unwrap_or(&empty).iter().collect(),
            Direction::Both => data
                .adjacency_out
                .get(&vertex.id)
                .unwrap_or(&empty)
                .iter()
                .chain(data.adjacency_in.get(&vertex.id).unwrap_or(&empty).iter())
                .collect(),
        };
        Ok(ids
            .into_iter()
            .filter_map(|id| data.edge_ref(id))
            .filter(|edge| labels.is_empty() || labels.iter().any(|l| *l == edge.label))
            .collect())
    }

    fn property(&self, element: &Element, key: &str) -> GraphResult<Option<Value>> {
        let data = self.data.read();
        Ok(data.properties_of(element)?.get(key).cloned())
    }

    fn properties(&self, element: &Element, keys: &[String]) -> GraphResult<Vec<(String, Value)>> {
        let data = self.data.read();
        let properties = data.properties_of(element)?;
        if keys.is_empty() {
            return Ok(properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect());
        }
        Ok(keys
            .iter()
            .filter_map(|k| properties.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    fn set_property(
        &self,
        element: &Element,
        key: &str,
        value: Value,
    ) -> GraphResult<Option<Value>> {
        if key.is_empty() {
            return Err(GraphError::PropertyError(
                "Property key can not be empty".to_string(),
            ));
        }
        let mut data = self.data.write();
        let old_value = data
            .properties_of_mut(element)?
            .insert(key.to_string(), value);
        drop(data);

        self.log_undo(UndoOperation::SetProperty {
            element: element.clone(),
            key: key.to_string(),
            old_value: old_value.clone(),
        });
        Ok(old_value)
    }

    fn features(&self) -> GraphFeatures {
        GraphFeatures {
            supports_transactions: self.transactional,
            supports_user_supplied_ids: true,
        }
    }

    fn tx(&self) -> Option<&dyn Transaction> {
        if self.transactional {
            Some(self)
        } else {
            None
        }
    }
}

impl Transaction for MemoryGraph {
    fn is_open(&self) -> bool {
        self.transactions
            .lock()
            .contains_key(&thread::current().id())
    }

    fn open(&self) -> TraversalResult<()> {
        let mut transactions = self.transactions.lock();
        let thread_id = thread::current().id();
        if transactions.contains_key(&thread_id) {
            return Err(GraphError::TransactionError(
                "Transaction already open for this thread".to_string(),
            )
            .into());
        }
        transactions.insert(thread_id, Vec::new());
        Ok(())
    }

    fn commit(&self) -> TraversalResult<()> {
        let log = self.transactions.lock().remove(&thread::current().id());
        match log {
            Some(operations) => {
                log::debug!("Committed transaction with {} operation(s)", operations.len());
                self.notify(TransactionStatus::Commit)
            }
            None => Err(TraversalError::Graph(GraphError::TransactionError(
                "Open a transaction before attempting to commit".to_string(),
            ))),
        }
    }

    fn rollback(&self) -> TraversalResult<()> {
        let log = self.transactions.lock().remove(&thread::current().id());
        match log {
            Some(operations) => {
                let mut data = self.data.write();
                let count = operations.len();
                for operation in operations.into_iter().rev() {
                    data.undo(operation);
                }
                drop(data);
                log::debug!("Rolled back transaction with {} operation(s)", count);
                self.notify(TransactionStatus::Rollback)
            }
            None => Err(TraversalError::Graph(GraphError::TransactionError(
                "Open a transaction before attempting to rollback".to_string(),
            ))),
        }
    }

    fn add_transaction_listener(&self, listener: TransactionListener) {
        self.listeners.write().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_modern_graph_shape() {
        let graph = MemoryGraph::modern();
        assert_eq!(graph.vertex_count(), 6);
        assert_eq!(graph.edge_count(), 6);

        let marko = Vertex::new(1, "person");
        let out = graph.adjacent_edges(&marko, Direction::Out, &[]).unwrap();
        assert_eq!(out.len(), 3);
        let knows = graph
            .adjacent_edges(&marko, Direction::Out, &["knows".to_string()])
            .unwrap();
        assert_eq!(knows.len(), 2);
        assert_eq!(
            graph
                .property(&Element::Vertex(marko), "name")
                .unwrap(),
            Some(Value::from("marko"))
        );
    }

    #[test]
    fn test_add_edge_requires_both_vertices() {
        let graph = MemoryGraph::new();
        let a = graph.add_vertex("person", None, &[]).unwrap();
        let ghost = Vertex::new(99, "person");
        let result = graph.add_edge("knows", &a, &ghost, None, &[]);
        assert!(matches!(result, Err(GraphError::InvalidEdge { .. })));
    }

    #[test]
    fn test_rollback_undoes_mutations() {
        let graph = MemoryGraph::transactional();
        let rollbacks = Arc::new(AtomicUsize::new(0));
        let counter = rollbacks.clone();
        graph.add_transaction_listener(Arc::new(move |status| {
            if status == TransactionStatus::Rollback {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }));

        let a = graph.add_vertex("person", None, &[]).unwrap();
        graph.commit().unwrap();

        let b = graph.add_vertex("person", None, &[]).unwrap();
        graph.add_edge("knows", &a, &b, None, &[]).unwrap();
        graph
            .set_property(&Element::Vertex(a.clone()), "name", Value::from("marko"))
            .unwrap();
        assert!(graph.is_open());
        graph.rollback().unwrap();

        assert!(!graph.is_open());
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.property(&Element::Vertex(a), "name").unwrap(), None);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let graph = MemoryGraph::transactional();
        assert!(graph.commit().is_err());
        assert!(MemoryGraph::new().tx().is_none());
    }
}
