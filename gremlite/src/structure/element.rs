// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph elements
//!
//! Vertices and edges travel through a traversal as lightweight references
//! (id + label). Properties live in the backing [`Graph`](super::Graph) and are
//! fetched on demand. Mutation events carry detached snapshots instead, which
//! hold a full copy of the properties and no reference to any backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;

/// Identifier of a vertex or an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementId {
    Integer(i64),
    String(String),
}

impl ElementId {
    /// Convert a value into an element id, if it has a usable shape
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(ElementId::Integer(*i)),
            Value::String(s) => Some(ElementId::String(s.clone())),
            Value::Vertex(v) => Some(v.id.clone()),
            Value::Edge(e) => Some(e.id.clone()),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ElementId::Integer(i) => Value::Integer(*i),
            ElementId::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Integer(i) => write!(f, "{}", i),
            ElementId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ElementId {
    fn from(id: i64) -> Self {
        ElementId::Integer(id)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        ElementId::String(id.to_string())
    }
}

/// Edge direction relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
    Both,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
            Direction::Both => Direction::Both,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "OUT"),
            Direction::In => write!(f, "IN"),
            Direction::Both => write!(f, "BOTH"),
        }
    }
}

/// Reserved element accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum T {
    Id,
    Label,
}

impl T {
    /// Key under which the token appears in has-containers and parameters
    pub fn accessor(&self) -> &'static str {
        match self {
            T::Id => "~id",
            T::Label => "~label",
        }
    }

    pub fn from_accessor(key: &str) -> Option<T> {
        match key {
            "~id" => Some(T::Id),
            "~label" => Some(T::Label),
            _ => None,
        }
    }
}

impl fmt::Display for T {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            T::Id => write!(f, "id"),
            T::Label => write!(f, "label"),
        }
    }
}

/// Vertex reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
}

impl Vertex {
    pub fn new(id: impl Into<ElementId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v[{}]", self.id)
    }
}

/// Edge reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: ElementId,
    pub label: String,
    pub out_v: Vertex,
    pub in_v: Vertex,
}

impl Edge {
    pub fn new(id: impl Into<ElementId>, label: impl Into<String>, out_v: Vertex, in_v: Vertex) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            out_v,
            in_v,
        }
    }

    /// The vertex at the given end of the edge; `Both` is not a single end
    pub fn vertex(&self, direction: Direction) -> Option<&Vertex> {
        match direction {
            Direction::Out => Some(&self.out_v),
            Direction::In => Some(&self.in_v),
            Direction::Both => None,
        }
    }

    /// The end that is not `vertex`
    pub fn other_vertex(&self, vertex: &Vertex) -> &Vertex {
        if self.out_v.id == vertex.id {
            &self.in_v
        } else {
            &self.out_v
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e[{}][{}-{}->{}]",
            self.id, self.out_v.id, self.label, self.in_v.id
        )
    }
}

/// Either kind of element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
}

impl Element {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vertex(v) => Some(Element::Vertex(v.clone())),
            Value::Edge(e) => Some(Element::Edge(e.clone())),
            _ => None,
        }
    }

    pub fn id(&self) -> &ElementId {
        match self {
            Element::Vertex(v) => &v.id,
            Element::Edge(e) => &e.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Element::Vertex(v) => &v.label,
            Element::Edge(e) => &e.label,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Element::Vertex(v) => Value::Vertex(v),
            Element::Edge(e) => Value::Edge(e),
        }
    }
}

/// Snapshot of a vertex, independent of any graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedVertex {
    pub id: ElementId,
    pub label: String,
    pub properties: BTreeMap<String, Value>,
}

/// Snapshot of an edge, independent of any graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedEdge {
    pub id: ElementId,
    pub label: String,
    pub out_v: Vertex,
    pub in_v: Vertex,
    pub properties: BTreeMap<String, Value>,
}

/// Snapshot of either kind of element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetachedElement {
    Vertex(DetachedVertex),
    Edge(DetachedEdge),
}

impl DetachedElement {
    pub fn id(&self) -> &ElementId {
        match self {
            DetachedElement::Vertex(v) => &v.id,
            DetachedElement::Edge(e) => &e.id,
        }
    }
}
