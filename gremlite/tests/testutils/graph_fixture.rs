//! Shared fixture for traversals over the modern sample graph

use std::sync::Arc;

use gremlite::process::MutationListener;
use gremlite::structure::{DetachedEdge, DetachedVertex};
use gremlite::{GraphTraversalSource, MemoryGraph, Traversal, TraversalStrategies, Value};
use parking_lot::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct GraphFixture {
    pub graph: Arc<MemoryGraph>,
}

impl GraphFixture {
    pub fn modern() -> Self {
        init_logging();
        Self {
            graph: Arc::new(MemoryGraph::modern()),
        }
    }

    pub fn transactional() -> Self {
        init_logging();
        Self {
            graph: Arc::new(MemoryGraph::transactional()),
        }
    }

    /// Source with the standard strategies
    pub fn g(&self) -> GraphTraversalSource {
        GraphTraversalSource::new(self.graph.clone())
    }

    /// Source without any strategy
    pub fn bare(&self) -> GraphTraversalSource {
        self.g().with_strategies(TraversalStrategies::new())
    }

    pub fn assert_values(&self, mut traversal: Traversal, expected: Vec<Value>) {
        let rendering = traversal.to_string();
        let actual = traversal
            .to_list()
            .unwrap_or_else(|e| panic!("Traversal {} failed: {}", rendering, e));
        assert_eq!(actual, expected, "unexpected results for {}", rendering);
    }

    /// Like `assert_values` but ignoring order
    pub fn assert_unordered(&self, mut traversal: Traversal, expected: Vec<Value>) {
        let rendering = traversal.to_string();
        let mut actual = traversal
            .to_list()
            .unwrap_or_else(|e| panic!("Traversal {} failed: {}", rendering, e));
        let mut expected = expected;
        actual.sort_by(|a, b| a.total_cmp(b));
        expected.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(actual, expected, "unexpected results for {}", rendering);
    }
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

#[derive(Default)]
pub struct RecordingListener {
    pub seen: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl MutationListener for RecordingListener {
    fn vertex_added(&self, vertex: &DetachedVertex) {
        self.seen.lock().push(format!("addV:{}", vertex.label));
    }

    fn edge_added(&self, edge: &DetachedEdge) {
        self.seen.lock().push(format!("addE:{}", edge.label));
    }

    fn vertex_property_changed(
        &self,
        _vertex: &DetachedVertex,
        key: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) {
        let old = old_value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
        self.seen
            .lock()
            .push(format!("property:{}:{}->{}", key, old, new_value));
    }

    fn edge_property_changed(
        &self,
        _edge: &DetachedEdge,
        key: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) {
        let old = old_value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
        self.seen
            .lock()
            .push(format!("edgeProperty:{}:{}->{}", key, old, new_value));
    }
}
