//! Mutation listeners driven by the event strategy

#[path = "testutils/mod.rs"]
mod testutils;

use std::sync::Arc;
use std::thread;

use gremlite::process::strategy::EventStrategy;
use gremlite::process::TransactionalEventQueue;
use gremlite::structure::Transaction;
use gremlite::{MemoryGraph, TraversalError, Value, __};
use testutils::graph_fixture::{GraphFixture, RecordingListener};

#[test]
fn test_listeners_receive_every_mutation_in_order() {
    let fixture = GraphFixture::modern();
    let first = RecordingListener::new();
    let second = RecordingListener::new();
    let strategy = EventStrategy::builder()
        .add_listener(first.clone())
        .add_listener(second.clone())
        .create();
    let g = fixture.g().with_strategy(strategy).unwrap();

    g.add_v("person").property("name", "stephen").iterate().unwrap();
    g.v(1).add_e("knows").to(__::v(6)).iterate().unwrap();
    g.v(1).property("nickname", "okram").iterate().unwrap();
    g.e(7).property("weight", 0.9).iterate().unwrap();

    let expected = vec![
        "addV:person".to_string(),
        "addE:knows".to_string(),
        "property:nickname:none->okram".to_string(),
        "edgeProperty:weight:0.5->0.9".to_string(),
    ];
    assert_eq!(first.seen(), expected);
    assert_eq!(second.seen(), expected);
}

#[test]
fn test_reads_raise_no_events() {
    let fixture = GraphFixture::modern();
    let listener = RecordingListener::new();
    let g = fixture
        .g()
        .with_strategy(EventStrategy::builder().add_listener(listener.clone()).create())
        .unwrap();
    fixture.assert_values(g.v(()).count(), vec![Value::from(6)]);
    assert!(listener.seen().is_empty());
}

#[test]
fn test_transactional_queue_follows_commit_and_rollback() {
    let fixture = GraphFixture::transactional();
    let listener = RecordingListener::new();
    let queue = TransactionalEventQueue::new(fixture.graph.as_ref()).unwrap();
    let strategy = EventStrategy::builder()
        .add_listener(listener.clone())
        .event_queue(queue.clone())
        .create();
    let g = fixture.g().with_strategy(strategy).unwrap();
    let me = thread::current().id();

    g.add_v("person").iterate().unwrap();
    assert!(listener.seen().is_empty());
    assert_eq!(queue.pending(me), 1);

    fixture.graph.commit().unwrap();
    assert_eq!(listener.seen(), vec!["addV:person".to_string()]);
    assert_eq!(queue.pending(me), 0);

    g.add_v("software").iterate().unwrap();
    assert_eq!(queue.pending(me), 1);
    fixture.graph.rollback().unwrap();
    assert_eq!(queue.pending(me), 0);
    assert_eq!(listener.seen().len(), 1);
    assert_eq!(fixture.graph.vertex_count(), 1);
}

#[test]
fn test_transactional_queue_needs_transactions() {
    let graph = Arc::new(MemoryGraph::modern());
    let error = TransactionalEventQueue::new(graph.as_ref()).unwrap_err();
    assert!(matches!(error, TraversalError::Configuration(_)));
}
