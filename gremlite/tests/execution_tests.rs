//! Traversal evaluation over the modern sample graph

#[path = "testutils/mod.rs"]
mod testutils;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gremlite::process::{Operator, Order};
use gremlite::{Value, P, T, __};
use testutils::graph_fixture::{strings, GraphFixture};

#[test]
fn test_vertex_scans_follow_id_order() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(()).values("name"),
        strings(&["marko", "vadas", "lop", "josh", "ripple", "peter"]),
    );
    fixture.assert_values(g.v([4, 1]).values("name"), strings(&["josh", "marko"]));
    fixture.assert_values(g.v(()).count(), vec![Value::from(6)]);
    fixture.assert_values(g.e(()).count(), vec![Value::from(6)]);
}

#[test]
fn test_adjacency() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(g.v(1).out("knows").values("name"), strings(&["vadas", "josh"]));
    fixture.assert_values(
        g.v(3).in_("created").values("name"),
        strings(&["marko", "josh", "peter"]),
    );
    fixture.assert_values(
        g.v(4).both(()).values("name"),
        strings(&["ripple", "lop", "marko"]),
    );
    fixture.assert_values(
        g.v(1).out_e("created").values("weight"),
        vec![Value::from(0.4)],
    );
    fixture.assert_values(
        g.v(1).out_e("knows").in_v().values("name"),
        strings(&["vadas", "josh"]),
    );
}

#[test]
fn test_filters() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(()).has("age", P::gt(30)).values("name"),
        strings(&["josh", "peter"]),
    );
    fixture.assert_values(
        g.v(()).has("age", P::between(27, 32)).values("name"),
        strings(&["marko", "vadas"]),
    );
    fixture.assert_values(
        g.v(()).has_label("software").values("name"),
        strings(&["lop", "ripple"]),
    );
    fixture.assert_values(
        g.v(()).has_not("age").values("name"),
        strings(&["lop", "ripple"]),
    );
    fixture.assert_values(
        g.v(()).has("name", P::within(["vadas", "peter", "nobody"])).id(),
        vec![Value::from(2), Value::from(6)],
    );
    fixture.assert_values(
        g.v(()).or(vec![__::has("name", "marko"), __::has("lang", "java")]).values("name"),
        strings(&["marko", "lop", "ripple"]),
    );
    fixture.assert_values(
        g.v(()).not(__::out(())).values("name"),
        strings(&["vadas", "lop", "ripple"]),
    );
    fixture.assert_values(
        g.v(()).values("age").is(P::lt(29)),
        vec![Value::from(27)],
    );
}

#[test]
fn test_reducing_steps() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(()).has_label("person").values("age").mean(),
        vec![Value::from(30.75)],
    );
    fixture.assert_values(
        g.v(()).has_label("person").values("age").sum(),
        vec![Value::from(123)],
    );
    fixture.assert_values(g.v(()).out(()).count(), vec![Value::from(6)]);
    fixture.assert_values(g.v(()).out(()).dedup().count(), vec![Value::from(4)]);
    fixture.assert_values(
        g.v(()).has("name", "nobody").values("age").mean(),
        Vec::new(),
    );
    fixture.assert_values(
        g.v(()).has("name", "nobody").values("age").sum(),
        vec![Value::from(0)],
    );
    fixture.assert_values(
        g.v(1).out(()).values("name").fold(),
        vec![Value::List(strings(&["vadas", "josh", "lop"]))],
    );
}

#[test]
fn test_group_count_keeps_first_seen_order() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(()).group_count().by(T::Label),
        vec![Value::Map(vec![
            (Value::from("person"), Value::from(4)),
            (Value::from("software"), Value::from(2)),
        ])],
    );
    // lop and ripple have no age and are skipped
    fixture.assert_values(
        g.v(()).group_count().by("age").unfold().count(),
        vec![Value::from(4)],
    );
}

#[test]
fn test_ordering_and_ranges() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    let ages = || g.v(()).values("age");
    fixture.assert_values(
        ages().order(),
        vec![27, 29, 32, 35].into_iter().map(Value::from).collect(),
    );
    fixture.assert_values(
        g.v(()).has_label("person").order().by_order("age", Order::Decr).values("name"),
        strings(&["peter", "josh", "marko", "vadas"]),
    );
    fixture.assert_values(ages().order().limit(2), vec![Value::from(27), Value::from(29)]);
    fixture.assert_values(ages().order().range(1, 3), vec![Value::from(29), Value::from(32)]);
    fixture.assert_values(ages().order().tail(1), vec![Value::from(35)]);

    let mut shuffled = ages().order().by_order((), Order::Shuffle);
    assert_eq!(shuffled.to_list().unwrap().len(), 4);
}

#[test]
fn test_repeat() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(1).repeat(__::out(())).times(2).values("name"),
        strings(&["ripple", "lop"]),
    );
    fixture.assert_values(
        g.v(1)
            .repeat(__::out(()))
            .until(__::has_label("software"))
            .values("name"),
        strings(&["lop", "ripple", "lop"]),
    );
    fixture.assert_values(
        g.v(1).repeat(__::out(())).times(2).emit().values("name"),
        strings(&["vadas", "josh", "lop", "ripple", "lop"]),
    );
}

#[test]
fn test_branching() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(4).union(vec![__::in_(()), __::out(())]).values("name"),
        strings(&["marko", "ripple", "lop"]),
    );
    fixture.assert_values(
        g.v(())
            .has_label("person")
            .choose(
                __::has("age", P::gt(30)),
                __::constant("old"),
                __::constant("young"),
            ),
        strings(&["young", "young", "old", "old"]),
    );
}

#[test]
fn test_labels_and_paths() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    fixture.assert_values(
        g.v(1).as_("a").out("created").select("a").values("name"),
        strings(&["marko"]),
    );
    fixture.assert_values(
        g.v(1)
            .values("name")
            .as_("a")
            .constant("x")
            .as_("b")
            .select(["a", "b"]),
        vec![Value::Map(vec![
            (Value::from("a"), Value::from("marko")),
            (Value::from("b"), Value::from("x")),
        ])],
    );

    let mut paths = g.v(1).out("created").values("name").path();
    let paths = paths.to_list().unwrap();
    assert_eq!(paths.len(), 1);
    match &paths[0] {
        Value::Path(path) => {
            assert_eq!(path.objects().len(), 3);
            assert_eq!(path.objects()[2], Value::from("lop"));
        }
        other => panic!("expected a path, got {}", other),
    }
}

#[test]
fn test_side_effects() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    let mut collected = g.v(()).has_label("person").aggregate("x").cap("x");
    let collected = collected.to_list().unwrap();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].as_list().map(Vec::len), Some(4));

    fixture.assert_values(
        g.v(1).out(()).store("x").values("name").cap("x").unfold().count(),
        vec![Value::from(3)],
    );
    fixture.assert_values(g.v(()).cap("missing"), vec![Value::List(Vec::new())]);
}

#[test]
fn test_sacks() {
    let fixture = GraphFixture::modern();
    let g = fixture.g().with_sack(1.0);
    fixture.assert_values(
        g.v(1).out_e("knows").sack_op(Operator::Mult).by("weight").sack(),
        vec![Value::from(0.5), Value::from(1.0)],
    );
    fixture.assert_values(g.v(2).sack(), vec![Value::from(1.0)]);

    let mut unconfigured = fixture.g().v(1).sack();
    assert!(unconfigured.to_list().is_err());
}

#[test]
fn test_bulk_is_unrolled_by_next() {
    let fixture = GraphFixture::modern();
    let mut traversal = fixture.g().inject([1, 1, 1, 2]).barrier();
    let first = traversal.next_traverser().unwrap().unwrap();
    assert_eq!(first.bulk(), 3);
    assert_eq!(*first.get(), Value::from(1));

    let mut counted = fixture.g().inject([1, 1, 1, 2]).barrier().count();
    assert_eq!(counted.to_list().unwrap(), vec![Value::from(4)]);
}

#[test]
fn test_evaluation_is_lazy() {
    let fixture = GraphFixture::modern();
    let visited = Arc::new(AtomicUsize::new(0));
    let counter = visited.clone();
    let mut traversal = fixture
        .bare()
        .v(())
        .side_effect_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .limit(2);

    assert!(traversal.next().unwrap().is_some());
    assert_eq!(visited.load(Ordering::SeqCst), 1);
    assert!(traversal.next().unwrap().is_some());
    assert!(traversal.next().unwrap().is_none());
    assert_eq!(visited.load(Ordering::SeqCst), 2);
}

#[test]
fn test_mutations() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    g.add_v("person")
        .property("name", "stephen")
        .property("age", 40)
        .iterate()
        .unwrap();
    fixture.assert_values(g.v(()).count(), vec![Value::from(7)]);
    fixture.assert_values(
        g.v(()).has("name", "stephen").values("age"),
        vec![Value::from(40)],
    );

    g.v(1)
        .as_("a")
        .v(6)
        .add_e("knows")
        .from_label("a")
        .property("weight", 0.1)
        .iterate()
        .unwrap();
    fixture.assert_values(
        g.v(1).out("knows").values("name"),
        strings(&["vadas", "josh", "peter"]),
    );

    g.v(2).property("age", 28).iterate().unwrap();
    fixture.assert_values(g.v(2).values("age"), vec![Value::from(28)]);
}

#[test]
fn test_errors_surface_on_iteration() {
    let fixture = GraphFixture::modern();
    let g = fixture.g();
    let mut not_a_vertex = g.inject(["marko"]).out(());
    assert!(not_a_vertex.to_list().is_err());
    // a failed traversal stays exhausted
    assert_eq!(not_a_vertex.next().unwrap(), None);

    let mut misuse = g.v(()).times(2);
    assert!(misuse.error().is_some());
    assert!(misuse.to_list().is_err());
}
