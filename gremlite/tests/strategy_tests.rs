//! Strategy application through traversal sources

#[path = "testutils/mod.rs"]
mod testutils;

use std::any::Any;

use gremlite::process::strategy::{
    ElementIdStrategy, IdentityRemovalStrategy, LambdaRestrictionStrategy, ReadOnlyStrategy,
    StrategyCategory,
};
use gremlite::process::{HasContainer, Step, StepKind};
use gremlite::{
    GraphTraversalSource, Traversal, TraversalError, TraversalResult, TraversalStrategies,
    TraversalStrategy, Value, P, T, __,
};
use testutils::graph_fixture::{strings, GraphFixture};

/// Restricts every vertex scan to people
#[derive(Debug, Default)]
struct PeopleOnly;

impl TraversalStrategy for PeopleOnly {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Decoration
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        traversal.apply_recursively(&mut |t| {
            let scans: Vec<usize> = t
                .steps()
                .iter()
                .enumerate()
                .filter(|(_, step)| matches!(step.kind, StepKind::Graph { .. }))
                .map(|(i, _)| i)
                .collect();
            for i in scans.into_iter().rev() {
                let label = HasContainer::new(T::Label.accessor(), P::eq("person"));
                t.insert_step(i + 1, Step::new(StepKind::Has(vec![label])));
            }
            Ok(())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn assert_same_results(fixture: &GraphFixture, build: impl Fn(&GraphTraversalSource) -> Traversal) {
    let mut optimized = build(&fixture.g());
    let mut plain = build(&fixture.bare());
    assert_eq!(
        optimized.to_list().unwrap(),
        plain.to_list().unwrap(),
        "optimizing changed the results of {}",
        plain
    );
}

#[test]
fn test_optimizations_preserve_results() {
    let fixture = GraphFixture::modern();
    assert_same_results(&fixture, |g| g.v(()).identity().out(()).identity().values("name"));
    assert_same_results(&fixture, |g| g.v(()).out_e(()).in_v().values("name"));
    assert_same_results(&fixture, |g| g.v(()).filter(__::has("age", P::gt(30))).values("name"));
    assert_same_results(&fixture, |g| {
        g.v(())
            .and(vec![__::has_label("person"), __::has("age", P::lt(30))])
            .values("name")
    });
    assert_same_results(&fixture, |g| {
        g.v(()).or(vec![__::has("name", "josh"), __::has("name", "lop")]).id()
    });
    assert_same_results(&fixture, |g| {
        g.v(()).out_e(()).has_label("created").in_v().dedup().values("name")
    });
    assert_same_results(&fixture, |g| {
        g.v(()).union(vec![__::in_e(()).out_v(), __::identity()]).count()
    });
}

#[test]
fn test_inlined_filters_preserve_results() {
    let fixture = GraphFixture::modern();
    assert_same_results(&fixture, |g| {
        g.v(())
            .filter(__::has("age", P::gt(10)).as_("b"))
            .as_("a")
            .select("a")
            .values("name")
    });
    assert_same_results(&fixture, |g| {
        g.v(())
            .or(vec![
                __::has("age", 27),
                __::and(vec![__::has("age", P::gt(30)), __::has("age", P::lt(35))]),
            ])
            .values("name")
    });
    assert_same_results(&fixture, |g| {
        g.v(())
            .out_e(())
            .or(vec![
                __::has_label("knows").as_("a"),
                __::has_label("created").as_("b"),
            ])
            .as_("c")
            .in_v()
            .select("c")
            .id()
    });

    let mut merged = fixture.g().v(()).or(vec![
        __::has("age", 27),
        __::and(vec![__::has("age", P::gt(30)), __::has("age", P::lt(35))]),
    ]);
    merged.apply_strategies().unwrap();
    assert_eq!(
        merged.to_string(),
        "[GraphStep(vertex,[]), HasStep([age.or(eq(27), and(gt(30), lt(35)))])]"
    );
    assert_eq!(merged.to_list().unwrap().len(), 2);
}

#[test]
fn test_rewrites_are_visible_after_application() {
    let fixture = GraphFixture::modern();
    let mut traversal = fixture.g().v(()).identity().out_e(()).in_v();
    traversal.apply_strategies().unwrap();
    assert!(traversal.is_locked());
    assert_eq!(
        traversal.to_string(),
        "[GraphStep(vertex,[]), VertexStep(OUT,vertex)]"
    );

    // edges stay observable when the path is requested
    let mut traversal = fixture.g().v(()).out_e(()).in_v().path();
    traversal.apply_strategies().unwrap();
    assert!(traversal.to_string().contains("EdgeVertexStep(IN)"));
}

#[test]
fn test_user_decoration() {
    let fixture = GraphFixture::modern();
    let g = fixture.g().with_strategy(PeopleOnly).unwrap();
    assert_eq!(
        g.strategies().iter().next().map(|s| s.name()),
        Some("PeopleOnly")
    );
    fixture.assert_values(g.v(()).count(), vec![Value::from(4)]);
    fixture.assert_values(
        g.v(()).union(vec![__::v(3).values("name"), __::constant("x")]).count(),
        vec![Value::from(4)],
    );
    fixture.assert_values(
        g.v(()).has("age", P::gt(30)).values("name"),
        strings(&["josh", "peter"]),
    );
}

#[test]
fn test_verification_strategies() {
    let fixture = GraphFixture::modern();
    let read_only = fixture.g().with_strategy(ReadOnlyStrategy).unwrap();
    let error = read_only.add_v("person").iterate().unwrap_err();
    assert!(error.is_verification());
    assert_eq!(fixture.graph.vertex_count(), 6);
    fixture.assert_values(read_only.v(1).values("name"), strings(&["marko"]));

    let no_lambdas = fixture.g().with_strategy(LambdaRestrictionStrategy).unwrap();
    let mut traversal = no_lambdas.v(()).map_fn(|t| t.get().clone());
    assert!(matches!(
        traversal.to_list(),
        Err(TraversalError::Verification(_))
    ));
    fixture.assert_values(no_lambdas.v(()).count(), vec![Value::from(6)]);
}

#[test]
fn test_removing_strategies() {
    let fixture = GraphFixture::modern();
    let g = fixture.g().without_strategy::<IdentityRemovalStrategy>();
    assert_eq!(g.strategies().len(), 2);
    let mut traversal = g.v(()).identity();
    traversal.apply_strategies().unwrap();
    assert_eq!(traversal.to_string(), "[GraphStep(vertex,[]), IdentityStep]");

    let mut strategies = TraversalStrategies::standard();
    assert!(strategies.remove::<IdentityRemovalStrategy>());
    assert!(!strategies.remove::<IdentityRemovalStrategy>());
}

#[test]
fn test_element_ids_in_properties() {
    let fixture = GraphFixture::modern();
    let strategy = ElementIdStrategy::builder().id_property_key("uid").create();
    let g = fixture.g().with_strategy(strategy).unwrap();

    g.add_v("person").property(T::Id, "stephen-1").iterate().unwrap();
    fixture.assert_values(g.v("stephen-1").label(), strings(&["person"]));
    fixture.assert_values(g.v(()).has_id("stephen-1").id(), strings(&["stephen-1"]));

    g.add_v("person").iterate().unwrap();
    let mut ids = fixture.bare().v(()).values("uid");
    let ids = ids.to_list().unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.as_str().is_some()));
    assert_ne!(ids[0], ids[1]);
}
