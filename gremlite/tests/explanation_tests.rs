//! Strategy-by-strategy explanations

#[path = "testutils/mod.rs"]
mod testutils;

use gremlite::process::strategy::{ReadOnlyStrategy, StrategyCategory};
use gremlite::{EngineConfig, GraphTraversalSource, Value, P, __};
use testutils::graph_fixture::GraphFixture;

#[test]
fn test_explain_standard_strategies() {
    let fixture = GraphFixture::modern();
    let traversal = fixture
        .g()
        .v(())
        .identity()
        .filter(__::has("age", P::gt(30)))
        .out_e(())
        .in_v();
    let explanation = traversal.explain().unwrap();

    assert_eq!(
        explanation.original(),
        "[GraphStep(vertex,[]), IdentityStep, TraversalFilterStep([HasStep([age.gt(30)])]), \
         VertexStep(OUT,edge), EdgeVertexStep(IN)]"
    );
    assert_eq!(explanation.snapshots().len(), 3);
    assert!(explanation
        .snapshots()
        .iter()
        .all(|s| s.category == StrategyCategory::Optimization));
    assert_eq!(
        explanation.final_traversal(),
        "[GraphStep(vertex,[]), HasStep([age.gt(30)]), VertexStep(OUT,vertex)]"
    );

    let text = explanation.to_string();
    assert!(text.starts_with("Traversal Explanation\n"));
    // names are padded to the longest one, IncidentToAdjacentStrategy
    assert!(text.contains(&format!("{:<27}[O]   ", "InlineFilterStrategy")));
    assert!(text.trim_end().ends_with("VertexStep(OUT,vertex)]"));
}

#[test]
fn test_explaining_does_not_consume_the_traversal() {
    let fixture = GraphFixture::modern();
    let mut traversal = fixture.g().v(()).identity().values("name").limit(1);
    let explanation = traversal.explain().unwrap();
    assert_eq!(
        explanation.final_traversal(),
        "[GraphStep(vertex,[]), PropertiesStep([name],value), RangeGlobalStep(0,1)]"
    );
    assert!(!traversal.is_locked());
    assert_eq!(traversal.to_list().unwrap(), vec![Value::from("marko")]);
}

#[test]
fn test_verification_shows_in_explanation() {
    let fixture = GraphFixture::modern();
    let g = fixture.g().with_strategy(ReadOnlyStrategy).unwrap();

    let explanation = g.v(()).count().explain().unwrap();
    let last = explanation.snapshots().last().unwrap();
    assert_eq!(last.strategy, "ReadOnlyStrategy");
    assert!(explanation
        .to_string()
        .contains(&format!("{:<27}[V]   ", "ReadOnlyStrategy")));

    assert!(g.add_v("person").explain().unwrap_err().is_verification());
}

#[test]
fn test_configured_width_wraps_lines() {
    let fixture = GraphFixture::modern();
    let config = EngineConfig::from_json(r#"{ "explain_width": 60 }"#).unwrap();
    let g = GraphTraversalSource::with_config(fixture.graph.clone(), &config).unwrap();
    let traversal = g.v(()).out(()).out(()).out(()).values("name");
    let text = traversal
        .explain()
        .unwrap()
        .pretty_print(config.explain_width)
        .unwrap();
    assert!(text.lines().skip(2).all(|line| line.chars().count() <= 60));
    assert!(text.lines().count() > 8);
}
