//! Bytecode encoding, transport and evaluation

#[path = "testutils/mod.rs"]
mod testutils;

use gremlite::process::{Argument, Operator, Order};
use gremlite::{Bytecode, Traversal, TraversalError, Value, P, T, __};
use testutils::graph_fixture::{strings, GraphFixture};

fn replay(fixture: &GraphFixture, traversal: Traversal) {
    let bytecode = traversal.to_bytecode().unwrap();
    let json = bytecode.to_json().unwrap();
    let decoded = Bytecode::from_json(&json).unwrap();
    assert_eq!(decoded, bytecode);

    let mut original = fixture.g().bind(traversal);
    let mut rebuilt = fixture.g().traversal_from_bytecode(&decoded).unwrap();
    assert_eq!(
        original.to_list().unwrap(),
        rebuilt.to_list().unwrap(),
        "bytecode {} evaluated differently",
        bytecode
    );
}

#[test]
fn test_decoded_traversals_evaluate_alike() {
    let fixture = GraphFixture::modern();
    replay(&fixture, __::v(()).has("age", P::gt(28)).values("name"));
    replay(&fixture, __::v(1).out("knows").has_t(T::Label, "person").id());
    replay(
        &fixture,
        __::v(())
            .has_label("person")
            .order()
            .by_order("age", Order::Decr)
            .values("name")
            .range(1, 3),
    );
    replay(&fixture, __::v(()).group_count().by(T::Label));
    replay(
        &fixture,
        __::v(1)
            .repeat(__::out(()))
            .until(__::has_label("software"))
            .values("name"),
    );
    replay(
        &fixture,
        __::v(())
            .choose(__::has_label("person"), __::values("age"), __::constant(0))
            .sum(),
    );
    replay(
        &fixture,
        __::v(1).as_("a").out("created").in_("created").as_("b").select(["a", "b"]),
    );
}

#[test]
fn test_hand_written_json() {
    let fixture = GraphFixture::modern();
    let json = r#"{
        "steps": [
            { "operator": "V" },
            {
                "operator": "has",
                "arguments": [
                    { "type": "value", "value": { "String": "age" } },
                    {
                        "type": "predicate",
                        "value": { "Compare": { "op": "Gt", "value": { "Integer": 30 } } }
                    }
                ]
            },
            { "operator": "values", "arguments": [{ "type": "value", "value": { "String": "name" } }] }
        ]
    }"#;
    let bytecode = Bytecode::from_json(json).unwrap();
    assert_eq!(
        bytecode.to_string(),
        "[[], [V(), has(age, gt(30)), values(name)]]"
    );
    fixture.assert_values(
        fixture.g().traversal_from_bytecode(&bytecode).unwrap(),
        strings(&["josh", "peter"]),
    );
}

#[test]
fn test_source_configuration_travels_with_bytecode() {
    let fixture = GraphFixture::modern();
    let traversal = fixture
        .g()
        .with_sack(1.0)
        .v(1)
        .out_e("knows")
        .sack_op(Operator::Mult)
        .by("weight")
        .sack();
    let bytecode = traversal.to_bytecode().unwrap();
    assert_eq!(bytecode.source.len(), 1);
    assert_eq!(bytecode.source[0].operator, "withSack");
    assert_eq!(bytecode.source[0].arguments, vec![Argument::Value(Value::from(1.0))]);

    fixture.assert_values(
        fixture.g().traversal_from_bytecode(&bytecode).unwrap(),
        vec![Value::from(0.5), Value::from(1.0)],
    );
    assert!(Traversal::from_bytecode(&bytecode).is_err());
}

#[test]
fn test_malformed_bytecode() {
    let fixture = GraphFixture::modern();
    assert!(matches!(
        Bytecode::from_json("{ \"steps\": 3 }"),
        Err(TraversalError::Bytecode(_))
    ));

    let mut bytecode = Bytecode::new();
    bytecode.add_step("V", vec![]);
    bytecode.add_step("times", vec![Argument::Value(Value::from(2))]);
    assert!(fixture.g().traversal_from_bytecode(&bytecode).is_err());

    let lambda = __::v(()).filter_fn(|_| true).to_bytecode();
    assert!(matches!(lambda, Err(TraversalError::Bytecode(_))));
}
