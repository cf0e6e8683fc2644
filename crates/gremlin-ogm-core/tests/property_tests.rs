//! # Property-Based Tests
//!
//! Invariants of the mapper checked with proptest.

use gremlin_ogm_core::schema::type_name;
use gremlin_ogm_core::{
    Element, FieldDescriptor, Model, ModelRegistry, OgmError, SchemaBuilder, ScriptArgs,
    ScriptLibrary, ScriptMethod, Vertex, WireValue,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use serde_json::json;
use std::io::Write;

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            SchemaBuilder::vertex("TestModel")
                .field(FieldDescriptor::integer("count"))
                .field(FieldDescriptor::text("text").db_field("body")),
        )
        .expect("register");
    registry
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Writing one instance never changes another instance of the same model.
    #[test]
    fn instances_are_isolated(a in any::<i64>(), b in any::<i64>(), c in any::<i64>()) {
        let registry = registry();
        let schema = registry.vertex("test_model").expect("schema");
        let mut first = Vertex::with_values(schema, [("count", a)]).expect("first");
        let second = Vertex::with_values(schema, [("count", b)]).expect("second");

        first.set("count", c).expect("set");
        prop_assert_eq!(second.get("count").expect("get"), Some(WireValue::Int(b)));
        prop_assert_eq!(first.get("count").expect("get"), Some(WireValue::Int(c)));
    }

    /// A saved row read back through the registry yields the written values.
    #[test]
    fn wire_round_trip(count in any::<i64>(), text in "[ -~]{0,40}", id in 1i64..1_000_000) {
        let registry = registry();
        let schema = registry.vertex("test_model").expect("schema");
        let mut vertex = Vertex::with_values(
            schema,
            [("count", WireValue::Int(count)), ("text", WireValue::Text(text.clone()))],
        )
        .expect("vertex");
        vertex.validate().expect("validate");

        let mut row = vertex.as_wire_map();
        row.insert("_id".into(), json!(id));
        row.insert("_type".into(), json!("vertex"));
        row.insert("element_type".into(), json!("test_model"));

        let back = Element::deserialize(&registry, &serde_json::Value::Object(row))
            .expect("deserialize")
            .into_vertex()
            .expect("vertex");
        prop_assert_eq!(back.get("count").expect("get"), Some(WireValue::Int(count)));
        prop_assert_eq!(back.get("text").expect("get"), Some(WireValue::Text(text)));
        prop_assert_eq!(back.vid(), vertex.vid());
    }

    /// Distinct CamelCase names map to distinct discriminators.
    #[test]
    fn discriminator_is_injective_on_camel_case(
        words in btree_set("[A-Z][a-z]{1,6}", 2..4)
    ) {
        let names: Vec<String> = words.into_iter().collect();
        let joined = names.concat();
        let derived = type_name(&joined, None);

        prop_assert_eq!(derived.clone(), names.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("_"));
        prop_assert_eq!(type_name(&derived, None), derived);
    }

    /// Any two fields sharing a wire name make the schema invalid.
    #[test]
    fn shared_wire_name_is_rejected(wire in "[a-z][a-z_]{0,10}", extra in vec("[a-z]{3,8}", 0..4)) {
        prop_assume!(wire != "vid" && wire != "element_type");
        let mut builder = SchemaBuilder::vertex("Clash")
            .field(FieldDescriptor::text("first_field").db_field(wire.clone()));
        for (i, name) in extra.iter().enumerate() {
            builder = builder.field(FieldDescriptor::integer(format!("{name}_{i}")).db_field(format!("x_{name}_{i}")));
        }
        builder = builder.field(FieldDescriptor::text("second_field").db_field(wire));
        prop_assert!(matches!(builder.build(), Err(OgmError::SchemaDefinition(_))));
    }

    /// More arguments than parameters is always an arity error.
    #[test]
    fn excess_arguments_fail(params in 0usize..5, extra in 1usize..4) {
        let names: Vec<String> = (0..params).map(|i| format!("p{i}")).collect();
        let source = format!("def f({}) {{\n  1\n}}\n", names.join(", "));
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(source.as_bytes()).expect("write");

        let mut library = ScriptLibrary::new();
        let bound = library
            .bind(None, &ScriptMethod::new("f").static_method(true).path(file.path()))
            .expect("bind");

        let mut args = ScriptArgs::new();
        for i in 0..params + extra {
            args = args.arg(i as i64);
        }
        let is_arity = matches!(
            bound.prepare(None, args),
            Err(OgmError::Arity { expected, given, .. }) if expected == params && given == params + extra
        );
        prop_assert!(is_arity);
    }
}
