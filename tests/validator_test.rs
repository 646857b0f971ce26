// Validator tests: the per-node-kind semantics table, struct/union/dispatch
// rules, version gating, and the end-to-end scenarios from the schema
// pipeline's acceptance list.

use mcdoc_core::ast::ModulePath;
use mcdoc_core::error::{Diagnostic, DiagnosticKind};
use mcdoc_core::{compile, Compiled, JsonValue, Start, Version};
use serde_json::json;

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn schema(source: &str) -> Compiled {
    let compiled = compile([(ModulePath::relative(["test"]), source.to_string())]);
    assert!(
        compiled.diagnostics.is_empty(),
        "fixture schema failed to compile: {:#?}",
        compiled.diagnostics
    );
    compiled
}

fn check_type(compiled: &Compiled, ty: &str, json: serde_json::Value, version: &str) -> Vec<Diagnostic> {
    compiled.validate(
        &Start::Type(format!("test::{ty}")),
        &JsonValue::from(json),
        v(version),
    )
}

fn kinds(findings: &[Diagnostic]) -> Vec<DiagnosticKind> {
    findings.iter().map(|d| d.kind).collect()
}

// === Primitives and literals ===

#[test]
fn test_primitive_string() {
    let compiled = schema("type T = string");
    assert!(check_type(&compiled, "T", json!("hello"), "1.20").is_empty());
    let findings = check_type(&compiled, "T", json!(5), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::TypeMismatch]);
    assert!(findings[0].message.contains("expected string"));
}

#[test]
fn test_primitive_int_accepts_integral_float() {
    let compiled = schema("type T = int");
    assert!(check_type(&compiled, "T", json!(42), "1.20").is_empty());
    assert!(check_type(&compiled, "T", json!(42.0), "1.20").is_empty());
    let findings = check_type(&compiled, "T", json!(42.5), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn test_primitive_float_accepts_int() {
    let compiled = schema("type T = float");
    assert!(check_type(&compiled, "T", json!(3), "1.20").is_empty());
    assert!(check_type(&compiled, "T", json!(3.5), "1.20").is_empty());
    assert!(!check_type(&compiled, "T", json!("3.5"), "1.20").is_empty());
}

#[test]
fn test_primitive_boolean_and_any() {
    let compiled = schema("type B = boolean\ntype A = any");
    assert!(check_type(&compiled, "B", json!(true), "1.20").is_empty());
    assert!(!check_type(&compiled, "B", json!(0), "1.20").is_empty());
    for value in [json!(null), json!(1), json!("x"), json!([1]), json!({"a": 1})] {
        assert!(check_type(&compiled, "A", value, "1.20").is_empty());
    }
}

#[test]
fn test_literal_types() {
    let compiled = schema(r#"type T = "flat""#);
    assert!(check_type(&compiled, "T", json!("flat"), "1.20").is_empty());
    let findings = check_type(&compiled, "T", json!("noise"), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::TypeMismatch]);
}

// === Ranges ===

#[test]
fn test_int_range_inclusive() {
    let compiled = schema("type T = int @ 0..10");
    assert!(check_type(&compiled, "T", json!(0), "1.20").is_empty());
    assert!(check_type(&compiled, "T", json!(10), "1.20").is_empty());
    assert_eq!(
        kinds(&check_type(&compiled, "T", json!(11), "1.20")),
        vec![DiagnosticKind::OutOfRange]
    );
    assert_eq!(
        kinds(&check_type(&compiled, "T", json!(-1), "1.20")),
        vec![DiagnosticKind::OutOfRange]
    );
}

#[test]
fn test_exclusive_range_markers() {
    let compiled = schema("type L = float @ 0<..1\ntype R = float @ 0..<1");
    assert!(!check_type(&compiled, "L", json!(0), "1.20").is_empty());
    assert!(check_type(&compiled, "L", json!(1), "1.20").is_empty());
    assert!(check_type(&compiled, "R", json!(0), "1.20").is_empty());
    assert!(!check_type(&compiled, "R", json!(1), "1.20").is_empty());
}

#[test]
fn test_string_constraint_is_length() {
    let compiled = schema("type T = string @ 2..4");
    assert!(check_type(&compiled, "T", json!("ab"), "1.20").is_empty());
    assert!(check_type(&compiled, "T", json!("abcd"), "1.20").is_empty());
    assert_eq!(
        kinds(&check_type(&compiled, "T", json!("a"), "1.20")),
        vec![DiagnosticKind::LengthOutOfRange]
    );
    assert_eq!(
        kinds(&check_type(&compiled, "T", json!("abcde"), "1.20")),
        vec![DiagnosticKind::LengthOutOfRange]
    );
}

#[test]
fn test_array_length_range() {
    let compiled = schema("type T = [int] @ 2");
    assert!(check_type(&compiled, "T", json!([1, 2]), "1.20").is_empty());
    assert_eq!(
        kinds(&check_type(&compiled, "T", json!([1]), "1.20")),
        vec![DiagnosticKind::LengthOutOfRange]
    );
}

#[test]
fn test_array_elements_validated_with_indices() {
    let compiled = schema("type T = [int]");
    let findings = check_type(&compiled, "T", json!([1, "two", 3.5]), "1.20");
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].json_path, "[1]");
    assert_eq!(findings[1].json_path, "[2]");
}

// === Enums ===

#[test]
fn test_enum_values_case_sensitive() {
    let compiled = schema(r#"enum(string) Category { Beach = "beach", Ocean = "ocean" }"#);
    assert!(check_type(&compiled, "Category", json!("beach"), "1.20").is_empty());
    assert_eq!(
        kinds(&check_type(&compiled, "Category", json!("Beach"), "1.20")),
        vec![DiagnosticKind::EnumValueNotAllowed]
    );
}

#[test]
fn test_int_enum() {
    let compiled = schema("enum(int) Tier { Low = 1, High = 2 }");
    assert!(check_type(&compiled, "Tier", json!(1), "1.20").is_empty());
    assert!(!check_type(&compiled, "Tier", json!(3), "1.20").is_empty());
}

// === Structs ===

#[test]
fn test_empty_struct_boundaries() {
    let compiled = schema(
        "struct Empty {}
         struct Optional { x?: int }
         struct Required { x: int }",
    );
    assert!(check_type(&compiled, "Empty", json!({}), "1.20").is_empty());
    assert!(check_type(&compiled, "Optional", json!({}), "1.20").is_empty());
    let findings = check_type(&compiled, "Required", json!({}), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::MissingRequiredField]);
    assert!(findings[0].message.contains("'x'"));
}

#[test]
fn test_unexpected_field() {
    let compiled = schema("struct S { a: int }");
    let findings = check_type(&compiled, "S", json!({"a": 1, "b": 2}), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::UnexpectedField]);
    assert_eq!(findings[0].json_path, "b");
}

#[test]
fn test_nested_struct_paths() {
    let compiled = schema(
        "struct Outer { inner: Inner }
         struct Inner { value: int }",
    );
    let findings = check_type(&compiled, "Outer", json!({"inner": {"value": "no"}}), "1.20");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].json_path, "inner.value");
}

#[test]
fn test_computed_field_matches_keys() {
    let compiled = schema(
        r#"struct Carvers { [string]: int }"#,
    );
    assert!(check_type(&compiled, "Carvers", json!({"cave": 1, "canyon": 2}), "1.20").is_empty());
    let findings = check_type(&compiled, "Carvers", json!({"cave": "deep"}), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::TypeMismatch]);
    assert_eq!(findings[0].json_path, "cave");
}

#[test]
fn test_computed_field_with_enum_key() {
    let compiled = schema(
        r#"enum(string) Slot { Head = "head", Chest = "chest" }
           struct Equipment { [Slot]: int, name: string }"#,
    );
    assert!(check_type(
        &compiled,
        "Equipment",
        json!({"head": 1, "name": "kit"}),
        "1.20"
    )
    .is_empty());
    // A key outside the enum is unexpected.
    let findings = check_type(
        &compiled,
        "Equipment",
        json!({"legs": 1, "name": "kit"}),
        "1.20",
    );
    assert_eq!(kinds(&findings), vec![DiagnosticKind::UnexpectedField]);
}

#[test]
fn test_any_key_computed_field_is_catch_all() {
    let compiled = schema("struct Loose { known: int, [any]: any }");
    assert!(check_type(
        &compiled,
        "Loose",
        json!({"known": 1, "extra": [1, 2], "more": "x"}),
        "1.20"
    )
    .is_empty());
}

#[test]
fn test_unknown_spread_suppresses_unexpected_field() {
    // `Missing` fails to resolve, so the struct's key set is unknowable.
    let sources = [(
        ModulePath::relative(["test"]),
        "struct S { a: int, ...Missing }".to_string(),
    )];
    let compiled = compile(sources);
    assert_eq!(compiled.diagnostics.len(), 1); // the unresolved reference
    let findings = compiled.validate(
        &Start::Type("test::S".to_string()),
        &JsonValue::from(json!({"a": 1, "mystery": true})),
        v("1.20"),
    );
    assert!(findings.is_empty(), "{findings:#?}");
}

// === Unions ===

#[test]
fn test_union_first_match_wins_s5() {
    let compiled = schema("type T = (int @ 0..10 | string)");
    assert!(check_type(&compiled, "T", json!(5), "1.20").is_empty());
    assert!(check_type(&compiled, "T", json!("hi"), "1.20").is_empty());

    let findings = check_type(&compiled, "T", json!(true), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::NoUnionMatch]);
    // The summary mentions both arms, first lines only.
    assert!(findings[0].message.contains("expected int"));
    assert!(findings[0].message.contains("expected string"));
}

#[test]
fn test_union_member_success_implies_union_success() {
    let compiled = schema(
        "type A = int @ 0..10
         type T = (A | string)",
    );
    let value = json!(7);
    assert!(check_type(&compiled, "A", value.clone(), "1.20").is_empty());
    assert!(check_type(&compiled, "T", value, "1.20").is_empty());
}

#[test]
fn test_union_discards_failed_attempt_diagnostics() {
    let compiled = schema("type T = (struct { a: int } | struct { b: string })");
    // Matches the second arm; the first arm's failures must not leak.
    assert!(check_type(&compiled, "T", json!({"b": "x"}), "1.20").is_empty());
}

// === Version gating ===

#[test]
fn test_version_gated_field_s3() {
    let compiled = schema(r#"struct S { #[since="1.20"] effects: int }"#);
    assert!(check_type(&compiled, "S", json!({}), "1.19.4").is_empty());
    let findings = check_type(&compiled, "S", json!({}), "1.20.1");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::MissingRequiredField]);
    assert!(findings[0].message.contains("'effects'"));
}

#[test]
fn test_gated_field_value_not_checked_when_inactive() {
    let compiled = schema(r#"struct S { #[until="1.18"] old?: int }"#);
    // At 1.19 the field is gone entirely, so its presence is unexpected.
    let findings = check_type(&compiled, "S", json!({"old": "anything"}), "1.19");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::UnexpectedField]);
}

#[test]
fn test_spread_version_overlay_s6() {
    let compiled = schema(
        r#"struct Base { a: int }
           struct Outer { #[until="1.18"] ...Base, b: int }"#,
    );
    let findings = check_type(&compiled, "Outer", json!({"a": 1, "b": 2}), "1.19");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::UnexpectedField]);
    assert_eq!(findings[0].json_path, "a");

    assert!(check_type(&compiled, "Outer", json!({"a": 1, "b": 2}), "1.17").is_empty());
}

#[test]
fn test_union_variant_filtering_by_version() {
    let compiled = schema(
        r#"type T = (#[until="1.18"] int | #[since="1.19"] string)"#,
    );
    assert!(check_type(&compiled, "T", json!(5), "1.17").is_empty());
    assert!(!check_type(&compiled, "T", json!(5), "1.19").is_empty());
    assert!(check_type(&compiled, "T", json!("x"), "1.19").is_empty());
}

#[test]
fn test_union_with_no_active_variants_validates_anything() {
    let compiled = schema(r#"type T = (#[until="1.15"] int | #[until="1.15"] string)"#);
    assert!(check_type(&compiled, "T", json!({"weird": true}), "1.20").is_empty());
}

// === Dispatchers ===

#[test]
fn test_happy_path_dispatcher_s1_s2() {
    let compiled = schema(
        "dispatch minecraft:resource[worldgen/biome] to struct Biome {
             temperature: float,
             downfall: float @ 0..1,
         }",
    );
    let start = Start::Dispatcher {
        resource: "minecraft:resource".to_string(),
        key: "worldgen/biome".to_string(),
    };

    let ok = compiled.validate(
        &start,
        &JsonValue::from(json!({"temperature": 0.8, "downfall": 0.4})),
        v("1.20.1"),
    );
    assert!(ok.is_empty(), "{ok:#?}");

    let bad = compiled.validate(
        &start,
        &JsonValue::from(json!({"temperature": 0.8, "downfall": 1.5})),
        v("1.20.1"),
    );
    assert_eq!(kinds(&bad), vec![DiagnosticKind::OutOfRange]);
    assert_eq!(bad[0].json_path, "downfall");
}

#[test]
fn test_dispatcher_spread_s4() {
    let compiled = schema(
        "struct Ref { type: string, ...minecraft:chunk_generator[[type]] }
         dispatch minecraft:chunk_generator[flat] to struct Flat { layers: [int] }",
    );

    let ok = check_type(
        &compiled,
        "Ref",
        json!({"type": "flat", "layers": [1, 2, 3]}),
        "1.20",
    );
    assert!(ok.is_empty(), "{ok:#?}");

    let unknown = check_type(&compiled, "Ref", json!({"type": "noise"}), "1.20");
    assert_eq!(kinds(&unknown), vec![DiagnosticKind::UnknownDispatchKey]);
    assert_eq!(unknown[0].json_path, "");
}

#[test]
fn test_dispatcher_field_value() {
    let compiled = schema(
        "struct Carver { config: minecraft:carver_config[[%parent.type]], type: string }
         dispatch minecraft:carver_config[cave] to struct CaveConfig { probability: float }",
    );
    let ok = check_type(
        &compiled,
        "Carver",
        json!({"type": "cave", "config": {"probability": 0.5}}),
        "1.20",
    );
    assert!(ok.is_empty(), "{ok:#?}");

    let bad = check_type(
        &compiled,
        "Carver",
        json!({"type": "cave", "config": {"probability": "often"}}),
        "1.20",
    );
    assert_eq!(kinds(&bad), vec![DiagnosticKind::TypeMismatch]);
    // Path includes the dispatcher hop.
    assert!(bad[0].json_path.contains("config"));
    assert!(bad[0].json_path.contains("probability"));
}

#[test]
fn test_dispatcher_fallback_variant() {
    let compiled = schema(
        "struct Ref { type: string, ...minecraft:gen[[type]] }
         dispatch minecraft:gen[flat] to struct Flat { layers: [int] }
         dispatch minecraft:gen[%fallback] to struct AnyGen {}",
    );
    // An unregistered key falls back instead of erroring; the fallback
    // struct has no fields, but `type` is consumed by Ref itself.
    let findings = check_type(&compiled, "Ref", json!({"type": "mystery"}), "1.20");
    assert!(findings.is_empty(), "{findings:#?}");
}

#[test]
fn test_static_dispatcher_reference() {
    let compiled = schema(
        "type FlatRef = minecraft:gen[flat]
         dispatch minecraft:gen[flat] to struct Flat { layers: [int] }",
    );
    assert!(check_type(&compiled, "FlatRef", json!({"layers": [1]}), "1.20").is_empty());
    let findings = check_type(&compiled, "FlatRef", json!({"layers": "no"}), "1.20");
    assert_eq!(kinds(&findings), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn test_computed_key_dispatcher() {
    let compiled = schema(
        "struct Carvers { [string]: minecraft:carver[[%key]] }
         dispatch minecraft:carver[cave] to struct Cave { depth: int }",
    );
    let ok = check_type(&compiled, "Carvers", json!({"cave": {"depth": 3}}), "1.20");
    assert!(ok.is_empty(), "{ok:#?}");

    let bad = check_type(&compiled, "Carvers", json!({"ravine": {"depth": 3}}), "1.20");
    assert_eq!(kinds(&bad), vec![DiagnosticKind::UnknownDispatchKey]);
}

// === Unknown sentinel and determinism ===

#[test]
fn test_unknown_validates_anything() {
    let sources = [(
        ModulePath::relative(["test"]),
        "type T = Missing".to_string(),
    )];
    let compiled = compile(sources);
    for value in [json!(null), json!(5), json!("x"), json!({"a": [1, 2]})] {
        let findings = compiled.validate(
            &Start::Type("test::T".to_string()),
            &JsonValue::from(value),
            v("1.20"),
        );
        assert!(findings.is_empty());
    }
}

#[test]
fn test_validation_is_deterministic() {
    let compiled = schema(
        "struct S { a: int, b: [string], c?: (int | string) }",
    );
    let value = JsonValue::from(json!({"a": "x", "b": [1, "ok", 2], "c": true, "d": 0}));
    let start = Start::Type("test::S".to_string());
    let first = compiled.validate(&start, &value, v("1.20"));
    let second = compiled.validate(&start, &value, v("1.20"));
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn test_diagnostics_in_depth_first_order() {
    let compiled = schema("struct S { a: int, b: int, c: int }");
    let findings = check_type(
        &compiled,
        "S",
        json!({"a": "x", "b": "y", "c": "z"}),
        "1.20",
    );
    let paths: Vec<&str> = findings.iter().map(|d| d.json_path.as_str()).collect();
    assert_eq!(paths, ["a", "b", "c"]);
}

#[test]
fn test_recursive_schema_bounded_by_json() {
    let compiled = schema("struct Node { value: int, next?: Node }");
    let ok = check_type(
        &compiled,
        "Node",
        json!({"value": 1, "next": {"value": 2, "next": {"value": 3}}}),
        "1.20",
    );
    assert!(ok.is_empty(), "{ok:#?}");

    let bad = check_type(
        &compiled,
        "Node",
        json!({"value": 1, "next": {"value": "two"}}),
        "1.20",
    );
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].json_path, "next.value");
}
