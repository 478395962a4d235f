// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use alloc::format;
use alloc::string::String;

use super::*;
use crate::languages::azure_policy::ast::{
    CountSource, Effect, EffectSpec, NodeKind, Operand, Operator, PathSegment, SlotUsage, Subject,
};

fn rule(condition: &str) -> String {
    rule_with(condition, "{}", r#""Deny""#)
}

fn rule_with(condition: &str, parameters: &str, effect: &str) -> String {
    format!(
        r#"{{
            "displayName": "test rule",
            "parameters": {parameters},
            "policyRule": {{ "if": {condition}, "then": {{ "effect": {effect} }} }}
        }}"#
    )
}

fn nested_all_of(depth: usize) -> String {
    let mut condition = String::from(r#"{"field": "type", "equals": "x"}"#);
    for _ in 1..depth {
        condition = format!(r#"{{"allOf": [{condition}]}}"#);
    }
    condition
}

const STORAGE_HTTPS: &str = r#"{
    "allOf": [
        {"field": "type", "equals": "Microsoft.Storage/storageAccounts"},
        {"field": "properties.supportsHttpsTrafficOnly", "equals": "false"}
    ]
}"#;

#[test]
fn compiles_storage_https_rule() {
    let doc = compile(&rule(STORAGE_HTTPS)).unwrap();
    assert_eq!(doc.display_name, "test rule");
    assert_eq!(doc.mode, PolicyMode::All);
    assert_eq!(doc.effect, EffectSpec::Literal(Effect::Deny));
    assert_eq!(doc.node_count, 3);
    assert_eq!(doc.max_depth, 2);

    let NodeKind::AllOf { ref children } = doc.condition.kind else {
        panic!("expected allOf, got {:?}", doc.condition.kind);
    };
    assert_eq!(&*children[1].path, "policyRule.if.allOf[1]");
    match children[1].kind {
        NodeKind::Leaf(ref leaf) => {
            assert_eq!(leaf.operator, Operator::Equals);
            assert_eq!(leaf.operand, Operand::Literal(Value::from("false")));
            match leaf.subject {
                Subject::Field(ref field) => {
                    assert_eq!(field.raw(), "properties.supportsHttpsTrafficOnly")
                }
                ref other => panic!("unexpected subject {other:?}"),
            }
        }
        ref other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn compilation_is_deterministic() {
    let text = rule_with(
        r#"{"field": "location", "notIn": "[parameters('locations')]"}"#,
        r#"{"locations": {"type": "Array", "defaultValue": ["westus"]}}"#,
        r#""[parameters('effect')]""#,
    )
    .replace(
        r#""locations": {"#,
        r#""effect": {"type": "String", "defaultValue": "Audit"}, "locations": {"#,
    );
    assert_eq!(compile(&text).unwrap(), compile(&text).unwrap());
}

#[test]
fn accepts_full_definition_shape() {
    let text = format!(
        r#"{{"name": "deny-http-storage", "properties": {}}}"#,
        rule(STORAGE_HTTPS)
    );
    let doc = compile(&text).unwrap();
    assert_eq!(doc.id.as_deref(), Some("deny-http-storage"));
    assert_eq!(doc.node_count, 3);
}

#[test]
fn reports_missing_required_fields() {
    let err = compile(r#"{"policyRule": {"if": {}, "then": {"effect": "Deny"}}}"#).unwrap_err();
    assert_eq!(err.path(), Some("displayName"));

    let err = compile(r#"{"displayName": "x", "policyRule": {"then": {"effect": "Deny"}}}"#)
        .unwrap_err();
    assert_eq!(err.path(), Some("policyRule.if"));

    let err = compile(r#"{"displayName": "x", "policyRule": {"if": {"field": "type", "exists": true}, "then": {}}}"#)
        .unwrap_err();
    assert_eq!(err.path(), Some("policyRule.then.effect"));

    assert!(matches!(
        compile("{ not json").unwrap_err(),
        CompileError::InvalidJson(_)
    ));
}

#[test]
fn rejects_unknown_operators_and_effects() {
    let err = compile(&rule(r#"{"field": "type", "equalsish": "x"}"#)).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }), "{err}");

    let err = compile(&rule_with(r#"{"field": "type", "exists": true}"#, "{}", r#""Explode""#))
        .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }), "{err}");

    let err = compile(&rule_with(r#"{"field": "type", "exists": true}"#, "{}", r#""deny""#));
    assert!(err.is_ok(), "effect names are case-insensitive");
}

#[test]
fn rejects_ambiguous_leaves() {
    for condition in [
        r#"{"field": "type", "equals": "a", "notEquals": "b"}"#,
        r#"{"field": "type"}"#,
        r#"{"equals": "a"}"#,
        r#"{"field": "type", "value": "x", "equals": "a"}"#,
        r#"{"allOf": [], "field": "type"}"#,
        r#"{"allOf": {"field": "type", "equals": "a"}}"#,
        r#"{"not": [{"field": "type", "equals": "a"}]}"#,
        r#"{"field": "type", "in": "westus"}"#,
        r#"{"field": "type", "exists": "maybe"}"#,
        r#"{"field": "name", "like": 3}"#,
        r#"{"field": "a..b", "exists": true}"#,
        r#""just a string""#,
    ] {
        let err = compile(&rule(condition)).unwrap_err();
        assert!(
            matches!(err, CompileError::MalformedRule { .. }),
            "{condition}: {err}"
        );
    }
}

#[test]
fn error_paths_point_at_the_offending_node() {
    let err = compile(&rule(
        r#"{"anyOf": [{"field": "type", "exists": true}, {"not": {"field": "name", "bogus": 1}}]}"#,
    ))
    .unwrap_err();
    assert_eq!(err.path(), Some("policyRule.if.anyOf[1].not"));
}

#[test]
fn rejects_deeply_nested_rules() {
    let err = compile(&rule(&nested_all_of(40))).unwrap_err();
    assert!(matches!(err, CompileError::RuleTooComplex { .. }), "{err}");
    assert!(compile(&rule(&nested_all_of(32))).is_ok());

    let shallow = Compiler::new().with_max_depth(3);
    assert!(shallow.compile_str(&rule(&nested_all_of(3))).is_ok());
    assert!(matches!(
        shallow.compile_str(&rule(&nested_all_of(4))).unwrap_err(),
        CompileError::RuleTooComplex { .. }
    ));
}

#[test]
fn rejects_rules_with_too_many_nodes() {
    let leaves = (0..10)
        .map(|i| format!(r#"{{"field": "tags.t{i}", "exists": true}}"#))
        .collect::<alloc::vec::Vec<_>>()
        .join(",");
    let text = rule(&format!(r#"{{"anyOf": [{leaves}]}}"#));
    assert!(Compiler::new().with_max_nodes(11).compile_str(&text).is_ok());
    assert!(matches!(
        Compiler::new().with_max_nodes(10).compile_str(&text).unwrap_err(),
        CompileError::RuleTooComplex { .. }
    ));
}

#[test]
fn rejects_deeply_nested_expressions() {
    let calls = format!("[{}'a'{}]", "toLower(".repeat(20_000), ")".repeat(20_000));
    let indexes = format!("['abc'{}]", "[0]".repeat(20_000));
    for source in [calls, indexes] {
        let text = rule(&format!(r#"{{"field": "name", "equals": "{source}"}}"#));
        let err = compile(&text).unwrap_err();
        assert!(matches!(err, CompileError::RuleTooComplex { .. }), "{err}");
        assert!(err.path().unwrap().starts_with("policyRule.if"), "{err}");
    }

    let limited = Compiler::new().with_max_expression_depth(3);
    let leaf = |source: &str| rule(&format!(r#"{{"field": "name", "equals": "{source}"}}"#));
    assert!(limited.compile_str(&leaf("[toLower(toLower('A'))]")).is_ok());
    assert!(matches!(
        limited
            .compile_str(&leaf("[toLower(toLower(toLower('A')))]"))
            .unwrap_err(),
        CompileError::RuleTooComplex { .. }
    ));
}

#[test]
fn compile_options_deserialize_with_defaults() {
    let options: CompileOptions = serde_json::from_str(r#"{"maxDepth": 8}"#).unwrap();
    assert_eq!(options.max_depth, 8);
    assert_eq!(options.max_nodes, CompileOptions::default().max_nodes);
    assert_eq!(
        options.max_expression_depth,
        CompileOptions::default().max_expression_depth
    );
    assert!(serde_json::from_str::<CompileOptions>(r#"{"depth": 8}"#).is_err());
}

#[test]
fn validates_expressions_against_declared_parameters() {
    let err = compile(&rule(
        r#"{"field": "location", "in": "[parameters('allowedLocations')]"}"#,
    ))
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::UndeclaredParameter {
            name: "allowedLocations".into(),
            path: "policyRule.if.in".into(),
        }
    );

    let err = compile(&rule(r#"{"field": "location", "equals": "[resourceGroup().location]"}"#))
        .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }), "{err}");

    let err = compile(&rule(r#"{"field": "location", "equals": "[concat('a',]"}"#)).unwrap_err();
    assert!(matches!(err, CompileError::MalformedRule { .. }), "{err}");

    let err = compile(&rule(r#"{"field": "location", "equals": "[toLower('a', 'b')]"}"#))
        .unwrap_err();
    assert!(matches!(err, CompileError::MalformedRule { .. }), "{err}");
}

#[test]
fn records_expression_slots() {
    let doc = compile(&rule_with(
        r#"{"field": "[concat('tags[', parameters('tagName'), ']')]", "exists": false}"#,
        r#"{"tagName": {"type": "String"}, "effect": {"type": "String", "allowedValues": ["Audit", "Deny", "Disabled"], "defaultValue": "Audit"}}"#,
        r#""[parameters('effect')]""#,
    ))
    .unwrap();
    assert_eq!(doc.expressions.len(), 2);
    assert_eq!(doc.expressions[0].usage, SlotUsage::Field);
    assert_eq!(doc.expressions[0].path, "policyRule.if.field");
    assert_eq!(doc.expressions[1].usage, SlotUsage::Effect);
    assert_eq!(doc.effect, EffectSpec::Expression(1));
    match doc.condition.kind {
        NodeKind::Leaf(ref leaf) => assert_eq!(leaf.subject, Subject::BoundField(0)),
        ref other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn escaped_brackets_are_literals() {
    let doc = compile(&rule(r#"{"field": "name", "equals": "[[literal]"}"#)).unwrap();
    match doc.condition.kind {
        NodeKind::Leaf(ref leaf) => {
            assert_eq!(leaf.operand, Operand::Literal(Value::from("[literal]")))
        }
        ref other => panic!("unexpected node {other:?}"),
    }
    assert!(doc.expressions.is_empty());
}

#[test]
fn validates_parameter_declarations() {
    let cases = [
        (r#"{"p": {"type": "Strng"}}"#, "parameters.p.type"),
        (r#"{"p": {"allowedValues": ["a"]}}"#, "parameters.p"),
        (r#"{"p": {"type": "String", "allowedValues": []}}"#, "parameters.p.allowedValues"),
        (
            r#"{"p": {"type": "String", "allowedValues": ["a"], "defaultValue": "b"}}"#,
            "parameters.p.defaultValue",
        ),
        (r#"{"p": {"type": "Integer", "defaultValue": 1.5}}"#, "parameters.p.defaultValue"),
        (r#"{"p": {"type": "String"}, "P": {"type": "String"}}"#, "parameters.p"),
    ];
    for (parameters, path) in cases {
        let err = compile(&rule_with(
            r#"{"field": "type", "exists": true}"#,
            parameters,
            r#""Audit""#,
        ))
        .unwrap_err();
        assert_eq!(err.path(), Some(path), "{parameters}: {err}");
    }
}

#[test]
fn parses_modes() {
    let indexed = rule(STORAGE_HTTPS).replacen('{', r#"{"mode": "indexed","#, 1);
    assert_eq!(compile(&indexed).unwrap().mode, PolicyMode::Indexed);

    let other = rule(STORAGE_HTTPS).replacen('{', r#"{"mode": "Microsoft.KeyVault.Data","#, 1);
    let err = compile(&other).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }), "{err}");
}

#[test]
fn compiles_counts_and_current() {
    let doc = compile(&rule_with(
        r#"{
            "count": {
                "value": "[parameters('ports')]",
                "name": "port",
                "where": {"value": "[current('port')]", "greater": 1024}
            },
            "greater": 0
        }"#,
        r#"{"ports": {"type": "Array", "defaultValue": [22]}}"#,
        r#""Audit""#,
    ))
    .unwrap();
    assert_eq!(doc.node_count, 2);
    assert_eq!(doc.max_depth, 2);
    let NodeKind::Leaf(ref leaf) = doc.condition.kind else {
        panic!("expected a leaf");
    };
    let Subject::Count(ref count) = leaf.subject else {
        panic!("expected a count");
    };
    assert!(matches!(count.source, CountSource::Value { ref name, .. } if name.as_deref() == Some("port")));
    let inner = count.condition.as_ref().unwrap();
    assert_eq!(&*inner.path, "policyRule.if.count.where");
    match inner.kind {
        NodeKind::Leaf(ref leaf) => assert_eq!(
            leaf.subject,
            Subject::Current {
                name: Some("port".into()),
                path: alloc::vec![]
            }
        ),
        ref other => panic!("unexpected node {other:?}"),
    }

    let doc = compile(&rule(
        r#"{
            "count": {
                "field": "properties.rules[*]",
                "where": {"value": "[current('properties.rules[*].port')]", "equals": 22}
            },
            "greater": 0
        }"#,
    ))
    .unwrap();
    let NodeKind::Leaf(ref leaf) = doc.condition.kind else {
        panic!("expected a leaf");
    };
    let Subject::Count(ref count) = leaf.subject else {
        panic!("expected a count");
    };
    match count.condition.as_ref().unwrap().kind {
        NodeKind::Leaf(ref leaf) => assert_eq!(
            leaf.subject,
            Subject::Current {
                name: Some("properties.rules[*]".into()),
                path: alloc::vec![PathSegment::Key("port".into())]
            }
        ),
        ref other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn current_can_be_an_operand_inside_counts() {
    let doc = compile(&rule(
        r#"{
            "count": {
                "value": ["owner", "env"],
                "name": "tag",
                "where": {"field": "tags", "containsKey": "[current('tag')]"}
            },
            "less": 2
        }"#,
    ))
    .unwrap();
    assert!(doc.expressions.is_empty());
    let NodeKind::Leaf(ref leaf) = doc.condition.kind else {
        panic!("expected a leaf");
    };
    let Subject::Count(ref count) = leaf.subject else {
        panic!("expected a count");
    };
    match count.condition.as_ref().unwrap().kind {
        NodeKind::Leaf(ref leaf) => assert_eq!(
            leaf.operand,
            Operand::Current {
                name: Some("tag".into()),
                path: alloc::vec![]
            }
        ),
        ref other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn rejects_invalid_counts() {
    for condition in [
        r#"{"count": {"field": "properties.rules"}, "greater": 0}"#,
        r#"{"count": {"field": "a[*]", "value": [1]}, "greater": 0}"#,
        r#"{"count": {"value": "abc"}, "greater": 0}"#,
        r#"{"count": {"value": [1], "name": 3}, "greater": 0}"#,
        r#"{"count": {"value": [1], "name": "x", "where": {"value": "[current('y')]", "equals": 1}}, "greater": 0}"#,
        r#"{"value": "[current()]", "equals": 1}"#,
        r#"{"field": "name", "equals": "[current('x')]"}"#,
    ] {
        let err = compile(&rule(condition)).unwrap_err();
        assert!(
            matches!(err, CompileError::MalformedRule { .. }),
            "{condition}: {err}"
        );
    }
}
