// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::*;
use crate::languages::azure_policy::binder::bind;
use crate::languages::azure_policy::compiler::compile;

fn bound(condition: &str) -> BoundRule {
    bound_with(condition, "{}", "{}", "Deny", "All")
}

fn bound_with(
    condition: &str,
    declarations: &str,
    values: &str,
    effect: &str,
    mode: &str,
) -> BoundRule {
    let rule = compile(&format!(
        r#"{{
            "displayName": "interpreter test",
            "mode": "{mode}",
            "parameters": {declarations},
            "policyRule": {{ "if": {condition}, "then": {{ "effect": "{effect}" }} }}
        }}"#
    ))
    .unwrap();
    bind(&Arc::new(rule), &Value::from_json_str(values).unwrap()).unwrap()
}

fn doc(text: &str) -> Value {
    Value::from_json_str(text).unwrap()
}

fn matches(condition: &str, resource: &str) -> bool {
    evaluate(&bound(condition), &doc(resource)).matched
}

const STORAGE_HTTPS: &str = r#"{
    "allOf": [
        {"field": "type", "equals": "Microsoft.Storage/storageAccounts"},
        {"field": "properties.supportsHttpsTrafficOnly", "equals": "false"}
    ]
}"#;

#[test]
fn storage_https_example() {
    let rule = bound(STORAGE_HTTPS);

    let insecure = doc(
        r#"{"type": "Microsoft.Storage/storageAccounts", "properties": {"supportsHttpsTrafficOnly": false}}"#,
    );
    let result = evaluate(&rule, &insecure);
    assert!(!result.compliant);
    assert!(result.matched);
    assert_eq!(result.matched_effect, Effect::Deny);
    assert_eq!(result.applied_effect(), Some(Effect::Deny));

    let secure = doc(
        r#"{"type": "Microsoft.Storage/storageAccounts", "properties": {"supportsHttpsTrafficOnly": true}}"#,
    );
    let result = evaluate(&rule, &secure);
    assert!(result.compliant);
    assert_eq!(result.applied_effect(), None);

    let vm = doc(r#"{"type": "Microsoft.Compute/virtualMachines", "properties": {}}"#);
    let result = evaluate(&rule, &vm);
    assert!(result.compliant);
    // allOf stopped at the type check.
    assert_eq!(result.trace.len(), 2);
}

#[test]
fn evaluation_is_deterministic() {
    let rule = bound(STORAGE_HTTPS);
    let resource = doc(
        r#"{"type": "Microsoft.Storage/storageAccounts", "properties": {"supportsHttpsTrafficOnly": "false"}}"#,
    );
    let first = evaluate(&rule, &resource);
    for _ in 0..10 {
        assert_eq!(evaluate(&rule, &resource), first);
    }
}

#[test]
fn double_negation_is_identity() {
    let leaf = r#"{"field": "location", "equals": "westus"}"#;
    let negated = format!(r#"{{"not": {{"not": {leaf}}}}}"#);
    for resource in [
        r#"{"location": "westus"}"#,
        r#"{"location": "eastus"}"#,
        r#"{}"#,
    ] {
        assert_eq!(matches(leaf, resource), matches(&negated, resource));
    }
}

#[test]
fn empty_combinators() {
    assert!(matches(r#"{"allOf": []}"#, "{}"));
    assert!(!matches(r#"{"anyOf": []}"#, "{}"));
}

#[test]
fn exists_distinguishes_null_from_absent() {
    let absent = r#"{"field": "properties.encryption", "exists": false}"#;
    assert!(matches(absent, r#"{"properties": {}}"#));
    assert!(!matches(absent, r#"{"properties": {"encryption": null}}"#));
    assert!(matches(
        r#"{"field": "properties.encryption", "exists": "true"}"#,
        r#"{"properties": {"encryption": null}}"#
    ));
}

#[test]
fn missing_fields_satisfy_only_negated_operators() {
    let resource = "{}";
    assert!(!matches(r#"{"field": "tags.env", "equals": "prod"}"#, resource));
    assert!(matches(r#"{"field": "tags.env", "notEquals": "prod"}"#, resource));
    assert!(matches(r#"{"field": "tags.env", "notIn": ["prod"]}"#, resource));
    assert!(matches(r#"{"field": "tags.env", "notLike": "p*"}"#, resource));
    assert!(!matches(r#"{"field": "tags.env", "less": 3}"#, resource));
    assert!(!matches(r#"{"field": "tags", "containsKey": "env"}"#, resource));
    assert!(matches(r#"{"field": "tags", "notContainsKey": "env"}"#, resource));
}

#[test]
fn operator_semantics() {
    let resource = r#"{
        "name": "Web-Prod-01",
        "location": "westeurope",
        "tags": {"Environment": "prod"},
        "properties": {"minimumTlsVersion": "TLS1_2", "replicas": 3, "ratio": 2.5}
    }"#;
    assert!(matches(r#"{"field": "name", "equals": "Web-Prod-01"}"#, resource));
    assert!(!matches(r#"{"field": "name", "equals": "web-prod-01"}"#, resource));
    assert!(matches(r#"{"field": "name", "like": "web-*"}"#, resource));
    assert!(matches(r#"{"field": "name", "match": "???-????-##"}"#, resource));
    assert!(!matches(r#"{"field": "name", "match": "web-prod-##"}"#, resource));
    assert!(matches(r#"{"field": "name", "matchInsensitively": "web-prod-##"}"#, resource));
    assert!(matches(r#"{"field": "name", "contains": "Prod"}"#, resource));
    assert!(matches(r#"{"field": "location", "in": ["westeurope", "northeurope"]}"#, resource));
    assert!(matches(r#"{"field": "tags", "containsKey": "environment"}"#, resource));
    assert!(matches(r#"{"field": "properties.replicas", "greaterOrEquals": 3}"#, resource));
    assert!(matches(r#"{"field": "properties.replicas", "equals": 3.0}"#, resource));
    assert!(matches(r#"{"field": "properties.ratio", "less": 3}"#, resource));
    assert!(!matches(r#"{"field": "properties.replicas", "less": "4"}"#, resource));
    assert!(matches(r#"{"field": "properties.minimumTlsVersion", "less": "TLS1_3"}"#, resource));
}

#[test]
fn wildcards_match_when_any_element_matches() {
    let resource = r#"{"properties": {"rules": [
        {"access": "Deny", "port": "443"},
        {"access": "Allow", "port": "22"}
    ], "empty": []}}"#;
    assert!(matches(r#"{"field": "properties.rules[*].access", "equals": "Allow"}"#, resource));
    assert!(!matches(r#"{"field": "properties.rules[*].access", "equals": "Audit"}"#, resource));
    assert!(matches(r#"{"field": "properties.rules[*].port", "notEquals": "22"}"#, resource));
    assert!(matches(r#"{"field": "properties.rules[*].access", "exists": true}"#, resource));
    assert!(!matches(r#"{"field": "properties.empty[*]", "equals": "x"}"#, resource));
    assert!(matches(r#"{"field": "properties.empty[*]", "exists": false}"#, resource));
}

#[test]
fn trace_lists_evaluated_nodes_children_first() {
    let rule = bound(
        r#"{"anyOf": [
            {"field": "location", "equals": "westus"},
            {"not": {"field": "name", "exists": true}},
            {"field": "type", "equals": "never reached"}
        ]}"#,
    );
    let result = evaluate(&rule, &doc(r#"{"location": "eastus"}"#));
    let trace: Vec<(&str, TraceKind, bool)> = result
        .trace
        .iter()
        .map(|entry| (&*entry.path, entry.kind, entry.outcome))
        .collect();
    assert_eq!(
        trace,
        [
            ("policyRule.if.anyOf[0]", TraceKind::Leaf, false),
            ("policyRule.if.anyOf[1].not", TraceKind::Leaf, false),
            ("policyRule.if.anyOf[1]", TraceKind::Not, true),
            ("policyRule.if", TraceKind::AnyOf, true),
        ]
    );
}

#[test]
fn disabled_rules_are_skipped() {
    let rule = bound_with(
        r#"{"field": "type", "exists": true}"#,
        r#"{"effect": {"type": "String", "defaultValue": "Disabled"}}"#,
        "{}",
        "[parameters('effect')]",
        "All",
    );
    let result = evaluate(&rule, &doc(r#"{"type": "x"}"#));
    assert!(result.compliant);
    assert!(result.applicable);
    assert!(!result.matched);
    assert_eq!(result.matched_effect, Effect::Disabled);
    assert!(result.trace.is_empty());
}

#[test]
fn indexed_rules_skip_untracked_resources() {
    let rule = bound_with(
        r#"{"field": "tags.owner", "exists": false}"#,
        "{}",
        "{}",
        "Audit",
        "Indexed",
    );
    let result = evaluate(&rule, &doc(r#"{"type": "Microsoft.Resources/deployments"}"#));
    assert!(!result.applicable);
    assert!(result.compliant);
    assert!(result.trace.is_empty());

    let result = evaluate(&rule, &doc(r#"{"location": "westus"}"#));
    assert!(result.applicable);
    assert!(!result.compliant);
}

#[test]
fn parameters_flow_into_conditions() {
    let declarations = r#"{
        "tagName": {"type": "String"},
        "allowed": {"type": "Array", "defaultValue": ["westus", "eastus"]}
    }"#;
    let rule = bound_with(
        r#"{"anyOf": [
            {"field": "[concat('tags[', parameters('tagName'), ']')]", "exists": false},
            {"field": "location", "notIn": "[parameters('allowed')]"}
        ]}"#,
        declarations,
        r#"{"tagName": {"value": "cost-center"}}"#,
        "Audit",
        "All",
    );
    let tagged = doc(r#"{"location": "westus", "tags": {"cost-center": "42"}}"#);
    assert!(evaluate(&rule, &tagged).compliant);
    let untagged = doc(r#"{"location": "westus", "tags": {}}"#);
    assert!(!evaluate(&rule, &untagged).compliant);
    let elsewhere = doc(r#"{"location": "japaneast", "tags": {"cost-center": "42"}}"#);
    assert!(!evaluate(&rule, &elsewhere).compliant);
}

#[test]
fn field_count_scopes_where_to_each_element() {
    let condition = r#"{
        "count": {
            "field": "properties.securityRules[*]",
            "where": {"allOf": [
                {"field": "properties.securityRules[*].access", "equals": "Allow"},
                {"field": "properties.securityRules[*].destinationPortRange", "in": ["22", "3389"]}
            ]}
        },
        "greater": 0
    }"#;
    let open = r#"{"properties": {"securityRules": [
        {"access": "Allow", "destinationPortRange": "443"},
        {"access": "Allow", "destinationPortRange": "22"}
    ]}}"#;
    let closed = r#"{"properties": {"securityRules": [
        {"access": "Deny", "destinationPortRange": "22"},
        {"access": "Allow", "destinationPortRange": "443"}
    ]}}"#;
    assert!(matches(condition, open));
    assert!(!matches(condition, closed));
    assert!(!matches(condition, r#"{"properties": {}}"#));

    let all = r#"{"count": {"field": "properties.securityRules[*]"}, "equals": 2}"#;
    assert!(matches(all, open));
}

#[test]
fn count_where_nodes_are_not_traced() {
    let rule = bound(
        r#"{"count": {"field": "tags.list[*]", "where": {"field": "tags.list[*]", "equals": "a"}}, "equals": 1}"#,
    );
    let result = evaluate(&rule, &doc(r#"{"tags": {"list": ["a", "b", "c"]}}"#));
    assert!(result.matched);
    assert_eq!(result.trace.len(), 1);
    assert_eq!(&*result.trace[0].path, "policyRule.if");
}

#[test]
fn nested_field_counts() {
    let condition = r#"{
        "count": {
            "field": "properties.rules[*]",
            "where": {
                "count": {
                    "field": "properties.rules[*].ports[*]",
                    "where": {"field": "properties.rules[*].ports[*]", "equals": "22"}
                },
                "greater": 0
            }
        },
        "equals": 2
    }"#;
    let resource = r#"{"properties": {"rules": [
        {"ports": ["22", "80"]},
        {"ports": ["443"]},
        {"ports": ["22"]}
    ]}}"#;
    assert!(matches(condition, resource));
}

#[test]
fn value_count_uses_current() {
    let declarations = r#"{"required": {"type": "Array", "defaultValue": ["owner", "env"]}}"#;
    let rule = bound_with(
        r#"{
            "count": {
                "value": "[parameters('required')]",
                "name": "tag",
                "where": {"field": "tags", "containsKey": "[current('tag')]"}
            },
            "less": "[length(parameters('required'))]"
        }"#,
        declarations,
        "{}",
        "Audit",
        "All",
    );
    assert!(evaluate(&rule, &doc(r#"{"tags": {"owner": "a", "env": "b"}}"#)).compliant);
    assert!(!evaluate(&rule, &doc(r#"{"tags": {"owner": "a"}}"#)).compliant);
}

#[test]
fn value_count_current_as_subject() {
    let condition = r#"{
        "count": {
            "value": [{"port": 22}, {"port": 80}, {"port": 3389}],
            "name": "rule",
            "where": {"value": "[current('rule').port]", "greater": 50}
        },
        "equals": 2
    }"#;
    assert!(matches(condition, "{}"));
}

#[test]
fn custom_alias_tables() {
    let aliases = AliasTable::literal()
        .with_alias("Contoso/widgets/size", "properties.dimensions.size")
        .unwrap();
    let evaluator = PolicyEvaluator::with_aliases(Arc::new(aliases));
    let rule = bound(r#"{"field": "Contoso/widgets/size", "greater": 10}"#);
    let resource = doc(r#"{"properties": {"dimensions": {"size": 12}}}"#);
    assert!(evaluator.evaluate(&rule, &resource).matched);
    assert!(!matches(r#"{"field": "Contoso/widgets/size", "greater": 10}"#, r#"{"size": 12}"#));
}

#[test]
fn results_serialize_camel_case() {
    let result = evaluate(&bound(r#"{"field": "name", "exists": true}"#), &doc(r#"{"name": "a"}"#));
    let json: String = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"matchedEffect\":\"Deny\""));
    assert!(json.contains("\"kind\":\"leaf\""));
}
