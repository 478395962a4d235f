// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use azpolicy::*;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct ResourceCase {
    note: Option<String>,
    resource: Value,
    want_compliant: Option<bool>,
    want_matched: Option<bool>,
    want_applicable: Option<bool>,
    want_effect: Option<String>,
    /// Node paths in trace order.
    want_trace: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct TestCase {
    note: String,
    rule: Value,
    parameters: Option<Value>,
    aliases: Option<Value>,
    #[serde(default)]
    resources: Vec<ResourceCase>,
    want_compile_error: Option<String>,
    want_bind_error: Option<String>,
    skip: Option<bool>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn check_error(stage: &str, actual: &str, expected: Option<&String>) -> Result<()> {
    match expected {
        Some(expected) if actual.contains(expected.as_str()) => Ok(()),
        Some(expected) => bail!("{stage} error `{actual}` does not contain `{expected}`"),
        None => bail!("{stage} raised `{actual}` unexpectedly"),
    }
}

fn run_case(case: &TestCase) -> Result<()> {
    let rule = match compile_value(&case.rule) {
        Ok(rule) => Arc::new(rule),
        Err(e) => return check_error("compile", &e.to_string(), case.want_compile_error.as_ref()),
    };
    if let Some(expected) = &case.want_compile_error {
        bail!("expected compile error `{expected}`");
    }

    let bound = match bind(&rule, case.parameters.as_ref().unwrap_or(&Value::Null)) {
        Ok(bound) => bound,
        Err(e) => return check_error("bind", &e.to_string(), case.want_bind_error.as_ref()),
    };
    if let Some(expected) = &case.want_bind_error {
        bail!("expected bind error `{expected}`");
    }

    let evaluator = match &case.aliases {
        Some(aliases) => PolicyEvaluator::with_aliases(Arc::new(AliasTable::from_value(aliases)?)),
        None => PolicyEvaluator::new(),
    };

    for (index, expected) in case.resources.iter().enumerate() {
        let label = expected.note.clone().unwrap_or_else(|| format!("resource {index}"));
        let actual = evaluator.evaluate(&bound, &expected.resource);

        if let Some(compliant) = expected.want_compliant {
            if actual.compliant != compliant {
                bail!("{label}: want compliant = {compliant}, got {actual:?}");
            }
        }
        if let Some(matched) = expected.want_matched {
            if actual.matched != matched {
                bail!("{label}: want matched = {matched}, got {actual:?}");
            }
        }
        if let Some(applicable) = expected.want_applicable {
            if actual.applicable != applicable {
                bail!("{label}: want applicable = {applicable}, got {actual:?}");
            }
        }
        if let Some(effect) = &expected.want_effect {
            if actual.matched_effect.name() != effect {
                bail!("{label}: want effect {effect}, got {}", actual.matched_effect);
            }
        }
        if let Some(trace) = &expected.want_trace {
            let paths: Vec<&str> = actual.trace.iter().map(|entry| &*entry.path).collect();
            if paths != *trace {
                bail!("{label}: want trace {trace:?}, got {paths:?}");
            }
        }

        // Batch evaluation agrees with single evaluation.
        let batch = evaluator.evaluate_batch(&bound, std::slice::from_ref(&expected.resource));
        match batch.as_slice() {
            [Ok(result)] if *result == actual => {}
            other => bail!("{label}: batch result {other:?} differs from {actual:?}"),
        }
    }

    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    std::eprintln!("running {file}");

    for case in &test.cases {
        std::print!("case {} ", case.note);
        if case.skip == Some(true) {
            std::println!("skipped");
            continue;
        }
        run_case(case).map_err(|e| anyhow::anyhow!("case `{}`: {e}", case.note))?;
        std::println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/azure_policy/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
