// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Azure Policy condition interpreter.
//!
//! Walks a bound rule's condition tree against a resource document and
//! produces a compliance verdict with an evaluation trace. Evaluation never
//! fails: malformed or missing data makes conditions false.

mod count;
mod eval;
mod operators;
mod patterns;
mod result;

#[cfg(test)]
mod tests;

pub use result::{EvaluationFault, EvaluationResult, TraceEntry, TraceKind};

use alloc::sync::Arc;

use crate::languages::azure_policy::ast::{Effect, PolicyMode};
use crate::languages::azure_policy::binder::BoundRule;
use crate::languages::azure_policy::resolver::{default_aliases, AliasTable};
use crate::value::Value;
use eval::Evaluator;

/// Evaluates bound rules against resources using an alias table.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    aliases: Arc<AliasTable>,
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEvaluator {
    /// Evaluator backed by the built-in alias catalog.
    pub fn new() -> Self {
        Self {
            aliases: default_aliases(),
        }
    }

    pub const fn with_aliases(aliases: Arc<AliasTable>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &Arc<AliasTable> {
        &self.aliases
    }

    /// Decide whether `resource` complies with `rule`.
    pub fn evaluate(&self, rule: &BoundRule, resource: &Value) -> EvaluationResult {
        evaluate_rule(rule, resource, &self.aliases)
    }
}

/// Evaluate `rule` against `resource` using the built-in alias catalog.
pub fn evaluate(rule: &BoundRule, resource: &Value) -> EvaluationResult {
    evaluate_rule(rule, resource, &default_aliases())
}

fn evaluate_rule(rule: &BoundRule, resource: &Value, aliases: &AliasTable) -> EvaluationResult {
    let effect = rule.effect();
    if !effect.is_enabled() {
        return EvaluationResult::skipped(effect);
    }

    let document = rule.rule();
    if document.mode == PolicyMode::Indexed && !is_indexed(resource) {
        tracing::trace!(rule = %document.display_name, "resource outside indexed mode");
        return EvaluationResult::not_applicable(effect);
    }

    let mut evaluator = Evaluator::new(rule, resource, aliases);
    let matched = evaluator.evaluate(&document.condition);
    let trace = evaluator.into_trace();

    tracing::trace!(
        rule = %document.display_name,
        matched,
        nodes = trace.len(),
        "evaluated policy rule"
    );

    EvaluationResult {
        compliant: !matched,
        applicable: true,
        matched,
        matched_effect: effect,
        trace,
    }
}

// Indexed rules only see resources that support tags and location.
fn is_indexed(resource: &Value) -> bool {
    matches!(*resource, Value::Object(_))
        && (resource.get_ignore_case("tags").is_some()
            || resource.get_ignore_case("location").is_some())
}

impl EvaluationResult {
    /// Effect that applies to the resource, if any.
    ///
    /// `None` when the resource is compliant or the rule did not apply.
    pub fn applied_effect(&self) -> Option<Effect> {
        (self.applicable && !self.compliant).then_some(self.matched_effect)
    }
}
