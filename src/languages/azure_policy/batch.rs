// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Batch evaluation with per-item fault isolation.

use alloc::string::String;
use alloc::vec::Vec;
use std::panic::{self, AssertUnwindSafe};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::languages::azure_policy::binder::BoundRule;
use crate::languages::azure_policy::interpreter::{
    EvaluationFault, EvaluationResult, PolicyEvaluator,
};
use crate::value::Value;

/// Outcome of one item in a batch.
pub type BatchEntry = Result<EvaluationResult, EvaluationFault>;

impl PolicyEvaluator {
    /// Evaluate one rule against many resources.
    ///
    /// Results are returned in input order. A panic while evaluating one
    /// resource becomes an [`EvaluationFault`] for that entry only.
    pub fn evaluate_batch(&self, rule: &BoundRule, resources: &[Value]) -> Vec<BatchEntry> {
        tracing::debug!(
            rule = %rule.rule().display_name,
            resources = resources.len(),
            "evaluating batch"
        );
        fan_out(resources, |resource| self.evaluate(rule, resource))
    }

    /// Evaluate many rules against one resource, preserving rule order.
    pub fn evaluate_rules(&self, rules: &[BoundRule], resource: &Value) -> Vec<BatchEntry> {
        tracing::debug!(rules = rules.len(), "evaluating rules against resource");
        fan_out(rules, |rule| self.evaluate(rule, resource))
    }
}

/// [`PolicyEvaluator::evaluate_batch`] with the built-in alias catalog.
pub fn evaluate_batch(rule: &BoundRule, resources: &[Value]) -> Vec<BatchEntry> {
    PolicyEvaluator::new().evaluate_batch(rule, resources)
}

/// [`PolicyEvaluator::evaluate_rules`] with the built-in alias catalog.
pub fn evaluate_rules(rules: &[BoundRule], resource: &Value) -> Vec<BatchEntry> {
    PolicyEvaluator::new().evaluate_rules(rules, resource)
}

#[cfg(feature = "parallel")]
fn fan_out<T, F>(items: &[T], f: F) -> Vec<BatchEntry>
where
    T: Sync,
    F: Fn(&T) -> EvaluationResult + Sync,
{
    items
        .par_iter()
        .enumerate()
        .map(|(index, item)| guarded(index, || f(item)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn fan_out<T, F>(items: &[T], f: F) -> Vec<BatchEntry>
where
    F: Fn(&T) -> EvaluationResult,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| guarded(index, || f(item)))
        .collect()
}

pub(crate) fn guarded<F>(index: usize, f: F) -> BatchEntry
where
    F: FnOnce() -> EvaluationResult,
{
    // Evaluation only reads shared state, so nothing is left half-updated on unwind.
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Ok(result),
        Err(payload) => {
            let message = panic_message(payload);
            tracing::warn!(index, %message, "evaluation panicked");
            Err(EvaluationFault { index, message })
        }
    }
}

fn panic_message(payload: alloc::boxed::Box<dyn core::any::Any + Send + 'static>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).into()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("policy evaluation panicked")
    }
}
