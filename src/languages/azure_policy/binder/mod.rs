// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parameter binder.
//!
//! Combines a compiled rule with assignment-time parameter values. Every
//! template expression of the rule is evaluated here, once, so evaluation
//! only ever reads the resulting binding table.

mod error;


pub use error::BindError;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString as _};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{
    Effect, EffectSpec, ExpressionSlot, FieldRef, ParameterType, RuleDocument, SlotUsage,
};
use crate::languages::azure_policy::expressions::ExpressionEvaluator;
use crate::value::Value;

/// Result of evaluating one expression slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Value(Value),
    /// Field path produced by a `field` expression.
    Field(FieldRef),
}

/// A compiled rule together with its parameter values. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BoundRule {
    rule: Arc<RuleDocument>,
    parameters: Arc<BTreeMap<String, Value>>,
    bindings: Arc<[Bound]>,
    effect: Effect,
}

impl BoundRule {
    pub fn rule(&self) -> &Arc<RuleDocument> {
        &self.rule
    }

    /// Parameter values after defaults were applied.
    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    /// Effect after resolving any effect expression.
    pub const fn effect(&self) -> Effect {
        self.effect
    }

    pub fn binding(&self, slot: ExpressionSlot) -> Option<&Bound> {
        self.bindings.get(slot)
    }

    pub(crate) fn value(&self, slot: ExpressionSlot) -> Option<&Value> {
        match self.bindings.get(slot) {
            Some(Bound::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn field(&self, slot: ExpressionSlot) -> Option<&FieldRef> {
        match self.bindings.get(slot) {
            Some(Bound::Field(field)) => Some(field),
            _ => None,
        }
    }
}

/// Bind assignment parameters to a compiled rule.
///
/// `supplied` is either a plain `{name: value}` object, the assignment shape
/// `{name: {"value": value}}`, or `null` to use defaults only.
pub fn bind(rule: &Arc<RuleDocument>, supplied: &Value) -> Result<BoundRule, BindError> {
    let supplied = collect_supplied(rule, supplied)?;

    let mut parameters = BTreeMap::new();
    for (name, definition) in rule.parameters.iter() {
        let value = supplied
            .get(name.as_str())
            .cloned()
            .or_else(|| definition.default_value.clone())
            .ok_or_else(|| BindError::MissingParameter { name: name.clone() })?;
        if !definition.parameter_type.accepts(&value) {
            return Err(BindError::ParameterTypeMismatch {
                name: name.clone(),
                expected: definition.parameter_type,
                actual: value.type_name(),
            });
        }
        if !definition.allows(&value) {
            return Err(BindError::ParameterValueNotAllowed {
                name: name.clone(),
                value: value.to_string(),
            });
        }
        parameters.insert(name.clone(), value);
    }

    let evaluator = ExpressionEvaluator::new(&parameters);
    let mut bindings = Vec::with_capacity(rule.expressions.len());
    for expression in rule.expressions.iter() {
        let value = evaluator
            .evaluate(&expression.expr)
            .map_err(|e| BindError::ExpressionFailed {
                path: expression.path.clone(),
                expression: expression.source.clone(),
                message: e.to_string(),
            })?;
        let bound = match expression.usage {
            SlotUsage::Operand => Bound::Value(value),
            SlotUsage::Field => {
                let field = match value {
                    Value::String(ref raw) => FieldRef::parse(raw).map_err(|e| e.to_string()),
                    ref other => Err(format!(
                        "field expression produced {}, expected a field path",
                        other.type_name()
                    )),
                };
                Bound::Field(field.map_err(|message| BindError::ExpressionFailed {
                    path: expression.path.clone(),
                    expression: expression.source.clone(),
                    message,
                })?)
            }
            SlotUsage::Effect => {
                if resolve_effect(&value).is_none() {
                    return Err(BindError::InvalidEffect {
                        path: expression.path.clone(),
                        value: value.to_string(),
                    });
                }
                Bound::Value(value)
            }
        };
        bindings.push(bound);
    }

    let effect = match rule.effect {
        EffectSpec::Literal(effect) => effect,
        EffectSpec::Expression(slot) => bindings
            .get(slot)
            .and_then(|bound| match *bound {
                Bound::Value(ref value) => resolve_effect(value),
                Bound::Field(_) => None,
            })
            .ok_or_else(|| BindError::InvalidEffect {
                path: "policyRule.then.effect".to_string(),
                value: format!("slot {slot}"),
            })?,
    };

    tracing::debug!(
        rule = %rule.display_name,
        parameters = parameters.len(),
        expressions = bindings.len(),
        effect = %effect,
        "bound policy rule"
    );

    Ok(BoundRule {
        rule: rule.clone(),
        parameters: Arc::new(parameters),
        bindings: bindings.into(),
        effect,
    })
}

fn resolve_effect(value: &Value) -> Option<Effect> {
    match *value {
        Value::String(ref name) => Effect::parse(name),
        _ => None,
    }
}

// Supplied values keyed by their declared parameter name.
fn collect_supplied(
    rule: &RuleDocument,
    supplied: &Value,
) -> Result<BTreeMap<String, Value>, BindError> {
    let mut values = BTreeMap::new();
    let entries = match *supplied {
        Value::Null => return Ok(values),
        Value::Object(ref entries) => entries,
        ref other => {
            return Err(BindError::InvalidParameterValues {
                actual: other.type_name(),
            })
        }
    };

    for (name, raw) in entries.iter() {
        let (declared, definition) =
            rule.parameter(name).ok_or_else(|| BindError::UnknownParameter {
                name: name.to_string(),
            })?;
        values.insert(declared.clone(), unwrap_assignment(raw, definition.parameter_type));
    }
    Ok(values)
}

// Assignment files wrap each value as `{"value": ...}`. An Object parameter
// whose own value is `{"value": <non-object>}` is taken literally.
fn unwrap_assignment(raw: &Value, parameter_type: ParameterType) -> Value {
    if let Value::Object(ref fields) = *raw {
        if fields.len() == 1 {
            if let Some(inner) = raw.get_ignore_case("value") {
                if parameter_type != ParameterType::Object || matches!(*inner, Value::Object(_)) {
                    return inner.clone();
                }
            }
        }
    }
    raw.clone()
}
