// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

use super::condition::{ConditionNode, ExpressionSlot};
use super::effect::Effect;
use super::expr::Expr;

/// Compiled policy definition. Immutable once produced by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mode: PolicyMode,
    pub parameters: BTreeMap<String, ParameterDefinition>,
    pub condition: ConditionNode,
    pub effect: EffectSpec,
    /// `then.details`, carried for Modify/DeployIfNotExists consumers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Expression table referenced by [`ExpressionSlot`]s in the condition tree.
    pub expressions: Vec<TemplateExpression>,
    pub node_count: usize,
    pub max_depth: usize,
}

impl RuleDocument {
    /// Parameter declaration by name, falling back to a case-insensitive match.
    pub fn parameter(&self, name: &str) -> Option<(&String, &ParameterDefinition)> {
        self.parameters.get_key_value(name).or_else(|| {
            self.parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
        })
    }
}

/// Scope qualifier of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyMode {
    #[default]
    All,
    Indexed,
}

impl PolicyMode {
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("all") {
            Some(PolicyMode::All)
        } else if name.eq_ignore_ascii_case("indexed") {
            Some(PolicyMode::Indexed)
        } else {
            None
        }
    }
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Array,
    Object,
    Boolean,
    Integer,
    Float,
    DateTime,
}

impl ParameterType {
    const ALL: [ParameterType; 7] = [
        ParameterType::String,
        ParameterType::Array,
        ParameterType::Object,
        ParameterType::Boolean,
        ParameterType::Integer,
        ParameterType::Float,
        ParameterType::DateTime,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    /// Whether `value` is acceptable for a parameter of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ParameterType::String, Value::String(_)) => true,
            (ParameterType::Array, Value::Array(_)) => true,
            (ParameterType::Object, Value::Object(_)) => true,
            (ParameterType::Boolean, Value::Bool(_)) => true,
            (ParameterType::Integer, Value::Number(n)) => n.is_integer(),
            (ParameterType::Float, Value::Number(_)) => true,
            (ParameterType::DateTime, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            _ => false,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ParameterType::String => "String",
            ParameterType::Array => "Array",
            ParameterType::Object => "Object",
            ParameterType::Boolean => "Boolean",
            ParameterType::Integer => "Integer",
            ParameterType::Float => "Float",
            ParameterType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ParameterDefinition {
    /// Whether `value` satisfies `allowedValues`.
    ///
    /// Array parameters may list allowed elements instead of whole arrays, in
    /// which case every element must be allowed.
    pub fn allows(&self, value: &Value) -> bool {
        let Some(ref allowed) = self.allowed_values else {
            return true;
        };
        if allowed.contains(value) {
            return true;
        }
        match *value {
            Value::Array(ref items) if self.parameter_type == ParameterType::Array => {
                items.iter().all(|item| allowed.contains(item))
            }
            _ => false,
        }
    }
}

/// `then.effect`: either a literal effect name or an expression such as
/// `[parameters('effect')]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectSpec {
    Literal(Effect),
    Expression(ExpressionSlot),
}

/// Where an expression appears; decides how the binder treats its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotUsage {
    Operand,
    Field,
    Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExpression {
    /// Expression text including the surrounding brackets.
    pub source: String,
    /// Location of the expression in the rule document.
    pub path: String,
    pub usage: SlotUsage,
    pub expr: Expr,
}
