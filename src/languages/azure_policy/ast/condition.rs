// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::value::Value;

use super::operators::Operator;
use super::path::{FieldRef, PathSegment};

/// Index into a compiled rule's expression table.
///
/// Every `[...]` expression in a rule gets one slot; the binder fills the
/// slots once per assignment.
pub type ExpressionSlot = usize;

/// Condition tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    /// Location of the node in the rule document, e.g. `policyRule.if.allOf[1]`.
    pub path: Arc<str>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Leaf(Leaf),
    AllOf { children: Vec<ConditionNode> },
    AnyOf { children: Vec<ConditionNode> },
    Not { child: Box<ConditionNode> },
}

impl NodeKind {
    pub const fn label(&self) -> &'static str {
        match *self {
            NodeKind::Leaf(_) => "leaf",
            NodeKind::AllOf { .. } => "allOf",
            NodeKind::AnyOf { .. } => "anyOf",
            NodeKind::Not { .. } => "not",
        }
    }
}

/// Leaf condition: `<subject> <operator> <operand>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub subject: Subject,
    pub operator: Operator,
    pub operand: Operand,
}

/// Left-hand side of a leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Subject {
    /// `"field": "properties.x"`.
    Field(FieldRef),
    /// `"field": "[concat('tags[', parameters('tagName'), ']')]"`.
    BoundField(ExpressionSlot),
    /// `"value": ...`.
    Value(Operand),
    /// `"value": "[current('name')]"` inside a count `where`.
    Current {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<PathSegment>,
    },
    /// `"count": { ... }`.
    Count(Box<CountExpr>),
}

/// Right-hand side of a leaf, or the `value` of a leaf/count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(Value),
    Expression(ExpressionSlot),
    /// `"[current('name')]"` inside a count `where`, resolved per element.
    Current {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<PathSegment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountExpr {
    pub source: CountSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountSource {
    /// Field count over a `[*]` array path.
    Field(FieldRef),
    /// Value count over an array operand, optionally named for `current()`.
    Value {
        operand: Operand,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}
