// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{
    ConditionNode, FieldPath, FieldRef, Leaf, NodeKind, Operand, PathSegment, Subject,
};
use crate::languages::azure_policy::binder::BoundRule;
use crate::languages::azure_policy::resolver::{resolve_segments, AliasTable, FieldValue};
use crate::value::Value;

use super::operators;
use super::result::{TraceEntry, TraceKind};

/// Element of an enclosing `count` that `where` conditions are evaluated against.
#[derive(Debug, Clone, Copy)]
pub(super) enum Scope<'a> {
    Field {
        /// Resolved path of the counted array.
        prefix: &'a FieldPath,
        /// Field name as written in the rule, used by `current('<field>')`.
        name: &'a str,
        element: &'a Value,
    },
    Value {
        name: Option<&'a str>,
        element: &'a Value,
    },
}

impl<'a> Scope<'a> {
    const fn element(&self) -> &'a Value {
        match *self {
            Scope::Field { element, .. } | Scope::Value { element, .. } => element,
        }
    }

    fn answers_to(&self, requested: &str) -> bool {
        match *self {
            Scope::Field { name, .. } => name.eq_ignore_ascii_case(requested),
            Scope::Value { name, .. } => name.is_some_and(|n| n.eq_ignore_ascii_case(requested)),
        }
    }
}

pub(super) struct Evaluator<'a> {
    pub(super) rule: &'a BoundRule,
    pub(super) resource: &'a Value,
    pub(super) aliases: &'a AliasTable,
    pub(super) scopes: Vec<Scope<'a>>,
    trace: Vec<TraceEntry>,
    // Nesting level of `count` where clauses; their nodes are not traced.
    muted: usize,
}

impl<'a> Evaluator<'a> {
    pub(super) const fn new(
        rule: &'a BoundRule,
        resource: &'a Value,
        aliases: &'a AliasTable,
    ) -> Self {
        Self {
            rule,
            resource,
            aliases,
            scopes: Vec::new(),
            trace: Vec::new(),
            muted: 0,
        }
    }

    pub(super) fn into_trace(self) -> Vec<TraceEntry> {
        self.trace
    }

    pub(super) fn evaluate(&mut self, node: &'a ConditionNode) -> bool {
        let outcome = match node.kind {
            NodeKind::Leaf(ref leaf) => self.evaluate_leaf(leaf),
            NodeKind::AllOf { ref children } => children.iter().all(|child| self.evaluate(child)),
            NodeKind::AnyOf { ref children } => children.iter().any(|child| self.evaluate(child)),
            NodeKind::Not { ref child } => !self.evaluate(child),
        };

        if self.muted == 0 {
            self.trace.push(TraceEntry {
                path: node.path.clone(),
                kind: TraceKind::from(&node.kind),
                outcome,
            });
        }
        outcome
    }

    /// Evaluate a `where` clause without recording trace entries.
    pub(super) fn evaluate_muted(&mut self, node: &'a ConditionNode) -> bool {
        self.muted += 1;
        let outcome = self.evaluate(node);
        self.muted -= 1;
        outcome
    }

    fn evaluate_leaf(&mut self, leaf: &'a Leaf) -> bool {
        let Some(operand) = self.operand(&leaf.operand) else {
            return false;
        };

        match leaf.subject {
            Subject::Field(ref field) => {
                let value = self.field(field);
                operators::evaluate_field(leaf.operator, &value, operand)
            }
            Subject::BoundField(slot) => match self.rule.field(slot) {
                Some(field) => {
                    let value = self.field(field);
                    operators::evaluate_field(leaf.operator, &value, operand)
                }
                None => false,
            },
            Subject::Value(ref subject) => match self.operand(subject) {
                Some(value) => operators::evaluate(leaf.operator, value, operand),
                None => false,
            },
            Subject::Current { ref name, ref path } => {
                let value = self.current(name.as_deref(), path);
                operators::evaluate_field(leaf.operator, &value, operand)
            }
            Subject::Count(ref count) => {
                let count = Value::from(self.count(count));
                operators::evaluate(leaf.operator, &count, operand)
            }
        }
    }

    pub(super) fn operand(&self, operand: &'a Operand) -> Option<&'a Value> {
        match *operand {
            Operand::Literal(ref value) => Some(value),
            Operand::Expression(slot) => self.rule.value(slot),
            Operand::Current { ref name, ref path } => {
                self.current(name.as_deref(), path).single()
            }
        }
    }

    /// Resolve a field, relative to the innermost enclosing field count whose
    /// array path it extends.
    pub(super) fn field(&self, field: &'a FieldRef) -> FieldValue<'a> {
        let path = self.aliases.path_for(field);
        for scope in self.scopes.iter().rev() {
            if let Scope::Field {
                prefix, element, ..
            } = *scope
            {
                if let Some(rest) = path.strip_prefix(prefix) {
                    return resolve_segments(element, rest);
                }
            }
        }
        resolve_segments(self.resource, path.segments())
    }

    fn current(&self, name: Option<&str>, path: &[PathSegment]) -> FieldValue<'a> {
        let scope = match name {
            None => self.scopes.last(),
            Some(name) => self.scopes.iter().rev().find(|scope| scope.answers_to(name)),
        };
        match scope {
            Some(scope) => resolve_segments(scope.element(), path),
            None => FieldValue::NotFound,
        }
    }
}
