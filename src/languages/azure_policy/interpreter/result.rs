// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::languages::azure_policy::ast::{Effect, NodeKind};

/// Kind of a traced condition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceKind {
    Leaf,
    AllOf,
    AnyOf,
    Not,
}

impl From<&NodeKind> for TraceKind {
    fn from(kind: &NodeKind) -> Self {
        match *kind {
            NodeKind::Leaf(_) => TraceKind::Leaf,
            NodeKind::AllOf { .. } => TraceKind::AllOf,
            NodeKind::AnyOf { .. } => TraceKind::AnyOf,
            NodeKind::Not { .. } => TraceKind::Not,
        }
    }
}

/// Outcome of one evaluated condition node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub path: Arc<str>,
    pub kind: TraceKind,
    pub outcome: bool,
}

/// Verdict for one rule against one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub compliant: bool,
    /// False when the rule's mode excludes the resource.
    pub applicable: bool,
    /// Outcome of the rule's `if` condition.
    pub matched: bool,
    pub matched_effect: Effect,
    /// Evaluated nodes in completion order, children before parents.
    pub trace: Vec<TraceEntry>,
}

impl EvaluationResult {
    pub(crate) const fn skipped(effect: Effect) -> Self {
        Self {
            compliant: true,
            applicable: true,
            matched: false,
            matched_effect: effect,
            trace: Vec::new(),
        }
    }

    pub(crate) const fn not_applicable(effect: Effect) -> Self {
        Self {
            compliant: true,
            applicable: false,
            matched: false,
            matched_effect: effect,
            trace: Vec::new(),
        }
    }
}

/// An evaluation that panicked inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("evaluation of item {index} failed: {message}")]
pub struct EvaluationFault {
    /// Position of the resource (or rule) in the batch input.
    pub index: usize,
    pub message: String,
}
