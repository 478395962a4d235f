// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Rule compiler.
//!
//! Turns a policy definition document into an immutable [`RuleDocument`].
//! All structural validation happens here so that evaluation never fails.
//! Error paths are relative to the definition's `properties` object, e.g.
//! `policyRule.if.allOf[2]`.

mod conditions;
mod error;
mod parameters;

#[cfg(test)]
mod tests;

pub use error::CompileError;

use alloc::format;
use alloc::string::{String, ToString as _};

use serde::{Deserialize, Serialize};

use crate::languages::azure_policy::ast::{PolicyMode, RuleDocument};
use crate::languages::azure_policy::expressions::DEFAULT_MAX_EXPRESSION_DEPTH;
use crate::value::Value;

use conditions::ConditionBuilder;

/// Limits applied while compiling a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CompileOptions {
    /// Maximum nesting depth of the condition tree. The root is at depth 1.
    pub max_depth: usize,
    /// Maximum number of condition nodes, including `count` where clauses.
    pub max_nodes: usize,
    /// Maximum nesting of calls, member accesses and indexes inside a
    /// single template expression.
    pub max_expression_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 2048,
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
        }
    }
}

/// Policy rule compiler.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.options.max_nodes = max_nodes;
        self
    }

    pub fn with_max_expression_depth(mut self, max_expression_depth: usize) -> Self {
        self.options.max_expression_depth = max_expression_depth;
        self
    }

    pub const fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a definition from JSON text.
    pub fn compile_str(&self, text: &str) -> Result<RuleDocument, CompileError> {
        let document: Value = serde_json::from_str(text)?;
        self.compile(&document)
    }

    /// Compile an already parsed definition.
    ///
    /// Accepts both the full definition shape (`{"name", "properties": {...}}`)
    /// and the bare `properties` object.
    pub fn compile(&self, document: &Value) -> Result<RuleDocument, CompileError> {
        let (id, properties) = split_definition(document)?;

        let display_name = match properties.get_ignore_case("displayName") {
            Some(Value::String(name)) => name.to_string(),
            Some(other) => {
                return Err(CompileError::malformed(
                    "displayName",
                    format!("expected a string, found {}", other.type_name()),
                ))
            }
            None => return Err(CompileError::malformed("displayName", "missing `displayName`")),
        };

        let description = match properties.get_ignore_case("description") {
            Some(Value::String(text)) => Some(text.to_string()),
            _ => None,
        };

        let mode = match properties.get_ignore_case("mode") {
            None | Some(Value::Null) => PolicyMode::default(),
            Some(Value::String(name)) => PolicyMode::parse(name).ok_or_else(|| {
                CompileError::unsupported("mode", format!("unsupported mode `{name}`"))
            })?,
            Some(other) => {
                return Err(CompileError::malformed(
                    "mode",
                    format!("expected a string, found {}", other.type_name()),
                ))
            }
        };

        let parameters = parameters::compile_parameters(properties.get_ignore_case("parameters"))?;

        let rule = required_object(properties, "policyRule", "policyRule")?;
        let condition = rule
            .get_ignore_case("if")
            .ok_or_else(|| CompileError::malformed("policyRule.if", "missing `if`"))?;
        let then = required_object(rule, "then", "policyRule.then")?;
        let effect = then.get_ignore_case("effect").ok_or_else(|| {
            CompileError::malformed("policyRule.then.effect", "missing `effect`")
        })?;

        let mut builder = ConditionBuilder::new(&self.options, &parameters);
        let condition = builder.condition(condition, "policyRule.if", 1)?;
        let effect = builder.effect(effect, "policyRule.then.effect")?;
        let (expressions, node_count, max_depth) = builder.finish();

        tracing::debug!(
            display_name = %display_name,
            nodes = node_count,
            depth = max_depth,
            expressions = expressions.len(),
            "compiled policy rule"
        );

        Ok(RuleDocument {
            id,
            display_name,
            description,
            mode,
            parameters,
            condition,
            effect,
            details: then.get_ignore_case("details").cloned(),
            expressions,
            node_count,
            max_depth,
        })
    }
}

/// Compile a definition from JSON text with default limits.
pub fn compile(text: &str) -> Result<RuleDocument, CompileError> {
    Compiler::default().compile_str(text)
}

/// Compile an already parsed definition with default limits.
pub fn compile_value(document: &Value) -> Result<RuleDocument, CompileError> {
    Compiler::default().compile(document)
}

// Returns the definition id (if any) and its `properties` object.
fn split_definition(document: &Value) -> Result<(Option<String>, &Value), CompileError> {
    if !matches!(*document, Value::Object(_)) {
        return Err(CompileError::malformed(
            "$",
            format!("definition must be an object, found {}", document.type_name()),
        ));
    }
    if document.get_ignore_case("policyRule").is_some() {
        return Ok((None, document));
    }
    match document.get_ignore_case("properties") {
        Some(properties @ Value::Object(_)) => {
            let id = ["id", "name"]
                .iter()
                .find_map(|key| match document.get_ignore_case(key) {
                    Some(Value::String(s)) => Some(s.to_string()),
                    _ => None,
                });
            Ok((id, properties))
        }
        _ => Ok((None, document)),
    }
}

fn required_object<'v>(parent: &'v Value, key: &str, path: &str) -> Result<&'v Value, CompileError> {
    match parent.get_ignore_case(key) {
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(CompileError::malformed(
            path,
            format!("expected an object, found {}", other.type_name()),
        )),
        None => Err(CompileError::malformed(path, format!("missing `{key}`"))),
    }
}
