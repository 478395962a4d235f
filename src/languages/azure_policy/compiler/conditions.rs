// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString as _};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{
    ConditionNode, CountExpr, CountSource, Effect, EffectSpec, Expr, ExpressionSlot, FieldPath,
    FieldRef, Function, Leaf, NodeKind, Operand, Operator, ParameterDefinition, PathSegment,
    SlotUsage, Subject, TemplateExpression,
};
use crate::languages::azure_policy::expressions::{
    classify, ExpressionParser, ParseErrorKind, TemplateString,
};
use crate::value::Value;

use super::error::CompileError;
use super::CompileOptions;

const COMBINATORS: [&str; 3] = ["allOf", "anyOf", "not"];
const SUBJECTS: [&str; 3] = ["field", "value", "count"];

// Count whose `where` clause is being compiled.
enum CountScope {
    Field(FieldPath),
    Value(Option<String>),
}

impl CountScope {
    // Scope name and the segments below the element that `name` refers to.
    fn resolve(&self, name: &str) -> Option<(String, Vec<PathSegment>)> {
        match *self {
            CountScope::Value(Some(ref own)) if own.eq_ignore_ascii_case(name) => {
                Some((own.clone(), Vec::new()))
            }
            CountScope::Value(_) => None,
            CountScope::Field(ref prefix) => {
                let path = FieldPath::parse(name).ok()?;
                let rest = path.strip_prefix(prefix)?;
                Some((prefix.as_str().to_string(), rest.to_vec()))
            }
        }
    }
}

/// Builds the condition tree and expression table of one rule.
pub(super) struct ConditionBuilder<'a> {
    options: &'a CompileOptions,
    parameters: &'a BTreeMap<String, ParameterDefinition>,
    expressions: Vec<TemplateExpression>,
    scopes: Vec<CountScope>,
    node_count: usize,
    max_depth: usize,
}

impl<'a> ConditionBuilder<'a> {
    pub(super) fn new(
        options: &'a CompileOptions,
        parameters: &'a BTreeMap<String, ParameterDefinition>,
    ) -> Self {
        Self {
            options,
            parameters,
            expressions: Vec::new(),
            scopes: Vec::new(),
            node_count: 0,
            max_depth: 0,
        }
    }

    /// Expression table, node count and depth of everything built so far.
    pub(super) fn finish(self) -> (Vec<TemplateExpression>, usize, usize) {
        (self.expressions, self.node_count, self.max_depth)
    }

    pub(super) fn condition(
        &mut self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<ConditionNode, CompileError> {
        // Checked before descending further so deep documents fail fast.
        if depth > self.options.max_depth {
            return Err(CompileError::too_complex(
                path,
                format!("condition depth exceeds the limit of {}", self.options.max_depth),
            ));
        }
        self.node_count = self.node_count.saturating_add(1);
        if self.node_count > self.options.max_nodes {
            return Err(CompileError::too_complex(
                path,
                format!("condition has more than {} nodes", self.options.max_nodes),
            ));
        }
        self.max_depth = self.max_depth.max(depth);

        let Value::Object(ref fields) = *value else {
            return Err(CompileError::malformed(
                path,
                format!("condition must be an object, found {}", value.type_name()),
            ));
        };

        let combinator = fields
            .iter()
            .find(|(k, _)| COMBINATORS.iter().any(|c| k.eq_ignore_ascii_case(c)));
        let kind = match combinator {
            Some((key, body)) => {
                if fields.len() > 1 {
                    return Err(CompileError::malformed(
                        path,
                        format!("`{key}` cannot be combined with other keys"),
                    ));
                }
                self.combinator(key, body, path, depth)?
            }
            None => NodeKind::Leaf(self.leaf(fields, path, depth)?),
        };

        Ok(ConditionNode {
            path: Arc::from(path),
            kind,
        })
    }

    fn combinator(
        &mut self,
        key: &str,
        body: &Value,
        path: &str,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let child_depth = depth.saturating_add(1);
        let body_path = format!("{path}.{key}");

        if key.eq_ignore_ascii_case("not") {
            if !matches!(*body, Value::Object(_)) {
                return Err(CompileError::malformed(
                    &body_path,
                    "`not` expects a single condition object",
                ));
            }
            let child = self.condition(body, &body_path, child_depth)?;
            return Ok(NodeKind::Not {
                child: Box::new(child),
            });
        }

        let Value::Array(ref items) = *body else {
            return Err(CompileError::malformed(
                &body_path,
                format!("`{key}` expects an array of conditions"),
            ));
        };
        let mut children = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            children.push(self.condition(item, &format!("{body_path}[{index}]"), child_depth)?);
        }

        if key.eq_ignore_ascii_case("allOf") {
            Ok(NodeKind::AllOf { children })
        } else {
            Ok(NodeKind::AnyOf { children })
        }
    }

    fn leaf(
        &mut self,
        fields: &BTreeMap<Arc<str>, Value>,
        path: &str,
        depth: usize,
    ) -> Result<Leaf, CompileError> {
        let mut subject = None;
        let mut operator = None;
        for (key, body) in fields.iter() {
            if SUBJECTS.iter().any(|s| key.eq_ignore_ascii_case(s)) {
                if subject.replace((key, body)).is_some() {
                    return Err(CompileError::malformed(
                        path,
                        "condition must have exactly one of `field`, `value` or `count`",
                    ));
                }
                continue;
            }
            let op = Operator::parse(key).ok_or_else(|| {
                CompileError::unsupported(path, format!("unknown operator `{key}`"))
            })?;
            if operator.replace((op, key, body)).is_some() {
                return Err(CompileError::malformed(
                    path,
                    "condition must have exactly one operator",
                ));
            }
        }

        let Some((subject_key, subject_body)) = subject else {
            return Err(CompileError::malformed(
                path,
                "condition needs one of `field`, `value` or `count`",
            ));
        };
        let Some((operator, operator_key, operand_body)) = operator else {
            return Err(CompileError::malformed(path, "condition has no operator"));
        };

        let subject = self.subject(subject_key, subject_body, path, depth)?;
        let operand_path = format!("{path}.{operator_key}");
        let operand = self.operand(operand_body, &operand_path)?;
        if let Operand::Literal(ref literal) = operand {
            check_literal(operator, literal, &operand_path)?;
        }

        Ok(Leaf {
            subject,
            operator,
            operand,
        })
    }

    fn subject(
        &mut self,
        key: &str,
        body: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Subject, CompileError> {
        let subject_path = format!("{path}.{key}");
        if key.eq_ignore_ascii_case("field") {
            self.field(body, &subject_path)
        } else if key.eq_ignore_ascii_case("value") {
            self.value(body, &subject_path)
        } else {
            let count = self.count(body, &subject_path, depth)?;
            Ok(Subject::Count(Box::new(count)))
        }
    }

    fn field(&mut self, body: &Value, path: &str) -> Result<Subject, CompileError> {
        let Value::String(ref raw) = *body else {
            return Err(CompileError::malformed(path, "`field` must be a string"));
        };
        match classify(raw) {
            TemplateString::Expression(source) => {
                let expr = self.parse(&source, path)?;
                Ok(Subject::BoundField(self.push(raw, expr, path, SlotUsage::Field)?))
            }
            TemplateString::Literal(text) => FieldRef::parse(&text)
                .map(Subject::Field)
                .map_err(|e| CompileError::malformed(path, e.to_string())),
        }
    }

    fn value(&mut self, body: &Value, path: &str) -> Result<Subject, CompileError> {
        if let Value::String(ref raw) = *body {
            if let TemplateString::Expression(source) = classify(raw) {
                let expr = self.parse(&source, path)?;
                if let Some((name, segments)) = current_reference(&expr) {
                    let (name, path) = self.current(name, segments, path)?;
                    return Ok(Subject::Current { name, path });
                }
                let slot = self.push(raw, expr, path, SlotUsage::Operand)?;
                return Ok(Subject::Value(Operand::Expression(slot)));
            }
        }
        Ok(Subject::Value(self.operand(body, path)?))
    }

    // Enclosing count scope that `current(name)` refers to, and the path below its element.
    fn current(
        &self,
        name: Option<String>,
        mut segments: Vec<PathSegment>,
        path: &str,
    ) -> Result<(Option<String>, Vec<PathSegment>), CompileError> {
        let Some(ref requested) = name else {
            if self.scopes.is_empty() {
                return Err(CompileError::malformed(
                    path,
                    "current() can only be used inside a count",
                ));
            }
            return Ok((None, segments));
        };

        let (scope_name, mut below) = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.resolve(requested))
            .ok_or_else(|| {
                CompileError::malformed(
                    path,
                    format!("current('{requested}') does not name an enclosing count"),
                )
            })?;
        below.append(&mut segments);
        Ok((Some(scope_name), below))
    }

    fn count(&mut self, body: &Value, path: &str, depth: usize) -> Result<CountExpr, CompileError> {
        let Value::Object(ref fields) = *body else {
            return Err(CompileError::malformed(path, "`count` must be an object"));
        };

        let mut field = None;
        let mut value = None;
        let mut name = None;
        let mut condition = None;
        for (key, item) in fields.iter() {
            match key.to_ascii_lowercase().as_str() {
                "field" => field = Some(item),
                "value" => value = Some(item),
                "name" => name = Some(item),
                "where" => condition = Some(item),
                _ => {
                    return Err(CompileError::malformed(
                        path,
                        format!("unexpected key `{key}` in count"),
                    ))
                }
            }
        }

        let (source, scope) = match (field, value) {
            (Some(field), None) => {
                let field_path = format!("{path}.field");
                if name.is_some() {
                    return Err(CompileError::malformed(
                        path,
                        "`name` is only allowed in value counts",
                    ));
                }
                let Value::String(ref raw) = *field else {
                    return Err(CompileError::malformed(&field_path, "`field` must be a string"));
                };
                if matches!(classify(raw), TemplateString::Expression(_)) {
                    return Err(CompileError::unsupported(
                        &field_path,
                        "count field cannot be an expression",
                    ));
                }
                let field = FieldRef::parse(raw)
                    .map_err(|e| CompileError::malformed(&field_path, e.to_string()))?;
                if !field.literal.has_wildcard() {
                    return Err(CompileError::malformed(
                        &field_path,
                        "count field must contain a `[*]` array path",
                    ));
                }
                let scope = CountScope::Field(field.literal.clone());
                (CountSource::Field(field), scope)
            }
            (None, Some(value)) => {
                let name = match name {
                    None => None,
                    Some(&Value::String(ref n)) if !n.is_empty() => Some(n.to_string()),
                    Some(_) => {
                        return Err(CompileError::malformed(
                            &format!("{path}.name"),
                            "count `name` must be a non-empty string",
                        ))
                    }
                };
                let value_path = format!("{path}.value");
                let operand = self.operand(value, &value_path)?;
                if let Operand::Literal(ref literal) = operand {
                    if !matches!(*literal, Value::Array(_)) {
                        return Err(CompileError::malformed(
                            &value_path,
                            format!("count value must be an array, found {}", literal.type_name()),
                        ));
                    }
                }
                (
                    CountSource::Value {
                        operand,
                        name: name.clone(),
                    },
                    CountScope::Value(name),
                )
            }
            _ => {
                return Err(CompileError::malformed(
                    path,
                    "count must have exactly one of `field` or `value`",
                ))
            }
        };

        let condition = match condition {
            None => None,
            Some(body) => {
                self.scopes.push(scope);
                let built = self.condition(body, &format!("{path}.where"), depth.saturating_add(1));
                let _ = self.scopes.pop();
                Some(built?)
            }
        };

        Ok(CountExpr { source, condition })
    }

    fn operand(&mut self, body: &Value, path: &str) -> Result<Operand, CompileError> {
        let Value::String(ref raw) = *body else {
            return Ok(Operand::Literal(body.clone()));
        };
        match classify(raw) {
            TemplateString::Expression(source) => {
                let expr = self.parse(&source, path)?;
                if let Some((name, segments)) = current_reference(&expr) {
                    let (name, path) = self.current(name, segments, path)?;
                    return Ok(Operand::Current { name, path });
                }
                Ok(Operand::Expression(self.push(raw, expr, path, SlotUsage::Operand)?))
            }
            TemplateString::Literal(text) => Ok(Operand::Literal(Value::from(text))),
        }
    }

    /// Compile `then.effect`.
    pub(super) fn effect(&mut self, body: &Value, path: &str) -> Result<EffectSpec, CompileError> {
        let Value::String(ref raw) = *body else {
            return Err(CompileError::malformed(
                path,
                format!("effect must be a string, found {}", body.type_name()),
            ));
        };
        match classify(raw) {
            TemplateString::Expression(source) => {
                let expr = self.parse(&source, path)?;
                Ok(EffectSpec::Expression(self.push(raw, expr, path, SlotUsage::Effect)?))
            }
            TemplateString::Literal(name) => Effect::parse(&name)
                .map(EffectSpec::Literal)
                .ok_or_else(|| CompileError::unsupported(path, format!("unknown effect `{name}`"))),
        }
    }

    fn parse(&self, body: &str, path: &str) -> Result<Expr, CompileError> {
        ExpressionParser::parse_with_max_depth(body, self.options.max_expression_depth).map_err(
            |e| match e.kind {
                ParseErrorKind::Syntax => CompileError::malformed(path, e.to_string()),
                ParseErrorKind::Unsupported => CompileError::unsupported(path, e.to_string()),
                ParseErrorKind::TooDeep => CompileError::too_complex(path, e.to_string()),
            },
        )
    }

    // Validates an expression and appends it to the expression table.
    fn push(
        &mut self,
        source: &str,
        expr: Expr,
        path: &str,
        usage: SlotUsage,
    ) -> Result<ExpressionSlot, CompileError> {
        let mut checked = Ok(());
        expr.for_each_call(&mut |function, arguments| {
            if checked.is_ok() {
                checked = self.check_call(function, arguments, path);
            }
        });
        checked?;

        self.expressions.push(TemplateExpression {
            source: source.to_string(),
            path: path.to_string(),
            usage,
            expr,
        });
        Ok(self.expressions.len().saturating_sub(1))
    }

    fn check_call(
        &self,
        function: Function,
        arguments: &[Expr],
        path: &str,
    ) -> Result<(), CompileError> {
        let (min, max) = function.arity();
        let count = arguments.len();
        if count < min || max.is_some_and(|max| count > max) {
            let expected = match max {
                Some(max) if max == min => format!("{min}"),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(CompileError::malformed(
                path,
                format!(
                    "{}() takes {expected} arguments, found {count}",
                    function.name()
                ),
            ));
        }

        match function {
            Function::Parameters => {
                let name = arguments
                    .first()
                    .and_then(Expr::as_str_literal)
                    .ok_or_else(|| {
                        CompileError::malformed(path, "parameters() expects a literal parameter name")
                    })?;
                if !self.parameters.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                    return Err(CompileError::UndeclaredParameter {
                        name: name.to_string(),
                        path: path.to_string(),
                    });
                }
                Ok(())
            }
            Function::Current => Err(CompileError::malformed(
                path,
                "current() cannot be combined with other functions",
            )),
            _ => Ok(()),
        }
    }
}

// `current()` or `current('name')`, optionally followed by member and index access.
fn current_reference(expr: &Expr) -> Option<(Option<String>, Vec<PathSegment>)> {
    match *expr {
        Expr::Call {
            function: Function::Current,
            ref arguments,
        } => match arguments.as_slice() {
            [] => Some((None, Vec::new())),
            [name] => name
                .as_str_literal()
                .map(|n| (Some(n.to_string()), Vec::new())),
            _ => None,
        },
        Expr::Member {
            ref object,
            ref property,
        } => {
            let (name, mut path) = current_reference(object)?;
            path.push(PathSegment::Key(property.clone()));
            Some((name, path))
        }
        Expr::Index {
            ref object,
            ref index,
        } => {
            let (name, mut path) = current_reference(object)?;
            let segment = match **index {
                Expr::Literal {
                    value: Value::String(ref key),
                } => PathSegment::Key(key.to_string()),
                Expr::Literal {
                    value: Value::Number(ref n),
                } => PathSegment::Index(usize::try_from(n.as_u64()?).ok()?),
                _ => return None,
            };
            path.push(segment);
            Some((name, path))
        }
        _ => None,
    }
}

fn check_literal(operator: Operator, literal: &Value, path: &str) -> Result<(), CompileError> {
    let (valid, expected) = match operator {
        Operator::Exists => (
            match *literal {
                Value::Bool(_) => true,
                Value::String(ref s) => {
                    s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
                }
                _ => false,
            },
            "true or false",
        ),
        Operator::In | Operator::NotIn => (matches!(*literal, Value::Array(_)), "an array"),
        Operator::Like
        | Operator::NotLike
        | Operator::Match
        | Operator::NotMatch
        | Operator::MatchInsensitively
        | Operator::NotMatchInsensitively => (matches!(*literal, Value::String(_)), "a string"),
        _ => (true, ""),
    };
    if valid {
        return Ok(());
    }
    Err(CompileError::malformed(
        path,
        format!(
            "`{}` expects {expected}, found {}",
            operator.name(),
            literal.type_name()
        ),
    ))
}
