// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{Expr, Function};
use crate::value::Value;

use super::error::ExpressionEvalError;

/// Source of parameter values for expression evaluation.
pub trait ParameterLookup {
    fn parameter(&self, name: &str) -> Option<&Value>;
}

impl ParameterLookup for BTreeMap<String, Value> {
    fn parameter(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
}

/// Evaluates template expressions against bound parameter values.
pub struct ExpressionEvaluator<'a> {
    parameters: &'a dyn ParameterLookup,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(parameters: &'a dyn ParameterLookup) -> Self {
        Self { parameters }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, ExpressionEvalError> {
        match *expr {
            Expr::Literal { ref value } => Ok(value.clone()),
            Expr::Call {
                function,
                ref arguments,
            } => self.call(function, arguments),
            Expr::Member {
                ref object,
                ref property,
            } => {
                let object = self.evaluate(object)?;
                object.get_ignore_case(property).cloned().ok_or_else(|| {
                    ExpressionEvalError::new(format!(
                        "property `{property}` does not exist on {}",
                        object.type_name()
                    ))
                })
            }
            Expr::Index {
                ref object,
                ref index,
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                match (&object, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or_else(|| ExpressionEvalError::new(format!("index {n} out of range"))),
                    (Value::Object(_), Value::String(key)) => {
                        object.get_ignore_case(key).cloned().ok_or_else(|| {
                            ExpressionEvalError::new(format!("property `{key}` does not exist"))
                        })
                    }
                    _ => Err(ExpressionEvalError::new(format!(
                        "cannot index {} with {}",
                        object.type_name(),
                        index.type_name()
                    ))),
                }
            }
        }
    }

    // Arguments are evaluated on demand: `if` only evaluates the branch it
    // takes and `and`/`or` stop at the first deciding argument.
    fn call(&self, function: Function, arguments: &[Expr]) -> Result<Value, ExpressionEvalError> {
        let arg = |index: usize| self.argument(function, arguments, index);
        match function {
            Function::Parameters => {
                let name = arg(0)?;
                let name = as_str(function, &name)?;
                self.parameters
                    .parameter(name)
                    .cloned()
                    .ok_or_else(|| ExpressionEvalError::new(format!("parameter `{name}` is not bound")))
            }
            Function::Current => Err(ExpressionEvalError::new(
                "current() refers to a count element and cannot be evaluated at assignment time",
            )),
            Function::Concat => concat(&self.arguments(arguments)?),
            Function::ToLower => Ok(Value::from(as_str(function, &arg(0)?)?.to_lowercase())),
            Function::ToUpper => Ok(Value::from(as_str(function, &arg(0)?)?.to_uppercase())),
            Function::If => {
                let condition = as_bool(function, &arg(0)?)?;
                arg(if condition { 1 } else { 2 })
            }
            Function::Equals => Ok(Value::Bool(arg(0)? == arg(1)?)),
            Function::Not => Ok(Value::Bool(!as_bool(function, &arg(0)?)?)),
            Function::And | Function::Or => {
                let decisive = function == Function::Or;
                for argument in arguments {
                    if as_bool(function, &self.evaluate(argument)?)? == decisive {
                        return Ok(Value::Bool(decisive));
                    }
                }
                Ok(Value::Bool(!decisive))
            }
            Function::Empty => Ok(Value::Bool(match arg(0)? {
                Value::Null => true,
                Value::String(ref s) => s.is_empty(),
                Value::Array(ref a) => a.is_empty(),
                Value::Object(ref o) => o.is_empty(),
                _ => false,
            })),
            Function::Length => match arg(0)? {
                Value::String(ref s) => Ok(Value::from(s.chars().count())),
                Value::Array(ref a) => Ok(Value::from(a.len())),
                Value::Object(ref o) => Ok(Value::from(o.len())),
                ref other => Err(type_error(function, "string, array or object", other)),
            },
            Function::Contains => {
                let container = arg(0)?;
                let item = arg(1)?;
                match container {
                    Value::String(ref s) => Ok(Value::Bool(s.contains(as_text(&item).as_str()))),
                    Value::Array(ref a) => Ok(Value::Bool(a.contains(&item))),
                    Value::Object(_) => Ok(Value::Bool(
                        container.get_ignore_case(as_str(function, &item)?).is_some(),
                    )),
                    ref other => Err(type_error(function, "string, array or object", other)),
                }
            }
            Function::StartsWith | Function::EndsWith => {
                let value = as_str(function, &arg(0)?)?.to_ascii_lowercase();
                let affix = as_str(function, &arg(1)?)?.to_ascii_lowercase();
                Ok(Value::Bool(if function == Function::StartsWith {
                    value.starts_with(&affix)
                } else {
                    value.ends_with(&affix)
                }))
            }
            Function::String => Ok(Value::from(as_text(&arg(0)?))),
            Function::Int => match arg(0)? {
                Value::Number(ref n) => n
                    .as_i64()
                    .map(Value::from)
                    .ok_or_else(|| ExpressionEvalError::new(format!("int: {n} is not integral"))),
                Value::String(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| ExpressionEvalError::new(format!("int: `{s}` is not an integer"))),
                ref other => Err(type_error(function, "number or string", other)),
            },
            Function::Bool => match arg(0)? {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::Number(ref n) => Ok(Value::Bool(n.as_f64() != 0.0)),
                Value::String(ref s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(ref s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                ref other => Err(type_error(function, "boolean, number or boolean string", other)),
            },
            Function::Split => {
                let value = arg(0)?;
                let value = as_str(function, &value)?;
                let delimiters: Vec<String> = match arg(1)? {
                    Value::String(ref d) => alloc::vec![d.to_string()],
                    Value::Array(ref list) => list
                        .iter()
                        .map(|d| as_str(function, d).map(|s| s.to_string()))
                        .collect::<Result<_, _>>()?,
                    ref other => return Err(type_error(function, "string or array", other)),
                };
                Ok(Value::from(
                    split_any(value, &delimiters)
                        .into_iter()
                        .map(Value::from)
                        .collect::<Vec<_>>(),
                ))
            }
            Function::Replace => {
                let (value, old, new) = (arg(0)?, arg(1)?, arg(2)?);
                let value = as_str(function, &value)?;
                let old = as_str(function, &old)?;
                let new = as_str(function, &new)?;
                if old.is_empty() {
                    return Ok(Value::from(value));
                }
                Ok(Value::from(value.replace(old, new)))
            }
            Function::CreateArray => Ok(Value::from(self.arguments(arguments)?)),
            Function::First | Function::Last => {
                let first = function == Function::First;
                match arg(0)? {
                    Value::Array(ref a) => {
                        let item = if first { a.first() } else { a.last() };
                        Ok(item.cloned().unwrap_or(Value::Null))
                    }
                    Value::String(ref s) => {
                        let c = if first { s.chars().next() } else { s.chars().last() };
                        Ok(Value::from(c.map(String::from).unwrap_or_default()))
                    }
                    ref other => Err(type_error(function, "array or string", other)),
                }
            }
            Function::Union => union(&self.arguments(arguments)?),
        }
    }

    fn argument(
        &self,
        function: Function,
        arguments: &[Expr],
        index: usize,
    ) -> Result<Value, ExpressionEvalError> {
        let argument = arguments.get(index).ok_or_else(|| {
            ExpressionEvalError::new(format!(
                "{} expects at least {} arguments",
                function.name(),
                index.saturating_add(1)
            ))
        })?;
        self.evaluate(argument)
    }

    fn arguments(&self, arguments: &[Expr]) -> Result<Vec<Value>, ExpressionEvalError> {
        arguments.iter().map(|a| self.evaluate(a)).collect()
    }
}

fn type_error(function: Function, expected: &str, actual: &Value) -> ExpressionEvalError {
    ExpressionEvalError::new(format!(
        "{} expects {expected}, got {}",
        function.name(),
        actual.type_name()
    ))
}

fn as_str(function: Function, value: &Value) -> Result<&str, ExpressionEvalError> {
    match *value {
        Value::String(ref s) => Ok(s.as_ref()),
        ref other => Err(type_error(function, "string", other)),
    }
}

fn as_bool(function: Function, value: &Value) -> Result<bool, ExpressionEvalError> {
    match *value {
        Value::Bool(b) => Ok(b),
        ref other => Err(type_error(function, "boolean", other)),
    }
}

// Text form used by concat() and string(): strings verbatim, everything else as JSON.
fn as_text(value: &Value) -> String {
    match *value {
        Value::String(ref s) => s.to_string(),
        Value::Number(ref n) => n.format_decimal(),
        ref other => other.to_string(),
    }
}

fn concat(args: &[Value]) -> Result<Value, ExpressionEvalError> {
    if !args.is_empty() && args.iter().all(|a| matches!(a, Value::Array(_))) {
        let mut items = Vec::new();
        for value in args {
            if let Value::Array(ref a) = *value {
                items.extend(a.iter().cloned());
            }
        }
        return Ok(Value::from(items));
    }
    let mut text = String::new();
    for value in args {
        match *value {
            Value::Array(_) | Value::Object(_) => {
                return Err(ExpressionEvalError::new(
                    "concat cannot mix strings with arrays or objects",
                ))
            }
            ref scalar => text.push_str(&as_text(scalar)),
        }
    }
    Ok(Value::from(text))
}

fn union(args: &[Value]) -> Result<Value, ExpressionEvalError> {
    if args.iter().all(|a| matches!(a, Value::Array(_))) {
        let mut items: Vec<Value> = Vec::new();
        for value in args {
            if let Value::Array(ref a) = *value {
                for item in a.iter() {
                    if !items.contains(item) {
                        items.push(item.clone());
                    }
                }
            }
        }
        return Ok(Value::from(items));
    }
    if args.iter().all(|a| matches!(a, Value::Object(_))) {
        let mut merged = BTreeMap::new();
        for value in args {
            if let Value::Object(ref o) = *value {
                for (k, v) in o.iter() {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        return Ok(Value::from(merged));
    }
    Err(ExpressionEvalError::new(
        "union expects all arguments to be arrays or all to be objects",
    ))
}

fn split_any(value: &str, delimiters: &[String]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = value;
    loop {
        let next = delimiters
            .iter()
            .filter(|d| !d.is_empty())
            .filter_map(|d| rest.find(d.as_str()).map(|idx| (idx, d.len())))
            .min_by_key(|&(idx, _)| idx);
        match next {
            Some((idx, len)) => {
                parts.push(rest[..idx].to_string());
                rest = &rest[idx.saturating_add(len)..];
            }
            None => {
                parts.push(rest.to_string());
                return parts;
            }
        }
    }
}
