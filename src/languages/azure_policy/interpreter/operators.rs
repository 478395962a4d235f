// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp::Ordering;

use crate::languages::azure_policy::ast::Operator;
use crate::languages::azure_policy::resolver::FieldValue;
use crate::value::Value;

use super::patterns;

/// Apply `operator` to a resolved field.
///
/// A missing field satisfies only the negated operators and `exists: false`.
/// A wildcard field satisfies the operator when any element does.
pub(super) fn evaluate_field(operator: Operator, value: &FieldValue<'_>, operand: &Value) -> bool {
    match *value {
        FieldValue::NotFound => match operator {
            Operator::Exists => !exists_operand(operand),
            _ => operator.negates().is_some(),
        },
        FieldValue::Found(value) => evaluate(operator, value, operand),
        FieldValue::Many(ref items) => match operator {
            Operator::Exists => items.is_empty() != exists_operand(operand),
            _ => items.iter().any(|item| evaluate(operator, item, operand)),
        },
    }
}

/// Apply `operator` to a present value.
pub(super) fn evaluate(operator: Operator, value: &Value, operand: &Value) -> bool {
    if let Some(positive) = operator.negates() {
        return !evaluate(positive, value, operand);
    }

    match operator {
        Operator::Equals => loose_equals(value, operand),
        Operator::Like => match (value, operand) {
            (Value::String(value), Value::String(pattern)) => patterns::like(value, pattern),
            _ => false,
        },
        Operator::Match | Operator::MatchInsensitively => match (value, operand) {
            (Value::String(value), Value::String(pattern)) => {
                patterns::matches(value, pattern, operator == Operator::Match)
            }
            _ => false,
        },
        Operator::Contains => match *value {
            Value::String(ref text) => match *operand {
                Value::String(ref needle) => text.contains(&**needle),
                _ => false,
            },
            Value::Array(ref items) => items.iter().any(|item| loose_equals(item, operand)),
            _ => false,
        },
        Operator::In => match *operand {
            Value::Array(ref items) => items.iter().any(|item| loose_equals(value, item)),
            _ => false,
        },
        Operator::ContainsKey => match *operand {
            Value::String(ref key) => {
                matches!(*value, Value::Object(_)) && value.get_ignore_case(key).is_some()
            }
            _ => false,
        },
        Operator::Less => compare(value, operand) == Some(Ordering::Less),
        Operator::LessOrEquals => matches!(
            compare(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Greater => compare(value, operand) == Some(Ordering::Greater),
        Operator::GreaterOrEquals => matches!(
            compare(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Exists => exists_operand(operand),
        // Negated operators were reduced above.
        Operator::NotEquals
        | Operator::NotLike
        | Operator::NotMatch
        | Operator::NotMatchInsensitively
        | Operator::NotContains
        | Operator::NotIn
        | Operator::NotContainsKey => false,
    }
}

/// Equality used by `equals`, `in` and array `contains`.
///
/// Numbers compare by value and booleans equal the strings `"true"` and
/// `"false"`. Strings are compared case-sensitively.
pub(super) fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            bool_text(s) == Some(*b)
        }
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| loose_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, x)| b.get(k).is_some_and(|y| loose_equals(x, y)))
        }
        _ => left == right,
    }
}

/// Expected presence for `exists`.
pub(super) fn exists_operand(operand: &Value) -> bool {
    match *operand {
        Value::Bool(b) => b,
        Value::String(ref s) => bool_text(s).unwrap_or(false),
        _ => false,
    }
}

fn bool_text(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// Numbers compare numerically and strings ordinally; anything else is unordered.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        _ => None,
    }
}
