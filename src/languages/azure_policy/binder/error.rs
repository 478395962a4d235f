// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::string::String;

use crate::languages::azure_policy::ast::ParameterType;

/// Error raised while binding assignment parameters to a compiled rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("parameter `{name}` has no value and no default")]
    MissingParameter { name: String },
    #[error("parameter `{name}` expects {expected}, got {actual}")]
    ParameterTypeMismatch {
        name: String,
        expected: ParameterType,
        actual: &'static str,
    },
    #[error("value {value} is not allowed for parameter `{name}`")]
    ParameterValueNotAllowed { name: String, value: String },
    #[error("parameter `{name}` is not declared by the rule")]
    UnknownParameter { name: String },
    #[error("expression `{expression}` at `{path}` failed: {message}")]
    ExpressionFailed {
        path: String,
        expression: String,
        message: String,
    },
    #[error("parameter values must be an object, got {actual}")]
    InvalidParameterValues { actual: &'static str },
    #[error("`{value}` at `{path}` is not a valid effect")]
    InvalidEffect { path: String, value: String },
}
