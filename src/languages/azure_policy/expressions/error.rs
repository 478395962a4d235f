// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::string::String;

/// What went wrong while parsing a template expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The text is not a well formed expression.
    Syntax,
    /// Well formed, but uses something this evaluator does not implement,
    /// such as an unknown function.
    Unsupported,
    /// Nesting exceeds the parser's depth limit.
    TooDeep,
}

/// Error produced while parsing a template expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct ExpressionParseError {
    pub message: String,
    pub offset: usize,
    pub kind: ParseErrorKind,
}

impl ExpressionParseError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self::with_kind(message, offset, ParseErrorKind::Syntax)
    }

    pub(crate) fn unsupported(message: impl Into<String>, offset: usize) -> Self {
        Self::with_kind(message, offset, ParseErrorKind::Unsupported)
    }

    pub(crate) fn too_deep(message: impl Into<String>, offset: usize) -> Self {
        Self::with_kind(message, offset, ParseErrorKind::TooDeep)
    }

    fn with_kind(message: impl Into<String>, offset: usize, kind: ParseErrorKind) -> Self {
        Self {
            message: message.into(),
            offset,
            kind,
        }
    }
}

/// Error produced while evaluating a template expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExpressionEvalError {
    message: String,
}

impl ExpressionEvalError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
