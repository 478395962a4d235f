// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::string::String;

/// Error raised while compiling a rule document.
///
/// Compile errors are not retryable: the document itself must be fixed.
/// Every variant names the location in the document that caused it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The document is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Structure is invalid or ambiguous.
    #[error("malformed rule at `{path}`: {message}")]
    MalformedRule { path: String, message: String },
    /// Well formed but uses an operator, function, mode or effect that is not supported.
    #[error("unsupported construct at `{path}`: {message}")]
    UnsupportedConstruct { path: String, message: String },
    /// Condition tree exceeds the configured depth or node count.
    #[error("rule too complex at `{path}`: {message}")]
    RuleTooComplex { path: String, message: String },
    /// An expression references a parameter that is not declared.
    #[error("undeclared parameter `{name}` referenced at `{path}`")]
    UndeclaredParameter { name: String, path: String },
}

impl CompileError {
    pub(crate) fn malformed(path: &str, message: impl Into<String>) -> Self {
        CompileError::MalformedRule {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(path: &str, message: impl Into<String>) -> Self {
        CompileError::UnsupportedConstruct {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn too_complex(path: &str, message: impl Into<String>) -> Self {
        CompileError::RuleTooComplex {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Document location the error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match *self {
            CompileError::InvalidJson(_) => None,
            CompileError::MalformedRule { ref path, .. }
            | CompileError::UnsupportedConstruct { ref path, .. }
            | CompileError::RuleTooComplex { ref path, .. }
            | CompileError::UndeclaredParameter { ref path, .. } => Some(path),
        }
    }
}

impl From<serde_json::Error> for CompileError {
    fn from(error: serde_json::Error) -> Self {
        CompileError::InvalidJson(alloc::format!("{error}"))
    }
}
