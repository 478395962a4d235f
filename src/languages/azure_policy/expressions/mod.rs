// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Template expressions (`[parameters('effect')]`, `[concat(...)]`).
//!
//! Expressions are parsed once at compile time and evaluated once per
//! assignment by the binder. Their only references are parameters and a
//! fixed function set.

mod error;
mod functions;
mod parser;


pub use error::{ExpressionEvalError, ExpressionParseError, ParseErrorKind};
pub use functions::{ExpressionEvaluator, ParameterLookup};
pub use parser::{
    classify, parse_expression, ExpressionParser, TemplateString, DEFAULT_MAX_EXPRESSION_DEPTH,
};
