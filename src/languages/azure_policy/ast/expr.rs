// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::value::Value;

macro_rules! template_functions {
    ($( $variant:ident => { name: $name:literal, arity: ($min:expr, $max:expr) } ),* $(,)?) => {
        impl Function {
            /// Parse a template function name. Names are case-insensitive.
            pub fn parse(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($name) {
                        return Some(Self::$variant);
                    }
                )*
                None
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Accepted argument count range. `None` as maximum means variadic.
            pub const fn arity(self) -> (usize, Option<usize>) {
                match self {
                    $( Self::$variant => ($min, $max), )*
                }
            }
        }
    };
}

/// Functions available inside `[...]` template expressions.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Parameters,
    Current,
    Concat,
    ToLower,
    ToUpper,
    If,
    Equals,
    Not,
    And,
    Or,
    Empty,
    Length,
    Contains,
    StartsWith,
    EndsWith,
    String,
    Int,
    Bool,
    Split,
    Replace,
    CreateArray,
    First,
    Last,
    Union,
}

template_functions! {
    Parameters => { name: "parameters", arity: (1, Some(1)) },
    Current => { name: "current", arity: (0, Some(1)) },
    Concat => { name: "concat", arity: (1, None) },
    ToLower => { name: "toLower", arity: (1, Some(1)) },
    ToUpper => { name: "toUpper", arity: (1, Some(1)) },
    If => { name: "if", arity: (3, Some(3)) },
    Equals => { name: "equals", arity: (2, Some(2)) },
    Not => { name: "not", arity: (1, Some(1)) },
    And => { name: "and", arity: (2, None) },
    Or => { name: "or", arity: (2, None) },
    Empty => { name: "empty", arity: (1, Some(1)) },
    Length => { name: "length", arity: (1, Some(1)) },
    Contains => { name: "contains", arity: (2, Some(2)) },
    StartsWith => { name: "startsWith", arity: (2, Some(2)) },
    EndsWith => { name: "endsWith", arity: (2, Some(2)) },
    String => { name: "string", arity: (1, Some(1)) },
    Int => { name: "int", arity: (1, Some(1)) },
    Bool => { name: "bool", arity: (1, Some(1)) },
    Split => { name: "split", arity: (2, Some(2)) },
    Replace => { name: "replace", arity: (3, Some(3)) },
    CreateArray => { name: "createArray", arity: (0, None) },
    First => { name: "first", arity: (1, Some(1)) },
    Last => { name: "last", arity: (1, Some(1)) },
    Union => { name: "union", arity: (1, None) },
}

/// Template expression AST, e.g. `[concat('tags[', parameters('tagName'), ']')]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Call {
        function: Function,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    /// Visit every function call in the expression, outermost first.
    pub fn for_each_call<'a>(&'a self, f: &mut dyn FnMut(Function, &'a [Expr])) {
        match *self {
            Expr::Literal { .. } => {}
            Expr::Call {
                function,
                ref arguments,
            } => {
                f(function, arguments);
                for arg in arguments {
                    arg.for_each_call(f);
                }
            }
            Expr::Member { ref object, .. } => object.for_each_call(f),
            Expr::Index {
                ref object,
                ref index,
            } => {
                object.for_each_call(f);
                index.for_each_call(f);
            }
        }
    }

    /// String literal payload, if this is one.
    pub fn as_str_literal(&self) -> Option<&str> {
        match *self {
            Expr::Literal {
                value: Value::String(ref s),
            } => Some(s.as_ref()),
            _ => None,
        }
    }
}
