// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

macro_rules! policy_operators {
    ($( $variant:ident => { name: $name:literal, negates: $negates:expr } ),* $(,)?) => {
        impl Operator {
            /// Parse a condition operator key. Keys are matched case-insensitively.
            pub fn parse(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($name) {
                        return Some(Self::$variant);
                    }
                )*
                None
            }

            /// Operator key as written in rule documents.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Positive operator this one negates, if any.
            pub const fn negates(self) -> Option<Self> {
                match self {
                    $( Self::$variant => $negates, )*
                }
            }
        }
    };
}

/// Leaf condition operator.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    Like,
    NotLike,
    Match,
    NotMatch,
    MatchInsensitively,
    NotMatchInsensitively,
    Contains,
    NotContains,
    In,
    NotIn,
    ContainsKey,
    NotContainsKey,
    Less,
    LessOrEquals,
    Greater,
    GreaterOrEquals,
    Exists,
}

policy_operators! {
    Equals => { name: "equals", negates: None },
    NotEquals => { name: "notEquals", negates: Some(Operator::Equals) },
    Like => { name: "like", negates: None },
    NotLike => { name: "notLike", negates: Some(Operator::Like) },
    Match => { name: "match", negates: None },
    NotMatch => { name: "notMatch", negates: Some(Operator::Match) },
    MatchInsensitively => { name: "matchInsensitively", negates: None },
    NotMatchInsensitively => { name: "notMatchInsensitively", negates: Some(Operator::MatchInsensitively) },
    Contains => { name: "contains", negates: None },
    NotContains => { name: "notContains", negates: Some(Operator::Contains) },
    In => { name: "in", negates: None },
    NotIn => { name: "notIn", negates: Some(Operator::In) },
    ContainsKey => { name: "containsKey", negates: None },
    NotContainsKey => { name: "notContainsKey", negates: Some(Operator::ContainsKey) },
    Less => { name: "less", negates: None },
    LessOrEquals => { name: "lessOrEquals", negates: None },
    Greater => { name: "greater", negates: None },
    GreaterOrEquals => { name: "greaterOrEquals", negates: None },
    Exists => { name: "exists", negates: None },
}
