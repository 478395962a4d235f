// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

extern crate alloc;

pub mod languages;
mod number;
mod value;

pub use number::Number;
pub use value::Value;

pub use languages::azure_policy::ast::{Effect, PolicyMode, RuleDocument};
pub use languages::azure_policy::batch::{evaluate_batch, evaluate_rules, BatchEntry};
pub use languages::azure_policy::binder::{bind, BindError, BoundRule};
pub use languages::azure_policy::cache::{ContentHash, RuleCache};
pub use languages::azure_policy::compiler::{
    compile, compile_value, CompileError, CompileOptions, Compiler,
};
pub use languages::azure_policy::interpreter::{
    evaluate, EvaluationFault, EvaluationResult, PolicyEvaluator, TraceEntry, TraceKind,
};
pub use languages::azure_policy::resolver::{default_aliases, AliasTable};
