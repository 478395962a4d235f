// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Azure Policy rule evaluation.
//!
//! A definition flows through three stages:
//!
//! 1. [`compiler`] validates the document once and produces an immutable
//!    [`ast::RuleDocument`].
//! 2. [`binder`] combines the rule with assignment parameters and evaluates
//!    every template expression, producing a [`binder::BoundRule`].
//! 3. [`interpreter`] decides compliance of resource documents against the
//!    bound rule, resolving fields through [`resolver`].

pub mod ast;
pub mod batch;
pub mod binder;
pub mod cache;
pub mod compiler;
pub mod expressions;
pub mod interpreter;
pub mod resolver;
