// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod condition;
pub mod definition;
pub mod effect;
pub mod expr;
pub mod operators;
pub mod path;

pub use condition::*;
pub use definition::*;
pub use effect::*;
pub use expr::*;
pub use operators::*;
pub use path::*;
