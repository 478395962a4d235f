// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field resolution against resource documents.

mod aliases;


pub use aliases::{default_aliases, AliasTable};

use alloc::vec;
use alloc::vec::Vec;

use crate::languages::azure_policy::ast::{FieldRef, PathSegment};
use crate::value::Value;

/// Outcome of resolving a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// The path does not exist in the document.
    NotFound,
    /// The path exists. The value may be `null`.
    Found(&'a Value),
    /// The path fans out through `[*]`. Elements where the rest of the path
    /// does not exist are dropped.
    Many(Vec<&'a Value>),
}

impl<'a> FieldValue<'a> {
    pub const fn is_found(&self) -> bool {
        !matches!(*self, FieldValue::NotFound)
    }

    /// Single resolved value, if the path neither failed nor fanned out.
    pub const fn single(&self) -> Option<&'a Value> {
        match *self {
            FieldValue::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Resolve a field reference, consulting `aliases` first.
pub fn resolve<'a>(resource: &'a Value, field: &FieldRef, aliases: &AliasTable) -> FieldValue<'a> {
    resolve_segments(resource, aliases.path_for(field).segments())
}

/// Resolve path segments starting at `root`.
///
/// Keys match exactly first and then ASCII case-insensitively.
pub fn resolve_segments<'a>(root: &'a Value, segments: &[PathSegment]) -> FieldValue<'a> {
    let mut values = vec![root];
    let mut fanned = false;

    for segment in segments {
        if !fanned && *segment == PathSegment::Wildcard {
            // The first wildcard must land on an array. An empty one still fans out.
            match values.first() {
                Some(&&Value::Array(_)) => fanned = true,
                _ => return FieldValue::NotFound,
            }
        }
        let mut next = Vec::with_capacity(values.len());
        for value in values {
            step(value, segment, &mut next);
        }
        if next.is_empty() && !fanned {
            return FieldValue::NotFound;
        }
        values = next;
    }

    if fanned {
        FieldValue::Many(values)
    } else {
        values.pop().map_or(FieldValue::NotFound, FieldValue::Found)
    }
}

fn step<'a>(value: &'a Value, segment: &PathSegment, out: &mut Vec<&'a Value>) {
    match *segment {
        PathSegment::Key(ref key) => out.extend(value.get_ignore_case(key)),
        PathSegment::Index(index) => {
            if let Value::Array(ref items) = *value {
                out.extend(items.get(index));
            }
        }
        PathSegment::Wildcard => {
            if let Value::Array(ref items) = *value {
                out.extend(items.iter());
            }
        }
    }
}
