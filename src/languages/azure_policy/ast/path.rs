// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

/// A segment of a field path (e.g. `properties`, `[0]`, `[*]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl PathSegment {
    /// Segment equality as used for count scoping. Keys compare case-insensitively.
    pub fn same_as(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Key(a), PathSegment::Key(b)) => a.eq_ignore_ascii_case(b),
            (PathSegment::Index(a), PathSegment::Index(b)) => a == b,
            (PathSegment::Wildcard, PathSegment::Wildcard) => true,
            _ => false,
        }
    }
}

/// Error produced when a field path cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field path `{path}`: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: &'static str,
}

/// Parsed field path such as `properties.networkAcls.ipRules[*].value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let err = |reason| PathError {
            path: raw.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        // True right after a `]`, where a key may only follow a `.`.
        let mut after_bracket = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if current.is_empty() && !after_bracket {
                        return Err(err("empty segment"));
                    }
                    if !current.is_empty() {
                        segments.push(PathSegment::Key(core::mem::take(&mut current)));
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        return Err(err("trailing `.`"));
                    }
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(PathSegment::Key(core::mem::take(&mut current)));
                    } else if segments.is_empty() {
                        return Err(err("path cannot start with `[`"));
                    }
                    segments.push(Self::parse_bracket(&mut chars).ok_or_else(|| err("malformed brackets"))?);
                    after_bracket = true;
                }
                ']' => return Err(err("unbalanced `]`")),
                _ => {
                    if after_bracket {
                        return Err(err("expected `.` or `[` after `]`"));
                    }
                    current.push(c);
                }
            }
        }

        if !current.is_empty() {
            segments.push(PathSegment::Key(current));
        }
        if segments.is_empty() {
            return Err(err("empty path"));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    // Parses the contents of `[...]` after the opening bracket has been consumed.
    fn parse_bracket(chars: &mut core::iter::Peekable<core::str::Chars<'_>>) -> Option<PathSegment> {
        let mut content = String::new();
        if chars.peek() == Some(&'\'') {
            let _ = chars.next();
            loop {
                match chars.next()? {
                    '\'' if chars.peek() == Some(&'\'') => {
                        let _ = chars.next();
                        content.push('\'');
                    }
                    '\'' => break,
                    c => content.push(c),
                }
            }
            return match chars.next()? {
                ']' => Some(PathSegment::Key(content)),
                _ => None,
            };
        }

        loop {
            match chars.next()? {
                ']' => break,
                c => content.push(c),
            }
        }
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        if content == "*" {
            return Some(PathSegment::Wildcard);
        }
        if content.bytes().all(|b| b.is_ascii_digit()) {
            return content.parse().ok().map(PathSegment::Index);
        }
        Some(PathSegment::Key(content.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PathSegment::Wildcard)
    }

    /// Remaining segments if `prefix` is a leading part of this path.
    pub fn strip_prefix<'a>(&'a self, prefix: &FieldPath) -> Option<&'a [PathSegment]> {
        if prefix.segments.len() > self.segments.len() {
            return None;
        }
        let matches = self
            .segments
            .iter()
            .zip(prefix.segments.iter())
            .all(|(a, b)| a.same_as(b));
        if matches {
            self.segments.get(prefix.segments.len()..)
        } else {
            None
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Field reference of a leaf or count.
///
/// `derived` holds the `properties.*` path implied by an ARM-style alias name
/// (e.g. `Microsoft.Web/sites/httpsOnly`); the alias table decides at
/// evaluation time whether it is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub literal: FieldPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<FieldPath>,
}

impl FieldRef {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        Ok(Self {
            literal: FieldPath::parse(raw)?,
            derived: derive_alias_path(raw),
        })
    }

    pub fn raw(&self) -> &str {
        self.literal.as_str()
    }
}

// `Microsoft.Storage/storageAccounts/networkAcls.ipRules[*].value` maps to
// `properties.networkAcls.ipRules[*].value`.
fn derive_alias_path(raw: &str) -> Option<FieldPath> {
    let (resource_type, property) = raw.rsplit_once('/')?;
    let namespace = resource_type.split('/').next()?;
    if !namespace.contains('.') || resource_type.contains('[') || property.is_empty() {
        return None;
    }
    FieldPath::parse(&alloc::format!("properties.{property}")).ok()
}
