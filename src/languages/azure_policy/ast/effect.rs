// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Effect applied when a resource matches a rule's `if` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Append,
    Audit,
    AuditIfNotExists,
    Deny,
    DenyAction,
    DeployIfNotExists,
    Disabled,
    Manual,
    Modify,
}

impl Effect {
    const ALL: [Effect; 9] = [
        Effect::Append,
        Effect::Audit,
        Effect::AuditIfNotExists,
        Effect::Deny,
        Effect::DenyAction,
        Effect::DeployIfNotExists,
        Effect::Disabled,
        Effect::Manual,
        Effect::Modify,
    ];

    /// Parse an effect name. Azure treats effect names case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|effect| effect.name().eq_ignore_ascii_case(name))
    }

    pub const fn name(self) -> &'static str {
        match self {
            Effect::Append => "Append",
            Effect::Audit => "Audit",
            Effect::AuditIfNotExists => "AuditIfNotExists",
            Effect::Deny => "Deny",
            Effect::DenyAction => "DenyAction",
            Effect::DeployIfNotExists => "DeployIfNotExists",
            Effect::Disabled => "Disabled",
            Effect::Manual => "Manual",
            Effect::Modify => "Modify",
        }
    }

    /// Disabled rules are never evaluated.
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Effect::Disabled)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
