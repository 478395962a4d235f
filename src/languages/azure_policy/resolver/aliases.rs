// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;

use anyhow::{bail, Result};

use crate::languages::azure_policy::ast::{FieldPath, FieldRef, PathError};
use crate::value::Value;

// Aliases used by the storage, network, app service and function app rules
// of the policy catalog. Paths are relative to the resource document root.
const CATALOG_ALIASES: &[(&str, &str)] = &[
    ("fullName", "name"),
    // Storage accounts.
    ("Microsoft.Storage/storageAccounts/sku.name", "sku.name"),
    ("Microsoft.Storage/storageAccounts/sku.tier", "sku.tier"),
    ("Microsoft.Storage/storageAccounts/accessTier", "properties.accessTier"),
    ("Microsoft.Storage/storageAccounts/supportsHttpsTrafficOnly", "properties.supportsHttpsTrafficOnly"),
    ("Microsoft.Storage/storageAccounts/minimumTlsVersion", "properties.minimumTlsVersion"),
    ("Microsoft.Storage/storageAccounts/allowBlobPublicAccess", "properties.allowBlobPublicAccess"),
    ("Microsoft.Storage/storageAccounts/allowSharedKeyAccess", "properties.allowSharedKeyAccess"),
    ("Microsoft.Storage/storageAccounts/publicNetworkAccess", "properties.publicNetworkAccess"),
    ("Microsoft.Storage/storageAccounts/networkAcls.defaultAction", "properties.networkAcls.defaultAction"),
    ("Microsoft.Storage/storageAccounts/networkAcls.bypass", "properties.networkAcls.bypass"),
    ("Microsoft.Storage/storageAccounts/networkAcls.ipRules[*]", "properties.networkAcls.ipRules[*]"),
    ("Microsoft.Storage/storageAccounts/networkAcls.ipRules[*].value", "properties.networkAcls.ipRules[*].value"),
    ("Microsoft.Storage/storageAccounts/networkAcls.virtualNetworkRules[*]", "properties.networkAcls.virtualNetworkRules[*]"),
    ("Microsoft.Storage/storageAccounts/networkAcls.virtualNetworkRules[*].id", "properties.networkAcls.virtualNetworkRules[*].id"),
    ("Microsoft.Storage/storageAccounts/encryption.keySource", "properties.encryption.keySource"),
    ("Microsoft.Storage/storageAccounts/encryption.requireInfrastructureEncryption", "properties.encryption.requireInfrastructureEncryption"),
    // Network security groups and rules.
    ("Microsoft.Network/networkSecurityGroups/securityRules[*]", "properties.securityRules[*]"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].access", "properties.securityRules[*].properties.access"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].direction", "properties.securityRules[*].properties.direction"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].protocol", "properties.securityRules[*].properties.protocol"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].sourceAddressPrefix", "properties.securityRules[*].properties.sourceAddressPrefix"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].destinationPortRange", "properties.securityRules[*].properties.destinationPortRange"),
    ("Microsoft.Network/networkSecurityGroups/securityRules[*].destinationPortRanges[*]", "properties.securityRules[*].properties.destinationPortRanges[*]"),
    ("Microsoft.Network/networkSecurityGroups/securityRules/access", "properties.access"),
    ("Microsoft.Network/networkSecurityGroups/securityRules/direction", "properties.direction"),
    ("Microsoft.Network/networkSecurityGroups/securityRules/sourceAddressPrefix", "properties.sourceAddressPrefix"),
    ("Microsoft.Network/networkSecurityGroups/securityRules/destinationPortRange", "properties.destinationPortRange"),
    ("Microsoft.Network/networkInterfaces/ipconfigurations[*].publicIpAddress.id", "properties.ipConfigurations[*].properties.publicIPAddress.id"),
    ("Microsoft.Network/publicIPAddresses/sku.name", "sku.name"),
    ("Microsoft.Network/virtualNetworks/subnets[*].networkSecurityGroup.id", "properties.subnets[*].properties.networkSecurityGroup.id"),
    ("Microsoft.Network/virtualNetworks/enableDdosProtection", "properties.enableDdosProtection"),
    // App service and function apps.
    ("Microsoft.Web/sites/httpsOnly", "properties.httpsOnly"),
    ("Microsoft.Web/sites/clientCertEnabled", "properties.clientCertEnabled"),
    ("Microsoft.Web/sites/publicNetworkAccess", "properties.publicNetworkAccess"),
    ("Microsoft.Web/sites/siteConfig.minTlsVersion", "properties.siteConfig.minTlsVersion"),
    ("Microsoft.Web/sites/siteConfig.ftpsState", "properties.siteConfig.ftpsState"),
    ("Microsoft.Web/sites/siteConfig.http20Enabled", "properties.siteConfig.http20Enabled"),
    ("Microsoft.Web/sites/siteConfig.remoteDebuggingEnabled", "properties.siteConfig.remoteDebuggingEnabled"),
    ("Microsoft.Web/sites/siteConfig.cors.allowedOrigins[*]", "properties.siteConfig.cors.allowedOrigins[*]"),
    ("Microsoft.Web/sites/config/minTlsVersion", "properties.minTlsVersion"),
    ("Microsoft.Web/sites/config/ftpsState", "properties.ftpsState"),
    ("Microsoft.Web/sites/config/http20Enabled", "properties.http20Enabled"),
];

lazy_static::lazy_static! {
    static ref DEFAULT_ALIASES: Arc<AliasTable> = Arc::new(AliasTable::builtin());
}

/// Shared instance of [`AliasTable::builtin`].
pub fn default_aliases() -> Arc<AliasTable> {
    DEFAULT_ALIASES.clone()
}

/// Maps field alias names to paths in the resource document.
///
/// Alias names are case-insensitive. Fields that are not in the table
/// resolve literally, or through the `properties.*` path implied by an
/// ARM-style alias name when derivation is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    // Keyed by lowercase alias name.
    entries: BTreeMap<String, FieldPath>,
    derive_from_names: bool,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasTable {
    /// Empty table that derives paths from ARM-style alias names.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            derive_from_names: true,
        }
    }

    /// Empty table that resolves every field literally.
    pub fn literal() -> Self {
        Self {
            entries: BTreeMap::new(),
            derive_from_names: false,
        }
    }

    /// Table preloaded with the aliases used by the policy catalog.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for &(alias, path) in CATALOG_ALIASES {
            if let Err(e) = table.insert(alias, path) {
                tracing::error!(alias, error = %e, "invalid builtin alias");
            }
        }
        table
    }

    /// Load `{alias: path}` pairs from a JSON object.
    pub fn from_value(aliases: &Value) -> Result<Self> {
        let mut table = Self::new();
        table.extend_from_value(aliases)?;
        Ok(table)
    }

    /// Add `{alias: path}` pairs, replacing existing aliases of the same name.
    pub fn extend_from_value(&mut self, aliases: &Value) -> Result<()> {
        let Value::Object(ref entries) = *aliases else {
            bail!("alias table must be an object, got {}", aliases.type_name());
        };
        for (alias, path) in entries.iter() {
            match *path {
                Value::String(ref path) => self.insert(alias, path)?,
                ref other => bail!("path of alias `{alias}` must be a string, got {}", other.type_name()),
            }
        }
        Ok(())
    }

    /// Register an alias, replacing any existing one of the same name.
    pub fn insert(&mut self, alias: &str, path: &str) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        self.entries.insert(alias.to_ascii_lowercase(), path);
        Ok(())
    }

    pub fn with_alias(mut self, alias: &str, path: &str) -> Result<Self, PathError> {
        self.insert(alias, path)?;
        Ok(self)
    }

    pub fn remove(&mut self, alias: &str) -> Option<FieldPath> {
        self.entries.remove(&alias.to_ascii_lowercase())
    }

    pub fn set_derive_from_names(&mut self, derive: bool) {
        self.derive_from_names = derive;
    }

    pub const fn derives_from_names(&self) -> bool {
        self.derive_from_names
    }

    pub fn lookup(&self, alias: &str) -> Option<&FieldPath> {
        self.entries
            .get(alias)
            .or_else(|| self.entries.get(&alias.to_ascii_lowercase()))
    }

    /// Document path a field reference resolves to.
    pub fn path_for<'t>(&'t self, field: &'t FieldRef) -> &'t FieldPath {
        if let Some(path) = self.lookup(field.raw()) {
            return path;
        }
        match field.derived {
            Some(ref derived) if self.derive_from_names => derived,
            _ => &field.literal,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
