// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString as _};

use crate::languages::azure_policy::ast::{ParameterDefinition, ParameterType};
use crate::value::Value;

use super::error::CompileError;

/// Compile the `parameters` section of a definition.
pub(super) fn compile_parameters(
    declarations: Option<&Value>,
) -> Result<BTreeMap<String, ParameterDefinition>, CompileError> {
    let mut parameters = BTreeMap::new();
    let fields = match declarations {
        None | Some(Value::Null) => return Ok(parameters),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(CompileError::malformed(
                "parameters",
                format!("expected an object, found {}", other.type_name()),
            ))
        }
    };

    for (name, declaration) in fields.iter() {
        let path = format!("parameters.{name}");
        if parameters
            .keys()
            .any(|k: &String| k.eq_ignore_ascii_case(name))
        {
            return Err(CompileError::malformed(
                &path,
                "parameter names must be unique ignoring case",
            ));
        }
        parameters.insert(name.to_string(), compile_parameter(declaration, &path)?);
    }
    Ok(parameters)
}

fn compile_parameter(declaration: &Value, path: &str) -> Result<ParameterDefinition, CompileError> {
    if !matches!(*declaration, Value::Object(_)) {
        return Err(CompileError::malformed(
            path,
            "parameter declaration must be an object",
        ));
    }

    let type_path = format!("{path}.type");
    let parameter_type = match declaration.get_ignore_case("type") {
        Some(Value::String(name)) => ParameterType::parse(name).ok_or_else(|| {
            CompileError::unsupported(&type_path, format!("unknown parameter type `{name}`"))
        })?,
        Some(other) => {
            return Err(CompileError::malformed(
                &type_path,
                format!("expected a string, found {}", other.type_name()),
            ))
        }
        None => {
            return Err(CompileError::malformed(
                path,
                "parameter declaration requires `type`",
            ))
        }
    };

    let allowed_values = match declaration.get_ignore_case("allowedValues") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if !items.is_empty() => Some(items.to_vec()),
        Some(_) => {
            return Err(CompileError::malformed(
                &format!("{path}.allowedValues"),
                "`allowedValues` must be a non-empty array",
            ))
        }
    };

    let definition = ParameterDefinition {
        parameter_type,
        allowed_values,
        default_value: declaration.get_ignore_case("defaultValue").cloned(),
    };

    if let Some(ref default) = definition.default_value {
        let default_path = format!("{path}.defaultValue");
        if !parameter_type.accepts(default) {
            return Err(CompileError::malformed(
                &default_path,
                format!(
                    "default value of type {} does not match declared type {parameter_type}",
                    default.type_name()
                ),
            ));
        }
        if !definition.allows(default) {
            return Err(CompileError::malformed(
                &default_path,
                "default value is not one of `allowedValues`",
            ));
        }
    }

    Ok(definition)
}
