// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Validation rules for schema evolution operations.
//!
//! Rules fall in two classes. Structural impossibilities (unknown column,
//! duplicate name, reused field id, unsafe type change) fail under strict
//! and permissive alike. Data-shape hazards (required column on a
//! non-empty table, dropping a column, relaxing required) fail under
//! strict and downgrade to warnings under permissive. `None` skips
//! everything.

use std::str::FromStr;

use crate::spec::{PrimitiveType, Schema, SchemaRef};
use crate::{Error, ErrorKind, Result};

/// How strictly an evolution operation is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Any rule violation is an error.
    #[default]
    Strict,
    /// Non-fatal violations become warnings.
    Permissive,
    /// No validation. The facade spells this `force`.
    None,
}

impl FromStr for ValidationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(ValidationMode::Strict),
            "permissive" => Ok(ValidationMode::Permissive),
            "none" | "force" => Ok(ValidationMode::None),
            other => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("validation mode {other:?} is invalid"),
            )),
        }
    }
}

fn violation(rule: String, mode: ValidationMode, warnings: &mut Vec<String>) -> Result<()> {
    match mode {
        ValidationMode::Strict => Err(Error::new(ErrorKind::ValidationFailed, rule)),
        ValidationMode::Permissive => {
            warnings.push(rule);
            Ok(())
        }
        ValidationMode::None => Ok(()),
    }
}

/// Validate adding `name` to `schema`. `table_empty` relaxes the rule
/// against new required columns, since no existing row can be missing the
/// value.
pub fn validate_add_column(
    schema: &Schema,
    name: &str,
    required: bool,
    mode: ValidationMode,
    table_empty: bool,
) -> Result<Vec<String>> {
    if mode == ValidationMode::None {
        return Ok(Vec::new());
    }
    if schema.field_by_name(name).is_some() {
        return Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("column {name:?} already exists"),
        ));
    }
    let mut warnings = Vec::new();
    if required && !table_empty {
        violation(
            format!("adding required column {name:?} to a table that may contain rows"),
            mode,
            &mut warnings,
        )?;
    }
    Ok(warnings)
}

/// Validate dropping `name` from `schema`. Dropping discards data, so
/// strict mode refuses it outright.
pub fn validate_drop_column(
    schema: &Schema,
    name: &str,
    mode: ValidationMode,
) -> Result<Vec<String>> {
    if mode == ValidationMode::None {
        return Ok(Vec::new());
    }
    if schema.field_by_name(name).is_none() {
        return Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("column {name:?} does not exist"),
        ));
    }
    let mut warnings = Vec::new();
    violation(
        format!("dropping column {name:?} discards its data"),
        mode,
        &mut warnings,
    )?;
    Ok(warnings)
}

/// Validate renaming `old` to `new` within `schema`.
pub fn validate_rename_column(
    schema: &Schema,
    old: &str,
    new: &str,
    mode: ValidationMode,
) -> Result<Vec<String>> {
    if mode == ValidationMode::None {
        return Ok(Vec::new());
    }
    if schema.field_by_name(old).is_none() {
        return Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("column {old:?} does not exist"),
        ));
    }
    if old != new && schema.field_by_name(new).is_some() {
        return Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("column {new:?} already exists"),
        ));
    }
    Ok(Vec::new())
}

/// Validate a type change. The safe promotions are `int -> long` and
/// `float -> double`; the identity change is always allowed. Anything
/// else rewrites data and is rejected even under permissive.
pub fn validate_type_promotion(
    old: &PrimitiveType,
    new: &PrimitiveType,
    mode: ValidationMode,
) -> Result<Vec<String>> {
    if mode == ValidationMode::None || old == new {
        return Ok(Vec::new());
    }
    match (old, new) {
        (PrimitiveType::Int, PrimitiveType::Long)
        | (PrimitiveType::Float, PrimitiveType::Double) => Ok(Vec::new()),
        (old, new) => Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("type promotion {old} -> {new} is not safe"),
        )),
    }
}

/// Validate a change of the required flag. Making an optional column
/// required is allowed; relaxing a required column is permissive-only.
pub fn validate_required_promotion(
    old_required: bool,
    new_required: bool,
    mode: ValidationMode,
) -> Result<Vec<String>> {
    if mode == ValidationMode::None || old_required == new_required || new_required {
        return Ok(Vec::new());
    }
    let mut warnings = Vec::new();
    violation(
        "relaxing a required column to optional changes the row contract".to_string(),
        mode,
        &mut warnings,
    )?;
    Ok(warnings)
}

/// Reject a field id that appears in the current schema or in any prior
/// schema version. Dropped ids are never returned to the pool.
pub fn validate_field_id_not_reused(
    schema: &Schema,
    id: i32,
    historical_schemas: &[SchemaRef],
) -> Result<()> {
    let reused_in_current = schema.field_ids().contains(&id);
    let reused_in_history = historical_schemas
        .iter()
        .any(|historical| historical.field_ids().contains(&id));
    if reused_in_current || reused_in_history {
        return Err(Error::new(
            ErrorKind::ValidationFailed,
            format!("field id {id} was already used by this table"),
        ));
    }
    Ok(())
}
