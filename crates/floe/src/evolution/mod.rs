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

//! Schema evolution: pure functions from a prior schema and an operation
//! to the next schema.
//!
//! Every operation takes an [`EvolutionContext`] carrying the next free
//! field id and the table's historical schemas. New fields always receive
//! `next_field_id`; a dropped field's id is never handed out again.
//! Renames preserve id and type; type updates preserve id and name.

mod validate;

use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::spec::{NestedField, NestedFieldRef, PrimitiveType, Schema, SchemaRef, Type};
use crate::{Error, ErrorKind, Result};

pub use validate::{
    validate_add_column, validate_drop_column, validate_field_id_not_reused,
    validate_rename_column, validate_required_promotion, validate_type_promotion, ValidationMode,
};

/// State an evolution operation needs beyond the schema itself.
#[derive(Debug, Clone, Default)]
pub struct EvolutionContext {
    /// The id the next new field receives, `last-column-id + 1`.
    pub next_field_id: i32,
    /// Every schema version the table has had.
    pub historical_schemas: Vec<SchemaRef>,
    /// Whether the table is known to hold no rows.
    pub table_empty: bool,
}

/// Outcome of a successful evolution: the next schema plus any warnings
/// collected under permissive validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evolved {
    /// The evolved schema. Its schema id is assigned by the metadata
    /// state machine when the schema is installed.
    pub schema: Schema,
    /// Warnings produced by permissive validation; empty under strict.
    pub warnings: Vec<String>,
}

/// A column to be added.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct NewColumn {
    /// Column name; must not collide with an existing column.
    #[builder(setter(into))]
    pub name: String,
    /// Column type.
    pub field_type: Type,
    /// Whether values are mandatory.
    #[builder(default)]
    pub required: bool,
    /// Optional doc string.
    #[builder(default, setter(strip_option, into))]
    pub doc: Option<String>,
}

/// Add a column. The new field always takes `ctx.next_field_id`.
pub fn add_column(
    schema: &Schema,
    ctx: &EvolutionContext,
    column: NewColumn,
    mode: ValidationMode,
) -> Result<Evolved> {
    let warnings = validate_add_column(
        schema,
        &column.name,
        column.required,
        mode,
        ctx.table_empty,
    )?;
    validate_field_id_not_reused(schema, ctx.next_field_id, &ctx.historical_schemas)?;

    let mut field = NestedField::new(
        ctx.next_field_id,
        &column.name,
        column.field_type,
        column.required,
    );
    if let Some(doc) = column.doc {
        field = field.with_doc(doc);
    }

    let mut fields: Vec<NestedFieldRef> = schema.fields().to_vec();
    fields.push(field.into());
    rebuild(schema, fields, warnings)
}

/// Drop a column by name. The id leaves the schema but stays burned in
/// the table's `last-column-id`.
pub fn drop_column(schema: &Schema, name: &str, mode: ValidationMode) -> Result<Evolved> {
    let warnings = validate_drop_column(schema, name, mode)?;
    require_field(schema, name)?;

    let fields: Vec<NestedFieldRef> = schema
        .fields()
        .iter()
        .filter(|field| field.name != name)
        .cloned()
        .collect();
    rebuild(schema, fields, warnings)
}

/// Rename a column, preserving its id and type.
pub fn rename_column(
    schema: &Schema,
    old: &str,
    new: &str,
    mode: ValidationMode,
) -> Result<Evolved> {
    let warnings = validate_rename_column(schema, old, new, mode)?;
    require_field(schema, old)?;

    let fields = map_field(schema, old, |field| NestedField {
        name: new.to_string(),
        ..field.clone()
    });
    rebuild(schema, fields, warnings)
}

/// Change a column's primitive type, preserving its id and name. Only
/// safe promotions pass outside `force`.
pub fn update_column_type(
    schema: &Schema,
    name: &str,
    new_type: PrimitiveType,
    mode: ValidationMode,
) -> Result<Evolved> {
    let field = require_field(schema, name)?;
    let old_type = field.field_type.as_primitive_type().ok_or_else(|| {
        Error::new(
            ErrorKind::ValidationFailed,
            format!("column {name:?} is not a primitive type"),
        )
    })?;
    let warnings = validate_type_promotion(old_type, &new_type, mode)?;

    let fields = map_field(schema, name, |field| NestedField {
        field_type: Box::new(Type::Primitive(new_type.clone())),
        ..field.clone()
    });
    rebuild(schema, fields, warnings)
}

/// Flip a column between optional and required.
pub fn update_column_required(
    schema: &Schema,
    name: &str,
    required: bool,
    mode: ValidationMode,
) -> Result<Evolved> {
    let field = require_field(schema, name)?;
    let warnings = validate_required_promotion(field.required, required, mode)?;

    let fields = map_field(schema, name, |field| NestedField {
        required,
        ..field.clone()
    });
    rebuild(schema, fields, warnings)
}

fn require_field<'a>(schema: &'a Schema, name: &str) -> Result<&'a NestedFieldRef> {
    schema.field_by_name(name).ok_or_else(|| {
        Error::new(
            ErrorKind::ValidationFailed,
            format!("column {name:?} does not exist"),
        )
    })
}

fn map_field(
    schema: &Schema,
    name: &str,
    f: impl Fn(&NestedField) -> NestedField,
) -> Vec<NestedFieldRef> {
    schema
        .fields()
        .iter()
        .map(|field| {
            if field.name == name {
                Arc::new(f(field))
            } else {
                field.clone()
            }
        })
        .collect()
}

fn rebuild(schema: &Schema, fields: Vec<NestedFieldRef>, warnings: Vec<String>) -> Result<Evolved> {
    let schema = Schema::builder()
        .with_schema_id(schema.schema_id())
        .with_fields(fields)
        .build()?;
    Ok(Evolved { schema, warnings })
}
