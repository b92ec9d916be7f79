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

//! The table schema: a named struct with a schema id.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::spec::datatypes::{NestedFieldRef, StructType, Type};
use crate::{ensure_data_valid, Result};

/// Reference to [`Schema`].
pub type SchemaRef = Arc<Schema>;

/// Default value for schema id.
pub const DEFAULT_SCHEMA_ID: i32 = 0;

/// A table schema. Field ids are unique within the schema, including the
/// ids of nested list/map/struct members.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "crate::spec::schema::schema_serde::SchemaV2",
    into = "crate::spec::schema::schema_serde::SchemaV2"
)]
pub struct Schema {
    schema_id: i32,
    fields: StructType,
}

impl Schema {
    /// Create a schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The schema id.
    #[inline]
    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    /// The top-level struct.
    #[inline]
    pub fn as_struct(&self) -> &StructType {
        &self.fields
    }

    /// Top-level fields in declared order.
    #[inline]
    pub fn fields(&self) -> &[NestedFieldRef] {
        self.fields.fields()
    }

    /// Return the same schema under a different id.
    pub fn with_schema_id(self, schema_id: i32) -> Self {
        Self { schema_id, ..self }
    }

    /// Find a top-level field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&NestedFieldRef> {
        self.fields.field_by_name(name)
    }

    /// Find a top-level field by id.
    pub fn field_by_id(&self, id: i32) -> Option<&NestedFieldRef> {
        self.fields.field_by_id(id)
    }

    /// Every field id used anywhere in the schema, nested types included.
    pub fn field_ids(&self) -> Vec<i32> {
        let mut ids = Vec::new();
        for field in self.fields.fields() {
            collect_field_ids(field, &mut ids);
        }
        ids
    }

    /// The highest field id used anywhere in the schema, or 0 for an empty
    /// schema.
    pub fn highest_field_id(&self) -> i32 {
        self.field_ids().into_iter().max().unwrap_or(0)
    }
}

fn collect_field_ids(field: &NestedFieldRef, ids: &mut Vec<i32>) {
    ids.push(field.id);
    collect_type_field_ids(&field.field_type, ids);
}

fn collect_type_field_ids(field_type: &Type, ids: &mut Vec<i32>) {
    match field_type {
        Type::Primitive(_) => {}
        Type::Struct(fields) => {
            for field in fields.fields() {
                collect_field_ids(field, ids);
            }
        }
        Type::List(list) => collect_field_ids(&list.element_field, ids),
        Type::Map(map) => {
            collect_field_ids(&map.key_field, ids);
            collect_field_ids(&map.value_field, ids);
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "table {{")?;
        for field in self.fields() {
            writeln!(f, "  {}", field)?;
        }
        writeln!(f, "}}")
    }
}

/// Schema builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema_id: i32,
    fields: Vec<NestedFieldRef>,
}

impl SchemaBuilder {
    /// Set the schema id.
    pub fn with_schema_id(mut self, schema_id: i32) -> Self {
        self.schema_id = schema_id;
        self
    }

    /// Add fields to the schema.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = NestedFieldRef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Build the schema, checking that every field id is unique across the
    /// schema including nested members.
    pub fn build(self) -> Result<Schema> {
        let schema = Schema {
            schema_id: self.schema_id,
            fields: StructType::new(self.fields),
        };

        let mut seen = HashSet::new();
        for id in schema.field_ids() {
            ensure_data_valid!(
                seen.insert(id),
                "field id {} is used more than once in schema {}",
                id,
                schema.schema_id,
            );
        }

        Ok(schema)
    }
}

pub(super) mod schema_serde {
    use serde_derive::{Deserialize, Serialize};

    use super::Schema;
    use crate::spec::datatypes::NestedFieldRef;
    use crate::Error;

    /// The v2 on-disk shape: `{"schema-id", "type": "struct", "fields"}`.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub(crate) struct SchemaV2 {
        pub schema_id: i32,
        pub r#type: String,
        pub fields: Vec<NestedFieldRef>,
    }

    impl TryFrom<SchemaV2> for Schema {
        type Error = Error;

        fn try_from(value: SchemaV2) -> Result<Self, Error> {
            Schema::builder()
                .with_schema_id(value.schema_id)
                .with_fields(value.fields)
                .build()
        }
    }

    impl From<Schema> for SchemaV2 {
        fn from(value: Schema) -> Self {
            SchemaV2 {
                schema_id: value.schema_id,
                r#type: "struct".to_string(),
                fields: value.fields.fields().to_vec(),
            }
        }
    }
}
