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

//! Fallback field name to id mapping, stored in the
//! `schema.name-mapping.default` table property. Readers consult it when
//! data files lack embedded field ids.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::spec::datatypes::{NestedFieldRef, Type};
use crate::spec::schema::Schema;

/// Table property holding the default name mapping JSON.
pub const NAME_MAPPING_PROPERTY: &str = "schema.name-mapping.default";

/// Field name to ID mapping.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(transparent)]
pub struct NameMapping {
    /// Mapped fields of the schema root.
    pub root: Vec<MappedField>,
}

/// Maps the names of one field to its id.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct MappedField {
    /// The mapped field id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<i32>,
    /// Names the field is known under.
    pub names: Vec<String>,
    /// Mappings of nested fields.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub fields: Vec<MappedField>,
}

impl NameMapping {
    /// Build the default mapping for `schema`: one entry per field, one
    /// name per entry, nested fields included.
    pub fn from_schema(schema: &Schema) -> Self {
        NameMapping {
            root: schema.fields().iter().map(mapped_field).collect(),
        }
    }
}

fn mapped_field(field: &NestedFieldRef) -> MappedField {
    MappedField {
        field_id: Some(field.id),
        names: vec![field.name.clone()],
        fields: nested_mappings(&field.field_type),
    }
}

fn nested_mappings(field_type: &Type) -> Vec<MappedField> {
    match field_type {
        Type::Primitive(_) => Vec::new(),
        Type::Struct(fields) => fields.fields().iter().map(mapped_field).collect(),
        Type::List(list) => vec![mapped_field(&list.element_field)],
        Type::Map(map) => vec![
            mapped_field(&map.key_field),
            mapped_field(&map.value_field),
        ],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::datatypes::{ListType, NestedField, PrimitiveType};

    #[test]
    fn test_mapping_from_flat_schema() {
        let schema = Schema::builder()
            .with_fields(vec![
                NestedField::required(1, "id", Type::Primitive(PrimitiveType::String)).into(),
                NestedField::optional(2, "name", Type::Primitive(PrimitiveType::String)).into(),
            ])
            .build()
            .unwrap();

        let mapping = NameMapping::from_schema(&schema);
        assert_eq!(
            serde_json::to_string(&mapping).unwrap(),
            r#"[{"field-id":1,"names":["id"]},{"field-id":2,"names":["name"]}]"#
        );
    }

    #[test]
    fn test_mapping_includes_nested_fields() {
        let schema = Schema::builder()
            .with_fields(vec![NestedField::optional(
                1,
                "tags",
                Type::List(ListType::new(
                    NestedField::list_element(2, Type::Primitive(PrimitiveType::String), true)
                        .into(),
                )),
            )
            .into()])
            .build()
            .unwrap();

        let mapping = NameMapping::from_schema(&schema);
        assert_eq!(mapping.root.len(), 1);
        assert_eq!(mapping.root[0].fields.len(), 1);
        assert_eq!(mapping.root[0].fields[0].field_id, Some(2));
        assert_eq!(mapping.root[0].fields[0].names, vec!["element".to_string()]);
    }

    #[test]
    fn test_unicode_names_pass_through() {
        let schema = Schema::builder()
            .with_fields(vec![NestedField::required(
                1,
                "ニックネーム",
                Type::Primitive(PrimitiveType::String),
            )
            .into()])
            .build()
            .unwrap();

        let json = serde_json::to_string(&NameMapping::from_schema(&schema)).unwrap();
        let back: NameMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root[0].names, vec!["ニックネーム".to_string()]);
    }

    #[test]
    fn test_null_fields_tolerated_on_read() {
        let mapped: MappedField =
            serde_json::from_str(r#"{"field-id": 1, "names": ["id"], "fields": null}"#).unwrap();
        assert_eq!(mapped.fields, Vec::new());
    }
}
