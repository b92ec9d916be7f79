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

//! Writer-schema model for the Avro encoder.
//!
//! Records, fields and arrays carry an ordered attribute map so Iceberg
//! annotations (`field-id`, `element-id`, `logicalType`) are preserved in
//! the rendered schema JSON.

use std::collections::BTreeMap;

use serde_json::{json, Map as JsonMap, Number, Value as JsonValue};

/// Attribute key for Iceberg field ids on record fields.
pub const FIELD_ID_PROP: &str = "field-id";
/// Attribute key for Iceberg element ids on arrays.
pub const ELEMENT_ID_PROP: &str = "element-id";
/// Attribute key marking an `array<record{key,value}>` as a logical map.
pub const LOGICAL_TYPE_PROP: &str = "logicalType";
/// The logical type name for non-string-keyed maps.
pub const MAP_LOGICAL_TYPE: &str = "map";

/// An Avro writer schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// Named fixed-length binary.
    Fixed(FixedSchema),
    /// Named record with ordered fields.
    Record(RecordSchema),
    /// Array with optional attributes.
    Array(ArraySchema),
    /// String-keyed map.
    Map(MapSchema),
    /// Union of variants. Iceberg only uses `["null", T]`.
    Union(Vec<AvroSchema>),
}

/// Named fixed-length binary schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    /// Avro name of the fixed type.
    pub name: String,
    /// Exact byte length of every value.
    pub size: usize,
}

/// Record schema: a name plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// Avro record name.
    pub name: String,
    /// Fields in declared (and encoded) order.
    pub fields: Vec<RecordField>,
}

/// One record field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    /// Field name.
    pub name: String,
    /// Field schema.
    pub schema: AvroSchema,
    /// Default rendered into the schema JSON; optional fields use null.
    pub default: Option<JsonValue>,
    /// Extra JSON attributes such as `field-id`.
    pub attributes: BTreeMap<String, JsonValue>,
}

/// Array schema with attributes (element ids, logical types).
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// Element schema.
    pub items: Box<AvroSchema>,
    /// Extra JSON attributes such as `element-id` and `logicalType`.
    pub attributes: BTreeMap<String, JsonValue>,
}

/// String-keyed map schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSchema {
    /// Value schema; keys are always strings.
    pub values: Box<AvroSchema>,
}

impl RecordField {
    /// A required field with no annotations.
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach the Iceberg field id annotation.
    pub fn with_field_id(mut self, id: i32) -> Self {
        self.attributes
            .insert(FIELD_ID_PROP.to_string(), JsonValue::Number(Number::from(id)));
        self
    }

    /// Set the field default. Optional fields default to JSON null.
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }
}

impl AvroSchema {
    /// A record schema from a name and fields.
    pub fn record(name: impl Into<String>, fields: Vec<RecordField>) -> Self {
        AvroSchema::Record(RecordSchema {
            name: name.into(),
            fields,
        })
    }

    /// Wrap a schema into the nullable union `["null", T]`.
    pub fn optional(inner: AvroSchema) -> Self {
        AvroSchema::Union(vec![AvroSchema::Null, inner])
    }

    /// An array annotated with an Iceberg element id.
    pub fn array_with_element_id(items: AvroSchema, element_id: i32) -> Self {
        AvroSchema::Array(ArraySchema {
            items: Box::new(items),
            attributes: BTreeMap::from([(
                ELEMENT_ID_PROP.to_string(),
                JsonValue::Number(Number::from(element_id)),
            )]),
        })
    }

    /// The Iceberg representation of a non-string-keyed map:
    /// `array<record{key,value}>` tagged with `logicalType: "map"`.
    ///
    /// The Avro spec only permits string map keys, so integer-keyed maps
    /// (column sizes, value counts, bounds) are flattened to this form.
    pub fn entry_map(
        record_name: impl Into<String>,
        key: AvroSchema,
        value: AvroSchema,
        element_id: i32,
        key_id: i32,
        value_id: i32,
    ) -> Self {
        let entry = AvroSchema::record(record_name, vec![
            RecordField::new("key", key).with_field_id(key_id),
            RecordField::new("value", value).with_field_id(value_id),
        ]);
        let mut attributes = BTreeMap::from([(
            ELEMENT_ID_PROP.to_string(),
            JsonValue::Number(Number::from(element_id)),
        )]);
        attributes.insert(
            LOGICAL_TYPE_PROP.to_string(),
            JsonValue::String(MAP_LOGICAL_TYPE.to_string()),
        );
        AvroSchema::Array(ArraySchema {
            items: Box::new(entry),
            attributes,
        })
    }

    /// Whether this schema is the nullable union `["null", T]`.
    pub fn is_nullable(&self) -> bool {
        matches!(self, AvroSchema::Union(variants)
            if variants.first() == Some(&AvroSchema::Null))
    }

    /// Render the schema as Avro JSON, suitable for the `avro.schema`
    /// header entry.
    pub fn to_json(&self) -> JsonValue {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Boolean => json!("boolean"),
            AvroSchema::Int => json!("int"),
            AvroSchema::Long => json!("long"),
            AvroSchema::Float => json!("float"),
            AvroSchema::Double => json!("double"),
            AvroSchema::Bytes => json!("bytes"),
            AvroSchema::String => json!("string"),
            AvroSchema::Fixed(fixed) => json!({
                "type": "fixed",
                "name": fixed.name,
                "size": fixed.size,
            }),
            AvroSchema::Record(record) => {
                let fields: Vec<JsonValue> =
                    record.fields.iter().map(RecordField::to_json).collect();
                json!({
                    "type": "record",
                    "name": record.name,
                    "fields": fields,
                })
            }
            AvroSchema::Array(array) => {
                let mut object = JsonMap::new();
                object.insert("type".to_string(), json!("array"));
                object.insert("items".to_string(), array.items.to_json());
                for (key, value) in &array.attributes {
                    object.insert(key.clone(), value.clone());
                }
                JsonValue::Object(object)
            }
            AvroSchema::Map(map) => json!({
                "type": "map",
                "values": map.values.to_json(),
            }),
            AvroSchema::Union(variants) => {
                JsonValue::Array(variants.iter().map(AvroSchema::to_json).collect())
            }
        }
    }
}

impl RecordField {
    fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::new();
        object.insert("name".to_string(), json!(self.name));
        object.insert("type".to_string(), self.schema.to_json());
        if let Some(default) = &self.default {
            object.insert("default".to_string(), default.clone());
        }
        for (key, value) in &self.attributes {
            object.insert(key.clone(), value.clone());
        }
        JsonValue::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_primitive_json() {
        assert_eq!(AvroSchema::Long.to_json(), json!("long"));
        assert_eq!(
            AvroSchema::optional(AvroSchema::String).to_json(),
            json!(["null", "string"])
        );
    }

    #[test]
    fn test_record_field_annotations() {
        let schema = AvroSchema::record("manifest_entry", vec![
            RecordField::new("status", AvroSchema::Int).with_field_id(0),
            RecordField::new("snapshot_id", AvroSchema::optional(AvroSchema::Long))
                .with_field_id(1)
                .with_default(json!(null)),
        ]);

        assert_eq!(
            schema.to_json(),
            json!({
                "type": "record",
                "name": "manifest_entry",
                "fields": [
                    {"name": "status", "type": "int", "field-id": 0},
                    {
                        "name": "snapshot_id",
                        "type": ["null", "long"],
                        "default": null,
                        "field-id": 1
                    },
                ]
            })
        );
    }

    #[test]
    fn test_entry_map_shape() {
        let schema = AvroSchema::entry_map(
            "k119_v120",
            AvroSchema::Int,
            AvroSchema::Long,
            109,
            119,
            120,
        );

        assert_eq!(
            schema.to_json(),
            json!({
                "type": "array",
                "items": {
                    "type": "record",
                    "name": "k119_v120",
                    "fields": [
                        {"name": "key", "type": "int", "field-id": 119},
                        {"name": "value", "type": "long", "field-id": 120},
                    ]
                },
                "element-id": 109,
                "logicalType": "map",
            })
        );
    }

    #[test]
    fn test_is_nullable() {
        assert!(AvroSchema::optional(AvroSchema::Long).is_nullable());
        assert!(!AvroSchema::Long.is_nullable());
        assert!(!AvroSchema::Union(vec![AvroSchema::Long, AvroSchema::Null]).is_nullable());
    }
}
