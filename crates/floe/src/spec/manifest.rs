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

//! Manifest files: one Avro record per data file of a snapshot.
//!
//! The writer schema is the v2 `manifest_entry` record. Field ids are part
//! of the format; engines resolve columns by id, so the annotations below
//! must match the Iceberg spec exactly.

use std::collections::HashMap;

use chrono::NaiveDate;
use itertools::Itertools;
use serde_json::json;
use typed_builder::TypedBuilder;

use crate::avro::{AvroSchema, AvroValue, Codec, OcfWriter, RecordField};
use crate::spec::partition::{PartitionField, PartitionSpec};
use crate::spec::schema::Schema;
use crate::spec::values::{encode_bounds, Value};
use crate::Result;

/// Manifest entry status. Only `Added` is produced by this writer;
/// `Existing` and `Deleted` appear when manifests are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ManifestStatus {
    /// The file already existed in an earlier snapshot.
    Existing = 0,
    /// The file was added by this snapshot.
    Added = 1,
    /// The file was removed by this snapshot.
    Deleted = 2,
}

/// Per-file statistics feeding one manifest entry.
///
/// The path, size, count and partition values come from the stats
/// extractor; the column-level maps are an optional extension and encode
/// as null when absent.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct DataFileStats {
    /// Full path of the data file.
    pub file_path: String,
    /// Total file size in bytes.
    pub file_size_in_bytes: i64,
    /// Number of records in the file.
    pub record_count: i64,
    /// Partition values parsed from the file path, keyed by partition
    /// field name.
    #[builder(default)]
    pub partition_values: HashMap<String, String>,
    /// Per-column byte sizes keyed by field id.
    #[builder(default)]
    pub column_sizes: Option<HashMap<i32, i64>>,
    /// Per-column value counts keyed by field id.
    #[builder(default)]
    pub value_counts: Option<HashMap<i32, i64>>,
    /// Per-column null counts keyed by field id.
    #[builder(default)]
    pub null_value_counts: Option<HashMap<i32, i64>>,
    /// Per-column NaN counts keyed by field id.
    #[builder(default)]
    pub nan_value_counts: Option<HashMap<i32, i64>>,
    /// Per-column lower bounds keyed by field id.
    #[builder(default)]
    pub lower_bounds: Option<HashMap<i32, Value>>,
    /// Per-column upper bounds keyed by field id.
    #[builder(default)]
    pub upper_bounds: Option<HashMap<i32, Value>>,
    /// Row-group split offsets.
    #[builder(default)]
    pub split_offsets: Option<Vec<i64>>,
}

/// Builds the manifest Avro file for one snapshot.
#[derive(Debug)]
pub struct ManifestWriter {
    snapshot_id: i64,
    partition_spec: PartitionSpec,
    schema: Option<Schema>,
    schema_id: i32,
}

impl ManifestWriter {
    /// Create a writer for `snapshot_id` under the given partition spec.
    pub fn new(snapshot_id: i64, partition_spec: PartitionSpec, schema_id: i32) -> Self {
        Self {
            snapshot_id,
            partition_spec,
            schema: None,
            schema_id,
        }
    }

    /// Attach the table schema. Required for typed bounds; the schema also
    /// rides in the file header for readers that want it.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Serialize one ADDED entry per data file into an Object Container
    /// File.
    pub fn write(&self, files: &[DataFileStats]) -> Result<Vec<u8>> {
        let avro_schema = manifest_entry_schema(&self.partition_spec.fields);

        let mut writer = OcfWriter::new(avro_schema, Codec::Null)?
            .with_metadata("format-version", "2".as_bytes().to_vec())
            .with_metadata("content", "data".as_bytes().to_vec())
            .with_metadata(
                "partition-spec",
                serde_json::to_vec(&self.partition_spec.fields)?,
            )
            .with_metadata(
                "partition-spec-id",
                self.partition_spec.spec_id.to_string().into_bytes(),
            )
            .with_metadata("schema-id", self.schema_id.to_string().into_bytes());
        if let Some(schema) = &self.schema {
            writer = writer.with_metadata("schema", serde_json::to_vec(schema)?);
        }

        for file in files {
            writer.append(&self.entry(file))?;
        }
        writer.into_bytes()
    }

    fn entry(&self, file: &DataFileStats) -> AvroValue {
        let partition = AvroValue::Record(
            self.partition_spec
                .fields
                .iter()
                .map(|field| {
                    (
                        field.name.clone(),
                        partition_value(field, &file.partition_values),
                    )
                })
                .collect(),
        );

        let bounds = |bounds: &Option<HashMap<i32, Value>>| match (bounds, &self.schema) {
            (Some(bounds), Some(schema)) => AvroValue::Array(
                encode_bounds(bounds, schema)
                    .into_iter()
                    .sorted_by_key(|(id, _)| *id)
                    .map(|(id, bytes)| {
                        AvroValue::Record(vec![
                            ("key".to_string(), AvroValue::Int(id)),
                            ("value".to_string(), AvroValue::Bytes(bytes.into_vec())),
                        ])
                    })
                    .collect(),
            ),
            _ => AvroValue::Null,
        };

        let data_file = AvroValue::Record(vec![
            ("content".to_string(), AvroValue::Int(0)),
            ("file_path".to_string(), AvroValue::String(file.file_path.clone())),
            ("file_format".to_string(), AvroValue::String("PARQUET".to_string())),
            ("partition".to_string(), partition),
            ("record_count".to_string(), AvroValue::Long(file.record_count)),
            (
                "file_size_in_bytes".to_string(),
                AvroValue::Long(file.file_size_in_bytes),
            ),
            ("column_sizes".to_string(), count_map(&file.column_sizes)),
            ("value_counts".to_string(), count_map(&file.value_counts)),
            (
                "null_value_counts".to_string(),
                count_map(&file.null_value_counts),
            ),
            (
                "nan_value_counts".to_string(),
                count_map(&file.nan_value_counts),
            ),
            ("lower_bounds".to_string(), bounds(&file.lower_bounds)),
            ("upper_bounds".to_string(), bounds(&file.upper_bounds)),
            ("key_metadata".to_string(), AvroValue::Null),
            (
                "split_offsets".to_string(),
                match &file.split_offsets {
                    Some(offsets) => AvroValue::Array(
                        offsets.iter().map(|offset| AvroValue::Long(*offset)).collect(),
                    ),
                    None => AvroValue::Null,
                },
            ),
            ("equality_ids".to_string(), AvroValue::Null),
            ("sort_order_id".to_string(), AvroValue::Null),
        ]);

        AvroValue::Record(vec![
            (
                "status".to_string(),
                AvroValue::Int(ManifestStatus::Added as i32),
            ),
            ("snapshot_id".to_string(), AvroValue::Long(self.snapshot_id)),
            // Sequence numbers stay null so readers inherit them from the
            // manifest list.
            ("sequence_number".to_string(), AvroValue::Null),
            ("file_sequence_number".to_string(), AvroValue::Null),
            ("data_file".to_string(), data_file),
        ])
    }
}

/// Flatten an integer-keyed count map into the `array<record{key,value}>`
/// form, sorted by key.
fn count_map(map: &Option<HashMap<i32, i64>>) -> AvroValue {
    match map {
        Some(map) => AvroValue::Array(
            map.iter()
                .sorted_by_key(|(id, _)| **id)
                .map(|(key, value)| {
                    AvroValue::Record(vec![
                        ("key".to_string(), AvroValue::Int(*key)),
                        ("value".to_string(), AvroValue::Long(*value)),
                    ])
                })
                .collect(),
        ),
        None => AvroValue::Null,
    }
}

/// Resolve one partition value from the hive-style values of a file path.
fn partition_value(field: &PartitionField, values: &HashMap<String, String>) -> AvroValue {
    use crate::spec::transform::Transform;

    let direct = values.get(&field.name);
    if field.transform.produces_int() {
        if let Some(raw) = direct {
            if let Ok(v) = raw.parse::<i32>() {
                return AvroValue::Int(v);
            }
            if field.transform == Transform::Day {
                if let Ok(date) = raw.parse::<NaiveDate>() {
                    return AvroValue::Int(epoch_days(date));
                }
            }
        }
        // Hive-layout fallback: a day partition can be reassembled from
        // year/month/day path segments.
        if field.transform == Transform::Day {
            if let Some(days) = day_from_hive_parts(values) {
                return AvroValue::Int(days);
            }
        }
        AvroValue::Null
    } else {
        match direct {
            Some(raw) => AvroValue::String(raw.clone()),
            None => AvroValue::Null,
        }
    }
}

fn day_from_hive_parts(values: &HashMap<String, String>) -> Option<i32> {
    let year = values.get("year")?.parse().ok()?;
    let month = values.get("month")?.parse().ok()?;
    let day = values.get("day")?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(epoch_days)
}

fn epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
    (date - epoch).num_days() as i32
}

/// The v2 `manifest_entry` writer schema for the given partition fields.
pub fn manifest_entry_schema(partition_fields: &[PartitionField]) -> AvroSchema {
    let partition_record = AvroSchema::record(
        "r102",
        partition_fields
            .iter()
            .map(|field| {
                let value_schema = if field.transform.produces_int() {
                    AvroSchema::Int
                } else {
                    AvroSchema::String
                };
                RecordField::new(&field.name, AvroSchema::optional(value_schema))
                    .with_default(json!(null))
                    .with_field_id(field.field_id)
            })
            .collect(),
    );

    let count_map = |name: &str, element_id: i32, key_id: i32, value_id: i32| {
        AvroSchema::entry_map(name, AvroSchema::Int, AvroSchema::Long, element_id, key_id, value_id)
    };
    let bytes_map = |name: &str, element_id: i32, key_id: i32, value_id: i32| {
        AvroSchema::entry_map(name, AvroSchema::Int, AvroSchema::Bytes, element_id, key_id, value_id)
    };

    let data_file = AvroSchema::record("r2", vec![
        RecordField::new("content", AvroSchema::Int).with_field_id(134),
        RecordField::new("file_path", AvroSchema::String).with_field_id(100),
        RecordField::new("file_format", AvroSchema::String).with_field_id(101),
        RecordField::new("partition", partition_record).with_field_id(102),
        RecordField::new("record_count", AvroSchema::Long).with_field_id(103),
        RecordField::new("file_size_in_bytes", AvroSchema::Long).with_field_id(104),
        RecordField::new(
            "column_sizes",
            AvroSchema::optional(count_map("k117_v118", 108, 117, 118)),
        )
        .with_default(json!(null))
        .with_field_id(108),
        RecordField::new(
            "value_counts",
            AvroSchema::optional(count_map("k119_v120", 109, 119, 120)),
        )
        .with_default(json!(null))
        .with_field_id(109),
        RecordField::new(
            "null_value_counts",
            AvroSchema::optional(count_map("k121_v122", 110, 121, 122)),
        )
        .with_default(json!(null))
        .with_field_id(110),
        RecordField::new(
            "nan_value_counts",
            AvroSchema::optional(count_map("k138_v139", 137, 138, 139)),
        )
        .with_default(json!(null))
        .with_field_id(137),
        RecordField::new(
            "lower_bounds",
            AvroSchema::optional(bytes_map("k126_v127", 125, 126, 127)),
        )
        .with_default(json!(null))
        .with_field_id(125),
        RecordField::new(
            "upper_bounds",
            AvroSchema::optional(bytes_map("k129_v130", 128, 129, 130)),
        )
        .with_default(json!(null))
        .with_field_id(128),
        RecordField::new("key_metadata", AvroSchema::optional(AvroSchema::Bytes))
            .with_default(json!(null))
            .with_field_id(131),
        RecordField::new(
            "split_offsets",
            AvroSchema::optional(AvroSchema::array_with_element_id(AvroSchema::Long, 133)),
        )
        .with_default(json!(null))
        .with_field_id(132),
        RecordField::new(
            "equality_ids",
            AvroSchema::optional(AvroSchema::array_with_element_id(AvroSchema::Int, 136)),
        )
        .with_default(json!(null))
        .with_field_id(135),
        RecordField::new("sort_order_id", AvroSchema::optional(AvroSchema::Int))
            .with_default(json!(null))
            .with_field_id(140),
    ]);

    AvroSchema::record("manifest_entry", vec![
        RecordField::new("status", AvroSchema::Int).with_field_id(0),
        RecordField::new("snapshot_id", AvroSchema::optional(AvroSchema::Long))
            .with_default(json!(null))
            .with_field_id(1),
        RecordField::new("sequence_number", AvroSchema::optional(AvroSchema::Long))
            .with_default(json!(null))
            .with_field_id(3),
        RecordField::new("file_sequence_number", AvroSchema::optional(AvroSchema::Long))
            .with_default(json!(null))
            .with_field_id(4),
        RecordField::new("data_file", data_file).with_field_id(2),
    ])
}
