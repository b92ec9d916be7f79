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

//! Manifest lists: one Avro record per manifest of a snapshot.

use serde_json::json;
use typed_builder::TypedBuilder;

use crate::avro::{AvroSchema, AvroValue, Codec, OcfWriter, RecordField};
use crate::Result;

/// Metadata of one manifest referenced from a manifest list.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ManifestFile {
    /// Location of the manifest file.
    pub manifest_path: String,
    /// Length of the manifest file in bytes.
    pub manifest_length: i64,
    /// ID of the partition spec the manifest was written under.
    pub partition_spec_id: i32,
    /// ID of the snapshot that added the manifest.
    pub added_snapshot_id: i64,
    /// Number of ADDED entries in the manifest.
    pub added_data_files_count: i32,
    /// Number of EXISTING entries in the manifest.
    #[builder(default)]
    pub existing_data_files_count: i32,
    /// Number of DELETED entries in the manifest.
    #[builder(default)]
    pub deleted_data_files_count: i32,
    /// Rows added by the manifest's ADDED files.
    pub added_rows_count: i64,
    /// Rows in the manifest's EXISTING files.
    #[builder(default)]
    pub existing_rows_count: i64,
    /// Rows removed by the manifest's DELETED files.
    #[builder(default)]
    pub deleted_rows_count: i64,
}

/// Builds the manifest-list Avro file for one snapshot.
#[derive(Debug)]
pub struct ManifestListWriter {
    snapshot_id: i64,
    sequence_number: i64,
}

impl ManifestListWriter {
    /// Create a writer for `snapshot_id` at `sequence_number`.
    pub fn new(snapshot_id: i64, sequence_number: i64) -> Self {
        Self {
            snapshot_id,
            sequence_number,
        }
    }

    /// Serialize the manifest entries into an Object Container File.
    pub fn write(&self, manifests: &[ManifestFile]) -> Result<Vec<u8>> {
        let mut writer = OcfWriter::new(manifest_file_schema(), Codec::Null)?
            .with_metadata("format-version", "2".as_bytes().to_vec())
            .with_metadata(
                "snapshot-id",
                self.snapshot_id.to_string().into_bytes(),
            )
            .with_metadata(
                "sequence-number",
                self.sequence_number.to_string().into_bytes(),
            );

        for manifest in manifests {
            writer.append(&self.entry(manifest))?;
        }
        writer.into_bytes()
    }

    fn entry(&self, manifest: &ManifestFile) -> AvroValue {
        AvroValue::Record(vec![
            (
                "manifest_path".to_string(),
                AvroValue::String(manifest.manifest_path.clone()),
            ),
            (
                "manifest_length".to_string(),
                AvroValue::Long(manifest.manifest_length),
            ),
            (
                "partition_spec_id".to_string(),
                AvroValue::Int(manifest.partition_spec_id),
            ),
            ("content".to_string(), AvroValue::Int(0)),
            // Data manifests written here always carry the snapshot's own
            // sequence number, so min == sequence.
            (
                "sequence_number".to_string(),
                AvroValue::Long(self.sequence_number),
            ),
            (
                "min_sequence_number".to_string(),
                AvroValue::Long(self.sequence_number),
            ),
            (
                "added_snapshot_id".to_string(),
                AvroValue::Long(manifest.added_snapshot_id),
            ),
            (
                "added_data_files_count".to_string(),
                AvroValue::Int(manifest.added_data_files_count),
            ),
            (
                "existing_data_files_count".to_string(),
                AvroValue::Int(manifest.existing_data_files_count),
            ),
            (
                "deleted_data_files_count".to_string(),
                AvroValue::Int(manifest.deleted_data_files_count),
            ),
            (
                "added_rows_count".to_string(),
                AvroValue::Long(manifest.added_rows_count),
            ),
            (
                "existing_rows_count".to_string(),
                AvroValue::Long(manifest.existing_rows_count),
            ),
            (
                "deleted_rows_count".to_string(),
                AvroValue::Long(manifest.deleted_rows_count),
            ),
            ("partitions".to_string(), AvroValue::Null),
            ("key_metadata".to_string(), AvroValue::Null),
        ])
    }
}

/// The v2 `manifest_file` writer schema.
pub fn manifest_file_schema() -> AvroSchema {
    let field_summary = AvroSchema::record("r508", vec![
        RecordField::new("contains_null", AvroSchema::Boolean).with_field_id(509),
        RecordField::new("contains_nan", AvroSchema::optional(AvroSchema::Boolean))
            .with_default(json!(null))
            .with_field_id(518),
        RecordField::new("lower_bound", AvroSchema::optional(AvroSchema::Bytes))
            .with_default(json!(null))
            .with_field_id(510),
        RecordField::new("upper_bound", AvroSchema::optional(AvroSchema::Bytes))
            .with_default(json!(null))
            .with_field_id(511),
    ]);

    AvroSchema::record("manifest_file", vec![
        RecordField::new("manifest_path", AvroSchema::String).with_field_id(500),
        RecordField::new("manifest_length", AvroSchema::Long).with_field_id(501),
        RecordField::new("partition_spec_id", AvroSchema::Int).with_field_id(502),
        RecordField::new("content", AvroSchema::Int).with_field_id(517),
        RecordField::new("sequence_number", AvroSchema::Long).with_field_id(515),
        RecordField::new("min_sequence_number", AvroSchema::Long).with_field_id(516),
        RecordField::new("added_snapshot_id", AvroSchema::Long).with_field_id(503),
        RecordField::new("added_data_files_count", AvroSchema::Int).with_field_id(504),
        RecordField::new("existing_data_files_count", AvroSchema::Int).with_field_id(505),
        RecordField::new("deleted_data_files_count", AvroSchema::Int).with_field_id(506),
        RecordField::new("added_rows_count", AvroSchema::Long).with_field_id(512),
        RecordField::new("existing_rows_count", AvroSchema::Long).with_field_id(513),
        RecordField::new("deleted_rows_count", AvroSchema::Long).with_field_id(514),
        RecordField::new(
            "partitions",
            AvroSchema::optional(AvroSchema::array_with_element_id(field_summary, 508)),
        )
        .with_default(json!(null))
        .with_field_id(507),
        RecordField::new("key_metadata", AvroSchema::optional(AvroSchema::Bytes))
            .with_default(json!(null))
            .with_field_id(519),
    ])
}
