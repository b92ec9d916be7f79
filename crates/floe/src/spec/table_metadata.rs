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

/*!
Defines the [table metadata](https://iceberg.apache.org/spec/#table-metadata)
document for format version 2 and its pure mutations. The document is
immutable on disk; every change produces the next `v{N}.metadata.json`.
*/

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spec::name_mapping::{NameMapping, NAME_MAPPING_PROPERTY};
use crate::spec::partition::PartitionSpec;
use crate::spec::schema::{Schema, SchemaRef};
use crate::spec::snapshot::{Snapshot, SnapshotRef};
use crate::spec::sort::SortOrder;
use crate::{ensure_data_valid, Error, ErrorKind, Result};

/// The format version this writer produces.
pub const FORMAT_VERSION: u8 = 2;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(try_from = "TableMetadataV2", into = "TableMetadataV2")]
/// The v2 table metadata document.
pub struct TableMetadata {
    /// A UUID that identifies the table.
    table_uuid: Uuid,
    /// The table's base location.
    location: String,
    /// The table's highest assigned sequence number; monotone.
    last_sequence_number: i64,
    /// Timestamp in milliseconds from the unix epoch when the table was
    /// last updated.
    last_updated_ms: i64,
    /// The highest assigned column ID for the table; never decreases, so
    /// dropped field ids are never handed out again.
    last_column_id: i32,
    /// Every schema the table has ever had, current one included.
    schemas: Vec<SchemaRef>,
    /// ID of the table's current schema.
    current_schema_id: i32,
    /// A list of partition specs.
    partition_specs: Vec<PartitionSpec>,
    /// ID of the spec writers use by default.
    default_spec_id: i32,
    /// The highest assigned partition field ID across all specs.
    last_partition_id: i32,
    /// String properties; includes `schema.name-mapping.default`.
    properties: HashMap<String, String>,
    /// ID of the current snapshot, or None before the first commit.
    current_snapshot_id: Option<i64>,
    /// Valid snapshots, in commit order.
    snapshots: Vec<SnapshotRef>,
    /// One log entry per committed snapshot, parallel to `snapshots`.
    snapshot_log: Vec<SnapshotLog>,
    /// Pointers to previous metadata files.
    metadata_log: Vec<MetadataLog>,
    /// A list of sort orders.
    sort_orders: Vec<SortOrder>,
    /// Default sort order id of the table.
    default_sort_order_id: i64,
}

impl TableMetadata {
    /// Create the metadata of a brand-new, empty table.
    ///
    /// `last-column-id` starts at the highest field id in the schema. The
    /// default name mapping is installed as a property; entries of
    /// `properties` win on key collisions.
    pub fn new(
        location: impl Into<String>,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<Self> {
        let schema = schema.with_schema_id(0);
        let last_column_id = schema.highest_field_id();
        let last_partition_id = partition_spec.highest_field_id();

        let mut merged = HashMap::from([(
            NAME_MAPPING_PROPERTY.to_string(),
            serde_json::to_string(&NameMapping::from_schema(&schema))?,
        )]);
        merged.extend(properties);

        Ok(TableMetadata {
            table_uuid: Uuid::new_v4(),
            location: location.into(),
            last_sequence_number: 0,
            last_updated_ms: Utc::now().timestamp_millis(),
            last_column_id,
            schemas: vec![Arc::new(schema)],
            current_schema_id: 0,
            partition_specs: vec![PartitionSpec {
                spec_id: 0,
                ..partition_spec
            }],
            default_spec_id: 0,
            last_partition_id,
            properties: merged,
            current_snapshot_id: None,
            snapshots: Vec::new(),
            snapshot_log: Vec::new(),
            metadata_log: Vec::new(),
            sort_orders: vec![SortOrder::unsorted()],
            default_sort_order_id: 0,
        })
    }

    /// The table uuid.
    #[inline]
    pub fn table_uuid(&self) -> Uuid {
        self.table_uuid
    }

    /// The table's base location.
    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The highest committed sequence number.
    #[inline]
    pub fn last_sequence_number(&self) -> i64 {
        self.last_sequence_number
    }

    /// The sequence number the next commit will carry.
    #[inline]
    pub fn next_sequence_number(&self) -> i64 {
        self.last_sequence_number + 1
    }

    /// The high-water mark of field ids ever assigned.
    #[inline]
    pub fn last_column_id(&self) -> i32 {
        self.last_column_id
    }

    /// Timestamp of the last update in epoch millis.
    #[inline]
    pub fn last_updated_ms(&self) -> i64 {
        self.last_updated_ms
    }

    /// All schemas the table has had.
    #[inline]
    pub fn schemas(&self) -> &[SchemaRef] {
        &self.schemas
    }

    /// Id of the current schema.
    #[inline]
    pub fn current_schema_id(&self) -> i32 {
        self.current_schema_id
    }

    /// Get the current schema.
    pub fn current_schema(&self) -> Result<&SchemaRef> {
        self.schemas
            .iter()
            .find(|schema| schema.schema_id() == self.current_schema_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("schema id {} not found", self.current_schema_id),
                )
            })
    }

    /// Get the default partition spec.
    pub fn default_partition_spec(&self) -> Result<&PartitionSpec> {
        self.partition_specs
            .iter()
            .find(|spec| spec.spec_id == self.default_spec_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("partition spec id {} not found", self.default_spec_id),
                )
            })
    }

    /// The table properties.
    #[inline]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Id of the current snapshot, if any.
    #[inline]
    pub fn current_snapshot_id(&self) -> Option<i64> {
        self.current_snapshot_id
    }

    /// Committed snapshots in commit order.
    #[inline]
    pub fn snapshots(&self) -> &[SnapshotRef] {
        &self.snapshots
    }

    /// The snapshot log, parallel to `snapshots`.
    #[inline]
    pub fn snapshot_log(&self) -> &[SnapshotLog] {
        &self.snapshot_log
    }

    /// The metadata log.
    #[inline]
    pub fn metadata_log(&self) -> &[MetadataLog] {
        &self.metadata_log
    }

    /// Get the current snapshot.
    pub fn current_snapshot(&self) -> Option<&SnapshotRef> {
        let id = self.current_snapshot_id?;
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.snapshot_id() == id)
    }

    /// Relative path of the metadata file for the current state,
    /// `metadata/v{N}.metadata.json` with N = the last sequence number.
    pub fn metadata_file_path(&self) -> String {
        format!("metadata/v{}.metadata.json", self.last_sequence_number)
    }

    /// Commit a snapshot: bump the sequence number, make the snapshot
    /// current and extend the logs. Pure; persisting the result is a
    /// separate `save`.
    pub fn add_snapshot(mut self, snapshot: Snapshot) -> Result<Self> {
        ensure_data_valid!(
            snapshot.sequence_number() == self.last_sequence_number + 1,
            "snapshot sequence number {} does not follow table sequence number {}",
            snapshot.sequence_number(),
            self.last_sequence_number,
        );

        self.last_sequence_number += 1;
        self.current_snapshot_id = Some(snapshot.snapshot_id());
        self.last_updated_ms = snapshot.timestamp_ms();
        self.snapshot_log.push(SnapshotLog {
            snapshot_id: snapshot.snapshot_id(),
            timestamp_ms: snapshot.timestamp_ms(),
        });
        self.snapshots.push(Arc::new(snapshot));
        Ok(self)
    }

    /// Install an evolved schema produced by a schema evolution operation.
    ///
    /// The schema receives the next free schema id; `last-column-id` only
    /// ever grows; the default name mapping is rebuilt.
    pub fn with_new_schema(mut self, schema: Schema) -> Result<Self> {
        let next_schema_id = self
            .schemas
            .iter()
            .map(|s| s.schema_id())
            .max()
            .unwrap_or(0)
            + 1;
        let schema = schema.with_schema_id(next_schema_id);

        self.last_column_id = self.last_column_id.max(schema.highest_field_id());
        self.properties.insert(
            NAME_MAPPING_PROPERTY.to_string(),
            serde_json::to_string(&NameMapping::from_schema(&schema))?,
        );
        self.schemas.push(Arc::new(schema));
        self.current_schema_id = next_schema_id;
        self.last_updated_ms = Utc::now().timestamp_millis();
        Ok(self)
    }

    /// Merge properties and refresh the update timestamp.
    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self.last_updated_ms = Utc::now().timestamp_millis();
        self
    }

    /// Record a pointer to the metadata file this document was loaded
    /// from, ahead of saving its successor.
    pub fn append_metadata_log(mut self, entry: MetadataLog) -> Self {
        self.metadata_log.push(entry);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// The on-disk shape of the v2 document.
struct TableMetadataV2 {
    format_version: VersionNumber<2>,
    table_uuid: Uuid,
    location: String,
    last_sequence_number: i64,
    last_updated_ms: i64,
    last_column_id: i32,
    schemas: Vec<Schema>,
    current_schema_id: i32,
    partition_specs: Vec<PartitionSpec>,
    default_spec_id: i32,
    last_partition_id: i32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    properties: HashMap<String, String>,
    #[serde(default)]
    current_snapshot_id: Option<i64>,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    snapshot_log: Vec<SnapshotLog>,
    #[serde(default)]
    metadata_log: Vec<MetadataLog>,
    sort_orders: Vec<SortOrder>,
    default_sort_order_id: i64,
}

/// Helper to serialize and deserialize the format version.
#[derive(Debug, PartialEq, Eq)]
struct VersionNumber<const V: u8>;

impl<const V: u8> Serialize for VersionNumber<V> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: serde::Serializer {
        serializer.serialize_u8(V)
    }
}

impl<'de, const V: u8> Deserialize<'de> for VersionNumber<V> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: serde::Deserializer<'de> {
        let value = u8::deserialize(deserializer)?;
        if value == V {
            Ok(VersionNumber::<V>)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected format version {V}, got {value}"
            )))
        }
    }
}

impl TryFrom<TableMetadataV2> for TableMetadata {
    type Error = Error;

    fn try_from(value: TableMetadataV2) -> Result<Self> {
        // -1 on disk means no current snapshot.
        let current_snapshot_id = value.current_snapshot_id.filter(|id| *id != -1);

        ensure_data_valid!(
            value.snapshots.len() == value.snapshot_log.len(),
            "snapshot log length {} does not match snapshot count {}",
            value.snapshot_log.len(),
            value.snapshots.len(),
        );
        for (snapshot, log) in value.snapshots.iter().zip(value.snapshot_log.iter()) {
            ensure_data_valid!(
                snapshot.snapshot_id() == log.snapshot_id,
                "snapshot log entry {} does not match snapshot {}",
                log.snapshot_id,
                snapshot.snapshot_id(),
            );
        }
        if let Some(id) = current_snapshot_id {
            ensure_data_valid!(
                value.snapshots.iter().any(|s| s.snapshot_id() == id),
                "current snapshot id {} is not a known snapshot",
                id,
            );
        }

        Ok(TableMetadata {
            table_uuid: value.table_uuid,
            location: value.location,
            last_sequence_number: value.last_sequence_number,
            last_updated_ms: value.last_updated_ms,
            last_column_id: value.last_column_id,
            schemas: value.schemas.into_iter().map(Arc::new).collect(),
            current_schema_id: value.current_schema_id,
            partition_specs: value.partition_specs,
            default_spec_id: value.default_spec_id,
            last_partition_id: value.last_partition_id,
            properties: value.properties,
            current_snapshot_id,
            snapshots: value.snapshots.into_iter().map(Arc::new).collect(),
            snapshot_log: value.snapshot_log,
            metadata_log: value.metadata_log,
            sort_orders: value.sort_orders,
            default_sort_order_id: value.default_sort_order_id,
        })
    }
}

impl From<TableMetadata> for TableMetadataV2 {
    fn from(v: TableMetadata) -> Self {
        TableMetadataV2 {
            format_version: VersionNumber::<2>,
            table_uuid: v.table_uuid,
            location: v.location,
            last_sequence_number: v.last_sequence_number,
            last_updated_ms: v.last_updated_ms,
            last_column_id: v.last_column_id,
            schemas: v
                .schemas
                .into_iter()
                .map(|schema| {
                    Arc::try_unwrap(schema).unwrap_or_else(|schema| schema.as_ref().clone())
                })
                .collect(),
            current_schema_id: v.current_schema_id,
            partition_specs: v.partition_specs,
            default_spec_id: v.default_spec_id,
            last_partition_id: v.last_partition_id,
            properties: v.properties,
            current_snapshot_id: v.current_snapshot_id.or(Some(-1)),
            snapshots: v
                .snapshots
                .into_iter()
                .map(|snapshot| {
                    Arc::try_unwrap(snapshot).unwrap_or_else(|snapshot| snapshot.as_ref().clone())
                })
                .collect(),
            snapshot_log: v.snapshot_log,
            metadata_log: v.metadata_log,
            sort_orders: v.sort_orders,
            default_sort_order_id: v.default_sort_order_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Encodes changes to the previous metadata files for the table.
pub struct MetadataLog {
    /// The file for the log.
    pub metadata_file: String,
    /// Time new metadata was created.
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A log of when each snapshot was made.
pub struct SnapshotLog {
    /// Id of the snapshot.
    pub snapshot_id: i64,
    /// Last updated timestamp.
    pub timestamp_ms: i64,
}
