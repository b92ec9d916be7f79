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

//! Snapshot assembly: stats to manifest to manifest list to a snapshot
//! record ready for the metadata state machine.
//!
//! Upload order matters. The manifest goes first, the manifest list
//! second; nothing references either until the snapshot lands in a saved
//! metadata document, so a failure partway leaves only orphaned files.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::compute::ComputeRef;
use crate::io::StorageRef;
use crate::spec::{
    summary, DataFileStats, ManifestFile, ManifestListWriter, ManifestWriter, Operation,
    PartitionSpec, Schema, Snapshot, Summary,
};
use crate::stats::collect_data_file_stats;
use crate::{ErrorKind, Result};

const AVRO_CONTENT_TYPE: &str = "avro/binary";

/// Inputs of one snapshot production.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SnapshotOptions {
    /// The partition spec the data files were written under.
    #[builder(default = PartitionSpec::unpartitioned())]
    pub partition_spec: PartitionSpec,
    /// The sequence number the snapshot will commit at, normally the
    /// table's `last-sequence-number + 1`.
    pub sequence_number: i64,
    /// Operation recorded in the snapshot summary.
    #[builder(default)]
    pub operation: Operation,
    /// Source file recorded in the summary for register-file snapshots.
    #[builder(default, setter(strip_option, into))]
    pub source_file: Option<String>,
    /// Explicit snapshot id; defaults to the millisecond clock.
    #[builder(default, setter(strip_option))]
    pub snapshot_id: Option<i64>,
    /// The table schema, used to type the manifest bounds.
    #[builder(default, setter(strip_option))]
    pub table_schema: Option<Schema>,
    /// Id of the schema the snapshot is written under.
    #[builder(default)]
    pub schema_id: i32,
}

/// Assembles and uploads the manifest and manifest list of a snapshot.
#[derive(Debug)]
pub struct SnapshotProducer {
    storage: StorageRef,
    compute: ComputeRef,
    base_url: String,
}

impl SnapshotProducer {
    /// Create a producer. `base_url` prefixes relative storage paths into
    /// the absolute URLs recorded inside metadata.
    pub fn new(storage: StorageRef, compute: ComputeRef, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            compute,
            base_url: base_url.into(),
        }
    }

    fn absolute_url(&self, path: &str) -> String {
        if self.base_url.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    /// Produce the snapshot for every data file matching `data_glob`.
    ///
    /// An empty glob match still produces a legal snapshot with zero
    /// added files.
    pub async fn produce(
        &self,
        table_path: &str,
        data_glob: &str,
        options: SnapshotOptions,
    ) -> Result<Snapshot> {
        let files = collect_data_file_stats(self.compute.as_ref(), data_glob).await?;
        self.produce_from_stats(table_path, files, options).await
    }

    /// Produce the snapshot from already collected file statistics.
    pub async fn produce_from_stats(
        &self,
        table_path: &str,
        files: Vec<DataFileStats>,
        options: SnapshotOptions,
    ) -> Result<Snapshot> {
        let snapshot_id = options
            .snapshot_id
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        let manifest_url = self
            .upload_manifest(table_path, snapshot_id, &options, &files)
            .await?;
        let manifest_list_url = self
            .upload_manifest_list(table_path, snapshot_id, &options, &files, &manifest_url)
            .await?;

        Ok(self.snapshot_record(snapshot_id, &options, &files, manifest_list_url))
    }

    async fn upload_manifest(
        &self,
        table_path: &str,
        snapshot_id: i64,
        options: &SnapshotOptions,
        files: &[DataFileStats],
    ) -> Result<(String, usize)> {
        let mut writer = ManifestWriter::new(
            snapshot_id,
            options.partition_spec.clone(),
            options.schema_id,
        );
        if let Some(schema) = &options.table_schema {
            writer = writer.with_schema(schema.clone());
        }
        let bytes = writer.write(files)?;
        let length = bytes.len();

        let path = format!("{table_path}/metadata/{}.avro", Uuid::new_v4());
        self.storage
            .upload(&path, Bytes::from(bytes), Some(AVRO_CONTENT_TYPE))
            .await
            .map_err(|err| err.with_kind(ErrorKind::ManifestUploadFailed))?;
        debug!(%path, entries = files.len(), "uploaded manifest");
        Ok((self.absolute_url(&path), length))
    }

    async fn upload_manifest_list(
        &self,
        table_path: &str,
        snapshot_id: i64,
        options: &SnapshotOptions,
        files: &[DataFileStats],
        manifest_url: &(String, usize),
    ) -> Result<String> {
        let (manifest_path, manifest_length) = manifest_url;
        let manifest = ManifestFile::builder()
            .manifest_path(manifest_path.clone())
            .manifest_length(*manifest_length as i64)
            .partition_spec_id(options.partition_spec.spec_id)
            .added_snapshot_id(snapshot_id)
            .added_data_files_count(files.len() as i32)
            .added_rows_count(files.iter().map(|file| file.record_count).sum())
            .build();

        let bytes = ManifestListWriter::new(snapshot_id, options.sequence_number)
            .write(std::slice::from_ref(&manifest))?;

        let path = format!(
            "{table_path}/metadata/snap-{snapshot_id}-{}.avro",
            Uuid::new_v4()
        );
        self.storage
            .upload(&path, Bytes::from(bytes), Some(AVRO_CONTENT_TYPE))
            .await
            .map_err(|err| err.with_kind(ErrorKind::ManifestListUploadFailed))?;
        debug!(%path, "uploaded manifest list");
        Ok(self.absolute_url(&path))
    }

    fn snapshot_record(
        &self,
        snapshot_id: i64,
        options: &SnapshotOptions,
        files: &[DataFileStats],
        manifest_list_url: String,
    ) -> Snapshot {
        let added_records: i64 = files.iter().map(|file| file.record_count).sum();
        let added_files_size: i64 = files.iter().map(|file| file.file_size_in_bytes).sum();

        let mut other = HashMap::from([
            (
                summary::ADDED_DATA_FILES.to_string(),
                files.len().to_string(),
            ),
            (summary::ADDED_RECORDS.to_string(), added_records.to_string()),
            (
                summary::ADDED_FILES_SIZE.to_string(),
                added_files_size.to_string(),
            ),
        ]);
        if let Some(source_file) = &options.source_file {
            other.insert(summary::SOURCE_FILE.to_string(), source_file.clone());
        }

        Snapshot::builder()
            .snapshot_id(snapshot_id)
            .sequence_number(options.sequence_number)
            .timestamp_ms(Utc::now().timestamp_millis())
            .manifest_list(manifest_list_url)
            .summary(Summary {
                operation: options.operation,
                other,
            })
            .schema_id(options.schema_id)
            .build()
    }
}
