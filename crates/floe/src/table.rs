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

//! The table facade: create, insert-overwrite, register externally
//! produced files and evolve schemas.
//!
//! One logical operation is a blocking sequence of storage and compute
//! steps. The facade provides no locking; writers to the same table must
//! be serialized by the caller.

use std::collections::HashMap;

use tracing::{debug, warn};
use typed_builder::TypedBuilder;
use url::Url;

use crate::compute::{ComputeRef, WriteDataFilesOptions};
use crate::evolution::{self, EvolutionContext, NewColumn, ValidationMode};
use crate::io::StorageRef;
use crate::metastore::Metastore;
use crate::snapshot_producer::{SnapshotOptions, SnapshotProducer};
use crate::spec::{
    NameMapping, Operation, PartitionSpec, PrimitiveType, Schema, Snapshot, TableMetadata,
    NAME_MAPPING_PROPERTY,
};
use crate::stats::collect_data_file_stats;
use crate::{Error, ErrorKind, Result};

/// Configuration every table operation runs under.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TableConfig {
    /// The storage collaborator; paths are relative to its root.
    pub storage: StorageRef,
    /// The compute collaborator.
    pub compute: ComputeRef,
    /// Absolute URL prefix of the storage root, used to render the
    /// absolute URLs embedded in metadata.
    #[builder(setter(into))]
    pub base_url: String,
}

/// Handle for operating on tables under one configuration.
#[derive(Debug)]
pub struct Table {
    config: TableConfig,
    metastore: Metastore,
    producer: SnapshotProducer,
}

impl Table {
    /// Create a table handle.
    pub fn new(config: TableConfig) -> Self {
        let metastore = Metastore::new(config.storage.clone(), config.base_url.clone());
        let producer = SnapshotProducer::new(
            config.storage.clone(),
            config.compute.clone(),
            config.base_url.clone(),
        );
        Self {
            config,
            metastore,
            producer,
        }
    }

    fn absolute_url(&self, path: &str) -> String {
        if self.config.base_url.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    /// Create a new table. Refuses to overwrite an existing one.
    pub async fn create(
        &self,
        table_path: &str,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        if !self.config.base_url.is_empty() {
            Url::parse(&self.config.base_url).map_err(|err| {
                Error::from(err).with_context("base_url", self.config.base_url.clone())
            })?;
        }
        if self.metastore.exists(table_path).await? {
            return Err(Error::new(ErrorKind::AlreadyExists, "table already exists")
                .with_context("table_path", table_path.to_string()));
        }
        let metadata =
            self.metastore
                .create_initial(table_path, schema, partition_spec, properties)?;
        self.metastore.save(table_path, &metadata).await?;
        Ok(metadata)
    }

    /// Load the current metadata of a table.
    pub async fn load(&self, table_path: &str) -> Result<TableMetadata> {
        self.metastore.load(table_path).await
    }

    /// Whether a table exists at `table_path`.
    pub async fn exists(&self, table_path: &str) -> Result<bool> {
        self.metastore.exists(table_path).await
    }

    /// Replace the table's contents with the result of `source_sql`.
    ///
    /// Clears `data/`, has the compute engine write fresh Parquet files,
    /// assembles the snapshot and commits it. Leftover delete failures
    /// are logged, not fatal; the new write is authoritative.
    pub async fn insert_overwrite(&self, table_path: &str, source_sql: &str) -> Result<Snapshot> {
        let prior = self.metastore.load(table_path).await?;
        let schema = prior.current_schema()?.as_ref().clone();
        let partition_spec = prior.default_partition_spec()?.clone();

        self.clear_data_directory(table_path).await;

        let data_url = self.absolute_url(&format!("{table_path}/data"));
        let options = WriteDataFilesOptions {
            partition_by: partition_spec.fields.iter().map(|f| f.name.clone()).collect(),
        };
        self.config
            .compute
            .write_data_files(source_sql, &data_url, &options)
            .await?;

        let snapshot = self
            .producer
            .produce(
                table_path,
                &format!("{data_url}/**/*.parquet"),
                SnapshotOptions::builder()
                    .partition_spec(partition_spec)
                    .sequence_number(prior.next_sequence_number())
                    .operation(Operation::Overwrite)
                    .table_schema(schema)
                    .schema_id(prior.current_schema_id())
                    .build(),
            )
            .await?;

        let next = prior.clone().add_snapshot(snapshot.clone())?;
        self.metastore.commit(table_path, Some(&prior), next).await?;
        Ok(snapshot)
    }

    /// Commit files already produced by an external writer, without
    /// clearing or writing data. Returns `None` when the glob matches
    /// nothing.
    pub async fn register_files(
        &self,
        table_path: &str,
        file_glob: &str,
        source_file: Option<&str>,
    ) -> Result<Option<Snapshot>> {
        let prior = self.metastore.load(table_path).await?;
        let schema = prior.current_schema()?.as_ref().clone();
        let partition_spec = prior.default_partition_spec()?.clone();

        let files = collect_data_file_stats(self.config.compute.as_ref(), file_glob).await?;
        if files.is_empty() {
            debug!(file_glob, "no files matched; nothing to register");
            return Ok(None);
        }

        let builder = SnapshotOptions::builder()
            .partition_spec(partition_spec)
            .sequence_number(prior.next_sequence_number())
            .operation(Operation::Append)
            .table_schema(schema)
            .schema_id(prior.current_schema_id());
        let options = match source_file {
            Some(source_file) => builder.source_file(source_file).build(),
            None => builder.build(),
        };

        let snapshot = self
            .producer
            .produce_from_stats(table_path, files, options)
            .await?;

        let next = prior.clone().add_snapshot(snapshot.clone())?;
        self.metastore.commit(table_path, Some(&prior), next).await?;
        Ok(Some(snapshot))
    }

    /// Install `schema.name-mapping.default` on tables created before
    /// the property existed. Idempotent.
    pub async fn ensure_name_mapping(&self, table_path: &str) -> Result<TableMetadata> {
        let metadata = self.metastore.load(table_path).await?;
        if metadata.properties().contains_key(NAME_MAPPING_PROPERTY) {
            return Ok(metadata);
        }
        let mapping = serde_json::to_string(&NameMapping::from_schema(
            metadata.current_schema()?,
        ))?;
        self.metastore
            .update_properties(
                table_path,
                HashMap::from([(NAME_MAPPING_PROPERTY.to_string(), mapping)]),
            )
            .await
    }

    /// Merge string properties into the table.
    pub async fn update_properties(
        &self,
        table_path: &str,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        self.metastore.update_properties(table_path, properties).await
    }

    /// Add a column. `table_empty` overrides what the metadata implies;
    /// pass `Some(true)` when the caller knows no rows exist.
    pub async fn add_column(
        &self,
        table_path: &str,
        column: NewColumn,
        mode: ValidationMode,
        table_empty: Option<bool>,
    ) -> Result<(TableMetadata, Vec<String>)> {
        self.metastore
            .evolve_schema(table_path, |schema, ctx| {
                let ctx = EvolutionContext {
                    table_empty: table_empty.unwrap_or(ctx.table_empty),
                    ..ctx
                };
                evolution::add_column(schema, &ctx, column, mode)
            })
            .await
    }

    /// Drop a column by name.
    pub async fn drop_column(
        &self,
        table_path: &str,
        name: &str,
        mode: ValidationMode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        self.metastore
            .evolve_schema(table_path, |schema, _ctx| {
                evolution::drop_column(schema, name, mode)
            })
            .await
    }

    /// Rename a column, preserving its field id.
    pub async fn rename_column(
        &self,
        table_path: &str,
        old: &str,
        new: &str,
        mode: ValidationMode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        self.metastore
            .evolve_schema(table_path, |schema, _ctx| {
                evolution::rename_column(schema, old, new, mode)
            })
            .await
    }

    /// Change a column's primitive type.
    pub async fn update_column_type(
        &self,
        table_path: &str,
        name: &str,
        new_type: PrimitiveType,
        mode: ValidationMode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        self.metastore
            .evolve_schema(table_path, |schema, _ctx| {
                evolution::update_column_type(schema, name, new_type, mode)
            })
            .await
    }

    /// Flip a column between optional and required.
    pub async fn update_column_required(
        &self,
        table_path: &str,
        name: &str,
        required: bool,
        mode: ValidationMode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        self.metastore
            .evolve_schema(table_path, |schema, _ctx| {
                evolution::update_column_required(schema, name, required, mode)
            })
            .await
    }

    /// Delete every object under `{table_path}/data/`. Failures are
    /// logged and swallowed; the overwrite that follows is authoritative.
    async fn clear_data_directory(&self, table_path: &str) {
        let prefix = format!("{table_path}/data/");
        let paths = match self.config.storage.list(&prefix).await {
            Ok(paths) => paths,
            Err(err) => {
                warn!(%prefix, %err, "listing data directory failed; skipping clear");
                return;
            }
        };
        for path in paths {
            if let Err(err) = self.config.storage.delete(&path).await {
                warn!(%path, %err, "deleting data file failed; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::compute::{Row, ScriptedCompute};
    use crate::io::{MemoryStorage, Storage};
    use crate::spec::{NestedField, Type};

    fn schema() -> Schema {
        Schema::builder()
            .with_fields(vec![
                NestedField::required(1, "id", Type::Primitive(PrimitiveType::String)).into(),
                NestedField::optional(2, "name", Type::Primitive(PrimitiveType::String)).into(),
            ])
            .build()
            .unwrap()
    }

    fn harness() -> (Arc<MemoryStorage>, Arc<ScriptedCompute>, Table) {
        let storage = Arc::new(MemoryStorage::new());
        let compute = Arc::new(ScriptedCompute::with_storage(
            storage.clone(),
            "s3://warehouse",
        ));
        let table = Table::new(
            TableConfig::builder()
                .storage(storage.clone() as StorageRef)
                .compute(compute.clone() as ComputeRef)
                .base_url("s3://warehouse")
                .build(),
        );
        (storage, compute, table)
    }

    fn stats_row(path: &str, records: i64, size: i64) -> Row {
        Row::from([
            ("file_path".to_string(), json!(path)),
            ("record_count".to_string(), json!(records)),
            ("file_size_in_bytes".to_string(), json!(size)),
        ])
    }

    #[tokio::test]
    async fn test_create_refuses_existing_table() {
        let (_, _, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();
        let err = table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_insert_overwrite_clears_then_commits() {
        let (storage, compute, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();

        // A stale file from an earlier write must disappear.
        storage
            .upload("t/data/stale.parquet", Bytes::from_static(b"old"), None)
            .await
            .unwrap();

        compute
            .push_data_file("part-0.parquet", Bytes::from_static(b"pq"))
            .unwrap();
        compute
            .push_query_result(vec![stats_row(
                "s3://warehouse/t/data/part-0.parquet",
                2,
                64,
            )])
            .unwrap();

        let snapshot = table
            .insert_overwrite("t", "SELECT '1' AS id, 'a' AS name")
            .await
            .unwrap();

        assert!(!storage.exists("t/data/stale.parquet").await.unwrap());
        assert!(storage.exists("t/data/part-0.parquet").await.unwrap());
        assert_eq!(snapshot.summary().other["added-records"], "2");

        let metadata = table.load("t").await.unwrap();
        assert_eq!(metadata.last_sequence_number(), 1);
        assert_eq!(metadata.current_snapshot_id(), Some(snapshot.snapshot_id()));
        assert_eq!(metadata.snapshots().len(), 1);
        assert!(storage.exists("t/metadata/v1.metadata.json").await.unwrap());
        let hint = storage
            .download("t/metadata/version-hint.text")
            .await
            .unwrap();
        assert_eq!(&hint[..], b"1");
        // The previous metadata version is linked from the log.
        assert_eq!(metadata.metadata_log().len(), 1);
        assert!(metadata.metadata_log()[0]
            .metadata_file
            .ends_with("t/metadata/v0.metadata.json"));
    }

    #[tokio::test]
    async fn test_register_files_appends_without_clearing() {
        let (storage, compute, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();
        storage
            .upload("t/data/external.parquet", Bytes::from_static(b"pq"), None)
            .await
            .unwrap();
        compute
            .push_query_result(vec![stats_row(
                "s3://warehouse/t/data/external.parquet",
                5,
                128,
            )])
            .unwrap();

        let snapshot = table
            .register_files(
                "t",
                "s3://warehouse/t/data/*.parquet",
                Some("s3://ingest/batch-7.parquet"),
            )
            .await
            .unwrap()
            .expect("files matched");

        assert!(storage.exists("t/data/external.parquet").await.unwrap());
        assert_eq!(snapshot.summary().operation, Operation::Append);
        assert_eq!(
            snapshot.summary().other["source-file"],
            "s3://ingest/batch-7.parquet"
        );
        assert_eq!(snapshot.summary().other["added-records"], "5");
    }

    #[tokio::test]
    async fn test_register_files_with_no_match_is_none() {
        let (_, _, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();
        let result = table
            .register_files("t", "s3://warehouse/t/data/*.parquet", None)
            .await
            .unwrap();
        assert!(result.is_none());

        // No snapshot was committed.
        let metadata = table.load("t").await.unwrap();
        assert_eq!(metadata.last_sequence_number(), 0);
    }

    #[tokio::test]
    async fn test_ensure_name_mapping_is_idempotent() {
        let (storage, _, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();

        // Strip the property, as a table created by an older writer.
        let document = storage
            .download("t/metadata/v0.metadata.json")
            .await
            .unwrap();
        let mut json: serde_json::Value = serde_json::from_slice(&document).unwrap();
        json["properties"]
            .as_object_mut()
            .unwrap()
            .remove(NAME_MAPPING_PROPERTY);
        storage
            .upload(
                "t/metadata/v0.metadata.json",
                Bytes::from(serde_json::to_vec(&json).unwrap()),
                None,
            )
            .await
            .unwrap();

        let repaired = table.ensure_name_mapping("t").await.unwrap();
        assert!(repaired.properties().contains_key(NAME_MAPPING_PROPERTY));

        let unchanged = table.ensure_name_mapping("t").await.unwrap();
        assert_eq!(
            unchanged.properties()[NAME_MAPPING_PROPERTY],
            repaired.properties()[NAME_MAPPING_PROPERTY]
        );
    }

    #[tokio::test]
    async fn test_schema_evolution_wrappers() {
        let (_, _, table) = harness();
        table
            .create("t", schema(), PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();

        let (metadata, _) = table
            .add_column(
                "t",
                NewColumn::builder()
                    .name("email")
                    .field_type(Type::Primitive(PrimitiveType::String))
                    .build(),
                ValidationMode::Strict,
                Some(true),
            )
            .await
            .unwrap();
        assert_eq!(metadata.last_column_id(), 3);

        let (metadata, _) = table
            .rename_column("t", "email", "contact", ValidationMode::Strict)
            .await
            .unwrap();
        assert_eq!(
            metadata
                .current_schema()
                .unwrap()
                .field_by_name("contact")
                .unwrap()
                .id,
            3
        );

        let (metadata, warnings) = table
            .drop_column("t", "contact", ValidationMode::Permissive)
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(metadata
            .current_schema()
            .unwrap()
            .field_by_name("contact")
            .is_none());
        // The id stays burned.
        assert_eq!(metadata.last_column_id(), 3);
    }
}
