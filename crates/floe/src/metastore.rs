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

//! The metadata state machine: owns `v{N}.metadata.json` and
//! `version-hint.text` under a table's `metadata/` prefix.
//!
//! Writers must be serialized externally per table. The metadata file is
//! written before the version hint, so a failed hint write leaves the
//! table readable at its previous version.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::evolution::{Evolved, EvolutionContext};
use crate::io::StorageRef;
use crate::spec::{MetadataLog, PartitionSpec, Schema, TableMetadata};
use crate::{Error, ErrorKind, Result};

const JSON_CONTENT_TYPE: &str = "application/json";
const HINT_CONTENT_TYPE: &str = "text/plain";

/// Relative path of the version hint under a table path.
pub fn version_hint_path(table_path: &str) -> String {
    format!("{table_path}/metadata/version-hint.text")
}

fn metadata_path(table_path: &str, version: i64) -> String {
    format!("{table_path}/metadata/v{version}.metadata.json")
}

/// Reads and writes table metadata documents against a storage backend.
#[derive(Debug, Clone)]
pub struct Metastore {
    storage: StorageRef,
    base_url: String,
}

impl Metastore {
    /// Create a metastore. `base_url` prefixes relative paths into the
    /// absolute URLs recorded in metadata logs.
    pub fn new(storage: StorageRef, base_url: impl Into<String>) -> Self {
        Self {
            storage,
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

    /// Build the metadata of a new table rooted at `table_path`. Pure;
    /// nothing is persisted until [`Metastore::save`].
    pub fn create_initial(
        &self,
        table_path: &str,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        TableMetadata::new(
            self.absolute_url(table_path),
            schema,
            partition_spec,
            properties,
        )
    }

    /// Persist `metadata` as `v{N}.metadata.json`, then advance the
    /// version hint. Both writes must succeed; a hint failure leaves the
    /// metadata file orphaned but the table still readable at N-1.
    pub async fn save(&self, table_path: &str, metadata: &TableMetadata) -> Result<()> {
        let version = metadata.last_sequence_number();
        let path = metadata_path(table_path, version);
        let document = serde_json::to_vec(metadata)
            .map_err(|err| Error::from(err).with_kind(ErrorKind::MetadataSaveFailed))?;

        self.storage
            .upload(&path, Bytes::from(document), Some(JSON_CONTENT_TYPE))
            .await
            .map_err(|err| err.with_kind(ErrorKind::MetadataSaveFailed))?;

        self.storage
            .upload(
                &version_hint_path(table_path),
                Bytes::from(version.to_string()),
                Some(HINT_CONTENT_TYPE),
            )
            .await
            .map_err(|err| err.with_kind(ErrorKind::MetadataSaveFailed))?;

        debug!(%path, version, "saved table metadata");
        Ok(())
    }

    /// Load the current metadata. A missing hint falls back to
    /// `v1.metadata.json`; if both are missing the table does not exist.
    pub async fn load(&self, table_path: &str) -> Result<TableMetadata> {
        let version = match self.storage.download(&version_hint_path(table_path)).await {
            Ok(bytes) => {
                let text = std::str::from_utf8(&bytes)
                    .map_err(|err| Error::from(err).with_kind(ErrorKind::MetadataLoadFailed))?;
                Some(text.trim().parse::<i64>().map_err(|err| {
                    Error::new(ErrorKind::MetadataLoadFailed, "version hint is not a number")
                        .with_context("hint", text.trim().to_string())
                        .with_source(err)
                })?)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.with_kind(ErrorKind::MetadataLoadFailed)),
        };

        // Readers fall back to scanning for v1 when the hint is missing.
        let path = metadata_path(table_path, version.unwrap_or(1));
        let bytes = match self.storage.download(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound && version.is_none() => {
                return Err(Error::new(ErrorKind::NotFound, "table does not exist")
                    .with_context("table_path", table_path.to_string()))
            }
            Err(err) => return Err(err.with_kind(ErrorKind::MetadataLoadFailed)),
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            Error::new(ErrorKind::MetadataLoadFailed, "metadata document is invalid")
                .with_context("path", path)
                .with_source(err)
        })
    }

    /// Whether a table exists at `table_path`, judged by its version hint.
    pub async fn exists(&self, table_path: &str) -> Result<bool> {
        self.storage.exists(&version_hint_path(table_path)).await
    }

    /// Persist `next`, recording a metadata-log pointer to `prior`'s file
    /// when the version rotated.
    pub async fn commit(
        &self,
        table_path: &str,
        prior: Option<&TableMetadata>,
        next: TableMetadata,
    ) -> Result<TableMetadata> {
        let next = match prior {
            Some(prior) if prior.metadata_file_path() != next.metadata_file_path() => {
                let file = format!("{table_path}/{}", prior.metadata_file_path());
                next.append_metadata_log(MetadataLog {
                    metadata_file: self.absolute_url(&file),
                    timestamp_ms: prior.last_updated_ms(),
                })
            }
            _ => next,
        };
        self.save(table_path, &next).await?;
        Ok(next)
    }

    /// Evolve the current schema through a pure evolution function.
    ///
    /// The function receives the current schema and a context carrying
    /// the next free field id and the table's schema history; on success
    /// the evolved schema is installed under the next schema id and the
    /// result saved. Returns the new metadata and any warnings.
    pub async fn evolve_schema<F>(
        &self,
        table_path: &str,
        evolve: F,
    ) -> Result<(TableMetadata, Vec<String>)>
    where
        F: FnOnce(&Schema, EvolutionContext) -> Result<Evolved>,
    {
        let prior = self.load(table_path).await?;
        let current = prior.current_schema()?.clone();
        let context = EvolutionContext {
            next_field_id: prior.last_column_id() + 1,
            historical_schemas: prior.schemas().to_vec(),
            table_empty: prior.current_snapshot_id().is_none(),
        };

        let evolved = evolve(current.as_ref(), context)?;
        let next = prior.clone().with_new_schema(evolved.schema)?;
        let next = self.commit(table_path, Some(&prior), next).await?;
        Ok((next, evolved.warnings))
    }

    /// Merge properties into the table and save.
    pub async fn update_properties(
        &self,
        table_path: &str,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        let prior = self.load(table_path).await?;
        let next = prior.clone().with_properties(properties);
        self.commit(table_path, Some(&prior), next).await
    }
}
