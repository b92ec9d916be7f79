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

//! The compute collaborator: a SQL engine that can read Parquet metadata
//! and write partitioned Parquet files.
//!
//! Production backends (DuckDB and friends) implement [`Compute`]
//! out-of-tree; [`ScriptedCompute`] is the in-process double used to test
//! the core without an engine.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;

use crate::io::StorageRef;
use crate::{Error, ErrorKind, Result};

/// One result row: column name to JSON value.
pub type Row = std::collections::HashMap<String, JsonValue>;

/// Shared handle to a compute implementation.
pub type ComputeRef = Arc<dyn Compute>;

/// Options for [`Compute::write_data_files`].
#[derive(Debug, Clone, Default)]
pub struct WriteDataFilesOptions {
    /// Columns to partition the output by, hive layout.
    pub partition_by: Vec<String>,
}

/// SQL operations the table writer depends on.
#[async_trait]
pub trait Compute: Debug + Send + Sync {
    /// Run a query and return its rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute `source_sql` and write the result as Parquet files under
    /// `dest_url`.
    async fn write_data_files(
        &self,
        source_sql: &str,
        dest_url: &str,
        options: &WriteDataFilesOptions,
    ) -> Result<()>;
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|e| {
        Error::new(
            ErrorKind::Unexpected,
            format!("failed to acquire {what} lock: {e}"),
        )
    })
}

/// A scripted compute double. Queries pop canned row sets in order;
/// `write_data_files` uploads canned files through the attached storage,
/// mimicking an engine that writes Parquet next to the table.
#[derive(Debug, Default)]
pub struct ScriptedCompute {
    query_results: Mutex<VecDeque<Vec<Row>>>,
    statements: Mutex<Vec<String>>,
    data_files: Mutex<Vec<(String, Bytes)>>,
    storage: Option<StorageRef>,
    base_url: String,
}

impl ScriptedCompute {
    /// A double with no canned results; every query returns no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// A double that can satisfy `write_data_files` by uploading
    /// `data_files` (paths relative to the destination) through
    /// `storage`. The engine sees absolute destination URLs; `base_url`
    /// is stripped to get back to storage-relative paths.
    pub fn with_storage(storage: StorageRef, base_url: impl Into<String>) -> Self {
        Self {
            storage: Some(storage),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Queue the rows the next `query` call returns.
    pub fn push_query_result(&self, rows: Vec<Row>) -> Result<()> {
        lock(&self.query_results, "query result")?.push_back(rows);
        Ok(())
    }

    /// Queue a file for the next `write_data_files` call.
    pub fn push_data_file(&self, relative_path: impl Into<String>, bytes: Bytes) -> Result<()> {
        lock(&self.data_files, "data file")?.push((relative_path.into(), bytes));
        Ok(())
    }

    /// Every SQL text this double has seen, in order.
    pub fn statements(&self) -> Result<Vec<String>> {
        Ok(lock(&self.statements, "statement")?.clone())
    }

    fn record(&self, sql: &str) -> Result<()> {
        lock(&self.statements, "statement")?.push(sql.to_string());
        Ok(())
    }
}

#[async_trait]
impl Compute for ScriptedCompute {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.record(sql)?;
        Ok(lock(&self.query_results, "query result")?
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.record(sql)?;
        Ok(0)
    }

    async fn write_data_files(
        &self,
        source_sql: &str,
        dest_url: &str,
        _options: &WriteDataFilesOptions,
    ) -> Result<()> {
        self.record(source_sql)?;
        let files = std::mem::take(&mut *lock(&self.data_files, "data file")?);
        if let Some(storage) = &self.storage {
            let dest = dest_url
                .strip_prefix(self.base_url.trim_end_matches('/'))
                .unwrap_or(dest_url)
                .trim_matches('/');
            for (relative_path, bytes) in files {
                let path = format!("{dest}/{relative_path}");
                storage.upload(&path, bytes, None).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::io::{MemoryStorage, Storage};

    #[tokio::test]
    async fn test_queries_pop_in_order() {
        let compute = ScriptedCompute::new();
        compute
            .push_query_result(vec![Row::from([("n".to_string(), json!(1))])])
            .unwrap();

        let first = compute.query("SELECT 1").await.unwrap();
        assert_eq!(first[0]["n"], json!(1));
        // Exhausted scripts return empty row sets.
        assert!(compute.query("SELECT 2").await.unwrap().is_empty());
        assert_eq!(compute.statements().unwrap(), vec!["SELECT 1", "SELECT 2"]);
    }

    #[tokio::test]
    async fn test_write_data_files_uploads_through_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let compute = ScriptedCompute::with_storage(storage.clone(), "");
        compute
            .push_data_file("part-0.parquet", Bytes::from_static(b"pq"))
            .unwrap();

        compute
            .write_data_files("SELECT 1", "tbl/data", &WriteDataFilesOptions::default())
            .await
            .unwrap();
        assert!(storage.exists("tbl/data/part-0.parquet").await.unwrap());
    }
}
