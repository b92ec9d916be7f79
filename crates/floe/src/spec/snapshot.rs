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
 * Snapshots
*/
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Reference to [`Snapshot`].
pub type SnapshotRef = Arc<Snapshot>;

/// Summary keys written by the snapshot producer.
pub mod summary {
    /// Number of data files added by the snapshot.
    pub const ADDED_DATA_FILES: &str = "added-data-files";
    /// Number of records added by the snapshot.
    pub const ADDED_RECORDS: &str = "added-records";
    /// Total byte size of added data files.
    pub const ADDED_FILES_SIZE: &str = "added-files-size";
    /// Source file recorded for register-file snapshots.
    pub const SOURCE_FILE: &str = "source-file";
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
/// The operation field is used by some operations, like snapshot
/// expiration, to skip processing certain snapshots.
pub enum Operation {
    /// Only data files were added and no files were removed.
    #[default]
    Append,
    /// Data and delete files were added and removed without changing table
    /// data; i.e., compaction or relocating data files.
    Replace,
    /// Data and delete files were added and removed in a logical overwrite
    /// operation.
    Overwrite,
    /// Data files were removed and their contents logically deleted.
    Delete,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
/// Summarises the changes in the snapshot. Engines write counters as
/// strings; everything beyond `operation` passes through untyped.
pub struct Summary {
    /// The type of operation in the snapshot.
    pub operation: Operation,
    /// Other summary data.
    #[serde(flatten)]
    pub other: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, TypedBuilder)]
#[serde(rename_all = "kebab-case")]
/// A snapshot represents the state of a table at some time and is used to
/// access the complete set of data files in the table.
pub struct Snapshot {
    /// A unique long ID.
    snapshot_id: i64,
    /// A monotonically increasing long that tracks the order of changes to
    /// the table.
    sequence_number: i64,
    /// A timestamp when the snapshot was created.
    timestamp_ms: i64,
    /// The location of the manifest list for this snapshot.
    manifest_list: String,
    /// A string map that summarizes the snapshot changes, including
    /// operation.
    summary: Summary,
    /// ID of the table's current schema when the snapshot was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    schema_id: Option<i32>,
}

impl Snapshot {
    /// Get the id of the snapshot.
    #[inline]
    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// Get the sequence number of the snapshot.
    #[inline]
    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    /// Get the location of the manifest list file.
    #[inline]
    pub fn manifest_list(&self) -> &str {
        &self.manifest_list
    }

    /// Get the summary of the snapshot.
    #[inline]
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Get the timestamp of when the snapshot was created.
    #[inline]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Get the schema id the snapshot was written under.
    #[inline]
    pub fn schema_id(&self) -> Option<i32> {
        self.schema_id
    }
}
