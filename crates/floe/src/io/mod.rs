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

//! The storage collaborator: an object-safe trait over object storage,
//! with in-memory, local filesystem and opendal-backed implementations.
//!
//! All paths are relative to the storage root; the configured `base_url`
//! of the table turns them into absolute URLs inside metadata documents.

mod local_fs;
mod memory;
mod opendal;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

pub use local_fs::LocalFsStorage;
pub use memory::MemoryStorage;
pub use opendal::OpendalStorage;

/// Shared handle to a storage implementation.
pub type StorageRef = Arc<dyn Storage>;

/// Object storage operations the table writer depends on.
///
/// Implementations must be plug-compatible: the in-memory store used in
/// tests, the local filesystem and S3-compatible object stores behave
/// identically from the writer's point of view.
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    /// Write `bytes` at `path`, replacing any previous object.
    async fn upload(&self, path: &str, bytes: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Read the object at `path`. Missing objects surface as
    /// [`ErrorKind::NotFound`](crate::ErrorKind::NotFound).
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// All object paths under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete the object at `path`. Deleting a missing object is not an
    /// error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;
}
