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

//! In-memory storage implementation for testing.
//!
//! Data lives in a thread-safe `HashMap`; nothing persists beyond the
//! process. It exists to exercise the core without real object storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use super::Storage;
use crate::{Error, ErrorKind, Result};

/// In-memory storage backed by a shared map. Cloning yields a handle to
/// the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage` instance.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Bytes>>> {
        self.data.read().map_err(|e| {
            Error::new(
                ErrorKind::Unexpected,
                format!("failed to acquire read lock: {e}"),
            )
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Bytes>>> {
        self.data.write().map_err(|e| {
            Error::new(
                ErrorKind::Unexpected,
                format!("failed to acquire write lock: {e}"),
            )
        })
    }

    /// Number of stored objects.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the storage holds no objects.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(&self, path: &str, bytes: Bytes, _content_type: Option<&str>) -> Result<()> {
        self.write()?.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        self.read()?.get(path).cloned().ok_or_else(|| {
            Error::new(ErrorKind::NotFound, "object not found")
                .with_context("path", path.to_string())
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .read()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.write()?.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(path))
    }
}
