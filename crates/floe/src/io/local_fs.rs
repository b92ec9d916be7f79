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

//! Local filesystem storage rooted at a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::Storage;
use crate::{Error, ErrorKind, Result};

/// Storage over a local directory. Relative object paths map to paths
/// under the root.
#[derive(Debug, Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    /// Create a storage rooted at `root`. The directory is created on
    /// first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl Storage for LocalFsStorage {
    async fn upload(&self, path: &str, bytes: Bytes, _content_type: Option<&str>) -> Result<()> {
        let target = self.absolute(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &bytes).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        match fs::read(self.absolute(path)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::new(
                ErrorKind::NotFound,
                "object not found",
            )
            .with_context("path", path.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // The prefix can stop mid-filename, so walk from the deepest
        // existing directory and filter on the full relative path.
        let start = {
            let absolute = self.absolute(prefix);
            if absolute.is_dir() {
                absolute
            } else {
                match absolute.parent() {
                    Some(parent) if parent.is_dir() => parent.to_path_buf(),
                    _ => return Ok(Vec::new()),
                }
            }
        };

        let mut paths = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(entry_path);
                } else {
                    let relative = self.relative(&entry_path);
                    if relative.starts_with(prefix.trim_start_matches('/')) {
                        paths.push(relative);
                    }
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.absolute(path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.absolute(path)).await?)
    }
}
