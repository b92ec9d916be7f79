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

//! Storage over an [`opendal::Operator`], covering S3 and S3-compatible
//! object stores among others.

use async_trait::async_trait;
use bytes::Bytes;
use opendal::services::S3;
use opendal::{ErrorKind as OpendalErrorKind, Operator};

use super::Storage;
use crate::{Error, ErrorKind, Result};

/// Storage backed by any opendal service. The operator's configured root
/// is the storage root.
#[derive(Debug, Clone)]
pub struct OpendalStorage {
    op: Operator,
}

impl OpendalStorage {
    /// Wrap an already configured operator.
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// Storage over an S3 (or S3-compatible) bucket. `endpoint` overrides
    /// the AWS endpoint for MinIO-style deployments; credentials come
    /// from the environment.
    pub fn s3(
        bucket: impl AsRef<str>,
        region: impl AsRef<str>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = S3::default().bucket(bucket.as_ref()).region(region.as_ref());
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }
        let op = Operator::new(builder)
            .map_err(Error::from)?
            .finish();
        Ok(Self::new(op))
    }
}

fn from_opendal(err: opendal::Error, path: &str) -> Error {
    let kind = if err.kind() == OpendalErrorKind::NotFound {
        ErrorKind::NotFound
    } else {
        ErrorKind::Unexpected
    };
    Error::new(kind, "storage operation failed")
        .with_context("path", path.to_string())
        .with_source(err)
}

#[async_trait]
impl Storage for OpendalStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut write = self.op.write_with(path, bytes);
        if let Some(content_type) = content_type {
            write = write.content_type(content_type);
        }
        write.await.map_err(|err| from_opendal(err, path))?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let buffer = self
            .op
            .read(path)
            .await
            .map_err(|err| from_opendal(err, path))?;
        Ok(buffer.to_bytes())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self
            .op
            .list_with(prefix)
            .recursive(true)
            .await
            .map_err(|err| from_opendal(err, prefix))?;
        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| !entry.path().ends_with('/'))
            .map(|entry| entry.path().to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.op
            .delete(path)
            .await
            .map_err(|err| from_opendal(err, path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.op
            .exists(path)
            .await
            .map_err(|err| from_opendal(err, path))
    }
}
