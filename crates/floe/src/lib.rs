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

//! Writer for Apache Iceberg v2 tables: composes the metadata documents,
//! Avro manifests and snapshots that make a set of Parquet files readable
//! by independent query engines.

#![deny(missing_docs)]

mod error;
pub use error::{Error, ErrorKind, Result};

pub mod avro;
pub mod compute;
pub mod evolution;
pub mod io;
pub mod spec;
pub mod stats;

mod metastore;
pub use metastore::{version_hint_path, Metastore};

mod snapshot_producer;
pub use snapshot_producer::{SnapshotOptions, SnapshotProducer};

pub mod table;
pub use table::{Table, TableConfig};
