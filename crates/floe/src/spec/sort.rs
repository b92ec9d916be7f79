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
 * Sorting
*/
use serde::{Deserialize, Serialize};

use crate::spec::transform::Transform;

/// A sort field: a source column, a transform and directions.
///
/// Sort enforcement is not performed by this writer; orders are carried so
/// the metadata document stays complete for engines that read it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct SortField {
    /// A source column id from the table's schema.
    pub source_id: i32,
    /// A transform that is used to produce the sort value.
    pub transform: Transform,
    /// `asc` or `desc`.
    pub direction: String,
    /// `nulls-first` or `nulls-last`.
    pub null_order: String,
}

/// A sort order, at minimum the unsorted order `{order-id: 0, fields: []}`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SortOrder {
    /// Identifier for the SortOrder.
    pub order_id: i64,
    /// Details of the sort.
    pub fields: Vec<SortField>,
}

impl SortOrder {
    /// The unsorted order, present on every table.
    pub fn unsorted() -> Self {
        Self::default()
    }
}
