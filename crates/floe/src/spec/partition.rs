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
 * Partitioning
*/
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::spec::transform::Transform;

/// Partition field ids start here; field ids below 1000 belong to data
/// columns.
pub const PARTITION_FIELD_ID_START: i32 = 1000;

/// Reference to [`PartitionSpec`].
pub type PartitionSpecRef = Arc<PartitionSpec>;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, TypedBuilder)]
#[serde(rename_all = "kebab-case")]
/// Partition fields capture the transform from table data to partition values.
pub struct PartitionField {
    /// A source column id from the table's schema.
    pub source_id: i32,
    /// A partition field id, unique across all partition specs in v2
    /// metadata. Assigned from 1000 upward.
    pub field_id: i32,
    /// A partition name.
    pub name: String,
    /// A transform that is applied to the source column to produce a
    /// partition value.
    pub transform: Transform,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
/// Partition spec that defines how to produce a tuple of partition values
/// from a record.
pub struct PartitionSpec {
    /// Identifier for PartitionSpec.
    pub spec_id: i32,
    /// Details of the partition spec.
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// Create a partition spec builder.
    pub fn builder() -> PartitionSpecBuilder {
        PartitionSpecBuilder::default()
    }

    /// The unpartitioned spec.
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// Whether the spec carries no partition fields.
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }

    /// The highest partition field id, or the id floor minus one for an
    /// unpartitioned spec.
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|field| field.field_id)
            .max()
            .unwrap_or(PARTITION_FIELD_ID_START - 1)
    }
}

/// Builder that assigns partition field ids from 1000 upward.
#[derive(Debug, Default)]
pub struct PartitionSpecBuilder {
    spec_id: i32,
    fields: Vec<PartitionField>,
}

impl PartitionSpecBuilder {
    /// Set the spec id.
    pub fn with_spec_id(mut self, spec_id: i32) -> Self {
        self.spec_id = spec_id;
        self
    }

    /// Add a fully specified partition field.
    pub fn with_partition_field(mut self, field: PartitionField) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a partition field, assigning the next free field id.
    pub fn add_field(
        mut self,
        name: impl Into<String>,
        transform: Transform,
        source_id: i32,
    ) -> Self {
        let field_id = self
            .fields
            .iter()
            .map(|field| field.field_id)
            .max()
            .map(|id| id + 1)
            .unwrap_or(PARTITION_FIELD_ID_START);
        self.fields.push(PartitionField {
            source_id,
            field_id,
            name: name.into(),
            transform,
        });
        self
    }

    /// Build the spec.
    pub fn build(self) -> PartitionSpec {
        PartitionSpec {
            spec_id: self.spec_id,
            fields: self.fields,
        }
    }
}
