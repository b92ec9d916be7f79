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

//! Parquet statistics extraction through the compute backend.
//!
//! The file glob is interpolated into SQL, so it is restricted to a tight
//! character set before it gets anywhere near the engine. This is the one
//! place untrusted text meets the compute layer.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::compute::{Compute, Row};
use crate::spec::DataFileStats;
use crate::{Error, ErrorKind, Result};

/// Characters a data-file glob may contain.
fn is_allowed_pattern_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '*' | '.' | '_' | ':' | '-')
}

/// Validate a file glob against the allowed set `[A-Za-z0-9/*._:\-]+`.
pub fn validate_file_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() || !pattern.chars().all(is_allowed_pattern_char) {
        return Err(Error::new(
            ErrorKind::InvalidFilePattern,
            format!("file pattern {pattern:?} contains characters outside [A-Za-z0-9/*._:-]"),
        ));
    }
    Ok(())
}

/// The per-file rollup query. Parquet metadata reports one row per row
/// group; rows are deduplicated before summing so repeated row groups are
/// not double counted.
fn stats_sql(file_glob: &str) -> String {
    format!(
        "SELECT file_path, \
                SUM(row_group_num_rows) AS record_count, \
                SUM(row_group_bytes) AS file_size_in_bytes \
         FROM ( \
            SELECT DISTINCT file_name AS file_path, row_group_id, \
                            row_group_num_rows, row_group_bytes \
            FROM parquet_metadata('{file_glob}') \
         ) \
         GROUP BY file_path \
         ORDER BY file_path"
    )
}

/// Query the compute backend for per-file statistics of every Parquet
/// file matching `file_glob`. An empty match is an empty Vec, not an
/// error. Partition values are parsed from hive-style `k=v` path
/// segments.
pub async fn collect_data_file_stats(
    compute: &dyn Compute,
    file_glob: &str,
) -> Result<Vec<DataFileStats>> {
    validate_file_pattern(file_glob)?;

    let rows = compute.query(&stats_sql(file_glob)).await?;
    let mut stats = Vec::with_capacity(rows.len());
    for row in &rows {
        match file_stats_from_row(row) {
            Some(file) => stats.push(file),
            None => debug!(?row, "skipping malformed parquet metadata row"),
        }
    }
    Ok(stats)
}

fn file_stats_from_row(row: &Row) -> Option<DataFileStats> {
    let file_path = row.get("file_path")?.as_str()?.to_string();
    let record_count = integer(row.get("record_count")?)?;
    let file_size_in_bytes = integer(row.get("file_size_in_bytes")?)?;
    let partition_values = parse_hive_partition_values(&file_path);
    Some(
        DataFileStats::builder()
            .file_path(file_path)
            .file_size_in_bytes(file_size_in_bytes)
            .record_count(record_count)
            .partition_values(partition_values)
            .build(),
    )
}

/// Engines are loose about numeric row types; accept integers, integral
/// floats and decimal strings.
fn integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse hive-style `k=v` directory segments out of a file path. The
/// final segment is the file name and never contributes.
pub fn parse_hive_partition_values(file_path: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let segments: Vec<&str> = file_path.split('/').collect();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        if let Some((key, value)) = segment.split_once('=') {
            if !key.is_empty() {
                values.insert(key.to_string(), value.to_string());
            }
        }
    }
    values
}
