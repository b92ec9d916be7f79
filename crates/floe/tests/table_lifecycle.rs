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

//! End-to-end table lifecycle over in-memory storage and a scripted
//! compute backend.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;

use floe::compute::{ComputeRef, Row, ScriptedCompute};
use floe::evolution::{NewColumn, ValidationMode};
use floe::io::{MemoryStorage, Storage, StorageRef};
use floe::spec::{
    NestedField, PartitionSpec, PrimitiveType, Schema, Transform, Type, NAME_MAPPING_PROPERTY,
};
use floe::{Table, TableConfig};

fn two_column_schema() -> Schema {
    Schema::builder()
        .with_fields(vec![
            NestedField::required(1, "id", Type::Primitive(PrimitiveType::String)).into(),
            NestedField::optional(2, "name", Type::Primitive(PrimitiveType::String)).into(),
        ])
        .build()
        .unwrap()
}

fn harness() -> (Arc<MemoryStorage>, Arc<ScriptedCompute>, Table) {
    let storage = Arc::new(MemoryStorage::new());
    let compute = Arc::new(ScriptedCompute::with_storage(
        storage.clone(),
        "s3://warehouse",
    ));
    let table = Table::new(
        TableConfig::builder()
            .storage(storage.clone() as StorageRef)
            .compute(compute.clone() as ComputeRef)
            .base_url("s3://warehouse")
            .build(),
    );
    (storage, compute, table)
}

fn stats_row(path: &str, records: i64, size: i64) -> Row {
    Row::from([
        ("file_path".to_string(), json!(path)),
        ("record_count".to_string(), json!(records)),
        ("file_size_in_bytes".to_string(), json!(size)),
    ])
}

async fn metadata_json(storage: &MemoryStorage, path: &str) -> serde_json::Value {
    let bytes = storage.download(path).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scenario_create_minimal_table() {
    let (storage, _, table) = harness();
    table
        .create("t", two_column_schema(), PartitionSpec::unpartitioned(), HashMap::new())
        .await
        .unwrap();

    let hint = storage.download("t/metadata/version-hint.text").await.unwrap();
    assert_eq!(&hint[..], b"0");

    let document = metadata_json(&storage, "t/metadata/v0.metadata.json").await;
    assert_eq!(document["format-version"], json!(2));
    assert_eq!(document["current-snapshot-id"], json!(-1));
    assert_eq!(document["snapshots"], json!([]));
    assert_eq!(document["last-column-id"], json!(2));
    assert_eq!(document["last-sequence-number"], json!(0));
    assert_eq!(document["location"], json!("s3://warehouse/t"));
    assert_eq!(
        document["properties"][NAME_MAPPING_PROPERTY],
        json!(r#"[{"field-id":1,"names":["id"]},{"field-id":2,"names":["name"]}]"#)
    );
    assert_eq!(
        document["sort-orders"],
        json!([{"order-id": 0, "fields": []}])
    );
    // The document must parse as a v2 table metadata document.
    assert!(document["table-uuid"].as_str().is_some());
}

#[tokio::test]
async fn scenario_insert_overwrite_unpartitioned() {
    let (storage, compute, table) = harness();
    table
        .create("t", two_column_schema(), PartitionSpec::unpartitioned(), HashMap::new())
        .await
        .unwrap();

    compute
        .push_data_file("part-0.parquet", Bytes::from_static(b"parquet-bytes"))
        .unwrap();
    compute
        .push_query_result(vec![stats_row(
            "s3://warehouse/t/data/part-0.parquet",
            2,
            640,
        )])
        .unwrap();

    let snapshot = table
        .insert_overwrite(
            "t",
            "SELECT '1' AS id, 'a' AS name UNION ALL SELECT '2','b'",
        )
        .await
        .unwrap();

    // Data landed.
    assert_eq!(storage.list("t/data/").await.unwrap().len(), 1);

    // Manifest and manifest list exist beside the metadata.
    let metadata_files = storage.list("t/metadata/").await.unwrap();
    assert!(metadata_files
        .iter()
        .any(|p| p.contains("snap-") && p.ends_with(".avro")));
    assert!(metadata_files
        .iter()
        .any(|p| !p.contains("snap-") && p.ends_with(".avro")));

    let document = metadata_json(&storage, "t/metadata/v1.metadata.json").await;
    assert_eq!(document["last-sequence-number"], json!(1));
    assert_eq!(
        document["current-snapshot-id"],
        json!(snapshot.snapshot_id())
    );
    assert_eq!(document["snapshots"].as_array().unwrap().len(), 1);
    assert_eq!(
        document["snapshots"][0]["summary"]["added-records"],
        json!("2")
    );
    assert_eq!(
        document["snapshots"][0]["summary"]["operation"],
        json!("overwrite")
    );

    let hint = storage.download("t/metadata/version-hint.text").await.unwrap();
    assert_eq!(&hint[..], b"1");
}

#[tokio::test]
async fn scenario_evolve_by_adding_column() {
    let (storage, compute, table) = harness();
    table
        .create("t", two_column_schema(), PartitionSpec::unpartitioned(), HashMap::new())
        .await
        .unwrap();

    compute
        .push_data_file("part-0.parquet", Bytes::from_static(b"pq"))
        .unwrap();
    compute
        .push_query_result(vec![stats_row(
            "s3://warehouse/t/data/part-0.parquet",
            2,
            64,
        )])
        .unwrap();
    table
        .insert_overwrite("t", "SELECT '1' AS id, 'a' AS name UNION ALL SELECT '2','b'")
        .await
        .unwrap();

    let (metadata, warnings) = table
        .add_column(
            "t",
            NewColumn::builder()
                .name("email")
                .field_type(Type::Primitive(PrimitiveType::String))
                .build(),
            ValidationMode::Strict,
            Some(true),
        )
        .await
        .unwrap();

    assert!(warnings.is_empty());
    assert_eq!(metadata.schemas().len(), 2);
    assert_eq!(metadata.current_schema_id(), 1);
    assert_eq!(metadata.last_column_id(), 3);
    let email = metadata
        .current_schema()
        .unwrap()
        .field_by_name("email")
        .unwrap();
    assert_eq!(email.id, 3);
    assert!(!email.required);
    assert!(metadata.properties()[NAME_MAPPING_PROPERTY].contains("email"));

    // The saved document kept both schema versions.
    let document = metadata_json(&storage, "t/metadata/v1.metadata.json").await;
    assert_eq!(document["schemas"].as_array().unwrap().len(), 2);
    assert_eq!(document["current-schema-id"], json!(1));
}

#[tokio::test]
async fn scenario_drop_then_add_preserves_id_discipline() {
    let (_, _, table) = harness();
    let schema = Schema::builder()
        .with_fields(vec![
            NestedField::optional(1, "a", Type::Primitive(PrimitiveType::String)).into(),
            NestedField::optional(2, "b", Type::Primitive(PrimitiveType::String)).into(),
            NestedField::optional(3, "c", Type::Primitive(PrimitiveType::String)).into(),
        ])
        .build()
        .unwrap();
    table
        .create("t", schema, PartitionSpec::unpartitioned(), HashMap::new())
        .await
        .unwrap();

    table
        .drop_column("t", "b", "force".parse().unwrap())
        .await
        .unwrap();
    let (metadata, _) = table
        .add_column(
            "t",
            NewColumn::builder()
                .name("d")
                .field_type(Type::Primitive(PrimitiveType::String))
                .build(),
            ValidationMode::Strict,
            Some(true),
        )
        .await
        .unwrap();

    let fields: Vec<(i32, String)> = metadata
        .current_schema()
        .unwrap()
        .fields()
        .iter()
        .map(|f| (f.id, f.name.clone()))
        .collect();
    assert_eq!(fields, vec![
        (1, "a".to_string()),
        (3, "c".to_string()),
        (4, "d".to_string()),
    ]);
    assert_eq!(metadata.last_column_id(), 4);
}

#[tokio::test]
async fn scenario_day_partition_from_hive_path() {
    let (storage, compute, table) = harness();
    let schema = Schema::builder()
        .with_fields(vec![
            NestedField::required(1, "id", Type::Primitive(PrimitiveType::String)).into(),
            NestedField::required(2, "ts", Type::Primitive(PrimitiveType::Timestamptz)).into(),
        ])
        .build()
        .unwrap();
    let spec = PartitionSpec::builder()
        .add_field("timestamp_day", Transform::Day, 2)
        .build();
    table
        .create("t", schema, spec, HashMap::new())
        .await
        .unwrap();

    storage
        .upload(
            "t/data/year=2024/month=1/day=15/part-0.parquet",
            Bytes::from_static(b"pq"),
            None,
        )
        .await
        .unwrap();
    compute
        .push_query_result(vec![stats_row(
            "s3://warehouse/t/data/year=2024/month=1/day=15/part-0.parquet",
            1,
            32,
        )])
        .unwrap();

    table
        .register_files("t", "s3://warehouse/t/data/*.parquet", None)
        .await
        .unwrap()
        .expect("one file registered");

    // Read the manifest back and check the computed partition value:
    // 2024-01-15 is 19737 days after 1970-01-01.
    let manifest_path = storage
        .list("t/metadata/")
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.ends_with(".avro") && !p.contains("snap-"))
        .unwrap();
    let bytes = storage.download(&manifest_path).await.unwrap();
    let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
    let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);

    let apache_avro::types::Value::Record(fields) = &records[0] else {
        panic!("expected manifest entry record");
    };
    let (_, data_file) = fields.iter().find(|(n, _)| n == "data_file").unwrap();
    let apache_avro::types::Value::Record(data_file) = data_file else {
        panic!("expected data_file record");
    };
    let (_, partition) = data_file.iter().find(|(n, _)| n == "partition").unwrap();
    let apache_avro::types::Value::Record(partition) = partition else {
        panic!("expected partition record");
    };
    assert_eq!(partition.len(), 1);
    assert_eq!(partition[0].0, "timestamp_day");
    assert_eq!(
        partition[0].1,
        apache_avro::types::Value::Union(1, Box::new(apache_avro::types::Value::Int(19737)))
    );
}

#[tokio::test]
async fn sequence_numbers_track_snapshot_log() {
    let (_, compute, table) = harness();
    table
        .create("t", two_column_schema(), PartitionSpec::unpartitioned(), HashMap::new())
        .await
        .unwrap();

    for round in 0..3 {
        compute
            .push_data_file(format!("part-{round}.parquet"), Bytes::from_static(b"pq"))
            .unwrap();
        compute
            .push_query_result(vec![stats_row(
                &format!("s3://warehouse/t/data/part-{round}.parquet"),
                1,
                10,
            )])
            .unwrap();
        table.insert_overwrite("t", "SELECT '1', 'a'").await.unwrap();
    }

    let metadata = table.load("t").await.unwrap();
    // The sequence number equals the snapshot-log length, and the current
    // snapshot is a member of the snapshot set.
    assert_eq!(metadata.last_sequence_number(), 3);
    assert_eq!(metadata.snapshot_log().len(), 3);
    assert_eq!(metadata.snapshots().len(), 3);
    let current = metadata.current_snapshot_id().unwrap();
    assert!(metadata
        .snapshots()
        .iter()
        .any(|s| s.snapshot_id() == current));
    // Snapshot ids line up with the log, in order.
    for (snapshot, log) in metadata.snapshots().iter().zip(metadata.snapshot_log()) {
        assert_eq!(snapshot.snapshot_id(), log.snapshot_id);
    }
}
