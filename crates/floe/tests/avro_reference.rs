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

//! Round trips of the from-scratch Object Container File encoder against
//! a reference Avro implementation.

use apache_avro::types::Value as RefValue;
use pretty_assertions::assert_eq;

use floe::avro::{AvroSchema, AvroValue, Codec, OcfWriter, RecordField};

fn wide_schema() -> AvroSchema {
    AvroSchema::record("all_kinds", vec![
        RecordField::new("flag", AvroSchema::Boolean),
        RecordField::new("count", AvroSchema::Int),
        RecordField::new("total", AvroSchema::Long),
        RecordField::new("ratio", AvroSchema::Float),
        RecordField::new("exact", AvroSchema::Double),
        RecordField::new("label", AvroSchema::String),
        RecordField::new("payload", AvroSchema::Bytes),
        RecordField::new("maybe", AvroSchema::optional(AvroSchema::Long))
            .with_default(serde_json::json!(null)),
        RecordField::new("absent", AvroSchema::optional(AvroSchema::String))
            .with_default(serde_json::json!(null)),
        RecordField::new(
            "offsets",
            AvroSchema::array_with_element_id(AvroSchema::Long, 1),
        ),
        RecordField::new(
            "tags",
            AvroSchema::Map(floe::avro::schema::MapSchema {
                values: Box::new(AvroSchema::Int),
            }),
        ),
    ])
}

fn wide_value(maybe: Option<i64>) -> AvroValue {
    AvroValue::Record(vec![
        ("flag".to_string(), AvroValue::Boolean(true)),
        ("count".to_string(), AvroValue::Int(-7)),
        ("total".to_string(), AvroValue::Long(1 << 40)),
        ("ratio".to_string(), AvroValue::Float(0.5)),
        ("exact".to_string(), AvroValue::Double(-2.25)),
        ("label".to_string(), AvroValue::String("höhe".to_string())),
        ("payload".to_string(), AvroValue::Bytes(vec![0, 1, 255])),
        (
            "maybe".to_string(),
            match maybe {
                Some(v) => AvroValue::Long(v),
                None => AvroValue::Null,
            },
        ),
        ("absent".to_string(), AvroValue::Null),
        (
            "offsets".to_string(),
            AvroValue::Array(vec![AvroValue::Long(4), AvroValue::Long(8)]),
        ),
        (
            "tags".to_string(),
            AvroValue::Map(vec![("a".to_string(), AvroValue::Int(1))]),
        ),
    ])
}

fn field<'a>(record: &'a RefValue, name: &str) -> &'a RefValue {
    let RefValue::Record(fields) = record else {
        panic!("expected record, got {record:?}");
    };
    &fields.iter().find(|(n, _)| n == name).unwrap().1
}

#[test]
fn reference_reader_decodes_all_value_kinds() {
    let mut writer = OcfWriter::new(wide_schema(), Codec::Null).unwrap();
    writer.append(&wide_value(Some(11))).unwrap();
    writer.append(&wide_value(None)).unwrap();
    let bytes = writer.into_bytes().unwrap();

    let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
    let records: Vec<RefValue> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);

    assert_eq!(*field(&records[0], "flag"), RefValue::Boolean(true));
    assert_eq!(*field(&records[0], "count"), RefValue::Int(-7));
    assert_eq!(*field(&records[0], "total"), RefValue::Long(1 << 40));
    assert_eq!(*field(&records[0], "ratio"), RefValue::Float(0.5));
    assert_eq!(*field(&records[0], "exact"), RefValue::Double(-2.25));
    assert_eq!(
        *field(&records[0], "label"),
        RefValue::String("höhe".to_string())
    );
    assert_eq!(
        *field(&records[0], "payload"),
        RefValue::Bytes(vec![0, 1, 255])
    );

    // Nullable unions branch on value vs null.
    assert_eq!(
        *field(&records[0], "maybe"),
        RefValue::Union(1, Box::new(RefValue::Long(11)))
    );
    assert_eq!(
        *field(&records[1], "maybe"),
        RefValue::Union(0, Box::new(RefValue::Null))
    );
    assert_eq!(
        *field(&records[0], "absent"),
        RefValue::Union(0, Box::new(RefValue::Null))
    );

    assert_eq!(
        *field(&records[0], "offsets"),
        RefValue::Array(vec![RefValue::Long(4), RefValue::Long(8)])
    );
    let RefValue::Map(tags) = field(&records[0], "tags") else {
        panic!("expected map");
    };
    assert_eq!(tags["a"], RefValue::Int(1));
}

#[test]
fn reference_reader_decodes_deflate_blocks() {
    let mut writer = OcfWriter::new(wide_schema(), Codec::Deflate).unwrap();
    for _ in 0..50 {
        writer.append(&wide_value(Some(3))).unwrap();
    }
    let bytes = writer.into_bytes().unwrap();

    let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
    let records: Vec<RefValue> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 50);
    assert_eq!(*field(&records[49], "count"), RefValue::Int(-7));
}

#[test]
fn reference_reader_decodes_multiple_blocks() {
    let mut writer = OcfWriter::new(wide_schema(), Codec::Null).unwrap();
    writer.append(&wide_value(Some(1))).unwrap();
    writer.flush_block().unwrap();
    writer.append(&wide_value(Some(2))).unwrap();
    let bytes = writer.into_bytes().unwrap();

    let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
    let records: Vec<RefValue> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(
        *field(&records[1], "maybe"),
        RefValue::Union(1, Box::new(RefValue::Long(2)))
    );
}

#[test]
fn reference_reader_sees_user_metadata() {
    let writer = OcfWriter::new(wide_schema(), Codec::Null)
        .unwrap()
        .with_metadata("format-version", b"2".to_vec())
        .with_metadata("custom-key", b"custom-value".to_vec());
    let bytes = writer.into_bytes().unwrap();

    let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
    assert_eq!(
        reader.user_metadata().get("format-version"),
        Some(&b"2".to_vec())
    );
    assert_eq!(
        reader.user_metadata().get("custom-key"),
        Some(&b"custom-value".to_vec())
    );
}
