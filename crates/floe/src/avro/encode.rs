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

//! Schema-directed binary encoding of Avro values.
//!
//! Every path returns an explicit `Result`; a value that does not match
//! the writer schema is a `DataInvalid` error naming the offending field.

use crate::avro::schema::AvroSchema;
use crate::avro::varint::{write_int, write_long};
use crate::{Error, ErrorKind, Result};

/// A value to be written under a writer schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null, only valid inside a nullable union.
    Null,
    /// Single byte 0 or 1.
    Boolean(bool),
    /// Zigzag varint.
    Int(i32),
    /// Zigzag varint.
    Long(i64),
    /// 4 bytes IEEE-754 little-endian.
    Float(f32),
    /// 8 bytes IEEE-754 little-endian.
    Double(f64),
    /// Length-prefixed raw bytes.
    Bytes(Vec<u8>),
    /// Length-prefixed UTF-8.
    String(String),
    /// Raw bytes, length fixed by the schema.
    Fixed(Vec<u8>),
    /// Named fields; encoded in the schema's declared order.
    Record(Vec<(String, AvroValue)>),
    /// Block-encoded items.
    Array(Vec<AvroValue>),
    /// Block-encoded string-keyed entries.
    Map(Vec<(String, AvroValue)>),
}

impl AvroValue {
    fn type_name(&self) -> &'static str {
        match self {
            AvroValue::Null => "null",
            AvroValue::Boolean(_) => "boolean",
            AvroValue::Int(_) => "int",
            AvroValue::Long(_) => "long",
            AvroValue::Float(_) => "float",
            AvroValue::Double(_) => "double",
            AvroValue::Bytes(_) => "bytes",
            AvroValue::String(_) => "string",
            AvroValue::Fixed(_) => "fixed",
            AvroValue::Record(_) => "record",
            AvroValue::Array(_) => "array",
            AvroValue::Map(_) => "map",
        }
    }
}

fn mismatch(schema: &AvroSchema, value: &AvroValue, path: &str) -> Error {
    Error::new(
        ErrorKind::DataInvalid,
        format!(
            "avro value {} does not match writer schema {:?}",
            value.type_name(),
            schema
        ),
    )
    .with_context("path", path.to_string())
}

/// Encode `value` under `schema`, appending to `buf`.
pub fn encode(value: &AvroValue, schema: &AvroSchema, buf: &mut Vec<u8>) -> Result<()> {
    encode_at(value, schema, buf, "$")
}

fn encode_at(value: &AvroValue, schema: &AvroSchema, buf: &mut Vec<u8>, path: &str) -> Result<()> {
    match (schema, value) {
        (AvroSchema::Null, AvroValue::Null) => Ok(()),
        (AvroSchema::Boolean, AvroValue::Boolean(v)) => {
            buf.push(u8::from(*v));
            Ok(())
        }
        (AvroSchema::Int, AvroValue::Int(v)) => {
            write_int(buf, *v);
            Ok(())
        }
        (AvroSchema::Long, AvroValue::Long(v)) => {
            write_long(buf, *v);
            Ok(())
        }
        // Ints widen losslessly where the schema wants a long.
        (AvroSchema::Long, AvroValue::Int(v)) => {
            write_long(buf, i64::from(*v));
            Ok(())
        }
        (AvroSchema::Float, AvroValue::Float(v)) => {
            buf.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        (AvroSchema::Double, AvroValue::Double(v)) => {
            buf.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        (AvroSchema::Bytes, AvroValue::Bytes(v)) => {
            write_long(buf, v.len() as i64);
            buf.extend_from_slice(v);
            Ok(())
        }
        (AvroSchema::String, AvroValue::String(v)) => {
            write_long(buf, v.len() as i64);
            buf.extend_from_slice(v.as_bytes());
            Ok(())
        }
        (AvroSchema::Fixed(fixed), AvroValue::Fixed(v)) => {
            if v.len() != fixed.size {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "fixed value of {} bytes does not fit schema {} of size {}",
                        v.len(),
                        fixed.name,
                        fixed.size
                    ),
                )
                .with_context("path", path.to_string()));
            }
            buf.extend_from_slice(v);
            Ok(())
        }
        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
            static NULL: AvroValue = AvroValue::Null;
            for field in &record.fields {
                let value = fields
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .map(|(_, v)| v)
                    .or({
                        // Absent optional fields encode as null.
                        if field.schema.is_nullable() {
                            Some(&NULL)
                        } else {
                            None
                        }
                    })
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::DataInvalid,
                            format!("record is missing required field {:?}", field.name),
                        )
                        .with_context("path", path.to_string())
                    })?;
                encode_at(value, &field.schema, buf, &format!("{path}.{}", field.name))?;
            }
            Ok(())
        }
        (AvroSchema::Array(array), AvroValue::Array(items)) => {
            if !items.is_empty() {
                write_long(buf, items.len() as i64);
                for (i, item) in items.iter().enumerate() {
                    encode_at(item, &array.items, buf, &format!("{path}[{i}]"))?;
                }
            }
            write_long(buf, 0);
            Ok(())
        }
        (AvroSchema::Map(map), AvroValue::Map(entries)) => {
            if !entries.is_empty() {
                write_long(buf, entries.len() as i64);
                for (key, value) in entries {
                    write_long(buf, key.len() as i64);
                    buf.extend_from_slice(key.as_bytes());
                    encode_at(value, &map.values, buf, &format!("{path}[{key:?}]"))?;
                }
            }
            write_long(buf, 0);
            Ok(())
        }
        (AvroSchema::Union(variants), value) => {
            let branch = match value {
                AvroValue::Null => variants.iter().position(|v| *v == AvroSchema::Null),
                _ => variants.iter().position(|v| *v != AvroSchema::Null),
            }
            .ok_or_else(|| mismatch(schema, value, path))?;
            write_long(buf, branch as i64);
            encode_at(value, &variants[branch], buf, path)
        }
        (schema, value) => Err(mismatch(schema, value, path)),
    }
}
