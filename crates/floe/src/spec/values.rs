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
 * Single-value serialization: the binary form used for the min/max bound
 * values embedded in manifests, keyed by column id.
 */

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_bytes::ByteBuf;
use uuid::Uuid;

use crate::spec::datatypes::{NestedFieldRef, PrimitiveType, Type};
use crate::spec::schema::Schema;
use crate::{Error, ErrorKind, Result};

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 0x00 for false, 0x01 for true.
    Boolean(bool),
    /// Stored as 4-byte little-endian.
    Int(i32),
    /// Stored as 8-byte little-endian.
    Long(i64),
    /// Stored as 4-byte IEEE-754 little-endian.
    Float(f32),
    /// Stored as 8-byte IEEE-754 little-endian.
    Double(f64),
    /// Days from 1970-01-01 in a 4-byte little-endian int.
    Date(i32),
    /// Microseconds from midnight in an 8-byte little-endian long.
    Time(i64),
    /// Microseconds from epoch in an 8-byte little-endian long.
    Timestamp(i64),
    /// Microseconds from epoch UTC in an 8-byte little-endian long.
    TimestampTz(i64),
    /// UTF-8 bytes without length prefix.
    String(String),
    /// 16-byte big-endian value.
    Uuid(Uuid),
    /// Raw bytes, length fixed by the column type.
    Fixed(Vec<u8>),
    /// Raw bytes without length prefix.
    Binary(Vec<u8>),
    /// Unscaled value stored as two's-complement big-endian binary using
    /// the minimum number of bytes.
    Decimal {
        /// The unscaled value.
        unscaled: i128,
        /// Digits after the decimal point.
        scale: u32,
    },
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal {
            unscaled: value.mantissa(),
            scale: value.scale(),
        }
    }
}

impl Value {
    /// Serialize to the Iceberg single-value binary form.
    pub fn to_bytes(&self) -> ByteBuf {
        match self {
            Value::Boolean(v) => ByteBuf::from([u8::from(*v)]),
            Value::Int(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Long(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Float(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Double(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Date(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Time(v) => ByteBuf::from(v.to_le_bytes()),
            Value::Timestamp(v) => ByteBuf::from(v.to_le_bytes()),
            Value::TimestampTz(v) => ByteBuf::from(v.to_le_bytes()),
            Value::String(v) => ByteBuf::from(v.as_bytes()),
            Value::Uuid(v) => ByteBuf::from(*v.as_bytes()),
            Value::Fixed(v) => ByteBuf::from(v.clone()),
            Value::Binary(v) => ByteBuf::from(v.clone()),
            Value::Decimal { unscaled, .. } => {
                ByteBuf::from(minimal_twos_complement(*unscaled))
            }
        }
    }

    /// Deserialize a single value of `data_type` from its binary form.
    pub fn try_from_bytes(bytes: &[u8], data_type: &Type) -> Result<Self> {
        let primitive = data_type.as_primitive_type().ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                "single values of non-primitive types are not supported",
            )
        })?;
        match primitive {
            PrimitiveType::Boolean => match bytes {
                [0u8] => Ok(Value::Boolean(false)),
                [1u8] => Ok(Value::Boolean(true)),
                _ => Err(Error::new(
                    ErrorKind::DataInvalid,
                    "boolean value must be a single 0x00 or 0x01 byte",
                )),
            },
            PrimitiveType::Int => Ok(Value::Int(i32::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Long => Ok(Value::Long(i64::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Float => Ok(Value::Float(f32::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Double => Ok(Value::Double(f64::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Date => Ok(Value::Date(i32::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Time => Ok(Value::Time(i64::from_le_bytes(bytes.try_into()?))),
            PrimitiveType::Timestamp => {
                Ok(Value::Timestamp(i64::from_le_bytes(bytes.try_into()?)))
            }
            PrimitiveType::Timestamptz => {
                Ok(Value::TimestampTz(i64::from_le_bytes(bytes.try_into()?)))
            }
            PrimitiveType::String => {
                Ok(Value::String(std::str::from_utf8(bytes)?.to_string()))
            }
            PrimitiveType::Uuid => Ok(Value::Uuid(Uuid::from_bytes(bytes.try_into()?))),
            PrimitiveType::Fixed(len) => {
                if bytes.len() as u64 != *len {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!(
                            "fixed[{len}] value must be exactly {len} bytes, got {}",
                            bytes.len()
                        ),
                    ));
                }
                Ok(Value::Fixed(bytes.to_vec()))
            }
            PrimitiveType::Binary => Ok(Value::Binary(bytes.to_vec())),
            PrimitiveType::Decimal { scale, .. } => Ok(Value::Decimal {
                unscaled: sign_extend_be(bytes)?,
                scale: *scale,
            }),
        }
    }

    /// Coerce the value to the column's type where a lossless widening
    /// exists. Returns `None` when the value cannot represent the type.
    fn coerce_to(&self, target: &PrimitiveType) -> Option<Value> {
        match (self, target) {
            (Value::Boolean(_), PrimitiveType::Boolean)
            | (Value::Int(_), PrimitiveType::Int)
            | (Value::Long(_), PrimitiveType::Long)
            | (Value::Float(_), PrimitiveType::Float)
            | (Value::Double(_), PrimitiveType::Double)
            | (Value::Date(_), PrimitiveType::Date)
            | (Value::Time(_), PrimitiveType::Time)
            | (Value::Timestamp(_), PrimitiveType::Timestamp)
            | (Value::TimestampTz(_), PrimitiveType::Timestamptz)
            | (Value::String(_), PrimitiveType::String)
            | (Value::Uuid(_), PrimitiveType::Uuid)
            | (Value::Binary(_), PrimitiveType::Binary) => Some(self.clone()),
            (Value::Fixed(v), PrimitiveType::Fixed(len)) if v.len() as u64 == *len => {
                Some(self.clone())
            }
            (Value::Int(v), PrimitiveType::Long) => Some(Value::Long(i64::from(*v))),
            (Value::Float(v), PrimitiveType::Double) => Some(Value::Double(f64::from(*v))),
            (Value::Int(v), PrimitiveType::Date) => Some(Value::Date(*v)),
            (Value::Long(v), PrimitiveType::Time) => Some(Value::Time(*v)),
            (Value::Long(v), PrimitiveType::Timestamp) => Some(Value::Timestamp(*v)),
            (Value::Long(v), PrimitiveType::Timestamptz) => Some(Value::TimestampTz(*v)),
            (Value::Decimal { unscaled, scale }, PrimitiveType::Decimal { scale: s, .. })
                if scale == s =>
            {
                Some(Value::Decimal {
                    unscaled: *unscaled,
                    scale: *scale,
                })
            }
            _ => None,
        }
    }
}

/// Two's-complement big-endian with the minimum number of bytes.
fn minimal_twos_complement(value: i128) -> Vec<u8> {
    let full = value.to_be_bytes();
    let mut start = 0;
    while start < full.len() - 1 {
        let current = full[start];
        let next_msb_set = full[start + 1] & 0x80 != 0;
        // A leading 0x00 is redundant unless it guards a set sign bit;
        // a leading 0xFF is redundant unless it guards a clear sign bit.
        let redundant = (current == 0x00 && !next_msb_set) || (current == 0xff && next_msb_set);
        if !redundant {
            break;
        }
        start += 1;
    }
    full[start..].to_vec()
}

/// Sign-extend a big-endian two's-complement byte string into an i128.
fn sign_extend_be(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!("decimal value must be 1..=16 bytes, got {}", bytes.len()),
        ));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xffu8 } else { 0x00 };
    let mut full = [fill; 16];
    full[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(full))
}

/// Encode a `{column-id -> value}` mapping into `{column-id -> bytes}`
/// bounds, resolving each column's type against `schema`. Entries whose
/// column is unknown or whose value cannot be coerced to the column type
/// are dropped.
pub fn encode_bounds(
    bounds: &HashMap<i32, Value>,
    schema: &Schema,
) -> HashMap<i32, ByteBuf> {
    bounds
        .iter()
        .filter_map(|(column_id, value)| {
            let field = find_field_by_id(schema, *column_id)?;
            let primitive = field.field_type.as_primitive_type()?;
            let coerced = value.coerce_to(primitive)?;
            Some((*column_id, coerced.to_bytes()))
        })
        .collect()
}

fn find_field_by_id(schema: &Schema, id: i32) -> Option<NestedFieldRef> {
    fn walk(fields: &[NestedFieldRef], id: i32) -> Option<NestedFieldRef> {
        for field in fields {
            if field.id == id {
                return Some(field.clone());
            }
            let found = match field.field_type.as_ref() {
                Type::Primitive(_) => None,
                Type::Struct(nested) => walk(nested.fields(), id),
                Type::List(list) => walk(std::slice::from_ref(&list.element_field), id),
                Type::Map(map) => walk(
                    &[map.key_field.clone(), map.value_field.clone()],
                    id,
                ),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
    walk(schema.fields(), id)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::datatypes::NestedField;

    #[test]
    fn test_boolean_bytes() {
        assert_eq!(Value::Boolean(false).to_bytes().as_ref(), &[0x00]);
        assert_eq!(Value::Boolean(true).to_bytes().as_ref(), &[0x01]);
    }

    #[test]
    fn test_numeric_little_endian() {
        assert_eq!(
            Value::Int(1).to_bytes().as_ref(),
            &[0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(Value::Long(-1).to_bytes().as_ref(), &[0xff; 8]);
        assert_eq!(
            Value::Float(1.0).to_bytes().as_ref(),
            &1.0f32.to_le_bytes()
        );
    }

    #[test]
    fn test_string_and_binary_without_length_prefix() {
        assert_eq!(
            Value::String("iceberg".to_string()).to_bytes().as_ref(),
            b"iceberg"
        );
        assert_eq!(
            Value::Binary(vec![0x00, 0x01]).to_bytes().as_ref(),
            &[0x00, 0x01]
        );
    }

    #[test]
    fn test_uuid_big_endian() {
        let uuid = Uuid::parse_str("f79c3e09-677c-4bbd-a479-3f349cb785e7").unwrap();
        assert_eq!(Value::Uuid(uuid).to_bytes().as_ref(), uuid.as_bytes());
    }

    #[test]
    fn test_decimal_minimal_length() {
        for (unscaled, expected) in [
            (0i128, vec![0x00u8]),
            (127, vec![0x7f]),
            (128, vec![0x00, 0x80]),
            (-1, vec![0xff]),
            (-128, vec![0x80]),
            (-129, vec![0xff, 0x7f]),
            (255, vec![0x00, 0xff]),
        ] {
            assert_eq!(
                Value::Decimal { unscaled, scale: 2 }.to_bytes().as_ref(),
                &expected,
                "unscaled {unscaled}"
            );
        }
    }

    #[test]
    fn test_round_trip_all_primitives() {
        let uuid = Uuid::parse_str("f79c3e09-677c-4bbd-a479-3f349cb785e7").unwrap();
        let cases = [
            (Value::Boolean(true), Type::Primitive(PrimitiveType::Boolean)),
            (Value::Int(-42), Type::Primitive(PrimitiveType::Int)),
            (Value::Long(1 << 40), Type::Primitive(PrimitiveType::Long)),
            (Value::Float(3.5), Type::Primitive(PrimitiveType::Float)),
            (Value::Double(-0.25), Type::Primitive(PrimitiveType::Double)),
            (Value::Date(19737), Type::Primitive(PrimitiveType::Date)),
            (Value::Time(86_399_000_000), Type::Primitive(PrimitiveType::Time)),
            (
                Value::Timestamp(1_700_000_000_000_000),
                Type::Primitive(PrimitiveType::Timestamp),
            ),
            (
                Value::TimestampTz(1_700_000_000_000_000),
                Type::Primitive(PrimitiveType::Timestamptz),
            ),
            (
                Value::String("höhe".to_string()),
                Type::Primitive(PrimitiveType::String),
            ),
            (Value::Uuid(uuid), Type::Primitive(PrimitiveType::Uuid)),
            (
                Value::Fixed(vec![1, 2, 3]),
                Type::Primitive(PrimitiveType::Fixed(3)),
            ),
            (
                Value::Binary(vec![9, 8, 7]),
                Type::Primitive(PrimitiveType::Binary),
            ),
        ];
        for (value, data_type) in cases {
            let bytes = value.to_bytes();
            let back = Value::try_from_bytes(&bytes, &data_type).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_decimal_38_9_round_trips() {
        let data_type = Type::decimal(38, 9).unwrap();
        for unscaled in [
            0i128,
            1,
            -1,
            99_999_999_999_999_999_999_999_999_999_999_999_999i128,
            -99_999_999_999_999_999_999_999_999_999_999_999_999i128,
        ] {
            let value = Value::Decimal { unscaled, scale: 9 };
            let back = Value::try_from_bytes(&value.to_bytes(), &data_type).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_float_bit_patterns_preserved() {
        // -0.0 must stay -0.0 bitwise.
        let bytes = Value::Float(-0.0).to_bytes();
        let back = Value::try_from_bytes(&bytes, &Type::Primitive(PrimitiveType::Float)).unwrap();
        match back {
            Value::Float(f) => assert_eq!(f.to_bits(), (-0.0f32).to_bits()),
            other => panic!("unexpected value {other:?}"),
        }
    }

    fn bounds_schema() -> Schema {
        Schema::builder()
            .with_fields(vec![
                NestedField::required(1, "id", Type::Primitive(PrimitiveType::Long)).into(),
                NestedField::optional(2, "name", Type::Primitive(PrimitiveType::String)).into(),
                NestedField::optional(3, "score", Type::Primitive(PrimitiveType::Double)).into(),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_bounds_resolves_and_coerces() {
        let schema = bounds_schema();
        let bounds = HashMap::from([
            // Int widens to the column's long.
            (1, Value::Int(7)),
            (2, Value::String("a".to_string())),
            (3, Value::Float(0.5)),
        ]);

        let encoded = encode_bounds(&bounds, &schema);
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded[&1].as_ref(), &7i64.to_le_bytes());
        assert_eq!(encoded[&2].as_ref(), b"a");
        assert_eq!(encoded[&3].as_ref(), &0.5f64.to_le_bytes());
    }

    #[test]
    fn test_encode_bounds_drops_untypable_entries() {
        let schema = bounds_schema();
        let bounds = HashMap::from([
            // Unknown column id.
            (9, Value::Int(1)),
            // Value incompatible with the column type.
            (2, Value::Long(5)),
        ]);
        assert!(encode_bounds(&bounds, &schema).is_empty());
    }
}
