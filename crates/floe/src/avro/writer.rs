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

//! Avro 1.11 Object Container File framing.
//!
//! Layout: magic, header map (`avro.schema`, `avro.codec`, user metadata),
//! a random 16-byte sync marker, then data blocks of
//! `{object_count, byte_count, payload, sync}`.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::str::FromStr;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use rand::RngCore;

use crate::avro::encode::{encode, AvroValue};
use crate::avro::schema::AvroSchema;
use crate::avro::varint::write_long;
use crate::{Error, ErrorKind, Result};

const OCF_MAGIC: [u8; 4] = [b'O', b'b', b'j', 1u8];

/// Compression codec declared in the `avro.codec` header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression.
    #[default]
    Null,
    /// Raw deflate, no checksum.
    Deflate,
    /// Recognized for completeness; the writer does not produce it.
    Snappy,
}

impl Display for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::Null => write!(f, "null"),
            Codec::Deflate => write!(f, "deflate"),
            Codec::Snappy => write!(f, "snappy"),
        }
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            "snappy" => Ok(Codec::Snappy),
            other => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("avro codec {other:?} is invalid"),
            )),
        }
    }
}

/// Writer for a single Object Container File.
///
/// Records are buffered; `into_bytes` emits the header and one data block
/// per `flush_block` call plus the trailing partial block.
#[derive(Debug)]
pub struct OcfWriter {
    schema: AvroSchema,
    codec: Codec,
    metadata: Vec<(String, Vec<u8>)>,
    sync: [u8; 16],
    blocks: Vec<(i64, Vec<u8>)>,
    pending: Vec<u8>,
    pending_count: i64,
}

impl OcfWriter {
    /// Create a writer for `schema` with the given codec.
    pub fn new(schema: AvroSchema, codec: Codec) -> Result<Self> {
        if codec == Codec::Snappy {
            return Err(Error::new(
                ErrorKind::FeatureUnsupported,
                "snappy codec is not supported by this writer",
            ));
        }
        let mut sync = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut sync);
        Ok(Self {
            schema,
            codec,
            metadata: Vec::new(),
            sync,
            blocks: Vec::new(),
            pending: Vec::new(),
            pending_count: 0,
        })
    }

    /// Attach a user metadata entry to the file header. The Iceberg keys
    /// (`format-version`, `partition-spec`, ...) ride alongside
    /// `avro.schema` and `avro.codec`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Encode one record into the current block.
    pub fn append(&mut self, value: &AvroValue) -> Result<()> {
        encode(value, &self.schema, &mut self.pending)?;
        self.pending_count += 1;
        Ok(())
    }

    /// Encode each record of `values` in order.
    pub fn append_all<'a>(&mut self, values: impl IntoIterator<Item = &'a AvroValue>) -> Result<()> {
        for value in values {
            self.append(value)?;
        }
        Ok(())
    }

    /// Seal the current block. Large files may call this periodically to
    /// bound block size; `into_bytes` seals the last block itself.
    pub fn flush_block(&mut self) -> Result<()> {
        if self.pending_count == 0 {
            return Ok(());
        }
        let payload = match self.codec {
            Codec::Null => std::mem::take(&mut self.pending),
            Codec::Deflate => {
                let raw = std::mem::take(&mut self.pending);
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&raw)?;
                encoder.finish()?
            }
            Codec::Snappy => unreachable!("rejected in OcfWriter::new"),
        };
        self.blocks.push((self.pending_count, payload));
        self.pending_count = 0;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn record_count(&self) -> i64 {
        self.blocks.iter().map(|(n, _)| n).sum::<i64>() + self.pending_count
    }

    /// Finish the file and return its bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.flush_block()?;

        let mut out = Vec::new();
        out.extend_from_slice(&OCF_MAGIC);

        // The header is an Avro map<string, bytes>: count, entries, zero
        // terminator.
        let schema_json = serde_json::to_vec(&self.schema.to_json())?;
        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("avro.schema".to_string(), schema_json),
            ("avro.codec".to_string(), self.codec.to_string().into_bytes()),
        ];
        entries.append(&mut self.metadata);

        write_long(&mut out, entries.len() as i64);
        for (key, value) in &entries {
            write_long(&mut out, key.len() as i64);
            out.extend_from_slice(key.as_bytes());
            write_long(&mut out, value.len() as i64);
            out.extend_from_slice(value);
        }
        write_long(&mut out, 0);

        out.extend_from_slice(&self.sync);

        for (count, payload) in &self.blocks {
            write_long(&mut out, *count);
            write_long(&mut out, payload.len() as i64);
            out.extend_from_slice(payload);
            out.extend_from_slice(&self.sync);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::avro::schema::RecordField;
    use crate::avro::varint::read_long;

    fn long_record_schema() -> AvroSchema {
        AvroSchema::record("r", vec![RecordField::new("v", AvroSchema::Long)])
    }

    fn record(v: i64) -> AvroValue {
        AvroValue::Record(vec![("v".to_string(), AvroValue::Long(v))])
    }

    #[test]
    fn test_magic_and_header_layout() {
        let mut writer = OcfWriter::new(long_record_schema(), Codec::Null).unwrap();
        writer.append(&record(7)).unwrap();
        let bytes = writer.into_bytes().unwrap();

        assert_eq!(&bytes[..4], &[0x4f, 0x62, 0x6a, 0x01]);

        // Header map count covers avro.schema and avro.codec.
        let (count, read) = read_long(&bytes[4..]).unwrap();
        assert_eq!(count, 2);

        let (key_len, n) = read_long(&bytes[4 + read..]).unwrap();
        let key_start = 4 + read + n;
        assert_eq!(
            &bytes[key_start..key_start + key_len as usize],
            b"avro.schema"
        );
    }

    #[test]
    fn test_sync_marker_repeats_per_block() {
        let mut writer = OcfWriter::new(long_record_schema(), Codec::Null).unwrap();
        writer.append(&record(1)).unwrap();
        writer.flush_block().unwrap();
        writer.append(&record(2)).unwrap();
        let sync = writer.sync;
        let bytes = writer.into_bytes().unwrap();

        let matches = bytes
            .windows(16)
            .filter(|window| *window == sync)
            .count();
        // Header sync plus one per block.
        assert_eq!(matches, 3);
    }

    #[test]
    fn test_empty_file_has_no_blocks() {
        let writer = OcfWriter::new(long_record_schema(), Codec::Null).unwrap();
        let sync = writer.sync;
        let bytes = writer.into_bytes().unwrap();
        assert!(bytes.ends_with(&sync));
        let matches = bytes.windows(16).filter(|w| *w == sync).count();
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_user_metadata_entries_emitted() {
        let writer = OcfWriter::new(long_record_schema(), Codec::Null)
            .unwrap()
            .with_metadata("format-version", "2".as_bytes().to_vec());
        let bytes = writer.into_bytes().unwrap();
        let needle = b"format-version";
        assert!(bytes
            .windows(needle.len())
            .any(|window| window == needle));
    }

    #[test]
    fn test_snappy_rejected() {
        let err = OcfWriter::new(long_record_schema(), Codec::Snappy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureUnsupported);
    }

    #[test]
    fn test_record_count() {
        let mut writer = OcfWriter::new(long_record_schema(), Codec::Null).unwrap();
        writer.append_all([&record(1), &record(2)]).unwrap();
        writer.flush_block().unwrap();
        writer.append(&record(3)).unwrap();
        assert_eq!(writer.record_count(), 3);
    }
}
