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

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Result that is a wrapper of `Result<T, floe::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// ErrorKind is all kinds of Error of the table writer.
///
/// Every error carries the stage it was raised in; the wrapped cause, if
/// any, travels in the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The requested object does not exist: a storage path, or the table
    /// itself when both the version hint and metadata files are missing.
    NotFound,

    /// A table already exists at the target location at creation time.
    AlreadyExists,

    /// Input data is invalid: unparseable metadata, a value that does not
    /// match its column type, an Avro value that does not match the writer
    /// schema.
    DataInvalid,

    /// A schema evolution operation violated a validation rule under the
    /// requested mode. The message names the violated rule.
    ValidationFailed,

    /// The data-file glob contained characters outside the allowed set.
    InvalidFilePattern,

    /// The current metadata document could not be read or parsed.
    MetadataLoadFailed,

    /// The new metadata document or the version hint could not be written.
    /// The table is left at its previous version.
    MetadataSaveFailed,

    /// The manifest file could not be uploaded.
    ManifestUploadFailed,

    /// The manifest-list file could not be uploaded.
    ManifestListUploadFailed,

    /// A requested capability is recognized but not implemented, for
    /// example the snappy Avro codec.
    FeatureUnsupported,

    /// Nothing else fits, and no action other than returning it is known.
    Unexpected,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::DataInvalid => "DataInvalid",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::InvalidFilePattern => "InvalidFilePattern",
            ErrorKind::MetadataLoadFailed => "MetadataLoadFailed",
            ErrorKind::MetadataSaveFailed => "MetadataSaveFailed",
            ErrorKind::ManifestUploadFailed => "ManifestUploadFailed",
            ErrorKind::ManifestListUploadFailed => "ManifestListUploadFailed",
            ErrorKind::FeatureUnsupported => "FeatureUnsupported",
            ErrorKind::Unexpected => "Unexpected",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all floe functions.
///
/// Displayed on a single line via `Display`:
///
/// ```shell
/// MetadataSaveFailed, context: { path: metadata/v3.metadata.json } => upload rejected, source: timeout
/// ```
///
/// `Debug` prints multiple lines including the backtrace when captured.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<anyhow::Error>,
    backtrace: Backtrace,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, print like a struct Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source: {source:#}")?;
        }

        if self.backtrace.status() == BacktraceStatus::Captured {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{}", self.backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),

            source: None,
            // `Backtrace::capture()` is zero cost when backtraces are
            // disabled via the environment.
            backtrace: Backtrace::capture(),
        }
    }

    /// Add more context to the error.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set source for the error.
    ///
    /// # Notes
    ///
    /// If the source has been set, a debug assertion fires.
    pub fn with_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");

        self.source = Some(src.into());
        self
    }

    /// Rewrap the error under a different kind, keeping message, context
    /// and source. Used where a storage failure surfaces as a stage
    /// failure, for example `ManifestUploadFailed`.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Return the error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return the error's message.
    #[inline]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

macro_rules! define_from_err {
    ($source: path, $error_kind: path, $msg: expr) => {
        impl std::convert::From<$source> for crate::error::Error {
            fn from(v: $source) -> Self {
                Self::new($error_kind, $msg).with_source(v)
            }
        }
    };
}

define_from_err!(
    std::str::Utf8Error,
    ErrorKind::Unexpected,
    "handling invalid utf-8 characters"
);

define_from_err!(
    core::num::ParseIntError,
    ErrorKind::Unexpected,
    "parsing integer from string"
);

define_from_err!(
    std::array::TryFromSliceError,
    ErrorKind::DataInvalid,
    "failed to convert byte slice to array"
);

define_from_err!(
    std::num::TryFromIntError,
    ErrorKind::DataInvalid,
    "failed to convert integer"
);

define_from_err!(
    uuid::Error,
    ErrorKind::DataInvalid,
    "failed to parse uuid"
);

define_from_err!(
    opendal::Error,
    ErrorKind::Unexpected,
    "failure in doing io operation"
);

define_from_err!(
    url::ParseError,
    ErrorKind::DataInvalid,
    "failed to parse url"
);

define_from_err!(
    serde_json::Error,
    ErrorKind::DataInvalid,
    "failed to parse json string"
);

define_from_err!(
    rust_decimal::Error,
    ErrorKind::DataInvalid,
    "failed to convert decimal literal"
);

define_from_err!(std::io::Error, ErrorKind::Unexpected, "io operation failed");

/// Helper macro to check arguments.
///
/// Returns a `DataInvalid` error when the condition does not hold.
#[macro_export]
macro_rules! ensure_data_valid {
    ($cond: expr, $fmt: literal, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::new($crate::error::ErrorKind::DataInvalid, format!($fmt, $($arg)*)))
        }
    };
}
