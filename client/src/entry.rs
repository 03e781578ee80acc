// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use futures::{stream, Stream, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::input::{RawContent, RawEntry};
use crate::{ByteChunks, Error, Result};

/// Canonical (path, lazy byte sequence) pair representing one file or stream
/// to upload. Entries are built per call and consumed exactly once.
pub struct Entry {
    /// Caller-supplied relative name; empty when the input carries none.
    pub path: String,
    /// `None` only for explicit directory placeholders.
    pub content: Option<LazyBytes>,
}

impl Entry {
    /// Canonicalizes one candidate descriptor. Pure apart from delegating to
    /// the byte-source adapter; no I/O happens here.
    pub(crate) fn normalize(raw: RawEntry) -> Result<Entry> {
        if raw.path.is_none() && raw.content.is_none() {
            return Err(Error::UnsupportedInput(
                "descriptor with neither path nor content".to_string(),
            ));
        }
        Ok(Entry {
            path: raw.path.unwrap_or_default(),
            content: raw.content.map(LazyBytes::from_content),
        })
    }
}

/// Single-pass asynchronous chunk stream, annotated with a best-effort total
/// length when the underlying source is a fixed-size buffer or a
/// size-reporting reader. Re-iterating a `LazyBytes` is undefined; it must be
/// consumed at most once.
pub struct LazyBytes {
    /// Exact byte count when cheaply knowable, `None` otherwise.
    pub length: Option<u64>,
    /// The chunks themselves, in source order.
    pub chunks: ByteChunks,
}

impl LazyBytes {
    /// One-chunk sequence with an exact length hint.
    pub fn from_bytes(bytes: Bytes) -> Self {
        let length = bytes.len() as u64;
        Self {
            length: Some(length),
            chunks: Box::pin(stream::once(async move { Ok(bytes) })),
        }
    }

    /// Pass-through for an asynchronous chunk stream; length unknown up front.
    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            length: None,
            chunks: Box::pin(chunks),
        }
    }

    /// Incremental reads from a pull-based source, with an optional reported
    /// length.
    pub fn from_reader<R>(reader: R, length: Option<u64>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            length,
            chunks: Box::pin(ReaderStream::new(reader).map_err(Error::Io)),
        }
    }

    /// Adapter from one already-classified content value.
    pub(crate) fn from_content(content: RawContent) -> Self {
        match content {
            RawContent::Bytes(bytes) => Self::from_bytes(bytes),
            RawContent::Stream(chunks) => Self {
                length: None,
                chunks: Box::pin(chunks.map_err(Error::Io)),
            },
            RawContent::Reader { reader, length } => Self::from_reader(reader, length),
        }
    }
}
