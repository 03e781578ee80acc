// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::{Bytes, BytesMut};
use futures::{ready, Stream};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{ByteChunks, Error};

/// Frames a byte stream into one parsed JSON value per line.
///
/// Partial lines split across chunk boundaries are carried over in an
/// internal buffer; a trailing line without a newline is flushed when the
/// underlying stream ends. Blank lines are skipped. A line that is not valid
/// JSON is fatal: the decoder yields the error once and then ends, no matter
/// how much input remains.
pub struct NdJsonDecoder {
    inner: ByteChunks,
    buffer: BytesMut,
    done: bool,
    failed: bool,
}

impl NdJsonDecoder {
    pub fn new(inner: ByteChunks) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            done: false,
            failed: false,
        }
    }

    fn take_line(&mut self) -> Option<Bytes> {
        let newline = self.buffer.iter().position(|&byte| byte == b'\n')?;
        Some(self.buffer.split_to(newline + 1).freeze())
    }
}

impl Stream for NdJsonDecoder {
    type Item = Result<Value, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        loop {
            if let Some(line) = this.take_line() {
                let line = trim_line(&line);
                if line.is_empty() {
                    continue;
                }
                let parsed = serde_json::from_slice(line).map_err(Error::Decode);
                this.failed = parsed.is_err();
                return Poll::Ready(Some(parsed));
            }

            if this.done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let line = this.buffer.split().freeze();
                let line = trim_line(&line);
                if line.is_empty() {
                    return Poll::Ready(None);
                }
                let parsed = serde_json::from_slice(line).map_err(Error::Decode);
                this.failed = parsed.is_err();
                return Poll::Ready(Some(parsed));
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    this.failed = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => this.done = true,
            }
        }
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map(|index| index + 1)
        .unwrap_or(0);
    &line[..end]
}
