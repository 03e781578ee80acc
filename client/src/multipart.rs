// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use futures::{stream, StreamExt};
use uuid::Uuid;

use crate::entry::Entry;
use crate::input::EntryStream;
use crate::ByteChunks;

/// A multipart/form-data request body produced from a lazy entry sequence.
///
/// Entries are encoded as the body is consumed; no entry's content is ever
/// fully buffered.
pub struct MultipartBody {
    pub boundary: String,
    pub chunks: ByteChunks,
}

impl MultipartBody {
    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Encodes entries as streaming multipart content: one part per entry, in
/// discovery order, with a closing boundary after the last part.
pub fn encode(entries: EntryStream) -> MultipartBody {
    let boundary = format!("------------------------{}", Uuid::new_v4().simple());

    let part_boundary = boundary.clone();
    let parts = entries
        .map(move |result| match result {
            Ok(entry) => {
                let header = part_header(&part_boundary, &entry);
                let content: ByteChunks = match entry.content {
                    Some(lazy) => lazy.chunks,
                    None => Box::pin(stream::empty()),
                };
                stream::once(async move { Ok(header) })
                    .chain(content)
                    .chain(stream::once(async { Ok(Bytes::from_static(b"\r\n")) }))
                    .left_stream()
            }
            Err(err) => stream::once(async move { Err(err) }).right_stream(),
        })
        .flatten();

    let closing = format!("--{boundary}--\r\n");
    let chunks = parts.chain(stream::once(async move { Ok(Bytes::from(closing)) }));

    MultipartBody {
        boundary,
        chunks: Box::pin(chunks),
    }
}

fn part_header(boundary: &str, entry: &Entry) -> Bytes {
    let filename = escape(&entry.path);
    let content_type = if entry.content.is_some() {
        "application/octet-stream"
    } else {
        "application/x-directory"
    };
    Bytes::from(format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    ))
}

fn escape(path: &str) -> String {
    path.replace('\\', "\\\\").replace('"', "\\\"")
}
