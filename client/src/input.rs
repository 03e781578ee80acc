// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Input shape classification.
//!
//! Callers hand `add` one of many legal shapes: a buffer, an open file, a
//! filesystem path, a single descriptor, a synchronous sequence of chunks or
//! descriptors, an asynchronous sequence of chunks or descriptors, or a
//! pull-based reader. [`classify`] turns all of them into one lazy sequence
//! of canonical [`Entry`] values.
//!
//! Homogeneous sequences are ambiguous: a sequence of chunks is one flat byte
//! stream, a sequence of descriptors is many files, and only the first
//! element tells them apart. The classifier reads exactly one element to
//! decide and, for asynchronous sources, splices that element back in front
//! of the remainder so no bytes are dropped.

use bytes::{Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::entry::{Entry, LazyBytes};
use crate::{Error, Result};

/// Raw asynchronous chunk stream accepted from callers.
pub type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Asynchronous sequence of chunks or descriptors.
pub type ItemStream = Pin<Box<dyn Stream<Item = std::io::Result<InputItem>> + Send + 'static>>;

/// Lazy sequence of canonical entries, the classifier's output.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<Entry>> + Send + 'static>>;

/// Content of a single descriptor, in whichever shape the caller has it.
pub enum RawContent {
    /// In-memory buffer with a known length.
    Bytes(Bytes),
    /// Asynchronous chunk stream, length unknown up front.
    Stream(ChunkStream),
    /// Pull-based reader, optionally with a reported length.
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        length: Option<u64>,
    },
}

impl RawContent {
    pub fn stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(chunks))
    }

    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Reader {
            reader: Box::new(reader),
            length: None,
        }
    }

    pub fn sized_reader<R>(reader: R, length: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Reader {
            reader: Box::new(reader),
            length: Some(length),
        }
    }
}

impl From<Bytes> for RawContent {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RawContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

/// A per-file descriptor before normalization.
#[derive(Default)]
pub struct RawEntry {
    /// Relative name; defaults to the empty string when absent.
    pub path: Option<String>,
    /// `None` marks a directory placeholder.
    pub content: Option<RawContent>,
}

impl RawEntry {
    /// Descriptor for one file with content.
    pub fn file(path: impl Into<String>, content: impl Into<RawContent>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
        }
    }

    /// Descriptor for a directory placeholder: a path with no content.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            content: None,
        }
    }
}

/// Element of an ambiguous homogeneous sequence. The first item decides
/// whether the whole sequence is one flat byte stream or many descriptors.
pub enum InputItem {
    Chunk(Bytes),
    Entry(RawEntry),
}

/// The closed set of top-level shapes `add` accepts.
pub enum AddInput {
    /// Fixed binary buffer.
    Bytes(Bytes),
    /// Open file; name left empty, length taken from metadata.
    File(tokio::fs::File),
    /// Filesystem path; opened lazily, name derived from the final segment.
    Path(PathBuf),
    /// Single descriptor.
    Entry(RawEntry),
    /// Synchronously-iterable sequence of chunks or descriptors.
    Iter(Box<dyn Iterator<Item = InputItem> + Send + 'static>),
    /// Asynchronous sequence of chunks or descriptors, with an optional
    /// filesystem path hint for naming a flat stream.
    Stream {
        items: ItemStream,
        path_hint: Option<PathBuf>,
    },
    /// Pull-based reader with no name and no known length.
    Reader(Box<dyn AsyncRead + Send + Unpin + 'static>),
}

impl AddInput {
    /// Synchronous sequence of chunks or descriptors.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = InputItem>,
        I::IntoIter: Send + 'static,
    {
        Self::Iter(Box::new(items.into_iter()))
    }

    /// Synchronous sequence of per-file descriptors.
    pub fn entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RawEntry>,
        I::IntoIter: Send + 'static,
    {
        Self::Iter(Box::new(entries.into_iter().map(InputItem::Entry)))
    }

    /// Flat sequence of individual byte values, the whole of which is one
    /// file's content.
    pub fn byte_iter<I>(bytes: I) -> Self
    where
        I: IntoIterator<Item = u8>,
        I::IntoIter: Send + 'static,
    {
        Self::Iter(Box::new(
            bytes
                .into_iter()
                .map(|byte| InputItem::Chunk(Bytes::copy_from_slice(&[byte]))),
        ))
    }

    /// Asynchronous stream of byte chunks.
    pub fn stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream {
            items: Box::pin(chunks.map(|chunk| chunk.map(InputItem::Chunk))),
            path_hint: None,
        }
    }

    /// Asynchronous stream of byte chunks carrying a filesystem path hint,
    /// e.g. a file the caller opened themselves. The final path segment
    /// becomes the entry name.
    pub fn stream_with_path<S>(chunks: S, path: impl Into<PathBuf>) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream {
            items: Box::pin(chunks.map(|chunk| chunk.map(InputItem::Chunk))),
            path_hint: Some(path.into()),
        }
    }

    /// Asynchronous stream of chunks or descriptors.
    pub fn item_stream<S>(items: S) -> Self
    where
        S: Stream<Item = std::io::Result<InputItem>> + Send + 'static,
    {
        Self::Stream {
            items: Box::pin(items),
            path_hint: None,
        }
    }

    /// Asynchronous stream of per-file descriptors.
    pub fn entry_stream<S>(entries: S) -> Self
    where
        S: Stream<Item = std::io::Result<RawEntry>> + Send + 'static,
    {
        Self::Stream {
            items: Box::pin(entries.map(|entry| entry.map(InputItem::Entry))),
            path_hint: None,
        }
    }

    /// Pull-based reader.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Reader(Box::new(reader))
    }
}

impl From<Bytes> for AddInput {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for AddInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for AddInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<&str> for AddInput {
    fn from(text: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for AddInput {
    fn from(text: String) -> Self {
        Self::Bytes(Bytes::from(text))
    }
}

impl From<tokio::fs::File> for AddInput {
    fn from(file: tokio::fs::File) -> Self {
        Self::File(file)
    }
}

impl From<PathBuf> for AddInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for AddInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<RawEntry> for AddInput {
    fn from(entry: RawEntry) -> Self {
        Self::Entry(entry)
    }
}

impl From<Vec<RawEntry>> for AddInput {
    fn from(entries: Vec<RawEntry>) -> Self {
        Self::entries(entries)
    }
}

impl From<Vec<InputItem>> for AddInput {
    fn from(items: Vec<InputItem>) -> Self {
        Self::iter(items)
    }
}

impl<P: Into<String>, B: Into<Bytes>> From<(P, B)> for AddInput {
    fn from((path, content): (P, B)) -> Self {
        Self::Entry(RawEntry {
            path: Some(path.into()),
            content: Some(RawContent::Bytes(content.into())),
        })
    }
}

/// Classifies the caller's input and exposes it as a lazy sequence of
/// canonical entries. Shape errors that can be detected without I/O are
/// returned synchronously; everything else surfaces through the stream.
pub fn classify(input: AddInput) -> Result<EntryStream> {
    match input {
        AddInput::Bytes(bytes) => Ok(single(Entry::normalize(RawEntry {
            path: None,
            content: Some(RawContent::Bytes(bytes)),
        })?)),
        AddInput::File(file) => Ok(Box::pin(stream::once(async move {
            let length = file.metadata().await?.len();
            Entry::normalize(RawEntry {
                path: None,
                content: Some(RawContent::sized_reader(file, length)),
            })
        }))),
        AddInput::Path(path) => {
            let name = file_name(&path);
            Ok(Box::pin(stream::once(async move {
                let file = tokio::fs::File::open(&path).await?;
                let length = file.metadata().await?.len();
                Entry::normalize(RawEntry {
                    path: Some(name),
                    content: Some(RawContent::sized_reader(file, length)),
                })
            })))
        }
        AddInput::Entry(raw) => Ok(single(Entry::normalize(raw)?)),
        AddInput::Iter(items) => classify_iter(items),
        AddInput::Stream { items, path_hint } => Ok(classify_stream(items, path_hint)),
        AddInput::Reader(reader) => Ok(single(Entry::normalize(RawEntry {
            path: None,
            content: Some(RawContent::Reader {
                reader,
                length: None,
            }),
        })?)),
    }
}

fn single(entry: Entry) -> EntryStream {
    Box::pin(stream::iter([Ok(entry)]))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Synchronous sequences: the first element decides the shape. A chunk first
/// means the whole iterable is one buffer, so it is collected here with an
/// exact length hint, matching the fixed-buffer path.
fn classify_iter(mut items: Box<dyn Iterator<Item = InputItem> + Send>) -> Result<EntryStream> {
    match items.next() {
        None => Ok(Box::pin(stream::empty())),
        Some(InputItem::Entry(first)) => {
            let entries = std::iter::once(InputItem::Entry(first))
                .chain(items)
                .map(|item| match item {
                    InputItem::Entry(raw) => Entry::normalize(raw),
                    InputItem::Chunk(_) => Err(Error::UnsupportedInput(
                        "chunk in a descriptor sequence".to_string(),
                    )),
                });
            Ok(Box::pin(stream::iter(entries)))
        }
        Some(InputItem::Chunk(first)) => {
            let mut buffer = BytesMut::from(&first[..]);
            for item in items {
                match item {
                    InputItem::Chunk(chunk) => buffer.extend_from_slice(&chunk),
                    InputItem::Entry(_) => {
                        return Err(Error::UnsupportedInput(
                            "descriptor in a byte sequence".to_string(),
                        ))
                    }
                }
            }
            Ok(single(Entry::normalize(RawEntry {
                path: None,
                content: Some(RawContent::Bytes(buffer.freeze())),
            })?))
        }
    }
}

/// Reads exactly one element from a single-consumption stream. The caller
/// owns the peeked element and is responsible for splicing it back.
async fn peek(mut items: ItemStream) -> (Option<std::io::Result<InputItem>>, ItemStream) {
    let first = items.next().await;
    (first, items)
}

/// Asynchronous sequences: peek one element, decide, then rebuild a stream
/// that replays the peeked element before forwarding the remainder. Dropping
/// the peeked element here would silently corrupt the first bytes of the
/// upload.
fn classify_stream(items: ItemStream, path_hint: Option<PathBuf>) -> EntryStream {
    Box::pin(
        stream::once(async move {
            let (first, rest) = peek(items).await;
            match first {
                None => stream::empty().boxed(),
                Some(Err(err)) => stream::once(async move { Err(Error::Io(err)) }).boxed(),
                Some(Ok(InputItem::Entry(first))) => {
                    let spliced = stream::iter([Ok(InputItem::Entry(first))]).chain(rest);
                    spliced
                        .map(|item| match item {
                            Ok(InputItem::Entry(raw)) => Entry::normalize(raw),
                            Ok(InputItem::Chunk(_)) => Err(Error::UnsupportedInput(
                                "chunk in a descriptor sequence".to_string(),
                            )),
                            Err(err) => Err(Error::Io(err)),
                        })
                        .boxed()
                }
                Some(Ok(InputItem::Chunk(first))) => {
                    let path = path_hint.as_deref().map(file_name).unwrap_or_default();
                    let chunks = stream::iter([Ok(first)]).chain(rest.map(|item| match item {
                        Ok(InputItem::Chunk(chunk)) => Ok(chunk),
                        Ok(InputItem::Entry(_)) => Err(Error::UnsupportedInput(
                            "descriptor in a byte sequence".to_string(),
                        )),
                        Err(err) => Err(Error::Io(err)),
                    }));
                    stream::iter([Ok(Entry {
                        path,
                        content: Some(LazyBytes::from_stream(chunks)),
                    })])
                    .boxed()
                }
            }
        })
        .flatten(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect_entries(stream: EntryStream) -> Vec<Entry> {
        stream
            .map(|entry| entry.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    async fn content_bytes(entry: Entry) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunks = entry.content.expect("entry has content").chunks;
        while let Some(chunk) = chunks.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn buffer_becomes_single_unnamed_entry() {
        let entries = collect_entries(classify("hello".into()).unwrap()).await;
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap();
        assert_eq!(entry.path, "");
        assert_eq!(entry.content.as_ref().unwrap().length, Some(5));
        assert_eq!(content_bytes(entry).await, b"hello");
    }

    #[tokio::test]
    async fn descriptor_iterable_yields_one_entry_per_file() {
        let input = AddInput::entries(vec![
            RawEntry::file("a.txt", Bytes::from_static(b"aaa")),
            RawEntry::file("b.txt", Bytes::from_static(b"bb")),
        ]);
        let entries = collect_entries(classify(input).unwrap()).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "a.txt");
        assert_eq!(entries[1].path, "b.txt");
    }

    #[tokio::test]
    async fn byte_iterable_collapses_to_one_buffer() {
        let input = AddInput::byte_iter(vec![1u8, 2, 3, 4]);
        let entries = collect_entries(classify(input).unwrap()).await;
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap();
        assert_eq!(entry.content.as_ref().unwrap().length, Some(4));
        assert_eq!(content_bytes(entry).await, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn chunk_iterable_is_one_file_not_many() {
        let input = AddInput::iter(vec![
            InputItem::Chunk(Bytes::from_static(b"ab")),
            InputItem::Chunk(Bytes::from_static(b"cd")),
        ]);
        let entries = collect_entries(classify(input).unwrap()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(content_bytes(entries.into_iter().next().unwrap()).await, b"abcd");
    }

    #[tokio::test]
    async fn async_chunk_stream_replays_peeked_chunk() {
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(&[1, 2, 3])),
            Ok(Bytes::from_static(&[4, 5])),
        ]);
        let entries = collect_entries(classify(AddInput::stream(chunks)).unwrap()).await;
        assert_eq!(entries.len(), 1);

        // the adapter must emit [1,2,3] then [4,5], never losing the peeked chunk
        let mut stream = entries.into_iter().next().unwrap().content.unwrap().chunks;
        let mut emitted = Vec::new();
        while let Some(chunk) = stream.next().await {
            emitted.push(chunk.unwrap().to_vec());
        }
        assert_eq!(emitted, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[tokio::test]
    async fn async_descriptor_stream_drains_all_descriptors() {
        let items = stream::iter(vec![
            Ok::<_, std::io::Error>(InputItem::Entry(RawEntry::file("x", vec![1u8]))),
            Ok(InputItem::Entry(RawEntry::file("y", vec![2u8]))),
        ]);
        let entries = collect_entries(classify(AddInput::item_stream(items)).unwrap()).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "x");
        assert_eq!(entries[1].path, "y");
    }

    #[tokio::test]
    async fn path_hint_names_a_flat_stream() {
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"z"))]);
        let input = AddInput::stream_with_path(chunks, "/var/data/photo.jpg");
        let entries = collect_entries(classify(input).unwrap()).await;
        assert_eq!(entries[0].path, "photo.jpg");
    }

    #[tokio::test]
    async fn empty_async_stream_yields_no_entries() {
        let items = stream::empty();
        let entries = classify(AddInput::item_stream(items)).unwrap();
        assert_eq!(entries.count().await, 0);
    }

    #[test]
    fn empty_descriptor_fails_before_any_io() {
        let result = classify(AddInput::Entry(RawEntry::default()));
        assert!(matches!(result, Err(Error::UnsupportedInput(_))));
    }

    #[test]
    fn mixed_sync_sequence_is_rejected() {
        let input = AddInput::iter(vec![
            InputItem::Chunk(Bytes::from_static(b"ab")),
            InputItem::Entry(RawEntry::file("late", vec![0u8])),
        ]);
        assert!(matches!(classify(input), Err(Error::UnsupportedInput(_))));
    }

    #[tokio::test]
    async fn tuple_becomes_named_entry() {
        let entries = collect_entries(classify(("notes.txt", "abc").into()).unwrap()).await;
        assert_eq!(entries[0].path, "notes.txt");
    }
}
