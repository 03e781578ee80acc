// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! # Dagbox Client Library
//!
//! Client for content-addressed storage nodes speaking an IPFS-compatible
//! `/api/v0` HTTP API. The library takes upload content in any of the shapes
//! a caller might reasonably have on hand, normalizes all of them into one
//! lazy sequence of (path, byte-stream) entries, streams that sequence to the
//! node as multipart content, and decodes the node's newline-delimited JSON
//! response into typed result records with an optional progress side channel.
//!
//! ## Modules
//!
//! - [`client`](client): The [`Client`] itself and the `id`/`version` records.
//! - [`input`](input): Input shape classification ([`AddInput`] and friends).
//! - [`entry`](entry): Canonical entries and the byte-source adapter.
//! - [`add`](add): Upload options, result records and the response multiplexer.
//! - [`multipart`](multipart): Streaming multipart/form-data encoding.
//! - [`ndjson`](ndjson): Newline-delimited JSON framing.
//! - [`casing`](casing): Recursive key-casing normalization.
//! - [`transport`](transport): The [`Transport`] seam and its reqwest
//!   implementation.
//! - [`mock`](mock): An in-memory transport for testing, behind the `mock`
//!   feature.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dagbox_client::{AddOptions, Client, Config};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new(Config::default())?;
//!
//!     let records = client.add("hello world", AddOptions::new()).await?;
//!     futures::pin_mut!(records);
//!     while let Some(record) = records.next().await {
//!         let record = record?;
//!         println!("{} {}", record.cid, record.path);
//!     }
//!     Ok(())
//! }
//! ```

pub mod add;
pub mod casing;
pub mod client;
pub mod config;
pub mod entry;
pub mod input;
pub mod multipart;
pub mod ndjson;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use add::{AddOptions, AddedFile};
pub use client::{Client, Identity, NodeVersion};
pub use config::Config;
pub use entry::{Entry, LazyBytes};
pub use input::{AddInput, InputItem, RawContent, RawEntry};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Single-pass, forward-only stream of binary chunks.
pub type ByteChunks = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Error type for client operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The caller's input does not match any recognized shape.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// The client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request could not be carried out at the network level.
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),

    /// The node answered with a non-success status.
    #[error("Server responded with status {status}: {message}")]
    Api { status: u16, message: String },

    /// A response line is not valid JSON, or a record is missing required
    /// fields.
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller's cancellation token fired mid-operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A local content source failed while being read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
