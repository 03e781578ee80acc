// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::casing;
use crate::{Error, Result};

/// Callback invoked with the total bytes processed so far for the
/// currently-uploading item.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Options for [`Client::add`](crate::Client::add).
///
/// Every option defaults to absent; absent options are omitted from the
/// request entirely rather than sent with a default value.
#[derive(Clone, Default)]
pub struct AddOptions {
    pub chunker: Option<String>,
    pub cid_version: Option<u32>,
    pub cid_base: Option<String>,
    pub enable_sharding_experiment: Option<bool>,
    pub hash: Option<String>,
    pub only_hash: Option<bool>,
    pub pin: Option<bool>,
    pub quiet: Option<bool>,
    pub quieter: Option<bool>,
    pub raw_leaves: Option<bool>,
    pub shard_split_threshold: Option<u64>,
    pub silent: Option<bool>,
    pub trickle: Option<bool>,
    pub wrap_with_directory: Option<bool>,
    /// Per-call header overrides; when non-empty these replace the client's
    /// default headers.
    pub headers: Vec<(String, String)>,
    /// Progress side channel. Supplying a callback also asks the node to emit
    /// progress records.
    pub progress: Option<ProgressFn>,
    /// Caller-owned cancellation token, observed at every suspension point.
    pub cancel: Option<CancellationToken>,
}

impl AddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunker(mut self, chunker: impl Into<String>) -> Self {
        self.chunker = Some(chunker.into());
        self
    }

    pub fn cid_version(mut self, version: u32) -> Self {
        self.cid_version = Some(version);
        self
    }

    pub fn cid_base(mut self, base: impl Into<String>) -> Self {
        self.cid_base = Some(base.into());
        self
    }

    pub fn enable_sharding_experiment(mut self, enable: bool) -> Self {
        self.enable_sharding_experiment = Some(enable);
        self
    }

    pub fn hash(mut self, algorithm: impl Into<String>) -> Self {
        self.hash = Some(algorithm.into());
        self
    }

    pub fn only_hash(mut self, only_hash: bool) -> Self {
        self.only_hash = Some(only_hash);
        self
    }

    pub fn pin(mut self, pin: bool) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = Some(quiet);
        self
    }

    pub fn quieter(mut self, quieter: bool) -> Self {
        self.quieter = Some(quieter);
        self
    }

    pub fn raw_leaves(mut self, raw_leaves: bool) -> Self {
        self.raw_leaves = Some(raw_leaves);
        self
    }

    pub fn shard_split_threshold(mut self, threshold: u64) -> Self {
        self.shard_split_threshold = Some(threshold);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn trickle(mut self, trickle: bool) -> Self {
        self.trickle = Some(trickle);
        self
    }

    pub fn wrap_with_directory(mut self, wrap: bool) -> Self {
        self.wrap_with_directory = Some(wrap);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Query parameters actually sent. Absent options produce no parameter at
    /// all; `progress` is sent only when a callback was supplied.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("stream-channels", "true".to_string())];
        if let Some(chunker) = &self.chunker {
            pairs.push(("chunker", chunker.clone()));
        }
        if let Some(version) = self.cid_version {
            pairs.push(("cid-version", version.to_string()));
        }
        if let Some(base) = &self.cid_base {
            pairs.push(("cid-base", base.clone()));
        }
        if let Some(enable) = self.enable_sharding_experiment {
            pairs.push(("enable-sharding-experiment", enable.to_string()));
        }
        if let Some(algorithm) = &self.hash {
            pairs.push(("hash", algorithm.clone()));
        }
        if let Some(only_hash) = self.only_hash {
            pairs.push(("only-hash", only_hash.to_string()));
        }
        if let Some(pin) = self.pin {
            pairs.push(("pin", pin.to_string()));
        }
        if self.progress.is_some() {
            pairs.push(("progress", "true".to_string()));
        }
        if let Some(quiet) = self.quiet {
            pairs.push(("quiet", quiet.to_string()));
        }
        if let Some(quieter) = self.quieter {
            pairs.push(("quieter", quieter.to_string()));
        }
        if let Some(raw_leaves) = self.raw_leaves {
            pairs.push(("raw-leaves", raw_leaves.to_string()));
        }
        if let Some(threshold) = self.shard_split_threshold {
            pairs.push(("shard-split-threshold", threshold.to_string()));
        }
        if let Some(silent) = self.silent {
            pairs.push(("silent", silent.to_string()));
        }
        if let Some(trickle) = self.trickle {
            pairs.push(("trickle", trickle.to_string()));
        }
        if let Some(wrap) = self.wrap_with_directory {
            pairs.push(("wrap-with-directory", wrap.to_string()));
        }
        pairs
    }
}

/// One result record from the node, key-normalized.
///
/// The node reports `Name`/`Hash`; callers see `path`/`cid`. `Size` arrives
/// as a decimal string on the wire and is parsed to a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedFile {
    #[serde(rename = "name", default)]
    pub path: String,
    #[serde(rename = "hash")]
    pub cid: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(number) => Ok(number),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// Splits decoded records into progress callbacks and yielded results.
///
/// A record carrying a `bytes` field is delivered to the progress callback
/// and suppressed; every other record is yielded. Strict either/or per
/// record, with the relative order of yielded records preserved.
pub(crate) fn multiplex<S>(
    records: S,
    progress: Option<ProgressFn>,
) -> impl Stream<Item = Result<AddedFile>> + Send
where
    S: Stream<Item = Result<Value>> + Send,
{
    records.filter_map(move |record| {
        let progress = progress.clone();
        async move {
            match record {
                Ok(value) => {
                    let value = casing::normalize_keys(value);
                    if let Some(callback) = &progress {
                        if let Some(bytes) = value.get("bytes").and_then(Value::as_u64) {
                            callback(bytes);
                            return None;
                        }
                    }
                    Some(serde_json::from_value(value).map_err(Error::Decode))
                }
                Err(err) => Some(Err(err)),
            }
        }
    })
}
