// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-memory transport for tests.

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::{stream, StreamExt};
use multihash_codetable::{Code, MultihashDigest};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

use crate::transport::{ApiRequest, ApiResponse, Cancellable, Transport};
use crate::{ByteChunks, Error, Result};

/// One captured request: the final URL and the fully collected body.
pub struct RecordedRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
}

enum QueuedResponse {
    Lines { status: u16, lines: Vec<String> },
    Stalled { lines: Vec<String> },
    Fail(String),
}

/// Transport that replays queued responses and records every request with
/// its collected body, so tests can assert on the wire form.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<QueuedResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response whose body is the given lines, newline-terminated.
    pub fn respond(&self, status: u16, lines: Vec<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(QueuedResponse::Lines { status, lines });
    }

    /// Queues a plain JSON response, for the one-shot endpoints.
    pub fn respond_json(&self, status: u16, value: serde_json::Value) {
        self.respond(status, vec![value.to_string()]);
    }

    /// Queues a response that emits the given lines and then never ends,
    /// for cancellation tests.
    pub fn respond_stalled(&self, lines: Vec<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(QueuedResponse::Stalled { lines });
    }

    /// Queues a network-level failure.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(QueuedResponse::Fail(message.into()));
    }

    /// Drains the captured requests.
    pub fn take_requests(&self) -> Vec<RecordedRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

/// Content identifier a well-behaved node would return for `content`.
pub fn fake_cid(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let multihash = Code::Sha2_256.wrap(&digest).unwrap();
    Cid::new_v1(0x55, multihash).to_string()
}

fn lines_body(lines: Vec<String>) -> ByteChunks {
    Box::pin(stream::iter(
        lines
            .into_iter()
            .map(|line| Ok(Bytes::from(format!("{line}\n"))))
            .collect::<Vec<_>>(),
    ))
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (content_type, body) = match request.body {
            Some(body) => {
                let content_type = body.content_type();
                let mut chunks = body.chunks;
                let mut collected = Vec::new();
                while let Some(chunk) = chunks.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                (Some(content_type), Some(collected))
            }
            None => (None, None),
        };

        self.requests.lock().unwrap().push(RecordedRequest {
            url: request.url,
            headers: request.headers,
            content_type,
            body,
        });

        let queued = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(QueuedResponse::Lines {
                status: 200,
                lines: Vec::new(),
            });

        match queued {
            QueuedResponse::Lines { status, lines } => Ok(ApiResponse {
                status,
                body: lines_body(lines),
            }),
            QueuedResponse::Stalled { lines } => {
                let body: ByteChunks = Box::pin(lines_body(lines).chain(stream::pending()));
                Ok(ApiResponse {
                    status: 200,
                    body: Box::pin(Cancellable::new(body, request.cancel)),
                })
            }
            QueuedResponse::Fail(message) => Err(Error::Transport(anyhow::anyhow!(message))),
        }
    }
}
