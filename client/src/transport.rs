// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use log::debug;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use url::Url;

use crate::multipart::MultipartBody;
use crate::{ByteChunks, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One HTTP exchange as the upload pipeline sees it.
pub struct ApiRequest {
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<MultipartBody>,
    /// Observed at every suspension point; once triggered, pending I/O is
    /// abandoned rather than completed.
    pub cancel: CancellationToken,
}

pub struct ApiResponse {
    pub status: u16,
    pub body: ByteChunks,
}

/// Seam between the pipeline and the HTTP stack. The orchestrator owns one
/// request per call; implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Turns a non-success response into an [`Error::Api`] carrying the node's
/// reported message when one can be decoded from the body.
pub(crate) async fn ensure_ok(response: ApiResponse) -> Result<ApiResponse> {
    if (200..300).contains(&response.status) {
        return Ok(response);
    }

    let status = response.status;
    let mut body = response.body;
    let mut collected = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => {
                collected.extend_from_slice(&chunk);
                if collected.len() > 8192 {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    let message = serde_json::from_slice::<serde_json::Value>(&collected)
        .ok()
        .and_then(|value| {
            value
                .get("Message")
                .and_then(|message| message.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(&collected).trim().to_string());

    Err(Error::Api { status, message })
}

/// Stream wrapper that aborts with [`Error::Cancelled`] as soon as the token
/// fires, without polling the underlying source again.
pub(crate) struct Cancellable<S> {
    inner: S,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    fired: bool,
}

impl<S> Cancellable<S> {
    pub(crate) fn new(inner: S, token: CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Box::pin(token.cancelled_owned()),
            fired: false,
        }
    }
}

impl<S, T> Stream for Cancellable<S>
where
    S: Stream<Item = Result<T>> + Unpin,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.fired {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.fired = true;
            return Poll::Ready(Some(Err(Error::Cancelled)));
        }
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

/// Transport backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dagbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::Transport(anyhow::Error::new(err)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let ApiRequest {
            url,
            method,
            headers,
            body,
            cancel,
        } = request;

        let mut builder = match method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()),
        };
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            let content_type = body.content_type();
            builder = builder
                .header("Content-Type", content_type)
                .body(reqwest::Body::wrap_stream(Cancellable::new(
                    body.chunks,
                    cancel.clone(),
                )));
        }

        debug!("{method:?} {url}");
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = builder.send() => {
                response.map_err(|err| Error::Transport(anyhow::Error::new(err)))?
            }
        };

        let status = response.status().as_u16();
        let body: ByteChunks = Box::pin(
            response
                .bytes_stream()
                .map_err(|err| Error::Transport(anyhow::Error::new(err))),
        );
        Ok(ApiResponse {
            status,
            body: Box::pin(Cancellable::new(body, cancel)),
        })
    }
}
