// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use futures::{Stream, StreamExt};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::add::{self, AddOptions, AddedFile};
use crate::casing;
use crate::config::Config;
use crate::input::{self, AddInput};
use crate::multipart;
use crate::ndjson::NdJsonDecoder;
use crate::transport::{ensure_ok, ApiRequest, HttpTransport, Method, Transport};
use crate::{Error, Result};

/// Client for a content-addressed storage node.
///
/// Generic over the [`Transport`] seam so tests can swap in an in-memory
/// transport; `Client::new` wires up the reqwest-backed one.
#[derive(Clone)]
pub struct Client<T: Transport = HttpTransport> {
    base: Url,
    config: Config,
    transport: T,
}

impl Client<HttpTransport> {
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: Config, transport: T) -> Result<Self> {
        let base = Url::parse(&config.endpoint).map_err(|err| Error::Config(err.to_string()))?;
        Ok(Self {
            base,
            config,
            transport,
        })
    }

    /// Uploads content to the node.
    ///
    /// Accepts any [`AddInput`] shape (or anything convertible into one) and
    /// returns a lazy stream of result records, one per stored file. When
    /// `options` carries a progress callback, progress records are diverted
    /// to it instead of being yielded. The upload itself is driven by
    /// consuming the returned stream's underlying response.
    pub async fn add(
        &self,
        input: impl Into<AddInput>,
        options: AddOptions,
    ) -> Result<impl Stream<Item = Result<AddedFile>> + Send> {
        let entries = input::classify(input.into())?;
        let body = multipart::encode(entries);

        let url = self.endpoint("add", &options.query_pairs());
        let cancel = options.cancel.clone().unwrap_or_default();
        let headers = if options.headers.is_empty() {
            self.config.headers.clone()
        } else {
            options.headers.clone()
        };

        debug!("add: {url}");
        let response = self
            .transport
            .request(ApiRequest {
                url,
                method: Method::Post,
                headers,
                body: Some(body),
                cancel,
            })
            .await?;
        let response = ensure_ok(response).await?;

        let records = NdJsonDecoder::new(response.body);
        Ok(add::multiplex(records, options.progress.clone()))
    }

    /// Fetches the node's identity.
    pub async fn id(&self) -> Result<Identity> {
        self.fetch_json("id").await
    }

    /// Fetches the node's version information.
    pub async fn version(&self) -> Result<NodeVersion> {
        self.fetch_json("version").await
    }

    async fn fetch_json<R: DeserializeOwned>(&self, operation: &str) -> Result<R> {
        let url = self.endpoint(operation, &[]);
        debug!("{operation}: {url}");
        let response = self
            .transport
            .request(ApiRequest {
                url,
                method: Method::Get,
                headers: self.config.headers.clone(),
                body: None,
                cancel: CancellationToken::new(),
            })
            .await?;
        let response = ensure_ok(response).await?;

        let mut body = response.body;
        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        let value: serde_json::Value = serde_json::from_slice(&collected)?;
        Ok(serde_json::from_value(casing::normalize_keys(value))?)
    }

    fn endpoint(&self, operation: &str, query: &[(&'static str, String)]) -> Url {
        let mut url = self.base.clone();
        // the endpoint may carry its own path prefix; the api path is
        // appended to it, not substituted for it
        url.set_path(&format!(
            "{}/{}/{}",
            url.path().trim_end_matches('/'),
            self.config.api_path.trim_matches('/'),
            operation
        ));
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        url
    }
}

/// Node identity, from the `id` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
}

/// Node build information, from the `version` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golang: Option<String>,
}
