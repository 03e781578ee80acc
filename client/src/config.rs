// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

/// Connection settings for a [`Client`](crate::Client).
///
/// A `Config` is immutable once the client is built; per-call overrides go
/// through the operation's own options instead.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the node's HTTP API.
    pub endpoint: String,
    /// Path prefix every operation lives under.
    pub api_path: String,
    /// Headers attached to every request unless overridden per call.
    pub headers: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5001".to_string(),
            api_path: "/api/v0".to_string(),
            headers: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a `Config` pointing at the given endpoint. The rest of the
    /// fields keep their default values.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Adds a default header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
