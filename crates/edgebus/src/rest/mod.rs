// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! REST access used for directory bootstrap, topic registration and keep-alive.
//!
//! All HTTP traffic goes through [`RestFactory`], which asks the installed
//! [`RestClientFactory`] for a fresh [`RestClient`] per request. Tests swap the
//! factory with [`RestFactory::set_factory`] to serve canned responses.

mod http;

pub use http::{HttpClientFactory, HttpRestClient};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// HTTP 200.
pub const HTTP_OK: u16 = 200;
/// HTTP 201.
pub const HTTP_CREATED: u16 = 201;

/// Status code and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON, mapping failures to [`Error::RestError`].
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            log::error!("[REST] Malformed response body: {}", e);
            Error::RestError
        })
    }
}

/// Blocking HTTP client.
///
/// Transport-level failures (connection refused, timeout, unreadable body)
/// surface as [`Error::RestError`]; any HTTP status is returned as a response.
pub trait RestClient: Send + Sync {
    fn get(&self, url: &str) -> Result<RestResponse>;
    fn put(&self, url: &str, body: &[u8]) -> Result<RestResponse>;
    fn post(&self, url: &str, body: &[u8]) -> Result<RestResponse>;
    fn delete(&self, url: &str, body: &[u8]) -> Result<RestResponse>;
}

/// Produces REST clients bound to a request timeout.
pub trait RestClientFactory: Send + Sync {
    fn create(&self, timeout: Duration) -> Box<dyn RestClient>;
}

/// Entry point for REST calls with a swappable client factory.
pub struct RestFactory {
    factory: RwLock<Arc<dyn RestClientFactory>>,
    timeout: Duration,
}

impl RestFactory {
    pub fn new(factory: Arc<dyn RestClientFactory>, timeout: Duration) -> Self {
        Self {
            factory: RwLock::new(factory),
            timeout,
        }
    }

    /// Replace the client factory used by subsequent requests.
    pub fn set_factory(&self, factory: Arc<dyn RestClientFactory>) {
        *self.factory.write() = factory;
    }

    /// Default request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self, timeout: Duration) -> Box<dyn RestClient> {
        self.factory.read().create(timeout)
    }

    pub fn get(&self, url: &str) -> Result<RestResponse> {
        log::debug!("[REST] GET {}", url);
        self.client(self.timeout).get(url)
    }

    pub fn put(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        log::debug!("[REST] PUT {}", url);
        self.client(self.timeout).put(url, body)
    }

    pub fn post(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        self.post_with_timeout(url, body, self.timeout)
    }

    /// POST with an explicit timeout instead of the default.
    pub fn post_with_timeout(
        &self,
        url: &str,
        body: &[u8],
        timeout: Duration,
    ) -> Result<RestResponse> {
        log::debug!("[REST] POST {}", url);
        self.client(timeout).post(url, body)
    }

    pub fn delete(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        log::debug!("[REST] DELETE {}", url);
        self.client(self.timeout).delete(url, body)
    }
}

impl Default for RestFactory {
    fn default() -> Self {
        Self::new(
            Arc::new(HttpClientFactory),
            crate::config::CONNECTION_TIMEOUT,
        )
    }
}

impl std::fmt::Debug for RestFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestFactory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
