// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default [`RestClient`] backed by `reqwest`'s blocking client.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;

use super::{RestClient, RestClientFactory, RestResponse};
use crate::error::{Error, Result};

const APPLICATION_JSON: &str = "application/json";

/// Factory producing [`HttpRestClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

impl RestClientFactory for HttpClientFactory {
    fn create(&self, timeout: Duration) -> Box<dyn RestClient> {
        Box::new(HttpRestClient::new(timeout))
    }
}

/// Blocking HTTP client with a fixed request timeout.
#[derive(Debug)]
pub struct HttpRestClient {
    client: Option<Client>,
}

impl HttpRestClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| log::error!("[REST] Failed to build HTTP client: {}", e))
            .ok();
        Self { client }
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::RestError)
    }

    fn execute(&self, request: RequestBuilder, method: &str, url: &str) -> Result<RestResponse> {
        let response = request.send().map_err(|e| {
            log::error!("[REST] {} {} failed: {}", method, url, e);
            Error::RestError
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| {
            log::error!("[REST] Failed to read response body from {}: {}", url, e);
            Error::RestError
        })?;
        log::debug!("[REST] {} {} -> {}", method, url, status);
        Ok(RestResponse::new(status, body.to_vec()))
    }
}

impl RestClient for HttpRestClient {
    fn get(&self, url: &str) -> Result<RestResponse> {
        let request = self.client()?.get(url);
        self.execute(request, "GET", url)
    }

    fn put(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        let request = self
            .client()?
            .put(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(body.to_vec());
        self.execute(request, "PUT", url)
    }

    fn post(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        let request = self
            .client()?
            .post(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(body.to_vec());
        self.execute(request, "POST", url)
    }

    fn delete(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        let request = self.client()?.delete(url).body(body.to_vec());
        self.execute(request, "DELETE", url)
    }
}
