// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures: canned REST server and model files.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use edgebus::{Result, RestClient, RestClientFactory, RestResponse};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Test Z85 key (40 characters).
pub const KEY: &str = "rq:rM>}U?@Lns47E1%kR.o@n%FcmmsL/@{H8]yf7";

pub const DIRECTORY: &str = "http://directory:48323";

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub body: Vec<u8>,
}

impl Request {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

#[derive(Default)]
struct Routes {
    /// (method, url) -> queued responses; the last one repeats.
    responses: HashMap<(&'static str, String), Vec<RestResponse>>,
    log: Vec<Request>,
}

/// REST factory answering from a route table and logging every request.
///
/// Unrouted GET and DELETE answer `200 {}`, unrouted POST and PUT `201 {}`.
#[derive(Clone, Default)]
pub struct FakeRest {
    routes: Arc<Mutex<Routes>>,
}

impl FakeRest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, method: &'static str, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .responses
            .entry((method, url.to_string()))
            .or_default()
            .push(RestResponse::new(status, body));
    }

    /// Drop any queued responses for `method url` and answer with this one.
    pub fn replace(&self, method: &'static str, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .responses
            .insert((method, url.to_string()), vec![RestResponse::new(status, body)]);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.routes.lock().log.clone()
    }

    pub fn requests_to(&self, method: &str, url: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    /// Poll until `method url` was requested at least `count` times.
    pub fn wait_for(&self, method: &str, url: &str, count: usize, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.requests_to(method, url).len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    fn answer(&self, method: &'static str, url: &str, body: &[u8]) -> Result<RestResponse> {
        let mut routes = self.routes.lock();
        routes.log.push(Request {
            method,
            url: url.to_string(),
            body: body.to_vec(),
        });
        let key = (method, url.to_string());
        if let Some(queue) = routes.responses.get_mut(&key) {
            let response = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            };
            return Ok(response);
        }
        let status = match method {
            "POST" | "PUT" => 201,
            _ => 200,
        };
        Ok(RestResponse::new(status, "{}"))
    }
}

struct FakeClient {
    rest: FakeRest,
}

impl RestClient for FakeClient {
    fn get(&self, url: &str) -> Result<RestResponse> {
        self.rest.answer("GET", url, &[])
    }

    fn put(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        self.rest.answer("PUT", url, body)
    }

    fn post(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        self.rest.answer("POST", url, body)
    }

    fn delete(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
        self.rest.answer("DELETE", url, body)
    }
}

impl RestClientFactory for FakeRest {
    fn create(&self, _timeout: Duration) -> Box<dyn RestClient> {
        Box::new(FakeClient { rest: self.clone() })
    }
}

/// Directory topic registration URL.
pub fn topic_url() -> String {
    format!("{}/api/v1/tns/topic", DIRECTORY)
}

pub fn keepalive_url() -> String {
    format!("{}/api/v1/tns/keepalive", DIRECTORY)
}

pub const ROBOT_MODEL: &str = r#"{
  "name": "Robot",
  "version": "0.0.1",
  "fields": [
    { "name": "temperature", "kind": "number", "required": true },
    { "name": "label", "kind": "string" }
  ]
}"#;

pub const ROBOT_ID: &str = "Robot_0.0.1";

/// Write `content` to `name` inside a fresh temp dir.
pub fn write_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    (dir, path)
}

pub fn robot_model() -> (TempDir, PathBuf) {
    write_file("robot.json", ROBOT_MODEL)
}
