// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic handler: background keep-alive reporter for registered topics.
//!
//! # Architecture
//!
//! ```text
//! Publishers ──► TopicHandler (cmd_tx) ──► edgebus-topic-handler thread
//!                                            - owns the live topic list
//!                                            - POSTs {topic_names} to the
//!                                              directory every interval
//! ```
//!
//! The live topic list is owned by the loop thread; every mutation and read
//! travels through the control channel as a `HandlerRequest`. The keep-alive
//! interval is learned from the directory on the first successful topic
//! registration and never overwritten afterwards.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{API_PREFIX, DEFAULT_POLL_INTERVAL, DIRECTORY_KEEPALIVE_PATH};
use crate::error::{Error, Result};
use crate::rest::{RestFactory, HTTP_OK};

const INTERVAL_UNKNOWN: i64 = -1;

/// Control channel capacity. Senders block while the loop is busy posting.
const CONTROL_QUEUE_DEPTH: usize = 64;

// ============================================================================
// Requests
// ============================================================================

/// Requests accepted by the handler loop.
#[derive(Debug)]
pub(crate) enum HandlerRequest {
    /// Append a topic name to the live list.
    Register(String),
    /// Remove the first exact occurrence of a topic name.
    Unregister(String),
    /// Start periodic keep-alive reports.
    ArmKeepAlive,
    /// Reply with a copy of the live list.
    Snapshot(Sender<Vec<String>>),
    /// Acknowledge on the given channel, then exit the loop.
    Shutdown(Sender<()>),
}

#[derive(Serialize)]
struct KeepAlivePayload<'a> {
    topic_names: &'a [String],
}

// ============================================================================
// Shared keep-alive state
// ============================================================================

#[derive(Debug)]
struct KeepAliveState {
    interval_secs: AtomicI64,
    started: AtomicBool,
}

impl KeepAliveState {
    fn new() -> Self {
        Self {
            interval_secs: AtomicI64::new(INTERVAL_UNKNOWN),
            started: AtomicBool::new(false),
        }
    }

    fn interval(&self) -> Option<Duration> {
        let secs = self.interval_secs.load(Ordering::Acquire);
        (secs > 0).then(|| Duration::from_secs(secs as u64))
    }

    fn reset(&self) {
        self.interval_secs
            .store(INTERVAL_UNKNOWN, Ordering::Release);
        self.started.store(false, Ordering::Release);
    }
}

struct Worker {
    cmd_tx: Sender<HandlerRequest>,
    thread: Option<JoinHandle<()>>,
}

// ============================================================================
// Handle
// ============================================================================

/// Owner of the keep-alive loop. One per [`Context`](crate::Context).
pub struct TopicHandler {
    rest: Arc<RestFactory>,
    shutdown_timeout: Duration,
    keep_alive: Arc<KeepAliveState>,
    initialized: AtomicBool,
    worker: Mutex<Option<Worker>>,
}

impl TopicHandler {
    pub(crate) fn new(rest: Arc<RestFactory>, shutdown_timeout: Duration) -> Self {
        Self {
            rest,
            shutdown_timeout,
            keep_alive: Arc::new(KeepAliveState::new()),
            initialized: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Start the loop reporting to `directory_url`. No-op when already running.
    pub(crate) fn init(&self, directory_url: &str) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let keep_alive_url = format!("{}{}{}", directory_url, API_PREFIX, DIRECTORY_KEEPALIVE_PATH);
        let (cmd_tx, cmd_rx) = channel::bounded(CONTROL_QUEUE_DEPTH);
        let keep_alive = self.keep_alive.clone();
        let rest = self.rest.clone();
        let thread = thread::Builder::new()
            .name("edgebus-topic-handler".to_string())
            .spawn(move || handler_loop(&cmd_rx, &keep_alive, &rest, &keep_alive_url))
            .map_err(|e| {
                log::error!("[TOPIC-HANDLER] Failed to spawn handler thread: {}", e);
                Error::UnknownState
            })?;

        *worker = Some(Worker {
            cmd_tx,
            thread: Some(thread),
        });
        self.initialized.store(true, Ordering::Release);
        log::info!("[TOPIC-HANDLER] Started, reporting to {}", directory_url);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Learned keep-alive interval, `None` until the directory reported one.
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive.interval()
    }

    /// Record the interval if none is known yet. Returns whether it was stored.
    pub fn update_keep_alive_interval(&self, secs: i64) -> bool {
        if secs < 1 {
            return false;
        }
        self.keep_alive
            .interval_secs
            .compare_exchange(INTERVAL_UNKNOWN, secs, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_keep_alive_started(&self) -> bool {
        self.keep_alive.started.load(Ordering::Acquire)
    }

    pub fn register_topic(&self, name: &str) -> Result<()> {
        self.send(HandlerRequest::Register(name.to_string()))
    }

    pub fn unregister_topic(&self, name: &str) -> Result<()> {
        self.send(HandlerRequest::Unregister(name.to_string()))
    }

    pub fn arm_keep_alive(&self) -> Result<()> {
        self.send(HandlerRequest::ArmKeepAlive)
    }

    /// Current live topic list, in registration order.
    pub fn live_topics(&self) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.send(HandlerRequest::Snapshot(reply_tx))?;
        reply_rx
            .recv_timeout(self.rest.timeout() + self.shutdown_timeout)
            .map_err(|_| Error::UnknownState)
    }

    fn send(&self, request: HandlerRequest) -> Result<()> {
        let worker = self.worker.lock();
        let worker = worker.as_ref().ok_or(Error::NotInitialized)?;
        worker.cmd_tx.send(request).map_err(|_| {
            log::error!("[TOPIC-HANDLER] Handler loop is gone");
            Error::UnknownState
        })
    }

    /// Stop the loop and reset all state. The acknowledgment wait is bounded;
    /// a loop that does not answer in time is detached.
    pub(crate) fn terminate(&self) {
        let mut guard = self.worker.lock();
        let Some(mut worker) = guard.take() else {
            return;
        };

        let (ack_tx, ack_rx) = channel::bounded(1);
        if worker.cmd_tx.send(HandlerRequest::Shutdown(ack_tx)).is_ok() {
            match ack_rx.recv_timeout(self.shutdown_timeout) {
                Ok(()) => {
                    if let Some(thread) = worker.thread.take() {
                        let _ = thread.join();
                    }
                    log::debug!("[TOPIC-HANDLER] Loop acknowledged shutdown");
                }
                Err(_) => log::warn!(
                    "[TOPIC-HANDLER] No shutdown acknowledgment within {:?}, detaching",
                    self.shutdown_timeout
                ),
            }
        }

        self.keep_alive.reset();
        self.initialized.store(false, Ordering::Release);
        log::info!("[TOPIC-HANDLER] Terminated");
    }
}

impl Drop for TopicHandler {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for TopicHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicHandler")
            .field("initialized", &self.is_initialized())
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Loop
// ============================================================================

fn handler_loop(
    cmd_rx: &Receiver<HandlerRequest>,
    keep_alive: &KeepAliveState,
    rest: &RestFactory,
    keep_alive_url: &str,
) {
    let mut live_topics: Vec<String> = Vec::new();
    let mut last_report: Option<Instant> = None;

    loop {
        let interval = keep_alive.interval().unwrap_or(DEFAULT_POLL_INTERVAL);
        let wait = match last_report {
            Some(at) if keep_alive.started.load(Ordering::Acquire) => {
                interval.saturating_sub(at.elapsed())
            }
            _ => interval,
        };

        match cmd_rx.recv_timeout(wait) {
            Ok(HandlerRequest::Register(name)) => {
                log::debug!("[TOPIC-HANDLER] Register {}", name);
                live_topics.push(name);
            }
            Ok(HandlerRequest::Unregister(name)) => {
                log::debug!("[TOPIC-HANDLER] Unregister {}", name);
                if let Some(pos) = live_topics.iter().position(|t| *t == name) {
                    live_topics.remove(pos);
                }
            }
            Ok(HandlerRequest::ArmKeepAlive) => {
                keep_alive.started.store(true, Ordering::Release);
            }
            Ok(HandlerRequest::Snapshot(reply)) => {
                let _ = reply.send(live_topics.clone());
            }
            Ok(HandlerRequest::Shutdown(ack)) => {
                let _ = ack.send(());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if !keep_alive.started.load(Ordering::Acquire) {
            continue;
        }
        let interval = keep_alive.interval().unwrap_or(DEFAULT_POLL_INTERVAL);
        if last_report.map_or(true, |at| at.elapsed() >= interval) {
            send_keep_alive(rest, keep_alive_url, &live_topics);
            last_report = Some(Instant::now());
        }
    }
    log::debug!("[TOPIC-HANDLER] Loop exited");
}

fn send_keep_alive(rest: &RestFactory, url: &str, live_topics: &[String]) {
    let body = match serde_json::to_vec(&KeepAlivePayload {
        topic_names: live_topics,
    }) {
        Ok(body) => body,
        Err(e) => {
            log::error!("[TOPIC-HANDLER] Failed to encode keep-alive: {}", e);
            return;
        }
    };
    match rest.post(url, &body) {
        Ok(response) if response.status == HTTP_OK => {
            log::debug!("[TOPIC-HANDLER] Keep-alive sent for {} topic(s)", live_topics.len());
        }
        Ok(response) => log::warn!(
            "[TOPIC-HANDLER] Keep-alive rejected with status {}",
            response.status
        ),
        Err(e) => log::warn!("[TOPIC-HANDLER] Keep-alive failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{RestClient, RestClientFactory, RestResponse};

    #[derive(Default)]
    struct Posts {
        log: Arc<Mutex<Vec<(String, String)>>>,
    }

    struct PostClient {
        log: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RestClient for PostClient {
        fn get(&self, _url: &str) -> Result<RestResponse> {
            Ok(RestResponse::new(200, ""))
        }
        fn put(&self, _url: &str, _body: &[u8]) -> Result<RestResponse> {
            Ok(RestResponse::new(200, ""))
        }
        fn post(&self, url: &str, body: &[u8]) -> Result<RestResponse> {
            self.log
                .lock()
                .push((url.to_string(), String::from_utf8_lossy(body).into_owned()));
            Ok(RestResponse::new(200, ""))
        }
        fn delete(&self, _url: &str, _body: &[u8]) -> Result<RestResponse> {
            Ok(RestResponse::new(200, ""))
        }
    }

    impl RestClientFactory for Posts {
        fn create(&self, _timeout: Duration) -> Box<dyn RestClient> {
            Box::new(PostClient {
                log: self.log.clone(),
            })
        }
    }

    fn handler_with_log() -> (TopicHandler, Arc<Mutex<Vec<(String, String)>>>) {
        let posts = Posts::default();
        let log = posts.log.clone();
        let rest = Arc::new(RestFactory::new(Arc::new(posts), Duration::from_secs(5)));
        (TopicHandler::new(rest, Duration::from_secs(1)), log)
    }

    #[test]
    fn test_requests_before_init_fail() {
        let (handler, _) = handler_with_log();
        assert!(!handler.is_initialized());
        assert_eq!(handler.register_topic("/a"), Err(Error::NotInitialized));
        assert_eq!(handler.live_topics(), Err(Error::NotInitialized));
    }

    #[test]
    fn test_register_unregister() {
        let (handler, _) = handler_with_log();
        handler.init("http://dir:48323").expect("init");
        handler.register_topic("/a").expect("register");
        handler.register_topic("/b").expect("register");
        handler.register_topic("/a").expect("register");
        handler.unregister_topic("/a").expect("unregister");
        assert_eq!(handler.live_topics(), Ok(vec!["/b".to_string(), "/a".to_string()]));

        handler.unregister_topic("/missing").expect("unregister");
        handler.unregister_topic("/b").expect("unregister");
        handler.unregister_topic("/a").expect("unregister");
        assert_eq!(handler.live_topics(), Ok(Vec::new()));
    }

    #[test]
    fn test_interval_first_write_wins() {
        let (handler, _) = handler_with_log();
        assert_eq!(handler.keep_alive_interval(), None);
        assert!(!handler.update_keep_alive_interval(0));
        assert!(handler.update_keep_alive_interval(200));
        assert!(!handler.update_keep_alive_interval(100));
        assert_eq!(handler.keep_alive_interval(), Some(Duration::from_secs(200)));
    }

    #[test]
    fn test_keep_alive_posts_live_topics() {
        let (handler, posts) = handler_with_log();
        handler.init("http://dir:48323").expect("init");
        assert!(handler.update_keep_alive_interval(1));
        handler.register_topic("/robot/arm").expect("register");
        handler.arm_keep_alive().expect("arm");

        let deadline = Instant::now() + Duration::from_secs(3);
        while posts.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(handler.is_keep_alive_started());
        let posts = posts.lock();
        let (url, body) = posts.first().expect("keep-alive POST");
        assert_eq!(url, "http://dir:48323/api/v1/tns/keepalive");
        assert_eq!(body, r#"{"topic_names":["/robot/arm"]}"#);
    }

    #[test]
    fn test_terminate_resets_and_reinit() {
        let (handler, _) = handler_with_log();
        handler.init("http://dir:48323").expect("init");
        handler.update_keep_alive_interval(30);
        handler.register_topic("/x").expect("register");

        let started = Instant::now();
        handler.terminate();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!handler.is_initialized());
        assert_eq!(handler.keep_alive_interval(), None);
        assert!(!handler.is_keep_alive_started());

        handler.init("http://dir:48323").expect("re-init");
        assert_eq!(handler.live_topics(), Ok(Vec::new()));
        handler.register_topic("/y").expect("register after re-init");
        handler.register_topic("/z").expect("register after re-init");
        handler.unregister_topic("/y").expect("unregister after re-init");
        assert_eq!(handler.live_topics(), Ok(vec!["/z".to_string()]));
        assert!(handler.update_keep_alive_interval(45));
        assert_eq!(handler.keep_alive_interval(), Some(Duration::from_secs(45)));
        handler.terminate();
        handler.terminate();
    }
}
