// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic publishers.
//!
//! [`PublisherCore`] binds the transport socket, registers the topic with the
//! directory and drives the lifecycle state machine. [`ModelPublisher`] adds
//! schema encoding on top.
//!
//! Directory registration body:
//!
//! ```json
//! {"topic": {"name": "/a", "datamodel": "Robot_0.0.1", "endpoint": "10.0.0.1:4000", "secured": false}}
//! ```
//!
//! The directory answers `201 Created` with `{"ka_interval": <seconds>}`.

mod model;
mod status;

pub use model::{ModelInfo, ModelPublisher};
pub use status::PublisherStatus;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{API_PREFIX, DIRECTORY_TOPIC_PATH};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::rest::{HTTP_CREATED, HTTP_OK};
use crate::topic::{validate_topic, Topic};
use crate::transport::TransportPublisher;

use status::StatusCell;

#[derive(Serialize)]
struct TopicRegistration<'a> {
    topic: TopicRecord<'a>,
}

#[derive(Serialize)]
struct TopicRecord<'a> {
    name: &'a str,
    datamodel: &'a str,
    endpoint: String,
    secured: bool,
}

#[derive(Deserialize)]
struct RegistrationReply {
    ka_interval: i64,
}

#[derive(Default)]
struct CoreInner {
    socket: Option<Arc<dyn TransportPublisher>>,
    topic: Option<Topic>,
    local_port: u16,
    dynamic_port: bool,
}

/// Socket, topic registration and lifecycle shared by publisher facades.
pub(crate) struct PublisherCore {
    context: Arc<Context>,
    status: StatusCell,
    inner: Mutex<CoreInner>,
}

impl PublisherCore {
    pub(crate) fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            status: StatusCell::new(),
            inner: Mutex::new(CoreInner::default()),
        }
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub(crate) fn status(&self) -> PublisherStatus {
        self.status.load()
    }

    pub(crate) fn local_port(&self) -> u16 {
        self.inner.lock().local_port
    }

    pub(crate) fn topic(&self) -> Option<Topic> {
        self.inner.lock().topic.clone()
    }

    /// Bind and start the transport socket.
    ///
    /// Standalone contexts bind `optional_port`; directory-assisted contexts
    /// draw a port from the dynamic pool. A claimed dynamic port is returned
    /// to the pool when the socket cannot be started.
    pub(crate) fn initialize(&self, optional_port: u16, server_private_key: Option<&str>) -> Result<()> {
        if !self.context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        if !self.status.begin_init() {
            log::error!("[PUBLISHER] Initialize called in state {:?}", self.status.load());
            return Err(Error::UnknownState);
        }

        let dynamic = !self.context.is_standalone();
        let port = if dynamic {
            match self.context.assign_dynamic_port() {
                Ok(port) => port,
                Err(e) => {
                    self.status.abort_init();
                    return Err(e);
                }
            }
        } else {
            optional_port
        };

        match self.open_socket(port, server_private_key) {
            Ok(socket) => {
                *self.inner.lock() = CoreInner {
                    socket: Some(socket),
                    topic: None,
                    local_port: port,
                    dynamic_port: dynamic,
                };
                self.status.finish_init();
                log::debug!("[PUBLISHER] Socket started on port {}", port);
                Ok(())
            }
            Err(e) => {
                if dynamic {
                    if let Err(re) = self.context.release_dynamic_port(port) {
                        log::error!("[PUBLISHER] Could not release port {}: {}", port, re);
                    }
                }
                self.status.abort_init();
                Err(e)
            }
        }
    }

    fn open_socket(&self, port: u16, server_private_key: Option<&str>) -> Result<Arc<dyn TransportPublisher>> {
        let socket: Arc<dyn TransportPublisher> = self
            .context
            .transport()
            .create_publisher(port)
            .map_err(|e| {
                log::error!("[PUBLISHER] Could not create socket on port {}: {}", port, e);
                Error::UnknownState
            })?
            .into();
        if let Some(key) = server_private_key {
            socket.set_server_private_key(key).map_err(|e| {
                log::error!("[PUBLISHER] Rejected server key: {}", e);
                Error::InvalidParam
            })?;
        }
        socket.start().map_err(|e| {
            log::error!("[PUBLISHER] Could not start socket on port {}: {}", port, e);
            Error::UnknownState
        })?;
        if self.context.is_directory_enabled() {
            if let Err(e) = self.context.ensure_topic_handler() {
                let _ = socket.stop();
                return Err(e);
            }
        }
        Ok(socket)
    }

    /// Record the topic and, with a directory, register it and report it alive.
    pub(crate) fn register_topic(&self, topic: Topic) -> Result<()> {
        if !validate_topic(topic.name()) {
            log::error!("[PUBLISHER] Invalid topic name {}", topic.name());
            return Err(Error::InvalidTopic);
        }
        self.inner.lock().topic = Some(topic.clone());
        if !self.context.is_directory_enabled() {
            return Ok(());
        }

        let body = serde_json::to_vec(&TopicRegistration {
            topic: TopicRecord {
                name: topic.name(),
                datamodel: topic.datamodel(),
                endpoint: topic.endpoint().to_string(),
                secured: topic.is_secured(),
            },
        })
        .map_err(|_| Error::RestError)?;
        let url = format!("{}{}{}", self.context.directory_url(), API_PREFIX, DIRECTORY_TOPIC_PATH);
        let response = self.context.rest().post(&url, &body).map_err(|e| {
            log::error!("[PUBLISHER] Topic registration request failed: {}", e);
            Error::RestError
        })?;
        if response.status != HTTP_CREATED {
            log::error!("[PUBLISHER] Topic registration returned status {}", response.status);
            return Err(Error::RestError);
        }
        let reply: RegistrationReply = response.json()?;
        if reply.ka_interval < 1 {
            log::error!("[PUBLISHER] Invalid keep-alive interval {}", reply.ka_interval);
            return Err(Error::RestError);
        }

        let handler = self.context.topic_handler();
        if handler.update_keep_alive_interval(reply.ka_interval) {
            log::info!("[PUBLISHER] Keep-alive interval set to {}s", reply.ka_interval);
        }
        handler.register_topic(topic.name())?;
        if !handler.is_keep_alive_started() {
            handler.arm_keep_alive()?;
        }
        log::info!("[PUBLISHER] Registered {} at {}", topic.name(), topic.endpoint());
        Ok(())
    }

    /// Delete the directory record, then drop the topic from the keep-alive
    /// list. The list is updated even when the DELETE fails.
    fn unregister_topic(&self, topic: &Topic) -> Result<()> {
        let url = format!(
            "{}{}{}?name={}",
            self.context.directory_url(),
            API_PREFIX,
            DIRECTORY_TOPIC_PATH,
            topic.name()
        );
        match self.context.rest().delete(&url, &[]) {
            Ok(response) if response.status == HTTP_OK => {}
            Ok(response) => {
                log::error!("[PUBLISHER] Topic deletion returned status {}", response.status);
            }
            Err(e) => log::error!("[PUBLISHER] Topic deletion request failed: {}", e),
        }
        self.context.topic_handler().unregister_topic(topic.name())
    }

    pub(crate) fn publish(&self, payload: &[u8]) -> Result<()> {
        let (socket, name) = {
            let inner = self.inner.lock();
            match (&inner.socket, &inner.topic) {
                (Some(socket), Some(topic)) => (socket.clone(), topic.name().to_string()),
                _ => return Err(Error::UnknownState),
            }
        };
        socket.publish_on_topic(&name, payload).map_err(|e| {
            log::error!("[PUBLISHER] Publish on {} failed: {}", name, e);
            Error::UnknownState
        })
    }

    /// Release the port, unregister from the directory and stop the socket.
    ///
    /// Port release and unregistration failures are logged only. A socket
    /// that fails to stop leaves the publisher initialized.
    pub(crate) fn terminate(&self) -> Result<()> {
        if !self.status.begin_terminate() {
            log::error!("[PUBLISHER] Terminate called in state {:?}", self.status.load());
            return Err(Error::UnknownState);
        }
        let (socket, topic, port, dynamic) = {
            let inner = self.inner.lock();
            (
                inner.socket.clone(),
                inner.topic.clone(),
                inner.local_port,
                inner.dynamic_port,
            )
        };

        if dynamic {
            if let Err(e) = self.context.release_dynamic_port(port) {
                log::error!("[PUBLISHER] Could not release port {}: {}", port, e);
            }
        }
        if self.context.is_directory_enabled() {
            if let Some(topic) = &topic {
                if let Err(e) = self.unregister_topic(topic) {
                    log::warn!("[PUBLISHER] Could not unregister {}: {}", topic.name(), e);
                }
            }
        }
        if let Some(socket) = socket {
            if let Err(e) = socket.stop() {
                log::error!("[PUBLISHER] Could not stop socket: {}", e);
                self.status.rollback_terminate();
                return Err(Error::UnknownState);
            }
        }

        self.inner.lock().socket = None;
        self.status.finish_terminate();
        log::info!("[PUBLISHER] Terminated");
        Ok(())
    }

    /// Undo a successful `initialize` after a failed registration.
    pub(crate) fn abort(&self) {
        if !self.status.begin_terminate() {
            return;
        }
        let inner = std::mem::take(&mut *self.inner.lock());
        if let Some(socket) = inner.socket {
            let _ = socket.stop();
        }
        if inner.dynamic_port {
            let _ = self.context.release_dynamic_port(inner.local_port);
        }
        self.status.finish_terminate();
    }
}
