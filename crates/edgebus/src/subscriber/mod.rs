// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic subscribers.
//!
//! [`SubscriberCore`] resolves topics, caches one representation per topic
//! name and owns the transport subscription. [`Subscriber`] wraps it and is
//! generic over what it hands to the data callback:
//!
//! - [`ObjectSubscriber`]: the decoded [`DataObject`](crate::DataObject).
//! - [`TextSubscriber`]: the object rendered as text by its schema.
//!
//! Frames for unknown topics reach the error callback as `UnknownTopic`;
//! undecodable payloads as `BrokenPayload`.

mod facade;

pub use facade::{Delivery, ObjectSubscriber, Objects, Subscriber, Text, TextSubscriber};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::context::Context;
use crate::discovery::query_directory;
use crate::error::{Error, Result};
use crate::schema::{DataObject, Representation};
use crate::topic::{validate_topic, Topic};
use crate::transport::{MessageCallback, TransportSubscriber};

/// Error callback: `(topic, error)`.
pub type ErrorCallback = Arc<dyn Fn(&str, Error) + Send + Sync>;

/// Topic name -> representation used to decode its frames.
pub(crate) type RepresentationMap = Arc<RwLock<HashMap<String, Arc<dyn Representation>>>>;

/// Decode one frame with the representation cached for its topic.
pub(crate) fn decode_frame(
    representations: &RepresentationMap,
    topic: &str,
    payload: &[u8],
) -> Result<(Arc<dyn Representation>, DataObject)> {
    if topic.is_empty() {
        return Err(Error::UnknownTopic);
    }
    let representation = representations
        .read()
        .get(topic)
        .cloned()
        .ok_or(Error::UnknownTopic)?;
    let object = representation.decode(payload).map_err(|e| {
        log::debug!("[SUBSCRIBER] Undecodable frame on {}: {}", topic, e);
        Error::BrokenPayload
    })?;
    Ok((representation, object))
}

/// Topic resolution and transport subscription shared by subscriber facades.
pub(crate) struct SubscriberCore {
    context: Arc<Context>,
    socket: Mutex<Option<Box<dyn TransportSubscriber>>>,
    topics: Mutex<Vec<Topic>>,
    representations: RepresentationMap,
    on_frame: MessageCallback,
    terminated: AtomicBool,
    secured: bool,
}

impl SubscriberCore {
    /// `make_callback` receives the representation map the frame callback
    /// should decode with.
    pub(crate) fn new(
        context: &Arc<Context>,
        secured: bool,
        make_callback: impl FnOnce(RepresentationMap) -> MessageCallback,
    ) -> Self {
        let representations = RepresentationMap::default();
        let on_frame = make_callback(representations.clone());
        Self {
            context: context.clone(),
            socket: Mutex::new(None),
            topics: Mutex::new(Vec::new()),
            representations,
            on_frame,
            terminated: AtomicBool::new(false),
            secured,
        }
    }

    /// Resolve `topic` through the directory and subscribe to every match.
    pub(crate) fn subscribe_from_directory(&self, topic: &str, hierarchical: bool) -> Result<()> {
        if !self.context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        if !validate_topic(topic) {
            return Err(Error::InvalidTopic);
        }
        if !self.context.is_directory_enabled() {
            log::error!("[SUBSCRIBER] No directory configured");
            return Err(Error::DirectoryNotAvailable);
        }
        let topics = query_directory(&self.context, topic, hierarchical)?;
        self.store_topics(topics)
    }

    /// Subscribe to each topic in order, stopping at the first failure.
    pub(crate) fn store_topics(&self, topics: Vec<Topic>) -> Result<()> {
        if !self.context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        for topic in topics {
            self.cache_representation(&topic)?;
            self.subscribe(&topic)?;
            log::info!("[SUBSCRIBER] Subscribed to {} at {}", topic.name(), topic.endpoint());
            self.topics.lock().push(topic);
        }
        Ok(())
    }

    /// Subscribe to secured topics, each paired with its server public key.
    #[cfg(feature = "security")]
    pub(crate) fn store_secured_topics(
        &self,
        topics: Vec<(Topic, String)>,
        client_public_key: &str,
        client_secret_key: &str,
    ) -> Result<()> {
        if !self.context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        for (topic, server_public_key) in topics {
            if !topic.is_secured() {
                log::error!("[SUBSCRIBER] Topic {} is not secured", topic.name());
                return Err(Error::InvalidParam);
            }
            self.cache_representation(&topic)?;
            self.subscribe_secured(&topic, &server_public_key, client_public_key, client_secret_key)?;
            log::info!("[SUBSCRIBER] Subscribed (secured) to {} at {}", topic.name(), topic.endpoint());
            self.topics.lock().push(topic);
        }
        Ok(())
    }

    fn cache_representation(&self, topic: &Topic) -> Result<()> {
        if !validate_topic(topic.name()) {
            log::error!("[SUBSCRIBER] Invalid topic name {}", topic.name());
            return Err(Error::InvalidTopic);
        }
        let representation = self.context.representation(topic.datamodel())?;
        self.representations
            .write()
            .insert(topic.name().to_string(), representation);
        Ok(())
    }

    fn create_socket(&self, topic: &Topic) -> Result<Box<dyn TransportSubscriber>> {
        self.context
            .transport()
            .create_subscriber(topic.endpoint(), self.on_frame.clone())
            .map_err(|e| {
                log::error!("[SUBSCRIBER] Could not create socket: {}", e);
                Error::UnknownState
            })
    }

    fn subscribe(&self, topic: &Topic) -> Result<()> {
        let mut socket = self.socket.lock();
        if socket.is_none() {
            let created = self.create_socket(topic)?;
            created.start().map_err(|e| {
                log::error!("[SUBSCRIBER] Could not start socket: {}", e);
                Error::UnknownState
            })?;
            *socket = Some(created);
        }
        let socket = socket.as_ref().ok_or(Error::UnknownState)?;
        socket
            .subscribe_with_endpoint(topic.endpoint(), topic.name())
            .map_err(|e| {
                log::error!("[SUBSCRIBER] Subscribe to {} failed: {}", topic.name(), e);
                Error::SessionUnavailable
            })
    }

    #[cfg(feature = "security")]
    fn subscribe_secured(
        &self,
        topic: &Topic,
        server_public_key: &str,
        client_public_key: &str,
        client_secret_key: &str,
    ) -> Result<()> {
        use crate::config::KEY_LENGTH;

        if server_public_key.len() != KEY_LENGTH
            || client_public_key.len() != KEY_LENGTH
            || client_secret_key.len() != KEY_LENGTH
        {
            log::error!("[SUBSCRIBER] Keys must be {} characters", KEY_LENGTH);
            return Err(Error::InvalidParam);
        }

        let mut socket = self.socket.lock();
        let unknown_state = |e: crate::transport::TransportError| {
            log::error!("[SUBSCRIBER] Secured socket setup failed: {}", e);
            Error::UnknownState
        };
        match socket.as_ref() {
            None => {
                let created = self.create_socket(topic)?;
                created
                    .set_server_public_key(server_public_key)
                    .map_err(unknown_state)?;
                created
                    .set_client_keys(client_secret_key, client_public_key)
                    .map_err(unknown_state)?;
                created.start().map_err(unknown_state)?;
                let subscribed = created.subscribe_for_topic(topic.name());
                *socket = Some(created);
                subscribed.map_err(|e| {
                    log::error!("[SUBSCRIBER] Subscribe to {} failed: {}", topic.name(), e);
                    Error::SessionUnavailable
                })
            }
            Some(existing) => {
                existing
                    .set_server_public_key(server_public_key)
                    .map_err(unknown_state)?;
                existing
                    .subscribe_with_endpoint(topic.endpoint(), topic.name())
                    .map_err(|e| {
                        log::error!("[SUBSCRIBER] Subscribe to {} failed: {}", topic.name(), e);
                        Error::SessionUnavailable
                    })
            }
        }
    }

    /// Stop the transport subscription. A second call returns `Terminated`.
    pub(crate) fn terminate(&self) -> Result<()> {
        let socket = self.socket.lock();
        if self.terminated.load(Ordering::Acquire) {
            return Err(Error::Terminated);
        }
        if let Some(socket) = socket.as_ref() {
            socket.stop().map_err(|e| {
                log::error!("[SUBSCRIBER] Could not stop socket: {}", e);
                Error::UnknownState
            })?;
        }
        self.terminated.store(true, Ordering::Release);
        log::info!("[SUBSCRIBER] Terminated");
        Ok(())
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn topics(&self) -> Vec<Topic> {
        self.topics.lock().clone()
    }

    pub(crate) fn is_secured(&self) -> bool {
        self.secured
    }
}
