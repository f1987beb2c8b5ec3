// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher of schema-encoded data objects.

use std::path::PathBuf;
use std::sync::Arc;

use super::{PublisherCore, PublisherStatus};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::schema::{DataObject, Representation};
use crate::topic::{validate_topic, Topic};

/// How a publisher names its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelInfo {
    /// Id of a representation already cached in the context.
    Id(String),
    /// Schema file to load and cache.
    FilePath(PathBuf),
}

/// Publishes [`DataObject`]s encoded with one schema on one topic.
///
/// # Example
///
/// ```rust,no_run
/// use edgebus::{Context, ModelInfo, ModelPublisher};
///
/// let ctx = Context::new();
/// ctx.init_standalone("192.168.0.10", false, "")?;
/// let publisher = ModelPublisher::new(
///     &ctx,
///     "/robot/arm",
///     ModelInfo::FilePath("robot.json".into()),
///     5562,
/// )?;
/// publisher.publish(&serde_json::json!({ "temperature": 21.5 }))?;
/// publisher.terminate()?;
/// # Ok::<(), edgebus::Error>(())
/// ```
pub struct ModelPublisher {
    core: PublisherCore,
    representation: Arc<dyn Representation>,
    secured: bool,
}

impl ModelPublisher {
    /// Create a publisher on `topic`.
    ///
    /// `optional_port` is the bound port in standalone mode and ignored in
    /// directory-assisted mode.
    pub fn new(
        context: &Arc<Context>,
        topic: &str,
        model: ModelInfo,
        optional_port: u16,
    ) -> Result<Self> {
        Self::create(context, topic, model, optional_port, None)
    }

    /// Create a secured publisher using the server's Z85 secret key.
    #[cfg(feature = "security")]
    pub fn new_secured(
        context: &Arc<Context>,
        topic: &str,
        server_private_key: &str,
        model: ModelInfo,
        optional_port: u16,
    ) -> Result<Self> {
        if server_private_key.len() != crate::config::KEY_LENGTH {
            log::error!("[PUBLISHER] Server key must be {} characters", crate::config::KEY_LENGTH);
            return Err(Error::InvalidParam);
        }
        Self::create(context, topic, model, optional_port, Some(server_private_key))
    }

    fn create(
        context: &Arc<Context>,
        topic: &str,
        model: ModelInfo,
        optional_port: u16,
        server_private_key: Option<&str>,
    ) -> Result<Self> {
        if !context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        if !validate_topic(topic) {
            log::error!("[PUBLISHER] Invalid topic name {}", topic);
            return Err(Error::InvalidTopic);
        }

        let core = PublisherCore::new(context.clone());
        core.initialize(optional_port, server_private_key)?;
        let secured = server_private_key.is_some();
        match Self::register(&core, topic, &model, secured) {
            Ok(representation) => Ok(Self {
                core,
                representation,
                secured,
            }),
            Err(e) => {
                log::error!("[PUBLISHER] Registration of {} failed: {}", topic, e);
                core.abort();
                Err(e)
            }
        }
    }

    fn register(
        core: &PublisherCore,
        topic: &str,
        model: &ModelInfo,
        secured: bool,
    ) -> Result<Arc<dyn Representation>> {
        let context = core.context();
        let representation = match model {
            ModelInfo::Id(id) => context.representation(id)?,
            ModelInfo::FilePath(path) => {
                let ids = context.add_representations(std::slice::from_ref(path))?;
                let id = ids.first().ok_or(Error::UnknownState)?;
                context.representation(id)?
            }
        };
        let endpoint = context
            .host_endpoint(core.local_port())
            .map_err(|_| Error::UnknownState)?;
        core.register_topic(Topic::new(topic, representation.id(), secured, endpoint))?;
        Ok(representation)
    }

    /// Encode and send one object.
    ///
    /// A terminated context terminates this publisher and yields `Terminated`.
    /// A publisher without a live socket yields `UnknownState`.
    pub fn publish(&self, object: &DataObject) -> Result<()> {
        if self.core.context().is_terminated() {
            log::error!("[PUBLISHER] Context terminated, stopping publisher");
            let _ = self.core.terminate();
            return Err(Error::Terminated);
        }
        let bytes = self.representation.encode(object).map_err(|e| {
            log::error!("[PUBLISHER] Encoding failed: {}", e);
            Error::UnknownState
        })?;
        self.core.publish(&bytes)
    }

    pub fn terminate(&self) -> Result<()> {
        self.core.terminate()
    }

    pub fn is_terminated(&self) -> bool {
        self.core.status() == PublisherStatus::Created
    }

    pub fn status(&self) -> PublisherStatus {
        self.core.status()
    }

    /// Topic as registered, including its advertised endpoint.
    pub fn topic(&self) -> Option<Topic> {
        self.core.topic()
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    /// Schema id used for encoding.
    pub fn model_id(&self) -> &str {
        self.representation.id()
    }
}

impl Drop for ModelPublisher {
    fn drop(&mut self) {
        if self.core.status() == PublisherStatus::Initialized {
            let _ = self.core.terminate();
        }
    }
}

impl std::fmt::Debug for ModelPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPublisher")
            .field("topic", &self.core.topic())
            .field("model", &self.representation.id())
            .field("secured", &self.secured)
            .field("status", &self.core.status())
            .finish()
    }
}
