// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber facade, generic over what the data callback receives.

use std::borrow::Borrow;
#[cfg(feature = "security")]
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{decode_frame, ErrorCallback, RepresentationMap, SubscriberCore};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::schema::{DataObject, Representation};
use crate::topic::Topic;
use crate::transport::MessageCallback;

/// What a subscriber hands to its data callback for each decoded frame.
pub trait Delivery: Send + Sync + 'static {
    /// Borrowed form passed to the callback.
    type Output: ?Sized;
    /// Owned form produced from a decoded object.
    type Owned: Borrow<Self::Output>;

    const NAME: &'static str;

    fn render(representation: &dyn Representation, object: DataObject) -> Result<Self::Owned>;
}

/// Deliver the decoded [`DataObject`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Objects;

impl Delivery for Objects {
    type Output = DataObject;
    type Owned = DataObject;

    const NAME: &'static str = "ObjectSubscriber";

    fn render(_representation: &dyn Representation, object: DataObject) -> Result<DataObject> {
        Ok(object)
    }
}

/// Deliver the object rendered as text by its schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Delivery for Text {
    type Output = str;
    type Owned = String;

    const NAME: &'static str = "TextSubscriber";

    fn render(representation: &dyn Representation, object: DataObject) -> Result<String> {
        representation
            .to_text(&object)
            .map_err(|_| Error::BrokenPayload)
    }
}

/// Receives topic data from one or more topics.
///
/// Callbacks run on the transport's delivery thread. Use the
/// [`ObjectSubscriber`] and [`TextSubscriber`] aliases.
///
/// # Example
///
/// ```rust,no_run
/// use edgebus::{Context, Endpoint, ObjectSubscriber, Topic};
///
/// let ctx = Context::new();
/// ctx.init_standalone("192.168.0.10", false, "")?;
/// ctx.add_representations(&["robot.json"])?;
/// let topic = Topic::new("/robot/arm", "Robot_0.0.1", false, Endpoint::new("192.168.0.10", 5562));
/// let subscriber = ObjectSubscriber::standalone(
///     &ctx,
///     topic,
///     |topic, object| println!("{}: {}", topic, object),
///     |topic, err| eprintln!("{}: {}", topic, err),
/// )?;
/// subscriber.terminate()?;
/// # Ok::<(), edgebus::Error>(())
/// ```
pub struct Subscriber<D: Delivery> {
    core: SubscriberCore,
    _delivery: PhantomData<D>,
}

/// Subscriber delivering decoded data objects.
pub type ObjectSubscriber = Subscriber<Objects>;

/// Subscriber delivering data objects rendered as text.
pub type TextSubscriber = Subscriber<Text>;

impl<D: Delivery> Subscriber<D> {
    fn with_core(
        context: &Arc<Context>,
        secured: bool,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Self {
        let on_error: ErrorCallback = Arc::new(on_error);
        let core = SubscriberCore::new(context, secured, move |representations: RepresentationMap| {
            let callback: MessageCallback = Arc::new(move |topic: &str, payload: &[u8]| {
                let rendered = decode_frame(&representations, topic, payload)
                    .and_then(|(representation, object)| D::render(representation.as_ref(), object));
                match rendered {
                    Ok(data) => on_data(topic, Borrow::<D::Output>::borrow(&data)),
                    Err(e) => on_error(topic, e),
                }
            });
            callback
        });
        Self {
            core,
            _delivery: PhantomData,
        }
    }

    /// Subscribe to the topics the directory resolves for `topic`.
    ///
    /// With `hierarchical`, every topic below `topic` is included.
    pub fn from_directory(
        context: &Arc<Context>,
        topic: &str,
        hierarchical: bool,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Result<Self> {
        let subscriber = Self::with_core(context, false, on_data, on_error);
        subscriber.core.subscribe_from_directory(topic, hierarchical)?;
        Ok(subscriber)
    }

    /// Subscribe to a topic whose endpoint is already known.
    pub fn standalone(
        context: &Arc<Context>,
        topic: Topic,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::standalone_topics(context, vec![topic], on_data, on_error)
    }

    pub fn standalone_topics(
        context: &Arc<Context>,
        topics: Vec<Topic>,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Result<Self> {
        let subscriber = Self::with_core(context, false, on_data, on_error);
        subscriber.core.store_topics(topics)?;
        Ok(subscriber)
    }

    /// Subscribe to a secured topic with the publisher's public key and this
    /// client's key pair.
    #[cfg(feature = "security")]
    pub fn secured(
        context: &Arc<Context>,
        topic: Topic,
        server_public_key: &str,
        client_public_key: &str,
        client_secret_key: &str,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Result<Self> {
        let subscriber = Self::with_core(context, true, on_data, on_error);
        subscriber.core.store_secured_topics(
            vec![(topic, server_public_key.to_string())],
            client_public_key,
            client_secret_key,
        )?;
        Ok(subscriber)
    }

    /// Subscribe to several secured topics, each mapped to its server public key.
    #[cfg(feature = "security")]
    pub fn secured_topics(
        context: &Arc<Context>,
        topics: HashMap<Topic, String>,
        client_public_key: &str,
        client_secret_key: &str,
        on_data: impl Fn(&str, &D::Output) + Send + Sync + 'static,
        on_error: impl Fn(&str, Error) + Send + Sync + 'static,
    ) -> Result<Self> {
        let subscriber = Self::with_core(context, true, on_data, on_error);
        subscriber.core.store_secured_topics(
            topics.into_iter().collect(),
            client_public_key,
            client_secret_key,
        )?;
        Ok(subscriber)
    }

    pub fn terminate(&self) -> Result<()> {
        self.core.terminate()
    }

    pub fn is_terminated(&self) -> bool {
        self.core.is_terminated()
    }

    /// Topics subscribed so far, in subscription order.
    pub fn topics(&self) -> Vec<Topic> {
        self.core.topics()
    }

    pub fn is_secured(&self) -> bool {
        self.core.is_secured()
    }
}

impl<D: Delivery> Drop for Subscriber<D> {
    fn drop(&mut self) {
        if !self.core.is_terminated() {
            let _ = self.core.terminate();
        }
    }
}

impl<D: Delivery> std::fmt::Debug for Subscriber<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(D::NAME)
            .field("topics", &self.core.topics())
            .field("secured", &self.core.is_secured())
            .field("terminated", &self.core.is_terminated())
            .finish()
    }
}
