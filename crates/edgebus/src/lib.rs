// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # edgebus - topic-based publish/subscribe for edge nodes
//!
//! Publishers send schema-encoded data objects on named topics; subscribers
//! decode them with the same schema. Topics are either wired up by hand
//! (standalone) or registered with and looked up in a topic directory service
//! (directory-assisted).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgebus::{Context, Endpoint, ModelInfo, ModelPublisher, ObjectSubscriber, Result, Topic};
//!
//! fn main() -> Result<()> {
//!     let ctx = Context::new();
//!     ctx.init_standalone("127.0.0.1", false, "")?;
//!
//!     let publisher = ModelPublisher::new(
//!         &ctx,
//!         "/factory/line1/temperature",
//!         ModelInfo::FilePath("sensor.json".into()),
//!         5562,
//!     )?;
//!
//!     let topic = Topic::new(
//!         "/factory/line1/temperature",
//!         publisher.model_id(),
//!         false,
//!         Endpoint::new("127.0.0.1", 5562),
//!     );
//!     let _subscriber = ObjectSubscriber::standalone(
//!         &ctx,
//!         topic,
//!         |topic, object| println!("{} -> {}", topic, object),
//!         |topic, err| eprintln!("{} -> {}", topic, err),
//!     )?;
//!
//!     publisher.publish(&serde_json::json!({ "celsius": 21.5 }))?;
//!     ctx.terminate()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |  ModelPublisher | ObjectSubscriber | TextSubscriber | Discovery   |
//! +-------------------------------------------------------------------+
//! |  Context: mode, port pool, schema cache | TopicHandler (keep-alive)|
//! +-------------------------------------------------------------------+
//! |  Transport (loopback)  |  RestFactory (reqwest)  |  Schema loader  |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`context`] - Runtime context, bootstrap and dynamic ports
//! - [`publisher`] / [`subscriber`] - Data plane facades
//! - [`discovery`] - Directory topic queries
//! - [`handler`] - Background keep-alive actor
//! - [`rest`] - Swappable REST client
//! - [`transport`] - Message transport seam
//! - [`schema`] - Data object representations

/// Bootstrap constants and configuration.
pub mod config;
/// Runtime context (standalone or directory-assisted).
pub mod context;
/// Topic lookup through the directory.
pub mod discovery;
/// Address plus optional port.
pub mod endpoint;
/// Error codes.
pub mod error;
/// Background topic keep-alive loop.
pub mod handler;
/// Topic publishers.
pub mod publisher;
/// REST client seam and HTTP implementation.
pub mod rest;
/// Schema representations for data objects.
pub mod schema;
/// Topic subscribers.
pub mod subscriber;
/// Topic descriptor and name validation.
pub mod topic;
/// Message transport seam.
pub mod transport;

pub use config::BootstrapConfig;
pub use context::{Context, ContextBuilder, Mode};
pub use discovery::TopicDiscovery;
pub use endpoint::Endpoint;
pub use error::{Error, Result, OK};
pub use handler::TopicHandler;
pub use publisher::{ModelInfo, ModelPublisher, PublisherStatus};
pub use rest::{HttpClientFactory, RestClient, RestClientFactory, RestFactory, RestResponse};
pub use schema::{DataObject, ModelLoader, ModelRepresentation, Representation, RepresentationLoader};
pub use subscriber::{ObjectSubscriber, Subscriber, TextSubscriber};
pub use topic::{validate_topic, Topic};
pub use transport::{LoopbackTransport, Transport};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
