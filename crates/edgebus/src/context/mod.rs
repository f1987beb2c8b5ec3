// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime context shared by publishers, subscribers and topic discovery.
//!
//! A [`Context`] is initialized once in one of two modes:
//!
//! - **Standalone**: the caller supplies the host address and, optionally, a
//!   directory address. Publishers bind caller-chosen ports.
//! - **Directory-assisted**: the context asks the local node agent for its
//!   anchor, finds the connected topic directory and learns this container's
//!   private to public port mappings. Publishers draw local ports from the
//!   dynamic pool.
//!
//! The context owns the transport runtime, the schema representation cache,
//! the dynamic port pool and the [`TopicHandler`].
//!
//! # Example
//!
//! ```rust,no_run
//! use edgebus::Context;
//!
//! let ctx = Context::new();
//! ctx.init_standalone("192.168.0.10", false, "")?;
//! let ids = ctx.add_representations(&["robot.json"])?;
//! assert_eq!(ids.len(), 1);
//! ctx.terminate()?;
//! # Ok::<(), edgebus::Error>(())
//! ```

mod bootstrap;
mod ports;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::BootstrapConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::handler::TopicHandler;
use crate::rest::{HttpClientFactory, RestClientFactory, RestFactory};
use crate::schema::{ModelLoader, Representation, RepresentationLoader};
use crate::transport::{LoopbackTransport, Transport};

use ports::DynamicPortPool;

/// Host name recorded in standalone mode.
const LOCAL_HOST: &str = "localhost";

/// How the context was initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    StandAlone,
    DirectoryAssisted,
}

#[derive(Debug, Clone, Default)]
struct Identity {
    mode: Option<Mode>,
    host_name: String,
    host_address: String,
    anchor_address: String,
    directory_url: String,
    directory_enabled: bool,
}

struct Resources {
    ports: DynamicPortPool,
    port_map: HashMap<u16, u16>,
    representations: HashMap<String, Arc<dyn Representation>>,
}

impl Resources {
    fn new(config: &BootstrapConfig) -> Self {
        Self {
            ports: DynamicPortPool::new(config.port_start, config.port_count),
            port_map: HashMap::new(),
            representations: HashMap::new(),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Context`] with injectable collaborators.
pub struct ContextBuilder {
    rest_factory: Arc<dyn RestClientFactory>,
    transport: Arc<dyn Transport>,
    loader: Arc<dyn RepresentationLoader>,
    bootstrap: BootstrapConfig,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            rest_factory: Arc::new(HttpClientFactory),
            transport: Arc::new(LoopbackTransport::new()),
            loader: Arc::new(ModelLoader),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl ContextBuilder {
    pub fn rest_factory(mut self, factory: Arc<dyn RestClientFactory>) -> Self {
        self.rest_factory = factory;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn representation_loader(mut self, loader: Arc<dyn RepresentationLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn bootstrap(mut self, config: BootstrapConfig) -> Self {
        self.bootstrap = config;
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when the bootstrap settings fail validation.
    pub fn build(self) -> Result<Arc<Context>> {
        if let Err(reason) = self.bootstrap.validate() {
            log::error!("[CONTEXT] Invalid bootstrap config: {}", reason);
            return Err(Error::InvalidParam);
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> Arc<Context> {
        let bootstrap = self.bootstrap;
        let rest = Arc::new(RestFactory::new(self.rest_factory, bootstrap.rest_timeout));
        let handler = TopicHandler::new(rest.clone(), bootstrap.shutdown_timeout);
        Arc::new(Context {
            initialized: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            reverse_proxy: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            identity: RwLock::new(Identity::default()),
            resources: Mutex::new(Resources::new(&bootstrap)),
            rest,
            transport: self.transport,
            loader: self.loader,
            handler,
            bootstrap,
        })
    }
}

// ============================================================================
// Context
// ============================================================================

/// Process-level runtime state. Share it as `Arc<Context>`.
pub struct Context {
    initialized: AtomicBool,
    terminated: AtomicBool,
    reverse_proxy: AtomicBool,
    /// Serializes init and terminate.
    lifecycle: Mutex<()>,
    identity: RwLock<Identity>,
    resources: Mutex<Resources>,
    rest: Arc<RestFactory>,
    transport: Arc<dyn Transport>,
    loader: Arc<dyn RepresentationLoader>,
    handler: TopicHandler,
    bootstrap: BootstrapConfig,
}

impl Context {
    /// Context with the default HTTP client, loopback transport and model loader.
    pub fn new() -> Arc<Self> {
        Self::builder().assemble()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Initialize in standalone mode.
    ///
    /// With `use_directory`, `directory_address` is the directory base URL;
    /// `http://` is prepended when no scheme is given.
    pub fn init_standalone(
        &self,
        host_address: &str,
        use_directory: bool,
        directory_address: &str,
    ) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        if use_directory && directory_address.is_empty() {
            log::error!("[CONTEXT] Directory requested without an address");
            return Err(Error::InvalidParam);
        }
        self.start_transport()?;

        let directory_url = if !use_directory {
            String::new()
        } else if directory_address.contains("://") {
            directory_address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", directory_address.trim_end_matches('/'))
        };

        *self.identity.write() = Identity {
            mode: Some(Mode::StandAlone),
            host_name: LOCAL_HOST.to_string(),
            host_address: host_address.to_string(),
            anchor_address: String::new(),
            directory_url,
            directory_enabled: use_directory,
        };
        *self.resources.lock() = Resources::new(&self.bootstrap);
        self.terminated.store(false, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
        log::info!(
            "[CONTEXT] Initialized standalone at {} (directory {})",
            host_address,
            if use_directory { directory_address } else { "disabled" }
        );
        Ok(())
    }

    /// Initialize in directory-assisted mode.
    ///
    /// `image_config_path` is a JSON file `{"imageName": "..."}` naming the
    /// directory image to look up on the anchor.
    pub fn init_directory_assisted(&self, image_config_path: impl AsRef<Path>) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        self.start_transport()?;

        let info = match bootstrap::discover(&self.rest, &self.bootstrap, image_config_path.as_ref())
        {
            Ok(info) => info,
            Err(e) => {
                log::error!("[CONTEXT] Directory-assisted bootstrap failed: {}", e);
                if let Err(te) = self.transport.terminate() {
                    log::warn!("[CONTEXT] Transport shutdown failed: {}", te);
                }
                return Err(e);
            }
        };

        *self.identity.write() = Identity {
            mode: Some(Mode::DirectoryAssisted),
            host_name: info.host_name,
            host_address: info.host_address,
            anchor_address: info.anchor_address,
            directory_url: info.directory_url,
            directory_enabled: true,
        };
        let mut resources = Resources::new(&self.bootstrap);
        resources.port_map = info.port_map;
        *self.resources.lock() = resources;
        self.reverse_proxy.store(info.reverse_proxy, Ordering::Release);
        self.terminated.store(false, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
        log::info!("[CONTEXT] Initialized in directory-assisted mode");
        Ok(())
    }

    fn start_transport(&self) -> Result<()> {
        self.transport.initialize().map_err(|e| {
            log::error!("[CONTEXT] Transport initialization failed: {}", e);
            Error::UnknownState
        })
    }

    /// Stop the topic handler, clear every cache and stop the transport.
    pub fn terminate(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_initialized() {
            return Err(if self.is_terminated() {
                Error::Terminated
            } else {
                Error::NotInitialized
            });
        }

        self.handler.terminate();
        *self.resources.lock() = Resources::new(&self.bootstrap);
        *self.identity.write() = Identity::default();
        self.reverse_proxy.store(false, Ordering::Release);
        if let Err(e) = self.transport.terminate() {
            log::warn!("[CONTEXT] Transport shutdown failed: {}", e);
        }
        self.terminated.store(true, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        log::info!("[CONTEXT] Terminated");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------------

    /// Claim a local port from the dynamic pool.
    pub fn assign_dynamic_port(&self) -> Result<u16> {
        let port = self.resources.lock().ports.assign()?;
        log::debug!("[CONTEXT] Assigned dynamic port {}", port);
        Ok(port)
    }

    /// Return a port claimed with [`assign_dynamic_port`](Self::assign_dynamic_port).
    pub fn release_dynamic_port(&self, port: u16) -> Result<()> {
        self.resources.lock().ports.release(port)?;
        log::debug!("[CONTEXT] Released dynamic port {}", port);
        Ok(())
    }

    /// Externally reachable endpoint for a local port.
    ///
    /// Standalone mode uses the host address and the port unchanged;
    /// directory-assisted mode maps the port through the container mappings.
    pub fn host_endpoint(&self, local_port: u16) -> Result<Endpoint> {
        let identity = self.identity.read();
        match identity.mode {
            Some(Mode::StandAlone) => Ok(Endpoint::new(identity.host_address.clone(), local_port)),
            Some(Mode::DirectoryAssisted) => {
                let public = self
                    .resources
                    .lock()
                    .port_map
                    .get(&local_port)
                    .copied()
                    .ok_or_else(|| {
                        log::error!("[CONTEXT] No public mapping for local port {}", local_port);
                        Error::UnknownState
                    })?;
                Ok(Endpoint::new(identity.host_address.clone(), public))
            }
            None => Err(Error::NotInitialized),
        }
    }

    // ------------------------------------------------------------------------
    // Schema representations
    // ------------------------------------------------------------------------

    /// Load schema files and cache their representations.
    ///
    /// Returns the ids in input order. A schema id already cached keeps its
    /// first representation. On a load failure the files before it stay cached.
    pub fn add_representations<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<String>> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let mut resources = self.resources.lock();
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let representation = self.loader.load(path).map_err(|e| {
                log::error!("[CONTEXT] Cannot load {}: {}", path.display(), e);
                Error::InvalidModel
            })?;
            let id = representation.id().to_string();
            if id.is_empty() {
                return Err(Error::InvalidParam);
            }
            resources
                .representations
                .entry(id.clone())
                .or_insert(representation);
            log::debug!("[CONTEXT] Cached representation {}", id);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Cached representation for a schema id.
    pub fn representation(&self, id: &str) -> Result<Arc<dyn Representation>> {
        self.resources
            .lock()
            .representations
            .get(id)
            .cloned()
            .ok_or_else(|| {
                log::error!("[CONTEXT] Unknown data model {}", id);
                Error::UnknownModel
            })
    }

    /// Ids of all cached representations.
    pub fn cached_model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .resources
            .lock()
            .representations
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> Option<Mode> {
        self.identity.read().mode
    }

    pub fn is_standalone(&self) -> bool {
        self.mode() == Some(Mode::StandAlone)
    }

    pub fn is_directory_enabled(&self) -> bool {
        self.identity.read().directory_enabled
    }

    pub fn is_reverse_proxy_enabled(&self) -> bool {
        self.reverse_proxy.load(Ordering::Acquire)
    }

    pub fn host_name(&self) -> String {
        self.identity.read().host_name.clone()
    }

    pub fn host_address(&self) -> String {
        self.identity.read().host_address.clone()
    }

    pub fn anchor_address(&self) -> String {
        self.identity.read().anchor_address.clone()
    }

    /// Directory base URL (scheme, host, port and optional proxy prefix).
    pub fn directory_url(&self) -> String {
        self.identity.read().directory_url.clone()
    }

    pub fn rest(&self) -> &RestFactory {
        &self.rest
    }

    pub fn topic_handler(&self) -> &TopicHandler {
        &self.handler
    }

    pub fn bootstrap_config(&self) -> &BootstrapConfig {
        &self.bootstrap
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Start the topic handler against the current directory.
    pub(crate) fn ensure_topic_handler(&self) -> Result<()> {
        let url = self.directory_url();
        if url.is_empty() {
            return Err(Error::DirectoryNotAvailable);
        }
        self.handler.init(&url)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("initialized", &self.is_initialized())
            .field("terminated", &self.is_terminated())
            .field("identity", &*self.identity.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_invalid_bootstrap() {
        let empty_range = BootstrapConfig::default().with_port_range(6000, 0);
        assert_eq!(
            Context::builder().bootstrap(empty_range).build().err(),
            Some(Error::InvalidParam)
        );
        let overflow = BootstrapConfig::default().with_port_range(65000, 1000);
        assert!(Context::builder().bootstrap(overflow).build().is_err());

        let ctx = Context::builder()
            .bootstrap(BootstrapConfig::default().with_port_range(6000, 2))
            .build()
            .expect("valid range");
        ctx.init_standalone("10.0.0.1", false, "").expect("init");
        assert_eq!(ctx.assign_dynamic_port(), Ok(6000));
        assert_eq!(ctx.assign_dynamic_port(), Ok(6001));
        assert!(ctx.assign_dynamic_port().is_err());
    }

    #[test]
    fn test_standalone_lifecycle() {
        let ctx = Context::new();
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.terminate(), Err(Error::NotInitialized));

        ctx.init_standalone("10.0.0.1", false, "").expect("init");
        assert!(ctx.is_standalone());
        assert!(!ctx.is_directory_enabled());
        assert_eq!(ctx.host_name(), "localhost");
        assert_eq!(
            ctx.init_standalone("10.0.0.1", false, ""),
            Err(Error::AlreadyInitialized)
        );

        ctx.terminate().expect("terminate");
        assert!(ctx.is_terminated());
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.mode(), None);
        assert_eq!(ctx.terminate(), Err(Error::Terminated));

        ctx.init_standalone("10.0.0.2", false, "").expect("re-init");
        assert!(!ctx.is_terminated());
    }

    #[test]
    fn test_standalone_directory_url() {
        let ctx = Context::new();
        assert_eq!(ctx.init_standalone("h", true, ""), Err(Error::InvalidParam));
        ctx.init_standalone("h", true, "dir:48323").expect("init");
        assert!(ctx.is_directory_enabled());
        assert_eq!(ctx.directory_url(), "http://dir:48323");
    }

    #[test]
    fn test_host_endpoint_standalone() {
        let ctx = Context::new();
        assert_eq!(ctx.host_endpoint(5000), Err(Error::NotInitialized));
        ctx.init_standalone("192.168.1.5", false, "").expect("init");
        assert_eq!(
            ctx.host_endpoint(5000),
            Ok(Endpoint::new("192.168.1.5", 5000))
        );
    }

    #[test]
    fn test_port_pool_reset_on_terminate() {
        let ctx = Context::new();
        ctx.init_standalone("h", false, "").expect("init");
        assert_eq!(ctx.assign_dynamic_port(), Ok(4000));
        assert_eq!(ctx.assign_dynamic_port(), Ok(4001));
        ctx.terminate().expect("terminate");
        ctx.init_standalone("h", false, "").expect("init");
        assert_eq!(ctx.assign_dynamic_port(), Ok(4000));
        assert_eq!(ctx.release_dynamic_port(4001), Err(Error::ReleaseWrongPort));
    }

    #[test]
    fn test_representations_require_init() {
        let ctx = Context::new();
        assert_eq!(
            ctx.add_representations(&["robot.json"]),
            Err(Error::NotInitialized)
        );
        ctx.init_standalone("h", false, "").expect("init");
        assert_eq!(
            ctx.add_representations(&["/nonexistent/robot.json"]),
            Err(Error::InvalidModel)
        );
        assert!(matches!(ctx.representation("Robot_0.0.1"), Err(Error::UnknownModel)));
    }
}
