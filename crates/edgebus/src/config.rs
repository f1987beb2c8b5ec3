// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration constants and bootstrap settings.
//!
//! Constants are the single source of truth for well-known ports, REST paths
//! and timeouts. [`BootstrapConfig`] carries the subset that deployments (and
//! tests) may need to override at runtime.

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Dynamic port pool
// ============================================================================

/// First local port handed out by the dynamic port pool.
pub const LOCAL_PORT_START: u16 = 4000;

/// Number of ports in the dynamic port pool.
pub const LOCAL_PORT_MAX: u16 = 100;

// ============================================================================
// REST endpoints
// ============================================================================

/// Default node agent base URL used during directory-assisted bootstrap.
pub const NODE_URL: &str = "http://pharos-node:48098";

/// Version prefix shared by node and directory APIs.
pub const API_PREFIX: &str = "/api/v1";

/// Node resource returning the anchor endpoint and node address.
pub const NODE_CONFIG_PATH: &str = "/management/device/configuration";

/// Node resource listing running applications.
pub const NODE_APPS_PATH: &str = "/management/apps";

/// Node resource describing a single application (suffix `/{id}`).
pub const NODE_APP_PATH: &str = "/management/apps/";

/// Anchor resource listing directory nodes (query appended).
pub const ANCHOR_SEARCH_NODE_PATH: &str = "/search/nodes";

/// Directory resource for topic registration, query and deletion.
pub const DIRECTORY_TOPIC_PATH: &str = "/tns/topic";

/// Directory resource receiving keep-alive reports.
pub const DIRECTORY_KEEPALIVE_PATH: &str = "/tns/keepalive";

/// Query string used to look up directory nodes on the anchor.
pub const DIRECTORY_NODE_QUERY: &str = "?imageName=";

/// Well-known port of the topic directory.
pub const DIRECTORY_KNOWN_PORT: u16 = 48323;

/// Well-known port of the reverse proxy fronting the directory.
pub const REVERSE_PROXY_KNOWN_PORT: u16 = 80;

/// Path prefix added when the directory sits behind the reverse proxy.
pub const REVERSE_PROXY_PREFIX: &str = "/tns-server";

/// File holding this container's host name.
pub const HOST_NAME_FILE_PATH: &str = "/etc/hostname";

// ============================================================================
// Timing and security
// ============================================================================

/// Timeout applied to every REST request.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on waiting for the topic handler to acknowledge shutdown.
pub const HANDLER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Topic handler poll period while the keep-alive interval is unknown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Required length of Z85-encoded transport keys.
pub const KEY_LENGTH: usize = 40;

// ============================================================================
// Bootstrap configuration
// ============================================================================

/// Runtime settings for context bootstrap and background services.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Node agent base URL (scheme, host and port).
    pub node_url: String,

    /// File read to obtain this process's host name.
    pub hostname_path: PathBuf,

    /// Directory port used when the reverse proxy is disabled.
    pub directory_port: u16,

    /// Reverse proxy port used when the reverse proxy is enabled.
    pub reverse_proxy_port: u16,

    /// Path prefix added behind the reverse proxy.
    pub reverse_proxy_prefix: String,

    /// REST request timeout.
    pub rest_timeout: Duration,

    /// Bound on the topic handler shutdown handshake.
    pub shutdown_timeout: Duration,

    /// First dynamic port.
    pub port_start: u16,

    /// Number of dynamic ports.
    pub port_count: u16,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            node_url: NODE_URL.to_string(),
            hostname_path: PathBuf::from(HOST_NAME_FILE_PATH),
            directory_port: DIRECTORY_KNOWN_PORT,
            reverse_proxy_port: REVERSE_PROXY_KNOWN_PORT,
            reverse_proxy_prefix: REVERSE_PROXY_PREFIX.to_string(),
            rest_timeout: CONNECTION_TIMEOUT,
            shutdown_timeout: HANDLER_SHUTDOWN_TIMEOUT,
            port_start: LOCAL_PORT_START,
            port_count: LOCAL_PORT_MAX,
        }
    }
}

impl BootstrapConfig {
    /// Defaults overlaid with `EDGEBUS_NODE_URL` and `EDGEBUS_HOSTNAME_FILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("EDGEBUS_NODE_URL") {
            config.node_url = url;
        }
        if let Ok(path) = std::env::var("EDGEBUS_HOSTNAME_FILE") {
            config.hostname_path = PathBuf::from(path);
        }
        config
    }

    /// Builder: set node agent base URL.
    pub fn with_node_url(mut self, url: impl Into<String>) -> Self {
        self.node_url = url.into();
        self
    }

    /// Builder: set host name file path.
    pub fn with_hostname_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hostname_path = path.into();
        self
    }

    /// Builder: set the directory and reverse proxy ports.
    pub fn with_directory_ports(mut self, directory: u16, reverse_proxy: u16) -> Self {
        self.directory_port = directory;
        self.reverse_proxy_port = reverse_proxy;
        self
    }

    /// Builder: set REST request timeout.
    pub fn with_rest_timeout(mut self, timeout: Duration) -> Self {
        self.rest_timeout = timeout;
        self
    }

    /// Builder: set the handler shutdown bound.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Builder: set the dynamic port range.
    pub fn with_port_range(mut self, start: u16, count: u16) -> Self {
        self.port_start = start;
        self.port_count = count;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.node_url.is_empty() {
            return Err("node_url must not be empty");
        }
        if self.rest_timeout.is_zero() {
            return Err("rest_timeout must be > 0");
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0");
        }
        if self.port_count == 0 {
            return Err("port_count must be > 0");
        }
        if u32::from(self.port_start) + u32::from(self.port_count) > u32::from(u16::MAX) + 1 {
            return Err("dynamic port range exceeds 65535");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BootstrapConfig::default();
        assert_eq!(config.node_url, "http://pharos-node:48098");
        assert_eq!(config.directory_port, 48323);
        assert_eq!(config.reverse_proxy_port, 80);
        assert_eq!(config.port_start, 4000);
        assert_eq!(config.port_count, 100);
        assert_eq!(config.rest_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = BootstrapConfig::default()
            .with_node_url("http://localhost:9000")
            .with_hostname_path("/tmp/hostname")
            .with_directory_ports(1000, 1001)
            .with_rest_timeout(Duration::from_secs(2))
            .with_port_range(6000, 4);

        assert_eq!(config.node_url, "http://localhost:9000");
        assert_eq!(config.hostname_path, PathBuf::from("/tmp/hostname"));
        assert_eq!(config.directory_port, 1000);
        assert_eq!(config.reverse_proxy_port, 1001);
        assert_eq!(config.rest_timeout, Duration::from_secs(2));
        assert_eq!((config.port_start, config.port_count), (6000, 4));
    }

    #[test]
    fn test_from_env_overlays_defaults() {
        std::env::set_var("EDGEBUS_NODE_URL", "http://node.local:9100");
        std::env::set_var("EDGEBUS_HOSTNAME_FILE", "/run/edge/hostname");
        let config = BootstrapConfig::from_env();
        std::env::remove_var("EDGEBUS_NODE_URL");
        std::env::remove_var("EDGEBUS_HOSTNAME_FILE");

        assert_eq!(config.node_url, "http://node.local:9100");
        assert_eq!(config.hostname_path, PathBuf::from("/run/edge/hostname"));
        assert_eq!(config.directory_port, 48323);
        assert_eq!(config.port_start, 4000);
        assert!(config.validate().is_ok());

        let defaults = BootstrapConfig::from_env();
        assert_eq!(defaults.node_url, "http://pharos-node:48098");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = BootstrapConfig {
            port_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.port_count = 10;
        config.port_start = 65530;
        assert!(config.validate().is_err());

        config.port_start = 4000;
        config.rest_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
