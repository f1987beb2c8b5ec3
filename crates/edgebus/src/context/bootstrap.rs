// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Directory-assisted bootstrap.
//!
//! Sequence:
//!
//! ```text
//! image-name file ──► imageName
//! GET {node}/api/v1/management/device/configuration ──► anchor, node address
//! GET {anchor}/search/nodes?imageName=.. ──► connected directory ip, reverse proxy
//! hostname file ──► container host name
//! GET {node}/api/v1/management/apps ──► running app ids
//! GET {node}/api/v1/management/apps/{id} ──► private -> public ports of this container
//! ```
//!
//! Any HTTP failure, non-200 status or malformed body yields `RestError`;
//! unreadable local files yield `UnknownState`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::{
    BootstrapConfig, ANCHOR_SEARCH_NODE_PATH, API_PREFIX, DIRECTORY_NODE_QUERY, NODE_APPS_PATH,
    NODE_APP_PATH, NODE_CONFIG_PATH,
};
use crate::error::{Error, Result};
use crate::rest::{RestFactory, RestResponse, HTTP_OK};

const NODE_CONNECTED: &str = "connected";
const APP_RUNNING: &str = "running";

/// Everything learned from the node agent and the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectoryInfo {
    pub host_name: String,
    pub host_address: String,
    pub anchor_address: String,
    pub directory_url: String,
    pub reverse_proxy: bool,
    pub port_map: HashMap<u16, u16>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ImageConfig {
    #[serde(rename = "imageName")]
    image_name: String,
}

#[derive(Deserialize)]
struct NodeConfiguration {
    properties: Vec<NodeConfigProperty>,
}

#[derive(Deserialize)]
struct NodeConfigProperty {
    #[serde(rename = "anchorendpoint")]
    anchor_endpoint: Option<String>,
    #[serde(rename = "nodeaddress")]
    node_address: Option<String>,
}

#[derive(Deserialize)]
struct NodeSearch {
    nodes: Vec<DirectoryNode>,
}

#[derive(Deserialize)]
struct DirectoryNode {
    status: String,
    ip: Option<String>,
    config: Option<DirectoryNodeConfig>,
}

#[derive(Deserialize)]
struct DirectoryNodeConfig {
    properties: Vec<DirectoryNodeProperty>,
}

#[derive(Deserialize)]
struct DirectoryNodeProperty {
    #[serde(rename = "reverseproxy")]
    reverse_proxy: Option<ReverseProxy>,
}

#[derive(Deserialize)]
struct ReverseProxy {
    enabled: bool,
}

#[derive(Deserialize)]
struct AppList {
    apps: Vec<AppEntry>,
}

#[derive(Deserialize)]
struct AppEntry {
    id: String,
    state: String,
}

#[derive(Deserialize)]
struct AppInfo {
    services: Vec<ServiceEntry>,
}

#[derive(Deserialize)]
struct ServiceEntry {
    cid: String,
    ports: Option<Vec<PortEntry>>,
}

#[derive(Deserialize)]
struct PortEntry {
    #[serde(rename = "PrivatePort")]
    private_port: u16,
    #[serde(rename = "PublicPort")]
    public_port: u16,
}

// ============================================================================
// Parsing
// ============================================================================

fn expect_ok(response: &RestResponse, what: &str) -> Result<()> {
    if response.status != HTTP_OK {
        log::error!("[BOOTSTRAP] {} returned status {}", what, response.status);
        return Err(Error::RestError);
    }
    log::debug!("[BOOTSTRAP] {} response: {}", what, response.text());
    Ok(())
}

/// Anchor address and node address from the node configuration resource.
fn parse_node_configuration(response: &RestResponse) -> Result<(String, String)> {
    expect_ok(response, "Node configuration")?;
    let config: NodeConfiguration = response.json()?;
    let mut anchor = None;
    let mut node = None;
    for property in config.properties {
        if let Some(a) = property.anchor_endpoint {
            anchor = Some(a);
        }
        if let Some(n) = property.node_address {
            node = Some(n);
        }
    }
    match (anchor, node) {
        (Some(anchor), Some(node)) => Ok((anchor, node)),
        _ => {
            log::error!("[BOOTSTRAP] Anchor endpoint or node address missing");
            Err(Error::RestError)
        }
    }
}

/// Directory base URL and reverse proxy flag from the anchor node search.
fn parse_directory_nodes(
    response: &RestResponse,
    config: &BootstrapConfig,
) -> Result<(String, bool)> {
    expect_ok(response, "Directory node search")?;
    let search: NodeSearch = response.json()?;
    for node in search.nodes {
        if node.status != NODE_CONNECTED {
            log::debug!("[BOOTSTRAP] Skipping directory node in state {}", node.status);
            continue;
        }
        let ip = node.ip.ok_or(Error::RestError)?;
        let node_config = node.config.ok_or(Error::RestError)?;
        let reverse_proxy = node_config
            .properties
            .iter()
            .find_map(|p| p.reverse_proxy.as_ref().map(|r| r.enabled))
            .ok_or_else(|| {
                log::error!("[BOOTSTRAP] Directory node has no reverse proxy property");
                Error::RestError
            })?;
        let url = if reverse_proxy {
            format!(
                "http://{}:{}{}",
                ip, config.reverse_proxy_port, config.reverse_proxy_prefix
            )
        } else {
            format!("http://{}:{}", ip, config.directory_port)
        };
        return Ok((url, reverse_proxy));
    }
    log::error!("[BOOTSTRAP] No connected directory node");
    Err(Error::RestError)
}

fn parse_running_apps(response: &RestResponse) -> Result<Vec<String>> {
    expect_ok(response, "Application list")?;
    let list: AppList = response.json()?;
    Ok(list
        .apps
        .into_iter()
        .filter(|app| app.state == APP_RUNNING)
        .map(|app| app.id)
        .collect())
}

/// Merge this container's port mappings from an application description.
fn parse_app_ports(
    response: &RestResponse,
    host_name: &str,
    port_map: &mut HashMap<u16, u16>,
) -> Result<()> {
    expect_ok(response, "Application info")?;
    let info: AppInfo = response.json()?;
    for service in info.services {
        if !service.cid.starts_with(host_name) {
            continue;
        }
        let ports = service.ports.ok_or_else(|| {
            log::error!("[BOOTSTRAP] Container {} has no port list", service.cid);
            Error::RestError
        })?;
        for port in ports {
            log::debug!(
                "[BOOTSTRAP] Port mapping {} -> {}",
                port.private_port,
                port.public_port
            );
            port_map.insert(port.private_port, port.public_port);
        }
    }
    Ok(())
}

// ============================================================================
// Local files
// ============================================================================

fn read_image_name(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        log::error!("[BOOTSTRAP] Cannot read {}: {}", path.display(), e);
        Error::UnknownState
    })?;
    let config: ImageConfig = serde_json::from_str(&text).map_err(|e| {
        log::error!("[BOOTSTRAP] Malformed image config {}: {}", path.display(), e);
        Error::UnknownState
    })?;
    Ok(config.image_name)
}

fn read_host_name(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        log::error!("[BOOTSTRAP] Cannot read {}: {}", path.display(), e);
        Error::UnknownState
    })?;
    let name = text.trim();
    if name.is_empty() {
        log::error!("[BOOTSTRAP] Empty host name in {}", path.display());
        return Err(Error::UnknownState);
    }
    Ok(name.to_string())
}

// ============================================================================
// Sequence
// ============================================================================

/// Run the full bootstrap sequence.
pub(crate) fn discover(
    rest: &RestFactory,
    config: &BootstrapConfig,
    image_config_path: &Path,
) -> Result<DirectoryInfo> {
    let image_name = read_image_name(image_config_path)?;
    log::debug!("[BOOTSTRAP] Directory image name: {}", image_name);

    let node_api = format!("{}{}", config.node_url, API_PREFIX);
    let response = rest.get(&format!("{}{}", node_api, NODE_CONFIG_PATH))?;
    let (anchor_address, host_address) = parse_node_configuration(&response)?;

    let search_url = format!(
        "{}{}{}{}",
        anchor_address, ANCHOR_SEARCH_NODE_PATH, DIRECTORY_NODE_QUERY, image_name
    );
    let response = rest.get(&search_url)?;
    let (directory_url, reverse_proxy) = parse_directory_nodes(&response, config)?;

    let host_name = read_host_name(&config.hostname_path)?;

    let response = rest.get(&format!("{}{}", node_api, NODE_APPS_PATH))?;
    let app_ids = parse_running_apps(&response)?;

    let mut port_map = HashMap::new();
    for id in &app_ids {
        let response = rest.get(&format!("{}{}{}", node_api, NODE_APP_PATH, id))?;
        parse_app_ports(&response, &host_name, &mut port_map)?;
    }

    log::info!(
        "[BOOTSTRAP] Directory at {} (reverse proxy {}), host {} ({}), {} port mapping(s)",
        directory_url,
        reverse_proxy,
        host_name,
        host_address,
        port_map.len()
    );
    Ok(DirectoryInfo {
        host_name,
        host_address,
        anchor_address,
        directory_url,
        reverse_proxy,
        port_map,
    })
}
