// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network endpoint (`address[:port]`) used by topics and subscriptions.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Address plus optional port.
///
/// An endpoint parsed from text without a `:` carries no port; the directory
/// reports such endpoints for address-only services.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: String,
    port: Option<u16>,
}

impl Endpoint {
    /// Endpoint with both address and port.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port: Some(port),
        }
    }

    /// Endpoint carrying only an address.
    pub fn address_only(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
        }
    }

    /// Parse `"host:port"` or `"host"`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidEndpoint);
        }
        match text.rsplit_once(':') {
            None => Ok(Self::address_only(text)),
            Some((address, port)) => {
                if address.is_empty() {
                    return Err(Error::InvalidEndpoint);
                }
                let port = port.parse::<u16>().map_err(|_| Error::InvalidEndpoint)?;
                Ok(Self::new(address, port))
            }
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Port, or `None` for an address-only endpoint.
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.address, port),
            None => write!(f, "{}", self.address),
        }
    }
}
