// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic descriptor and topic-name grammar.
//!
//! A valid topic name starts with `/`, contains at least one more character
//! from `[A-Za-z0-9-_./]`, never contains `//` and never ends with `/`.

use std::sync::OnceLock;

use regex::Regex;

use crate::endpoint::Endpoint;

/// Published topic: name, schema id, endpoint and security flag.
///
/// Usable as a map key (secured subscribers map topics to server keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    name: String,
    datamodel: String,
    endpoint: Endpoint,
    secured: bool,
}

impl Topic {
    pub fn new(
        name: impl Into<String>,
        datamodel: impl Into<String>,
        secured: bool,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            name: name.into(),
            datamodel: datamodel.into(),
            endpoint,
            secured,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema (data model) id carried by this topic.
    pub fn datamodel(&self) -> &str {
        &self.datamodel
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }
}

const TOPIC_PATTERN: &str = r"^/[a-zA-Z0-9_./-]+$";

fn topic_regex() -> Option<&'static Regex> {
    static TOPIC_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    TOPIC_REGEX
        .get_or_init(|| Regex::new(TOPIC_PATTERN).ok())
        .as_ref()
}

/// Check a topic name against the topic grammar.
pub fn validate_topic(name: &str) -> bool {
    if name.contains("//") || name.ends_with('/') {
        return false;
    }
    topic_regex().is_some_and(|re| re.is_match(name))
}
