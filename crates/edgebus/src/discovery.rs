// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic discovery through the topic directory.
//!
//! `GET {directory}/api/v1/tns/topic?name=<topic>&hierarchical=yes|no` returns
//!
//! ```json
//! {"topics": [{"name": "/a", "datamodel": "Robot_0.0.1", "endpoint": "10.0.0.1:4000", "secured": false}]}
//! ```
//!
//! A hierarchical query also returns every topic below the given name.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::{API_PREFIX, DIRECTORY_TOPIC_PATH};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::rest::HTTP_OK;
use crate::topic::{validate_topic, Topic};

#[derive(Deserialize)]
struct TopicList {
    topics: Vec<TopicEntry>,
}

#[derive(Deserialize)]
struct TopicEntry {
    name: String,
    datamodel: String,
    endpoint: String,
    secured: bool,
}

/// Query the directory for `topic`. An empty answer is `NoTopicMatched`.
pub(crate) fn query_directory(context: &Context, topic: &str, hierarchical: bool) -> Result<Vec<Topic>> {
    let url = format!(
        "{}{}{}?name={}&hierarchical={}",
        context.directory_url(),
        API_PREFIX,
        DIRECTORY_TOPIC_PATH,
        topic,
        if hierarchical { "yes" } else { "no" }
    );
    let response = context.rest().get(&url).map_err(|e| {
        log::error!("[DISCOVERY] Query for {} failed: {}", topic, e);
        Error::RestError
    })?;
    if response.status != HTTP_OK {
        log::error!("[DISCOVERY] Query for {} returned status {}", topic, response.status);
        return Err(Error::RestError);
    }

    let list: TopicList = response.json()?;
    let topics = list
        .topics
        .into_iter()
        .map(|entry| {
            let endpoint = Endpoint::parse(&entry.endpoint).map_err(|_| {
                log::error!("[DISCOVERY] Malformed endpoint {}", entry.endpoint);
                Error::RestError
            })?;
            Ok(Topic::new(entry.name, entry.datamodel, entry.secured, endpoint))
        })
        .collect::<Result<Vec<_>>>()?;

    if topics.is_empty() {
        log::debug!("[DISCOVERY] No topic matched {}", topic);
        return Err(Error::NoTopicMatched);
    }
    log::debug!("[DISCOVERY] {} topic(s) matched {}", topics.len(), topic);
    Ok(topics)
}

/// Looks up published topics in the directory.
#[derive(Debug, Clone)]
pub struct TopicDiscovery {
    context: Arc<Context>,
}

impl TopicDiscovery {
    pub fn new(context: &Arc<Context>) -> Result<Self> {
        if !context.is_initialized() {
            return Err(Error::NotInitialized);
        }
        Ok(Self {
            context: context.clone(),
        })
    }

    /// First topic registered under exactly `topic`.
    pub fn query(&self, topic: &str) -> Result<Topic> {
        self.query_internal(topic, false)?
            .into_iter()
            .next()
            .ok_or(Error::NoTopicMatched)
    }

    /// `topic` and every topic below it.
    pub fn hierarchical_query(&self, topic: &str) -> Result<Vec<Topic>> {
        self.query_internal(topic, true)
    }

    fn query_internal(&self, topic: &str, hierarchical: bool) -> Result<Vec<Topic>> {
        if self.context.is_terminated() {
            return Err(Error::Terminated);
        }
        if !self.context.is_directory_enabled() {
            return Err(Error::DirectoryNotAvailable);
        }
        if !validate_topic(topic) {
            return Err(Error::InvalidTopic);
        }
        query_directory(&self.context, topic, hierarchical)
    }
}
