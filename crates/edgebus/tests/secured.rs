// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![cfg(feature = "security")]
#![allow(clippy::uninlined_format_args)] // Test readability

//! Secured publishers and subscribers.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use edgebus::{Context, Endpoint, Error, ModelInfo, ModelPublisher, ObjectSubscriber, Topic};
use serde_json::json;

use common::{robot_model, KEY, ROBOT_ID};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

fn context() -> Arc<Context> {
    let ctx = Context::new();
    ctx.init_standalone("127.0.0.1", false, "").expect("init");
    ctx
}

fn secured_topic(name: &str, port: u16) -> Topic {
    Topic::new(name, ROBOT_ID, true, Endpoint::new("127.0.0.1", port))
}

#[test]
fn test_secured_roundtrip() {
    let ctx = context();
    let (_dir, model) = robot_model();
    let publisher =
        ModelPublisher::new_secured(&ctx, "/vault/door", KEY, ModelInfo::FilePath(model), 5580)
            .expect("secured publisher");
    assert!(publisher.is_secured());
    assert!(publisher.topic().expect("topic").is_secured());

    let (tx, rx) = channel::unbounded();
    let subscriber = ObjectSubscriber::secured(
        &ctx,
        secured_topic("/vault/door", 5580),
        KEY,
        KEY,
        KEY,
        move |topic, object| {
            let _ = tx.send((topic.to_string(), object.clone()));
        },
        |topic, err| panic!("unexpected error on {}: {}", topic, err),
    )
    .expect("secured subscriber");
    assert!(subscriber.is_secured());

    // A plain subscription to the same port never sees secured traffic.
    let (plain_tx, plain_rx) = channel::unbounded();
    let _plain = ObjectSubscriber::standalone(
        &ctx,
        Topic::new("/vault/door", ROBOT_ID, false, Endpoint::new("127.0.0.1", 5580)),
        move |topic, _| {
            let _ = plain_tx.send(topic.to_string());
        },
        |_, _| {},
    )
    .expect("plain subscriber");

    let sample = json!({ "temperature": 4.0 });
    publisher.publish(&sample).expect("publish");
    assert_eq!(
        rx.recv_timeout(WAIT).expect("delivery"),
        ("/vault/door".to_string(), sample)
    );
    assert!(plain_rx.recv_timeout(QUIET).is_err());
}

#[test]
fn test_secured_topic_map() {
    let ctx = context();
    let (_dir, model) = robot_model();
    let a = ModelPublisher::new_secured(&ctx, "/vault/a", KEY, ModelInfo::FilePath(model.clone()), 5581)
        .expect("a");
    let b = ModelPublisher::new_secured(&ctx, "/vault/b", KEY, ModelInfo::FilePath(model), 5582)
        .expect("b");

    let mut topics = HashMap::new();
    topics.insert(secured_topic("/vault/a", 5581), KEY.to_string());
    topics.insert(secured_topic("/vault/b", 5582), KEY.to_string());

    let (tx, rx) = channel::unbounded();
    let subscriber = ObjectSubscriber::secured_topics(
        &ctx,
        topics,
        KEY,
        KEY,
        move |topic, _| {
            let _ = tx.send(topic.to_string());
        },
        |topic, err| panic!("unexpected error on {}: {}", topic, err),
    )
    .expect("subscriber");
    assert_eq!(subscriber.topics().len(), 2);

    a.publish(&json!({ "temperature": 1 })).expect("publish a");
    b.publish(&json!({ "temperature": 2 })).expect("publish b");
    let mut got = vec![
        rx.recv_timeout(WAIT).expect("first"),
        rx.recv_timeout(WAIT).expect("second"),
    ];
    got.sort();
    assert_eq!(got, vec!["/vault/a".to_string(), "/vault/b".to_string()]);
}

#[test]
fn test_secured_parameter_checks() {
    let ctx = context();
    let (_dir, model) = robot_model();
    ctx.add_representations(&[&model]).expect("model");

    assert_eq!(
        ModelPublisher::new_secured(&ctx, "/vault", "short", ModelInfo::Id(ROBOT_ID.into()), 5583)
            .err(),
        Some(Error::InvalidParam)
    );
    let one_short = &KEY[..39];
    assert_eq!(
        ModelPublisher::new_secured(&ctx, "/vault", one_short, ModelInfo::Id(ROBOT_ID.into()), 5583)
            .err(),
        Some(Error::InvalidParam)
    );
    let not_z85 = "~".repeat(40);
    assert_eq!(
        ModelPublisher::new_secured(&ctx, "/vault", &not_z85, ModelInfo::Id(ROBOT_ID.into()), 5583)
            .err(),
        Some(Error::InvalidParam)
    );

    assert_eq!(
        ObjectSubscriber::secured(
            &ctx,
            secured_topic("/vault", 5583),
            "short",
            KEY,
            KEY,
            |_, _| {},
            |_, _| {},
        )
        .err(),
        Some(Error::InvalidParam)
    );
    assert_eq!(
        ObjectSubscriber::secured(
            &ctx,
            secured_topic("/vault", 5583),
            one_short,
            KEY,
            KEY,
            |_, _| {},
            |_, _| {},
        )
        .err(),
        Some(Error::InvalidParam)
    );
    assert_eq!(
        ObjectSubscriber::secured(
            &ctx,
            Topic::new("/vault", ROBOT_ID, false, Endpoint::new("127.0.0.1", 5583)),
            KEY,
            KEY,
            KEY,
            |_, _| {},
            |_, _| {},
        )
        .err(),
        Some(Error::InvalidParam)
    );
}
