// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! Publishers and subscribers created from the same [`LoopbackTransport`]
//! exchange frames through a shared bus keyed by port. Endpoint addresses are
//! informational; the port identifies the publisher binding.
//!
//! Each started subscriber owns a delivery thread draining a crossbeam channel,
//! so user callbacks never run on the publishing thread. A secured binding only
//! delivers to subscriptions made with both a server public key and client
//! keys configured; a plain binding only delivers to plain subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};

use super::{
    is_valid_key, topic_matches, MessageCallback, Transport, TransportError, TransportPublisher,
    TransportSubscriber,
};
use crate::endpoint::Endpoint;

type Frame = (String, Vec<u8>);

struct Subscription {
    subscriber_id: u64,
    port: u16,
    filter: String,
    secured: bool,
    sink: Sender<Frame>,
}

#[derive(Default)]
struct Bus {
    running: AtomicBool,
    next_id: AtomicU64,
    /// Bound port -> secured flag.
    bindings: RwLock<HashMap<u16, bool>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl Bus {
    fn check_running(&self) -> Result<(), TransportError> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::NotInitialized)
        }
    }

    fn bind(&self, port: u16, secured: bool) -> Result<(), TransportError> {
        self.check_running()?;
        let mut bindings = self.bindings.write();
        if bindings.contains_key(&port) {
            return Err(TransportError::AddressInUse(port));
        }
        bindings.insert(port, secured);
        log::debug!("[LOOPBACK] Bound port {} (secured={})", port, secured);
        Ok(())
    }

    fn unbind(&self, port: u16) {
        self.bindings.write().remove(&port);
        log::debug!("[LOOPBACK] Unbound port {}", port);
    }

    fn deliver(&self, port: u16, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.check_running()?;
        let secured = match self.bindings.read().get(&port) {
            Some(secured) => *secured,
            None => return Err(TransportError::Closed),
        };
        let subscriptions = self.subscriptions.read();
        for sub in subscriptions.iter() {
            if sub.port == port && sub.secured == secured && topic_matches(&sub.filter, topic) {
                // A closed sink only means that subscriber is shutting down.
                let _ = sub.sink.send((topic.to_string(), payload.to_vec()));
            }
        }
        Ok(())
    }

    fn remove_subscriber(&self, subscriber_id: u64) {
        self.subscriptions
            .write()
            .retain(|s| s.subscriber_id != subscriber_id);
    }
}

// ============================================================================
// Transport
// ============================================================================

/// In-process transport; clones share the same bus.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    bus: Arc<Bus>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.bus.running.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("running", &self.is_running())
            .field("bindings", &self.bus.bindings.read().len())
            .finish()
    }
}

impl Transport for LoopbackTransport {
    fn initialize(&self) -> Result<(), TransportError> {
        self.bus.running.store(true, Ordering::Release);
        Ok(())
    }

    fn terminate(&self) -> Result<(), TransportError> {
        self.bus.running.store(false, Ordering::Release);
        self.bus.bindings.write().clear();
        self.bus.subscriptions.write().clear();
        log::debug!("[LOOPBACK] Terminated");
        Ok(())
    }

    fn create_publisher(&self, port: u16) -> Result<Box<dyn TransportPublisher>, TransportError> {
        self.bus.check_running()?;
        Ok(Box::new(LoopbackPublisher {
            bus: self.bus.clone(),
            port,
            secret_key: Mutex::new(None),
            started: AtomicBool::new(false),
        }))
    }

    fn create_subscriber(
        &self,
        endpoint: &Endpoint,
        on_message: MessageCallback,
    ) -> Result<Box<dyn TransportSubscriber>, TransportError> {
        self.bus.check_running()?;
        let id = self.bus.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(LoopbackSubscriber {
            bus: self.bus.clone(),
            id,
            endpoint: endpoint.clone(),
            on_message,
            state: Mutex::new(SubscriberState::default()),
        }))
    }
}

// ============================================================================
// Publisher
// ============================================================================

struct LoopbackPublisher {
    bus: Arc<Bus>,
    port: u16,
    secret_key: Mutex<Option<String>>,
    started: AtomicBool,
}

impl TransportPublisher for LoopbackPublisher {
    fn set_server_private_key(&self, key: &str) -> Result<(), TransportError> {
        if !is_valid_key(key) {
            return Err(TransportError::InvalidKey);
        }
        *self.secret_key.lock() = Some(key.to_string());
        Ok(())
    }

    fn start(&self) -> Result<(), TransportError> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        let secured = self.secret_key.lock().is_some();
        self.bus.bind(self.port, secured)?;
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn publish_on_topic(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(TransportError::NotStarted);
        }
        self.bus.deliver(self.port, topic, payload)
    }

    fn stop(&self) -> Result<(), TransportError> {
        if self.started.swap(false, Ordering::AcqRel) {
            self.bus.unbind(self.port);
        }
        Ok(())
    }
}

impl Drop for LoopbackPublisher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ============================================================================
// Subscriber
// ============================================================================

#[derive(Default)]
struct SubscriberState {
    server_key: Option<String>,
    client_keys: bool,
    sink: Option<Sender<Frame>>,
    worker: Option<JoinHandle<()>>,
    worker_id: Option<ThreadId>,
}

struct LoopbackSubscriber {
    bus: Arc<Bus>,
    id: u64,
    endpoint: Endpoint,
    on_message: MessageCallback,
    state: Mutex<SubscriberState>,
}

impl LoopbackSubscriber {
    fn subscribe(&self, endpoint: &Endpoint, topic: &str) -> Result<(), TransportError> {
        self.bus.check_running()?;
        let port = endpoint
            .port()
            .ok_or_else(|| TransportError::InvalidEndpoint(endpoint.to_string()))?;
        let state = self.state.lock();
        let sink = state.sink.clone().ok_or(TransportError::NotStarted)?;
        let secured = state.server_key.is_some() && state.client_keys;
        self.bus.subscriptions.write().push(Subscription {
            subscriber_id: self.id,
            port,
            filter: topic.to_string(),
            secured,
            sink,
        });
        log::debug!(
            "[LOOPBACK] Subscriber {} subscribed to {} on port {}",
            self.id,
            topic,
            port
        );
        Ok(())
    }
}

impl TransportSubscriber for LoopbackSubscriber {
    fn set_server_public_key(&self, key: &str) -> Result<(), TransportError> {
        if !is_valid_key(key) {
            return Err(TransportError::InvalidKey);
        }
        self.state.lock().server_key = Some(key.to_string());
        Ok(())
    }

    fn set_client_keys(&self, secret_key: &str, public_key: &str) -> Result<(), TransportError> {
        if !is_valid_key(secret_key) || !is_valid_key(public_key) {
            return Err(TransportError::InvalidKey);
        }
        self.state.lock().client_keys = true;
        Ok(())
    }

    fn start(&self) -> Result<(), TransportError> {
        self.bus.check_running()?;
        let mut state = self.state.lock();
        if state.sink.is_some() {
            return Ok(());
        }
        let (tx, rx) = channel::unbounded::<Frame>();
        let callback = self.on_message.clone();
        let worker = thread::Builder::new()
            .name(format!("edgebus-loopback-sub-{}", self.id))
            .spawn(move || {
                for (topic, payload) in rx.iter() {
                    callback(&topic, &payload);
                }
            })
            .map_err(|_| TransportError::Closed)?;
        state.worker_id = Some(worker.thread().id());
        state.worker = Some(worker);
        state.sink = Some(tx);
        Ok(())
    }

    fn subscribe_with_endpoint(
        &self,
        endpoint: &Endpoint,
        topic: &str,
    ) -> Result<(), TransportError> {
        self.subscribe(endpoint, topic)
    }

    fn subscribe_for_topic(&self, topic: &str) -> Result<(), TransportError> {
        let endpoint = self.endpoint.clone();
        self.subscribe(&endpoint, topic)
    }

    fn stop(&self) -> Result<(), TransportError> {
        // Drop every sender so the delivery loop drains and exits.
        self.bus.remove_subscriber(self.id);
        let (worker, worker_id) = {
            let mut state = self.state.lock();
            state.sink = None;
            (state.worker.take(), state.worker_id.take())
        };
        if let Some(worker) = worker {
            if worker_id != Some(thread::current().id()) {
                let _ = worker.join();
            }
        }
        Ok(())
    }
}

impl Drop for LoopbackSubscriber {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const KEY: &str = "rq:rM>}U?@Lns47E1%kR.o@n%FcmmsL/@{H8]yf7";

    fn collector() -> (MessageCallback, channel::Receiver<Frame>) {
        let (tx, rx) = channel::unbounded();
        let cb: MessageCallback = Arc::new(move |topic: &str, payload: &[u8]| {
            let _ = tx.send((topic.to_string(), payload.to_vec()));
        });
        (cb, rx)
    }

    #[test]
    fn test_requires_initialize() {
        let transport = LoopbackTransport::new();
        assert!(matches!(
            transport.create_publisher(5000),
            Err(TransportError::NotInitialized)
        ));
    }

    #[test]
    fn test_publish_reaches_matching_subscriber() {
        let transport = LoopbackTransport::new();
        transport.initialize().expect("init");

        let publisher = transport.create_publisher(5000).expect("publisher");
        publisher.start().expect("start publisher");

        let (cb, rx) = collector();
        let ep = Endpoint::new("localhost", 5000);
        let subscriber = transport.create_subscriber(&ep, cb).expect("subscriber");
        subscriber.start().expect("start subscriber");
        subscriber.subscribe_for_topic("/robot").expect("subscribe");

        publisher.publish_on_topic("/robot/arm", b"a").expect("publish");
        publisher.publish_on_topic("/robotic", b"b").expect("publish");
        publisher.publish_on_topic("/robot", b"c").expect("publish");

        let first = rx.recv_timeout(Duration::from_secs(2)).expect("first frame");
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("second frame");
        assert_eq!(first, ("/robot/arm".to_string(), b"a".to_vec()));
        assert_eq!(second, ("/robot".to_string(), b"c".to_vec()));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        subscriber.stop().expect("stop");
        publisher.publish_on_topic("/robot", b"d").expect("publish");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_port_binding_is_exclusive() {
        let transport = LoopbackTransport::new();
        transport.initialize().expect("init");
        let a = transport.create_publisher(5001).expect("publisher");
        let b = transport.create_publisher(5001).expect("publisher");
        a.start().expect("start");
        assert_eq!(b.start(), Err(TransportError::AddressInUse(5001)));
        a.stop().expect("stop");
        b.start().expect("rebind after stop");
    }

    #[test]
    fn test_secured_binding_requires_keys() {
        let transport = LoopbackTransport::new();
        transport.initialize().expect("init");
        let publisher = transport.create_publisher(5002).expect("publisher");
        assert_eq!(
            publisher.set_server_private_key("bad"),
            Err(TransportError::InvalidKey)
        );
        publisher.set_server_private_key(KEY).expect("key");
        publisher.start().expect("start");

        let ep = Endpoint::new("localhost", 5002);
        let (plain_cb, plain_rx) = collector();
        let plain = transport.create_subscriber(&ep, plain_cb).expect("plain");
        plain.start().expect("start");
        plain.subscribe_for_topic("/s").expect("subscribe");

        let (secure_cb, secure_rx) = collector();
        let secure = transport.create_subscriber(&ep, secure_cb).expect("secure");
        secure.set_server_public_key(KEY).expect("server key");
        secure.set_client_keys(KEY, KEY).expect("client keys");
        secure.start().expect("start");
        secure.subscribe_for_topic("/s").expect("subscribe");

        publisher.publish_on_topic("/s", b"x").expect("publish");
        assert!(secure_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(plain_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_subscribe_requires_start_and_port() {
        let transport = LoopbackTransport::new();
        transport.initialize().expect("init");
        let (cb, _rx) = collector();
        let sub = transport
            .create_subscriber(&Endpoint::new("localhost", 5003), cb)
            .expect("subscriber");
        assert_eq!(sub.subscribe_for_topic("/t"), Err(TransportError::NotStarted));
        sub.start().expect("start");
        assert!(matches!(
            sub.subscribe_with_endpoint(&Endpoint::address_only("localhost"), "/t"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
