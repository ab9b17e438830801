//! Fake sources and helpers shared by the supervisor integration tests.
//!
//! Sources are driven from the test: `emit` pushes a payload, `drop_connection`
//! simulates the provider going away.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use actionhub_supervisor::{EventSource, SignalSender, SourceSignal, TopicRegistrar, TopicSubscription};
use anyhow::Result;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

pub struct ScriptedSource<P> {
    name: &'static str,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    refuse: AtomicBool,
    signals: Mutex<Option<SignalSender<P>>>,
}

impl<P: Send + 'static> ScriptedSource<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            signals: Mutex::new(None),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Refuse (or accept again) subsequent connects.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn emit(&self, payload: P) {
        self.send(SourceSignal::Payload(payload));
    }

    /// Report an unexpected disconnect on the live session.
    pub fn drop_connection(&self) {
        self.send(SourceSignal::Disconnected);
    }

    /// Let go of the session sender without saying anything.
    pub fn vanish(&self) {
        self.signals.lock().unwrap().take();
    }

    fn send(&self, signal: SourceSignal<P>) {
        if let Some(tx) = self.signals.lock().unwrap().as_ref() {
            let _ = tx.send(signal);
        }
    }
}

#[async_trait]
impl<P: Send + 'static> EventSource for ScriptedSource<P> {
    type Payload = P;

    fn name(&self) -> &str {
        self.name
    }

    async fn connect(&self, signals: SignalSender<P>) -> Result<bool> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let _ = signals.send(SourceSignal::Connected);
        *self.signals.lock().unwrap() = Some(signals);
        Ok(true)
    }

    async fn disconnect(&self) -> Result<bool> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(self.signals.lock().unwrap().take().is_some())
    }
}

// ---------------------------------------------------------------------------
// StaticRegistrar
// ---------------------------------------------------------------------------

/// Answers every registration with the same statuses.
pub struct StaticRegistrar {
    statuses: Vec<String>,
    registered: Mutex<Vec<TopicSubscription>>,
}

impl StaticRegistrar {
    pub fn enabled() -> Self {
        Self::with_statuses(&["enabled"])
    }

    pub fn with_statuses(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn registered(&self) -> Vec<TopicSubscription> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicRegistrar for StaticRegistrar {
    async fn register(&self, subscription: &TopicSubscription) -> Result<Vec<String>> {
        self.registered.lock().unwrap().push(subscription.clone());
        Ok(self.statuses.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Poll `condition` until it holds. Panics after a minute of (test) time.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within deadline"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
