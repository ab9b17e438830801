// Test mocks for the dispatch engine.
//
// One mock per port:
// - MockRuntime (ScriptRuntime): records invocations, can fail, panic or stall
// - RecordingReplies (ReplySink): captures chat messages and whispers, can panic
// - StaticDirectory (UserDirectory): HashMap-based id ↔ login
// - RecordingLedger (Ledger): wraps a real ledger, records every delta,
//   can be switched to fail reads or mutations

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::catalog::ActionHandle;
use crate::traits::{Invocation, Ledger, ReplySink, ScriptRuntime, UserDirectory};

// ---------------------------------------------------------------------------
// MockRuntime
// ---------------------------------------------------------------------------

/// Script runtime that records every invocation.
/// Builder pattern: `.failing_on()`, `.panicking_on()`, `.with_delay()`.
#[derive(Default)]
pub struct MockRuntime {
    calls: Mutex<Vec<(String, Invocation)>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, action: &str) -> Self {
        self.failing.insert(action.to_string());
        self
    }

    pub fn panicking_on(mut self, action: &str) -> Self {
        self.panicking.insert(action.to_string());
        self
    }

    /// Every invocation sleeps this long before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, Invocation)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(action, _)| action.clone())
            .collect()
    }
}

#[async_trait]
impl ScriptRuntime for MockRuntime {
    async fn invoke(&self, action: &ActionHandle, invocation: &Invocation) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((action.as_str().to_string(), invocation.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(action.as_str()) {
            panic!("MockRuntime: scripted panic in {action}");
        }
        if self.failing.contains(action.as_str()) {
            bail!("MockRuntime: scripted failure in {action}");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReplies
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingReplies {
    messages: Mutex<Vec<String>>,
    whispers: Mutex<Vec<(String, String)>>,
    panicking: bool,
}

impl RecordingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panic on every chat message instead of recording it.
    pub fn panicking() -> Self {
        Self {
            panicking: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn whispers(&self) -> Vec<(String, String)> {
        self.whispers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySink for RecordingReplies {
    async fn send_chat_message(&self, text: &str) -> Result<()> {
        if self.panicking {
            panic!("RecordingReplies: scripted panic sending {text:?}");
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_whisper(&self, target: &str, text: &str) -> Result<()> {
        self.whispers
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticDirectory
// ---------------------------------------------------------------------------

/// HashMap-based user directory. Unregistered ids and logins resolve to None.
#[derive(Default, Clone)]
pub struct StaticDirectory {
    by_id: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, login: &str) -> Self {
        self.by_id.insert(user_id.to_string(), login.to_string());
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn login_for_id(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.by_id.get(user_id).cloned())
    }

    async fn id_for_login(&self, login: &str) -> Result<Option<String>> {
        Ok(self
            .by_id
            .iter()
            .find(|(_, l)| l.eq_ignore_ascii_case(login))
            .map(|(id, _)| id.clone()))
    }
}

// ---------------------------------------------------------------------------
// RecordingLedger
// ---------------------------------------------------------------------------

/// Wraps a ledger and records every `add_points` call, successful or not.
pub struct RecordingLedger {
    inner: Arc<dyn Ledger>,
    deltas: Mutex<Vec<(String, i64)>>,
    fail_mutations: AtomicBool,
    fail_reads: AtomicBool,
}

impl RecordingLedger {
    pub fn new(inner: Arc<dyn Ledger>) -> Self {
        Self {
            inner,
            deltas: Mutex::new(Vec::new()),
            fail_mutations: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn deltas(&self) -> Vec<(String, i64)> {
        self.deltas.lock().unwrap().clone()
    }

    /// Only the negative deltas, i.e. charges.
    pub fn debits(&self) -> Vec<(String, i64)> {
        self.deltas()
            .into_iter()
            .filter(|(_, delta)| *delta < 0)
            .map(|(user, delta)| (user, -delta))
            .collect()
    }
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("RecordingLedger: reads disabled");
        }
        self.inner.balance(user_id).await
    }

    async fn add_points(&self, user_id: &str, delta: i64) -> Result<i64> {
        self.deltas
            .lock()
            .unwrap()
            .push((user_id.to_string(), delta));
        if self.fail_mutations.load(Ordering::SeqCst) {
            bail!("RecordingLedger: mutations disabled");
        }
        self.inner.add_points(user_id, delta).await
    }

    async fn set_points(&self, user_id: &str, points: i64) -> Result<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            bail!("RecordingLedger: mutations disabled");
        }
        self.inner.set_points(user_id, points).await
    }

    async fn all_points(&self) -> Result<Vec<(String, i64)>> {
        self.inner.all_points().await
    }
}
