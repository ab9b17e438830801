//! The single consumer of the dispatch queue.
//!
//! Lookup → permission → cost → cooldown → invoke → charge, one request at a
//! time. Being the only consumer is what makes the cooldown check-then-reset
//! and the balance check-then-charge sequences race-free without locks.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::EventDefinition;
use crate::queue::DispatchReceiver;
use crate::request::EventInvocationRequest;
use crate::store::CatalogStore;
use crate::traits::{Invocation, Ledger, ReplySink, ScriptRuntime};

/// Why a request was turned away before its action ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Sender's tier is below the event's. Logged only.
    Permission,
    /// Sender cannot afford the event. Answered in chat.
    InsufficientPoints { needed: i64, balance: i64 },
    /// Event fired too recently. Logged only.
    Cooldown,
}

/// What happened to one dequeued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The action was invoked. `action_ok` is false if it errored, panicked
    /// or timed out; the cooldown was reset and any cost charged either way.
    Executed { action_ok: bool },
    Rejected(RejectReason),
    /// The key is not in the current catalog.
    Dropped,
    /// The gates could not be evaluated (ledger read failed) or processing
    /// panicked outside the action.
    Failed,
}

/// Per-loop tally of outcomes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    pub executed: u64,
    pub action_failures: u64,
    pub rejected_permission: u64,
    pub rejected_cost: u64,
    pub rejected_cooldown: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl ExecutorStats {
    pub fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Executed { action_ok } => {
                self.executed += 1;
                if !action_ok {
                    self.action_failures += 1;
                }
            }
            DispatchOutcome::Rejected(RejectReason::Permission) => self.rejected_permission += 1,
            DispatchOutcome::Rejected(RejectReason::InsufficientPoints { .. }) => {
                self.rejected_cost += 1
            }
            DispatchOutcome::Rejected(RejectReason::Cooldown) => self.rejected_cooldown += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.executed
            + self.rejected_permission
            + self.rejected_cost
            + self.rejected_cooldown
            + self.dropped
            + self.failed
    }
}

impl fmt::Display for ExecutorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} executed={} action_failures={} rejected(permission={}, cost={}, cooldown={}) dropped={} failed={}",
            self.processed(),
            self.executed,
            self.action_failures,
            self.rejected_permission,
            self.rejected_cost,
            self.rejected_cooldown,
            self.dropped,
            self.failed,
        )
    }
}

/// Gate & executor for dispatched requests.
pub struct Executor {
    catalog: Arc<CatalogStore>,
    ledger: Arc<dyn Ledger>,
    runtime: Arc<dyn ScriptRuntime>,
    replies: Arc<dyn ReplySink>,
    action_timeout: Option<Duration>,
}

impl Executor {
    pub fn new(
        catalog: Arc<CatalogStore>,
        ledger: Arc<dyn Ledger>,
        runtime: Arc<dyn ScriptRuntime>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            runtime,
            replies,
            action_timeout: None,
        }
    }

    /// Stop waiting on an action after `timeout`. The action counts as a
    /// failed execution; cooldown and charge still apply.
    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Drain the queue until shutdown or until every producer is gone.
    ///
    /// Shutdown interrupts the wait for the next request only; a request
    /// already being processed runs to completion.
    pub async fn run(&self, mut rx: DispatchReceiver, shutdown: CancellationToken) -> ExecutorStats {
        let mut stats = ExecutorStats::default();
        info!("Dispatch loop started");

        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Dispatch loop cancelled");
                    break;
                }
                next = rx.recv() => match next {
                    Some(request) => request,
                    None => {
                        info!("Dispatch queue closed");
                        break;
                    }
                },
            };

            let outcome = match AssertUnwindSafe(self.process(&request)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    error!(
                        event = %request.key,
                        sender = %request.sender_name,
                        panic = %panic_message(&*panic),
                        "Request processing panicked"
                    );
                    DispatchOutcome::Failed
                }
            };
            stats.record(&outcome);
        }

        info!("Dispatch loop stopped. {stats}");
        stats
    }

    /// Run one request through the gates and, if admitted, its action.
    pub async fn process(&self, request: &EventInvocationRequest) -> DispatchOutcome {
        let Some(definition) = self.catalog.lookup(&request.key) else {
            debug!(
                event = %request.key,
                sender = %request.sender_name,
                "Event not in catalog, dropping request"
            );
            return DispatchOutcome::Dropped;
        };

        if request.permission < definition.permission {
            info!(
                event = %definition.name,
                sender = %request.sender_name,
                has = %request.permission,
                needs = %definition.permission,
                "Sender lacks permission for event"
            );
            return DispatchOutcome::Rejected(RejectReason::Permission);
        }

        if definition.cost > 0 {
            let balance = match self.ledger.balance(&request.sender_id).await {
                Ok(balance) => balance,
                Err(e) => {
                    error!(
                        event = %definition.name,
                        sender = %request.sender_name,
                        error = %e,
                        "Failed to read balance, not executing"
                    );
                    return DispatchOutcome::Failed;
                }
            };
            if balance < definition.cost {
                self.reply_insufficient(&definition, request, balance).await;
                return DispatchOutcome::Rejected(RejectReason::InsufficientPoints {
                    needed: definition.cost,
                    balance,
                });
            }
        }

        if !definition.cooldown.is_ready() {
            info!(
                event = %definition.name,
                sender = %request.sender_name,
                remaining_ms = definition.cooldown.remaining().map(|d| d.as_millis() as u64),
                "Event is on cooldown"
            );
            return DispatchOutcome::Rejected(RejectReason::Cooldown);
        }

        info!(
            event = %definition.name,
            sender = %request.sender_name,
            "Executing event"
        );
        definition.cooldown.reset();
        let action_ok = self.invoke(&definition, request).await;

        if definition.cost > 0 {
            self.charge(&definition, request).await;
        }

        DispatchOutcome::Executed { action_ok }
    }

    async fn invoke(&self, definition: &EventDefinition, request: &EventInvocationRequest) -> bool {
        let invocation = Invocation {
            sender_id: request.sender_id.clone(),
            sender_name: request.sender_name.clone(),
            args: request.args.clone(),
        };
        let call = AssertUnwindSafe(self.runtime.invoke(&definition.action, &invocation))
            .catch_unwind();

        let result = match self.action_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        event = %definition.name,
                        sender = %request.sender_name,
                        timeout_ms = limit.as_millis() as u64,
                        "Action timed out"
                    );
                    return false;
                }
            },
            None => call.await,
        };

        match result {
            Ok(Ok(())) => {
                info!(event = %definition.name, "Event was executed successfully");
                true
            }
            Ok(Err(e)) => {
                error!(
                    event = %definition.name,
                    sender = %request.sender_name,
                    error = %e,
                    "Action failed"
                );
                false
            }
            Err(panic) => {
                error!(
                    event = %definition.name,
                    sender = %request.sender_name,
                    panic = %panic_message(&*panic),
                    "Action panicked"
                );
                false
            }
        }
    }

    /// Best-effort: a failed debit is logged, never rolled back or retried.
    async fn charge(&self, definition: &EventDefinition, request: &EventInvocationRequest) {
        match self.ledger.debit(&request.sender_id, definition.cost).await {
            Ok(balance) => info!(
                event = %definition.name,
                sender = %request.sender_name,
                cost = definition.cost,
                balance,
                "Charged points for event"
            ),
            Err(e) => warn!(
                event = %definition.name,
                sender = %request.sender_name,
                cost = definition.cost,
                error = %e,
                "Failed to charge points after execution"
            ),
        }
    }

    async fn reply_insufficient(
        &self,
        definition: &EventDefinition,
        request: &EventInvocationRequest,
        balance: i64,
    ) {
        info!(
            event = %definition.name,
            sender = %request.sender_name,
            cost = definition.cost,
            balance,
            "Sender cannot afford event"
        );
        let text = format!(
            "@{}, you need {} points for !{}, but you only have {}.",
            request.sender_name, definition.cost, definition.name, balance
        );
        if let Err(e) = self.replies.send_chat_message(&text).await {
            warn!(error = %e, "Failed to send cost rejection reply");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
