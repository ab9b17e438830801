//! Unbounded multi-producer, single-consumer dispatch queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::request::EventInvocationRequest;

/// Create a connected producer handle and consumer.
pub fn dispatch_queue() -> (DispatchQueue, DispatchReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        DispatchQueue {
            tx,
            pending: Arc::clone(&pending),
        },
        DispatchReceiver { rx, pending },
    )
}

/// Producer side. Cheap to clone; one clone per supervisor or timer.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<EventInvocationRequest>,
    pending: Arc<AtomicUsize>,
}

impl DispatchQueue {
    /// Append a request. Never blocks. Returns false only if the consumer is
    /// gone (shutdown), in which case the request is dropped.
    pub fn enqueue(&self, request: EventInvocationRequest) -> bool {
        let key = request.key.clone();
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(request) {
            Ok(()) => {
                debug!(event = %key, "Request enqueued");
                true
            }
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!(event = %key, "Dispatch queue closed, dropping request");
                false
            }
        }
    }

    /// Requests enqueued but not yet taken by the consumer.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side. Exactly one exists per queue.
pub struct DispatchReceiver {
    rx: mpsc::UnboundedReceiver<EventInvocationRequest>,
    pending: Arc<AtomicUsize>,
}

impl DispatchReceiver {
    /// Wait for the next request in arrival order. `None` once every
    /// producer handle is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<EventInvocationRequest> {
        let next = self.rx.recv().await;
        if next.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        next
    }

    /// Stop accepting new requests; already queued ones can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
