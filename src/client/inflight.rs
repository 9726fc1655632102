//! In-flight request coordination
//!
//! Concurrent GET requests with equal [`Signature`]s are merged onto a single
//! transport call and every caller receives a clone of its outcome. Mutating
//! requests always get their own call and never touch the pending map.
//!
//! The shared call runs on a spawned task. A caller that stops waiting does not
//! cancel it, and the entry is removed when the call completes even if the
//! transport panics. A call that dies without an outcome is reported once,
//! however many callers were waiting on it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::envelope::Envelope;
use super::error::TransportError;
use super::request::EndpointRequest;
use super::signature::Signature;
use super::transport::Gateway;

/// What every waiter on a request observes.
pub type Outcome = Result<Envelope, TransportError>;

struct PendingEntry {
    generation: u64,
    sender: broadcast::Sender<Outcome>,
}

#[derive(Default)]
struct PendingMap {
    entries: HashMap<Signature, PendingEntry>,
    next_generation: u64,
}

type SharedPending = Arc<Mutex<PendingMap>>;

enum Slot {
    /// First caller for this signature; owns the transport call.
    Leader {
        generation: u64,
        sender: broadcast::Sender<Outcome>,
        receiver: broadcast::Receiver<Outcome>,
    },
    /// A call with the same signature is already running.
    Follower(broadcast::Receiver<Outcome>),
}

/// Merges identical concurrent reads onto one transport call.
pub struct InFlightCoordinator {
    gateway: Arc<Gateway>,
    pending: SharedPending,
}

impl InFlightCoordinator {
    /// Coordinator dispatching through `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            pending: Arc::new(Mutex::new(PendingMap::default())),
        }
    }

    /// The gateway used for every call.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Number of signatures with a call currently in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().entries.len()
    }

    /// Send `request`, attaching to an identical in-flight GET when one exists.
    ///
    /// `request` must already carry its headers (see [`Gateway::prepare`]).
    pub async fn dispatch(&self, request: EndpointRequest) -> Outcome {
        let target = self.gateway.target(&request);

        if request.method.is_mutating() {
            return self.gateway.send(&target, &request).await;
        }

        let signature = Signature::compute(&target, &request);
        let mut receiver = match self.acquire(&signature) {
            Slot::Follower(receiver) => {
                tracing::debug!(fingerprint = %signature, url = %target, "joining in-flight request");
                receiver
            }
            Slot::Leader {
                generation,
                sender,
                receiver,
            } => {
                self.spawn_call(signature, generation, sender, target, request);
                receiver
            }
        };

        receiver
            .recv()
            .await
            .unwrap_or(Err(TransportError::Interrupted))
    }

    /// Lookup and insert under one lock acquisition.
    fn acquire(&self, signature: &Signature) -> Slot {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.entries.get(signature) {
            return Slot::Follower(entry.sender.subscribe());
        }

        let generation = pending.next_generation;
        pending.next_generation += 1;
        let (sender, receiver) = broadcast::channel(1);
        pending.entries.insert(
            signature.clone(),
            PendingEntry {
                generation,
                sender: sender.clone(),
            },
        );
        Slot::Leader {
            generation,
            sender,
            receiver,
        }
    }

    fn spawn_call(
        &self,
        signature: Signature,
        generation: u64,
        sender: broadcast::Sender<Outcome>,
        target: String,
        request: EndpointRequest,
    ) {
        let gateway = Arc::clone(&self.gateway);
        let guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            gateway: Arc::clone(&self.gateway),
            target: target.clone(),
            signature,
            generation,
            completed: false,
        };

        tokio::spawn(async move {
            let outcome = gateway.send(&target, &request).await;
            // entry leaves the map before any waiter sees the outcome
            guard.complete();
            let _ = sender.send(outcome);
        });
    }
}

/// Removes a pending entry when its call ends, including by panic.
struct PendingGuard {
    pending: SharedPending,
    gateway: Arc<Gateway>,
    target: String,
    signature: Signature,
    generation: u64,
    completed: bool,
}

impl PendingGuard {
    fn complete(mut self) {
        self.remove();
        self.completed = true;
    }

    fn remove(&self) {
        let mut pending = self.pending.lock();
        let owned = pending
            .entries
            .get(&self.signature)
            .is_some_and(|entry| entry.generation == self.generation);
        if owned {
            pending.entries.remove(&self.signature);
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.remove();
            self.gateway.report_interrupted(&self.target);
        }
    }
}
