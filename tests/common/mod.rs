//! Shared harness: a scripted in-process transport and recording collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use gerrit_relay::client::cache::{ChangeCache, MemoryFileCache};
use gerrit_relay::client::notify::RecordingNotifier;
use gerrit_relay::client::request::EndpointRequest;
use gerrit_relay::client::transport::Transport;
use gerrit_relay::client::{ChangeField, ChangeInfo, Envelope, TransportError};
use gerrit_relay::{ClientConfig, GerritClient};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Computes the response for one call.
pub type Responder =
    dyn Fn(&str, &EndpointRequest) -> Result<Envelope, TransportError> + Send + Sync;

/// One call observed by the transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub target: String,
    pub request: EndpointRequest,
}

/// Transport that answers from a closure, optionally holding every call until
/// [`ScriptedTransport::release`] is called.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    held: bool,
    gate: watch::Sender<bool>,
}

impl ScriptedTransport {
    fn build<F>(held: bool, responder: F) -> Arc<Self>
    where
        F: Fn(&str, &EndpointRequest) -> Result<Envelope, TransportError> + Send + Sync + 'static,
    {
        let (gate, _) = watch::channel(false);
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            held,
            gate,
        })
    }

    /// Answer every call immediately.
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &EndpointRequest) -> Result<Envelope, TransportError> + Send + Sync + 'static,
    {
        Self::build(false, responder)
    }

    /// Hold every call until released.
    pub fn held<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &EndpointRequest) -> Result<Envelope, TransportError> + Send + Sync + 'static,
    {
        Self::build(true, responder)
    }

    /// Always answer `status` with `body`.
    pub fn respond(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_, _| Ok(Envelope::new(status, body.clone())))
    }

    /// Let held calls complete.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of calls that reached the transport.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        target: &str,
        request: &EndpointRequest,
    ) -> Result<Envelope, TransportError> {
        self.calls.lock().push(RecordedCall {
            target: target.to_string(),
            request: request.clone(),
        });
        if self.held {
            let mut released = self.gate.subscribe();
            let _ = released.wait_for(|open| *open).await;
        }
        (self.responder)(target, request)
    }
}

/// Change cache remembering every write.
#[derive(Default)]
pub struct RecordingChangeCache {
    writes: Mutex<Vec<(String, Vec<ChangeField>, ChangeInfo)>>,
}

impl RecordingChangeCache {
    pub fn writes(&self) -> Vec<(String, Vec<ChangeField>, ChangeInfo)> {
        self.writes.lock().clone()
    }
}

impl ChangeCache for RecordingChangeCache {
    fn set(&self, change_id: &str, fields: &[ChangeField], change: &ChangeInfo) {
        self.writes
            .lock()
            .push((change_id.to_string(), fields.to_vec(), change.clone()));
    }
}

/// A client wired to scripted collaborators.
pub struct Harness {
    pub client: GerritClient,
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub changes: Arc<RecordingChangeCache>,
    pub files: Arc<MemoryFileCache>,
}

pub fn config(readonly: bool) -> ClientConfig {
    ClientConfig {
        username: Some("alice".into()),
        password: Some("secret".into()),
        readonly,
        ..ClientConfig::new("https://review.example.org")
    }
}

pub fn harness(transport: Arc<ScriptedTransport>) -> Harness {
    harness_with(config(false), transport)
}

pub fn readonly_harness(transport: Arc<ScriptedTransport>) -> Harness {
    harness_with(config(true), transport)
}

pub fn harness_with(config: ClientConfig, transport: Arc<ScriptedTransport>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let changes = Arc::new(RecordingChangeCache::default());
    let files = Arc::new(MemoryFileCache::new());
    let client = GerritClient::builder(config)
        .transport(transport.clone())
        .notifier(notifier.clone())
        .change_cache(changes.clone())
        .file_cache(files.clone())
        .build()
        .expect("client");
    Harness {
        client,
        transport,
        notifier,
        changes,
        files,
    }
}

/// Prefix `json` the way the server does.
pub fn gerrit_body(json: &str) -> String {
    format!(")]}}'\n{json}")
}
