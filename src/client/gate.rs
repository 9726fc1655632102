//! Readonly policy for mutating requests

use std::sync::Arc;

use super::error::RequestError;
use super::notify::{Notice, Notifier};
use super::request::EndpointRequest;

/// Refuses mutating requests while the client is readonly.
///
/// Consulted before a signature is computed and before the in-flight
/// coordinator sees the request.
#[derive(Clone)]
pub struct MutationGate {
    readonly: bool,
    notifier: Arc<dyn Notifier>,
}

impl MutationGate {
    /// Gate with the given policy, reporting refusals to `notifier`.
    pub fn new(readonly: bool, notifier: Arc<dyn Notifier>) -> Self {
        Self { readonly, notifier }
    }

    /// Whether the client is readonly.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// `true` when `request` may proceed. A refusal notifies the user.
    pub fn check_allowed(&self, request: &EndpointRequest) -> bool {
        self.check(request).is_ok()
    }

    /// Same as [`check_allowed`](Self::check_allowed) but yields the typed
    /// refusal for the request pipeline.
    pub fn check(&self, request: &EndpointRequest) -> Result<(), RequestError> {
        if !self.readonly || !request.method.is_mutating() {
            return Ok(());
        }

        tracing::info!(
            method = request.method.as_str(),
            path = %request.path,
            "refusing mutation in readonly mode"
        );
        self.notifier.notify(Notice::info(format!(
            "Readonly mode is enabled; not sending {} {}",
            request.method, request.path
        )));
        Err(RequestError::Refused {
            method: request.method.as_str(),
            path: request.path.clone(),
        })
    }
}
