//! HTTP transport and gateway
//!
//! [`Transport`] is the seam to the HTTP stack; [`ReqwestTransport`] is the
//! production implementation. [`Gateway`] sits in front of it: it owns the
//! base URL and credentials, stamps headers, logs, and turns transport faults
//! into notices.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::envelope::Envelope;
use super::error::{ConfigError, ConfigResult, TransportError};
use super::notify::{Notice, Notifier};
use super::request::{EndpointRequest, Method};

/// Issues one HTTP call and returns whatever the server answered.
///
/// Any received response, whatever its status, is `Ok`. `Err` means no
/// response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to the fully-qualified `target` URL.
    async fn send(&self, target: &str, request: &EndpointRequest)
    -> Result<Envelope, TransportError>;
}

/// Shared, per-request readable TLS policy.
#[derive(Debug, Clone, Default)]
pub struct TlsToggle(Arc<AtomicBool>);

impl TlsToggle {
    /// Toggle with the given initial policy.
    pub fn new(allow_invalid_certificates: bool) -> Self {
        Self(Arc::new(AtomicBool::new(allow_invalid_certificates)))
    }

    /// Whether invalid certificates are currently accepted.
    pub fn allow_invalid_certificates(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Change the policy; takes effect on the next request.
    pub fn set_allow_invalid_certificates(&self, allow: bool) {
        self.0.store(allow, Ordering::Relaxed);
    }
}

/// [`Transport`] backed by `reqwest`.
///
/// Two clients are kept because certificate validation is fixed when a
/// `reqwest::Client` is built; the toggle picks one per request.
pub struct ReqwestTransport {
    strict: reqwest::Client,
    lenient: reqwest::Client,
    tls: TlsToggle,
}

impl ReqwestTransport {
    /// Build both clients with an optional request timeout.
    pub fn new(timeout: Option<Duration>, tls: TlsToggle) -> ConfigResult<Self> {
        let build = |accept_invalid: bool| {
            let mut builder = reqwest::Client::builder()
                .user_agent(concat!("gerrit-relay/", env!("CARGO_PKG_VERSION")))
                .danger_accept_invalid_certs(accept_invalid);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            builder
                .build()
                .map_err(|err| ConfigError::HttpClient(err.to_string()))
        };

        Ok(Self {
            strict: build(false)?,
            lenient: build(true)?,
            tls,
        })
    }

    /// The TLS toggle consulted on every request.
    pub fn tls(&self) -> &TlsToggle {
        &self.tls
    }

    fn client(&self) -> &reqwest::Client {
        if self.tls.allow_invalid_certificates() {
            &self.lenient
        } else {
            &self.strict
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        target: &str,
        request: &EndpointRequest,
    ) -> Result<Envelope, TransportError> {
        let client = self.client();

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client.request(method, target);
        if !request.query.is_empty() {
            builder = builder.query(request.query.as_pairs());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Envelope::new(status, body))
    }
}

/// Authenticated front door to the transport.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    base_url: String,
    authorization: Option<String>,
    debug: bool,
    notifier: Arc<dyn Notifier>,
}

impl Gateway {
    /// Gateway for `base_url`; `credentials` are `(username, password)`.
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        credentials: Option<(&str, &str)>,
        debug: bool,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let authorization = credentials.map(|(user, password)| {
            format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
        });
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization,
            debug,
            notifier,
        }
    }

    /// Server root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fully-qualified URL of `request`.
    pub fn target(&self, request: &EndpointRequest) -> String {
        request.target(&self.base_url)
    }

    /// Stamp the headers this client sends with `request`.
    ///
    /// Headers depend only on client identity and on whether a body is
    /// present, so identical requests always end up with identical headers.
    /// A client without credentials serves every request anonymously.
    pub fn prepare(&self, mut request: EndpointRequest) -> EndpointRequest {
        match &self.authorization {
            Some(authorization) if request.authenticated => {
                request
                    .headers
                    .insert("Authorization".to_string(), authorization.clone());
            }
            Some(_) => {}
            // without credentials the `a/` tree only answers 401
            None => request.authenticated = false,
        }
        if request.body.is_some() {
            request
                .headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
        request
    }

    /// Issue the call. Transport faults are logged and reported to the user
    /// before being returned.
    pub async fn send(
        &self,
        target: &str,
        request: &EndpointRequest,
    ) -> Result<Envelope, TransportError> {
        if self.debug {
            tracing::debug!(
                method = request.method.as_str(),
                url = %target,
                query = ?request.query.as_pairs(),
                body = ?request.body,
                "sending request"
            );
        } else {
            tracing::debug!(method = request.method.as_str(), url = %target, "sending request");
        }

        match self.transport.send(target, request).await {
            Ok(envelope) => {
                tracing::debug!(
                    method = request.method.as_str(),
                    url = %target,
                    status = envelope.status,
                    "received response"
                );
                Ok(envelope)
            }
            Err(err) => {
                tracing::warn!(
                    method = request.method.as_str(),
                    url = %target,
                    error = %err,
                    "request failed without a response"
                );
                self.notifier.notify(Notice::error(format!(
                    "Could not reach the review server at {}: {err}",
                    self.base_url
                )));
                Err(err)
            }
        }
    }
}

impl Gateway {
    /// Report a shared call that ended without an outcome.
    pub fn report_interrupted(&self, target: &str) {
        tracing::warn!(url = %target, "in-flight request interrupted before completion");
        self.notifier.notify(Notice::error(format!(
            "Request to {target} was interrupted before completion"
        )));
    }
}
