//! Client orchestrator and public API
//!
//! [`GerritClient`] wires the pipeline together: mutation gate, gateway
//! (headers, logging, transport), in-flight coordinator, envelope codec, and
//! the injected caches and notifier. Endpoint operations live in
//! [`operations`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// Submodules
pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod inflight;
pub mod notify;
pub mod operations;
pub mod query;
pub mod request;
pub mod signature;
pub mod transport;
pub mod types;

use cache::{ChangeCache, FileCache, MemoryChangeCache, MemoryFileCache};
use error::{ConfigError, ConfigResult};
use gate::MutationGate;
use inflight::InFlightCoordinator;
use notify::{Notifier, TracingNotifier};
use transport::{Gateway, ReqwestTransport, TlsToggle, Transport};

/// Configuration for a client instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server root, e.g. `https://review.example.org`
    pub url: String,

    /// Login name for HTTP basic authentication
    pub username: Option<String>,

    /// HTTP password
    pub password: Option<String>,

    /// Refuse every mutating request
    pub readonly: bool,

    /// Log request bodies and parameters
    pub debug: bool,

    /// Skip TLS certificate validation
    pub allow_invalid_certificates: bool,

    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            readonly: false,
            debug: false,
            allow_invalid_certificates: false,
            timeout_ms: Some(30_000),
        }
    }
}

impl ClientConfig {
    /// Config for `url` with default policies.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reject configurations no client can be built from.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                detail: "url is empty".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                detail: "expected an http:// or https:// url".to_string(),
            });
        }
        if let (Some(user), None) = (&self.username, &self.password) {
            return Err(ConfigError::MissingPassword(user.clone()));
        }
        Ok(())
    }

    /// `(username, password)` when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }
}

/// Client for one review server.
pub struct GerritClient {
    config: ClientConfig,
    tls: TlsToggle,
    gate: MutationGate,
    coordinator: InFlightCoordinator,
    notifier: Arc<dyn Notifier>,
    change_cache: Arc<dyn ChangeCache>,
    file_cache: Arc<dyn FileCache>,
}

impl GerritClient {
    /// Client with the reqwest transport, tracing notices and in-memory caches.
    pub fn new(config: ClientConfig) -> ConfigResult<Self> {
        Self::builder(config).build()
    }

    /// Start configuring a client.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transport: None,
            notifier: None,
            change_cache: None,
            file_cache: None,
        }
    }

    /// The configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether mutations are refused
    pub fn is_readonly(&self) -> bool {
        self.gate.is_readonly()
    }

    /// TLS policy, read on every request by the reqwest transport
    pub fn tls(&self) -> &TlsToggle {
        &self.tls
    }

    /// Number of GET signatures currently in flight
    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending_count()
    }
}

/// Builder for [`GerritClient`]; unset collaborators get production defaults.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn Notifier>>,
    change_cache: Option<Arc<dyn ChangeCache>>,
    file_cache: Option<Arc<dyn FileCache>>,
}

impl ClientBuilder {
    /// Use a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Send notices to `notifier`.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Write fetched changes to `cache`.
    pub fn change_cache(mut self, cache: Arc<dyn ChangeCache>) -> Self {
        self.change_cache = Some(cache);
        self
    }

    /// Read and write file contents through `cache`.
    pub fn file_cache(mut self, cache: Arc<dyn FileCache>) -> Self {
        self.file_cache = Some(cache);
        self
    }

    /// Validate the config and assemble the client.
    pub fn build(self) -> ConfigResult<GerritClient> {
        let config = self.config;
        config.validate()?;

        let tls = TlsToggle::new(config.allow_invalid_certificates);
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                config.timeout_ms.map(Duration::from_millis),
                tls.clone(),
            )?),
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier));

        let gateway = Gateway::new(
            transport,
            config.url.trim(),
            config.credentials(),
            config.debug,
            Arc::clone(&notifier),
        );

        tracing::debug!(
            url = %gateway.base_url(),
            readonly = config.readonly,
            authenticated = config.credentials().is_some(),
            "gerrit client ready"
        );

        Ok(GerritClient {
            gate: MutationGate::new(config.readonly, Arc::clone(&notifier)),
            coordinator: InFlightCoordinator::new(Arc::new(gateway)),
            change_cache: self
                .change_cache
                .unwrap_or_else(|| Arc::new(MemoryChangeCache::new())),
            file_cache: self
                .file_cache
                .unwrap_or_else(|| Arc::new(MemoryFileCache::new())),
            notifier,
            tls,
            config,
        })
    }
}

// Re-export commonly used types
pub use envelope::Envelope;
pub use error::{RequestError, TransportError};
pub use query::{ChangeField, ChangeQuery, Offset};
pub use types::{AccountInfo, ChangeInfo, Comment, CommentKind, CommentMap, DraftInput, FileContent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ClientConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = ClientConfig::new("ftp://review").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn username_requires_password() {
        let config = ClientConfig {
            username: Some("alice".into()),
            ..ClientConfig::new("https://review.example.org")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPassword(_))
        ));
    }

    #[test]
    fn credentials_need_both_parts() {
        let mut config = ClientConfig::new("https://review.example.org");
        assert!(config.credentials().is_none());
        config.username = Some("alice".into());
        config.password = Some("secret".into());
        assert_eq!(config.credentials(), Some(("alice", "secret")));
    }
}
