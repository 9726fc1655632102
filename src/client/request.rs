//! Endpoint descriptors
//!
//! An [`EndpointRequest`] is built fresh for every operation call and never
//! mutated once handed to the pipeline.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP verbs used against the review server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read request; the only verb eligible for deduplication
    Get,
    /// Create or full-replace
    Put,
    /// Create
    Post,
    /// Remove
    Delete,
}

impl Method {
    /// Verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the verb can change server state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered multiset of query parameters. Keys may repeat (`q`, `o`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `key=value` entry, keeping any existing entries for `key`.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// All values recorded for `key`, in insertion order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over every entry in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no entries are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw pairs.
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Everything the transport needs to issue one HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRequest {
    /// HTTP verb
    pub method: Method,
    /// Path relative to the server root, without the `a/` prefix
    pub path: String,
    /// Whether the path is served under the authenticated `a/` prefix
    pub authenticated: bool,
    /// Query parameters
    pub query: QueryParams,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Headers, filled in by the gateway before dispatch
    pub headers: BTreeMap<String, String>,
}

impl EndpointRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            authenticated: true,
            query: QueryParams::new(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    /// GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// PUT request for `path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// POST request for `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// DELETE request for `path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a query parameter set.
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serve the request from the anonymous path instead of `a/`.
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Full target URL without the query string.
    pub fn target(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if self.authenticated {
            format!("{base}/a/{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Percent-encode one path segment (change ids contain `~`, file paths `/`).
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Encode an identifier that may already be percent-encoded.
///
/// The server issues change ids such as `core%2Fsub~main~I1`; existing `%`
/// escapes pass through unchanged while raw unsafe characters (a `/` in a
/// hand-typed `core/sub~main~I1`) are encoded.
pub fn encode_id(id: &str) -> String {
    id.split('%')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("%")
}
