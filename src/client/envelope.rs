//! Response envelope normalization
//!
//! The review server prefixes JSON payloads with `)]}'` to defeat cross-site
//! script inclusion. Bodies are normalized by removing that prefix (when
//! present) and trimming; decoding is only attempted after a status check.

use serde::de::DeserializeOwned;

use super::error::{RequestError, RequestResult};

/// Literal prefix emitted in front of every JSON response.
pub const MAGIC_PREFIX: &str = ")]}'";

/// Raw HTTP response as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl Envelope {
    /// Build an envelope from a status code and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Status in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body with the magic prefix removed and whitespace trimmed.
    pub fn normalized(&self) -> &str {
        normalize(&self.body)
    }

    /// Fail with [`RequestError::Status`] unless the status is successful.
    pub fn check_status(&self) -> RequestResult<&Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RequestError::Status {
                status: self.status,
                body: self.normalized().to_owned(),
            })
        }
    }

    /// Status check followed by JSON decoding of the normalized body.
    pub fn json<T: DeserializeOwned>(&self) -> RequestResult<T> {
        decode(self.check_status()?.normalized())
    }
}

/// Strip the magic prefix if the body starts with it, then trim.
///
/// Repeated prefixes are all removed so that
/// `normalize(normalize(x)) == normalize(x)` holds for every input.
pub fn normalize(raw: &str) -> &str {
    let mut text = raw.trim_start();
    while let Some(rest) = text.strip_prefix(MAGIC_PREFIX) {
        text = rest.trim_start();
    }
    text.trim_end()
}

/// Parse normalized text as `T`.
pub fn decode<T: DeserializeOwned>(text: &str) -> RequestResult<T> {
    serde_json::from_str(text).map_err(|err| RequestError::Envelope {
        reason: err.to_string(),
        text: text.to_owned(),
    })
}
