//! Canonical request signatures
//!
//! Two GET requests are interchangeable when their signatures are equal. The
//! signature is an explicit canonical form rather than an incidental
//! serialization:
//! - query parameters are a multiset, so entries are sorted before encoding
//! - header names and values are sorted the same way
//! - JSON bodies are written with object keys sorted, arrays in order, and
//!   every string escaped so that no delimiter can be forged by content

use blake3::Hasher;
use serde_json::Value;
use std::fmt;

use super::request::EndpointRequest;

/// Canonical key of a GET request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    /// Compute the signature of `request` sent to `target`.
    pub fn compute(target: &str, request: &EndpointRequest) -> Self {
        let mut out = String::with_capacity(target.len() + 64);
        out.push_str(request.method.as_str());
        out.push(' ');
        write_string(&mut out, target);

        out.push_str(" headers=");
        let mut headers: Vec<(&str, &str)> = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        headers.sort_unstable();
        write_pairs(&mut out, &headers);

        out.push_str(" query=");
        let mut query: Vec<(&str, &str)> = request.query.iter().collect();
        query.sort_unstable();
        write_pairs(&mut out, &query);

        out.push_str(" body=");
        match &request.body {
            Some(body) => write_value(&mut out, body),
            None => out.push('-'),
        }

        Signature(out)
    }

    /// Canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short blake3 digest, safe to log (the canonical text embeds headers).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.0.as_bytes());
        hasher.finalize().to_hex().as_str()[..16].to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Canonical text of a JSON value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_pairs(out: &mut String, pairs: &[(&str, &str)]) {
    out.push('[');
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push('=');
        write_string(out, value);
    }
    out.push(']');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
