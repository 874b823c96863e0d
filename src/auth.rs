//! Operation gating and credential checks.
//!
//! Operations are `get`, `put` and `index`; the config's `protect` list
//! (or its `all` wildcard) decides which of them require credentials.
//! Comparison is byte-exact on the encoded `base64(user:password)` token,
//! never on a decoded pair.

use std::collections::HashSet;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use tracing::warn;

use crate::config::Snapshot;

/// Request operation classes subject to protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Put,
    Index,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Put => "put",
            Operation::Index => "index",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Operation::Get),
            "put" => Some(Operation::Put),
            "index" => Some(Operation::Index),
            _ => None,
        }
    }
}

/// The set of operations that require credentials.
#[derive(Debug, Clone, Default)]
pub struct ProtectSet {
    all: bool,
    ops: HashSet<Operation>,
}

impl ProtectSet {
    /// Build from the config's `protect` value. A missing or wrong-shaped
    /// value falls back to protecting `put`, matching the shipped default;
    /// an explicit empty list protects nothing.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Array(items)) = value else {
            return Self {
                all: false,
                ops: HashSet::from([Operation::Put]),
            };
        };
        let mut set = Self::default();
        for item in items {
            match item.as_str() {
                Some("all") => set.all = true,
                Some(name) => match Operation::from_name(name) {
                    Some(op) => {
                        set.ops.insert(op);
                    }
                    None => warn!(name = %name, "unknown operation in protect list, ignoring"),
                },
                None => warn!("non-string entry in protect list, ignoring"),
            }
        }
        set
    }

    pub fn requires_auth(&self, op: Operation) -> bool {
        self.all || self.ops.contains(&op)
    }

    /// Names of the protected operations, for startup logging.
    pub fn names(&self) -> Vec<&'static str> {
        if self.all {
            return vec!["all"];
        }
        let mut names: Vec<_> = self.ops.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names
    }
}

/// Encode a credential pair into the comparable authorization token.
pub fn encode_credentials(user: &str, password: &str) -> String {
    BASE64.encode(format!("{user}:{password}"))
}

/// Decide whether `op` may proceed for a request carrying `headers` and,
/// optionally, an `auth` query parameter.
///
/// Unprotected operations pass unconditionally. Protected ones accept a
/// `Basic` Authorization header whose payload equals the stored token, or
/// the query parameter's raw value once base64-encoded, when the
/// `query-auth` flag allows it.
pub fn authorize(
    snapshot: &Snapshot,
    op: Operation,
    headers: &HeaderMap,
    query_auth: Option<&str>,
) -> bool {
    if !snapshot.protect().requires_auth(op) {
        return true;
    }

    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(payload) = value.strip_prefix("Basic ") {
            if payload == snapshot.credentials() {
                return true;
            }
        }
    }

    if snapshot.query_auth() {
        if let Some(raw) = query_auth {
            if BASE64.encode(raw) == snapshot.credentials() {
                return true;
            }
        }
    }

    false
}

const BROWSER_TOKENS: [&str; 4] = ["Chrome", "Mozilla", "Safari", "Opera"];

/// Whether the request comes from an interactive browser. Browsers get HTML
/// bodies and a `WWW-Authenticate` challenge; programmatic clients get JSON
/// and a bare 401 so they are never stuck in a credential prompt.
pub fn is_browser(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| BROWSER_TOKENS.iter().any(|token| ua.contains(token)))
        .unwrap_or(false)
}
