//! Configuration document, snapshot and store.
//!
//! ```text
//! config.json
//!     → ConfigDocument (nested JSON tree, dotted-path access)
//!     → Snapshot (document + derived credentials/mounts/protect/redirects)
//!     → ArcSwap<Snapshot> (atomic replace on reload)
//! ```
//!
//! A request loads the live snapshot once and works against it for its whole
//! lifetime; a reload builds a complete new snapshot and swaps it in as a
//! single unit. A malformed or missing file on reload keeps the previous
//! snapshot; the server never serves with a half-applied configuration.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::auth::{self, ProtectSet};
use crate::error::HostError;
use crate::mounts::MountTable;

/// Credential pair used when `user` or `password` is absent.
pub const DEFAULT_CREDENTIALS: (&str, &str) = ("admin", "password");

/// Nested key-value document with dotted-path access.
///
/// `get("display.col1-spacing")` descends the tree one dot-separated key at
/// a time; any missing intermediate or wrong-shaped value yields `None`
/// rather than an error, so callers always supply their own defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

impl ConfigDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return Some(&self.root);
        }
        let mut current = &self.root;
        for part in key.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Set a dotted key, materializing intermediate objects as needed and
    /// overwriting non-object values in the way.
    pub fn set(&mut self, key: &str, value: Value) {
        if key.is_empty() {
            if value.is_object() {
                self.root = value;
            }
            return;
        }
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(last) = parts.pop() else { return };

        let mut current = &mut self.root;
        for part in parts {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map.entry(part.to_string()).or_insert(Value::Null),
                _ => return,
            };
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
    }
}

/// Immutable view of the configuration plus the fields derived from it once
/// per reload. Requests read one snapshot; they never see a mix of old and
/// new values.
#[derive(Debug)]
pub struct Snapshot {
    document: ConfigDocument,
    credentials: String,
    protect: ProtectSet,
    mounts: MountTable,
    redirects: HashMap<String, String>,
}

impl Snapshot {
    pub fn from_document(document: ConfigDocument) -> Self {
        let user = document.get("user").and_then(Value::as_str);
        let password = document.get("password").and_then(Value::as_str);
        let credentials = match (user, password) {
            (Some(user), Some(password)) => auth::encode_credentials(user, password),
            _ => auth::encode_credentials(DEFAULT_CREDENTIALS.0, DEFAULT_CREDENTIALS.1),
        };

        let protect = ProtectSet::from_value(document.get("protect"));
        let mounts = MountTable::from_contents(document.get("contents"));
        let redirects = document
            .get("redirect-flow")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(from, to)| to.as_str().map(|to| (from.clone(), to.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            document,
            credentials,
            protect,
            mounts,
            redirects,
        }
    }

    pub fn from_value(root: Value) -> Self {
        Self::from_document(ConfigDocument::new(root))
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Encoded `base64(user:password)` authorization token.
    pub fn credentials(&self) -> &str {
        &self.credentials
    }

    pub fn protect(&self) -> &ProtectSet {
        &self.protect
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn redirects(&self) -> &HashMap<String, String> {
        &self.redirects
    }

    pub fn watchdog(&self) -> bool {
        self.document.get_bool("watchdog", true)
    }

    pub fn enable_put(&self) -> bool {
        self.document.get_bool("enable-put", true)
    }

    pub fn query_auth(&self) -> bool {
        self.document.get_bool("query-auth", false)
    }

    pub fn host(&self) -> String {
        self.document.get_str("host", "0.0.0.0")
    }

    pub fn port(&self) -> u16 {
        self.document.get_u64("port", 9800) as u16
    }
}

/// What a reload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot was swapped in.
    Applied,
    /// The file was unreadable or malformed; the previous snapshot stays.
    Retained,
}

/// Holder of the live configuration snapshot.
pub struct ConfigStore {
    path: PathBuf,
    live: ArcSwap<Snapshot>,
}

impl ConfigStore {
    /// Open the store against a config file path. A missing file is
    /// materialized with the built-in defaults before the first load, so a
    /// fresh install starts from a file the operator can edit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        if !path.is_file() {
            info!(path = %path.display(), "no config file, writing defaults");
            let rendered = serde_json::to_string_pretty(&default_document())?;
            fs::write(&path, rendered)?;
        }

        let document = match read_document(&path) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "config file unreadable at startup, using defaults");
                ConfigDocument::new(default_document())
            }
        };

        Ok(Self {
            live: ArcSwap::from_pointee(Snapshot::from_document(document)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The live snapshot. Cheap; loaded once per request.
    pub fn current(&self) -> Arc<Snapshot> {
        self.live.load_full()
    }

    /// Re-read the config file and atomically swap in a new snapshot. On
    /// any failure the previous snapshot is retained and the server keeps
    /// serving with it.
    pub fn reload(&self) -> ReloadOutcome {
        match read_document(&self.path) {
            Ok(document) => {
                self.live.store(Arc::new(Snapshot::from_document(document)));
                info!(path = %self.path.display(), "configuration reloaded");
                ReloadOutcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "reload failed, keeping previous configuration");
                ReloadOutcome::Retained
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.current().document().get(key).cloned()
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.current().document().get_str(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.current().document().get_u64(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.current().document().get_bool(key, default)
    }

    /// Update one dotted key. The whole snapshot is rebuilt from the edited
    /// document so the derived fields can never drift from the tree.
    pub fn set(&self, key: &str, value: Value) {
        let mut document = self.current().document().clone();
        document.set(key, value);
        self.live.store(Arc::new(Snapshot::from_document(document)));
    }
}

fn read_document(path: &Path) -> Result<ConfigDocument, HostError> {
    let content = fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&content)?;
    Ok(ConfigDocument::new(root))
}

fn default_document() -> Value {
    json!({
        "user": "admin",
        "password": "password",
        "protect": ["put"],
        "contents": { "": "./files" },
        "redirect-flow": {},
        "watchdog": true,
        "enable-put": true,
        "query-auth": false,
        "host": "0.0.0.0",
        "port": 9800,
        "display": {
            "col1-spacing": 48,
            "col2-spacing": 12,
            "humanize-size": true,
            "gnu-style-size": false,
            "auto-dark-theme": true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Operation;
    use serde_json::json;
    use std::thread;

    #[test]
    fn dotted_get_descends_nesting() {
        let doc = ConfigDocument::new(json!({
            "display": { "col1-spacing": 40, "humanize-size": true },
            "port": 9800
        }));
        assert_eq!(doc.get_u64("display.col1-spacing", 0), 40);
        assert!(doc.get_bool("display.humanize-size", false));
        assert_eq!(doc.get_u64("port", 0), 9800);
    }

    #[test]
    fn missing_keys_yield_the_default() {
        let doc = ConfigDocument::new(json!({ "display": { "col1-spacing": 40 } }));
        assert_eq!(doc.get_u64("display.col2-spacing", 12), 12);
        assert_eq!(doc.get_u64("no.such.path", 7), 7);
        assert_eq!(doc.get_str("display.col1-spacing", "x"), "x"); // wrong shape
    }

    #[test]
    fn dotted_set_materializes_intermediates() {
        let mut doc = ConfigDocument::default();
        doc.set("display.col1-spacing", json!(64));
        assert_eq!(doc.get_u64("display.col1-spacing", 0), 64);

        // A scalar in the way is replaced by an object.
        doc.set("display.col1-spacing.nested", json!("deep"));
        assert_eq!(doc.get_str("display.col1-spacing.nested", ""), "deep");
    }

    #[test]
    fn snapshot_derives_credentials_and_protect() {
        let snap = Snapshot::from_value(json!({
            "user": "alice",
            "password": "secret",
            "protect": ["get", "index"]
        }));
        assert_eq!(snap.credentials(), auth::encode_credentials("alice", "secret"));
        assert!(snap.protect().requires_auth(Operation::Get));
        assert!(!snap.protect().requires_auth(Operation::Put));
    }

    #[test]
    fn first_open_materializes_defaults_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(&path).unwrap();

        assert!(path.is_file());
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["user"], "admin");
        assert_eq!(written["protect"], json!(["put"]));

        let snap = store.current();
        assert!(snap.watchdog());
        assert_eq!(snap.port(), 9800);
    }

    #[test]
    fn malformed_reload_retains_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            json!({ "user": "alice", "password": "pw", "protect": ["get"],
                    "contents": { "docs": "/srv/docs" } })
            .to_string(),
        )
        .unwrap();
        let store = ConfigStore::open(&path).unwrap();
        let before = store.current();

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(store.reload(), ReloadOutcome::Retained);

        let after = store.current();
        assert_eq!(after.credentials(), before.credentials());
        assert!(after.mounts().resolve("/docs/x").is_some());
        assert!(after.protect().requires_auth(Operation::Get));
    }

    #[test]
    fn reload_applies_a_complete_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json!({ "user": "a", "password": "1" }).to_string()).unwrap();
        let store = ConfigStore::open(&path).unwrap();

        fs::write(
            &path,
            json!({ "user": "b", "password": "2", "protect": [] }).to_string(),
        )
        .unwrap();
        assert_eq!(store.reload(), ReloadOutcome::Applied);
        let snap = store.current();
        assert_eq!(snap.credentials(), auth::encode_credentials("b", "2"));
        assert!(!snap.protect().requires_auth(Operation::Put));
    }

    #[test]
    fn set_rebuilds_derived_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json!({ "user": "a", "password": "1" }).to_string()).unwrap();
        let store = ConfigStore::open(&path).unwrap();

        store.set("contents", json!({ "docs": "/srv/docs" }));
        assert!(store.current().mounts().resolve("/docs/x").is_some());
        assert_eq!(store.get_str("user", ""), "a");
    }

    // Interleaved reload + lookup: a reader must never observe a snapshot
    // mixing fields from the two configurations.
    #[test]
    fn concurrent_readers_never_see_a_torn_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config_a =
            json!({ "user": "alice", "password": "pw", "protect": ["get"] }).to_string();
        let config_b =
            json!({ "user": "bob", "password": "pw", "protect": ["put", "index"] }).to_string();

        fs::write(&path, &config_a).unwrap();
        let store = Arc::new(ConfigStore::open(&path).unwrap());

        let alice = auth::encode_credentials("alice", "pw");
        let bob = auth::encode_credentials("bob", "pw");

        let writer = {
            let store = store.clone();
            let path = path.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let doc = if i % 2 == 0 { &config_b } else { &config_a };
                    fs::write(&path, doc).unwrap();
                    store.reload();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let alice = alice.clone();
                let bob = bob.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = store.current();
                        let get = snap.protect().requires_auth(Operation::Get);
                        let put = snap.protect().requires_auth(Operation::Put);
                        let index = snap.protect().requires_auth(Operation::Index);
                        if snap.credentials() == alice {
                            assert!(get && !put && !index, "alice paired with bob's protect");
                        } else if snap.credentials() == bob {
                            assert!(!get && put && index, "bob paired with alice's protect");
                        } else {
                            panic!("unknown credentials in snapshot");
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
