//! URL-prefix mount table.
//!
//! Each mount binds a URL-path prefix ("key") to a filesystem base
//! directory. The table is rebuilt wholesale from the `contents` section on
//! every reload and is immutable afterwards; resolution walks the entries
//! longest key first so the most specific prefix always wins.

use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

/// A configured binding of a URL-path prefix to a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub key: String,
    pub base: PathBuf,
}

/// Outcome of mount resolution: the owning mount and what is left of the
/// request path once the key prefix is stripped.
#[derive(Debug, PartialEq, Eq)]
pub struct MountMatch<'a> {
    pub mount: &'a Mount,
    pub relative: String,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    /// Build the table from the config's `contents` object. Keys lose their
    /// leading/trailing slashes; `~` in a directory expands to the user's
    /// home. Non-string directory values are skipped with a warning.
    pub fn from_contents(contents: Option<&Value>) -> Self {
        let mut mounts = Vec::new();
        if let Some(Value::Object(map)) = contents {
            for (key, dir) in map {
                let Some(dir) = dir.as_str() else {
                    warn!(key = %key, "mount directory is not a string, skipping");
                    continue;
                };
                mounts.push(Mount {
                    key: key.trim_matches('/').to_string(),
                    base: expand_home(dir),
                });
            }
        }
        // Longest key first; the empty catch-all key sorts last and so
        // matches only when nothing more specific does.
        mounts.sort_by(|a, b| b.key.len().cmp(&a.key.len()));
        Self { mounts }
    }

    /// Resolve a request path to its owning mount and remaining relative
    /// path, or `None` when no key is a prefix of the path.
    pub fn resolve(&self, url_path: &str) -> Option<MountMatch<'_>> {
        let path = url_path.trim_start_matches('/');
        self.mounts
            .iter()
            .find(|m| path.starts_with(&m.key))
            .map(|mount| MountMatch {
                mount,
                relative: path[mount.key.len()..].trim_start_matches('/').to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

fn expand_home(dir: &str) -> PathBuf {
    if dir == "~" || dir.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(dir.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(contents: Value) -> MountTable {
        MountTable::from_contents(Some(&contents))
    }

    #[test]
    fn longest_key_wins() {
        let t = table(json!({ "a": "/srv/a", "a/b": "/srv/b" }));
        let m = t.resolve("/a/b/file.txt").unwrap();
        assert_eq!(m.mount.base, PathBuf::from("/srv/b"));
        assert_eq!(m.relative, "file.txt");

        let m = t.resolve("/a/c/file.txt").unwrap();
        assert_eq!(m.mount.base, PathBuf::from("/srv/a"));
        assert_eq!(m.relative, "c/file.txt");
    }

    #[test]
    fn empty_key_is_the_catch_all() {
        let t = table(json!({ "": "/srv/root", "docs": "/srv/docs" }));
        let m = t.resolve("/anything/else").unwrap();
        assert_eq!(m.mount.base, PathBuf::from("/srv/root"));
        assert_eq!(m.relative, "anything/else");

        let m = t.resolve("/docs/readme.md").unwrap();
        assert_eq!(m.mount.base, PathBuf::from("/srv/docs"));
        assert_eq!(m.relative, "readme.md");
    }

    #[test]
    fn no_match_without_catch_all() {
        let t = table(json!({ "docs": "/srv/docs" }));
        assert!(t.resolve("/images/logo.png").is_none());
    }

    #[test]
    fn keys_lose_surrounding_slashes() {
        let t = table(json!({ "/docs/": "/srv/docs" }));
        let m = t.resolve("/docs/a.txt").unwrap();
        assert_eq!(m.mount.key, "docs");
        assert_eq!(m.relative, "a.txt");
    }

    #[test]
    fn mount_root_resolves_to_empty_relative() {
        let t = table(json!({ "docs": "/srv/docs" }));
        let m = t.resolve("/docs").unwrap();
        assert_eq!(m.relative, "");
        let m = t.resolve("/docs/").unwrap();
        assert_eq!(m.relative, "");
    }

    #[test]
    fn non_string_directories_are_skipped() {
        let t = table(json!({ "docs": 42, "ok": "/srv/ok" }));
        assert!(t.resolve("/docs/x").is_none());
        assert!(t.resolve("/ok/x").is_some());
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            let t = table(json!({ "h": "~/shared" }));
            let m = t.resolve("/h/x").unwrap();
            assert_eq!(m.mount.base, home.join("shared"));
        }
    }
}
