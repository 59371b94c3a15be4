// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Stack-to-package attribution.
//!
//! Walks captured stack frames looking for a `node_modules` path segment,
//! derives the package name (scoped or plain) from the segments after it,
//! and resolves the version from the package's `package.json`. Parsed
//! manifests are cached per package directory for the process lifetime.
//!
//! The engine never raises: every I/O or parse failure collapses to
//! "unresolvable" for that frame and the walk continues.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;

use crate::signal::PackageIdentity;
use crate::stack::CallStack;

const MANIFEST_FILE: &str = "package.json";
const NODE_MODULES: &str = "node_modules";

/// The subset of `package.json` the monitor reads.
#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    #[serde(default)]
    version: Option<String>,
}

/// Resolves captured stacks to package identities, with a process-lifetime
/// manifest cache keyed by absolute package directory.
pub struct AttributionEngine {
    cache: Mutex<HashMap<PathBuf, Manifest>>,
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributionEngine {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Attribute a captured stack to the first resolvable third-party
    /// package, or `None` for first-party / unresolvable stacks.
    pub fn attribute(&self, stack: &CallStack) -> Option<PackageIdentity> {
        for frame in stack.frames() {
            let Some((name, package_dir)) = split_package_path(&frame.file) else {
                // No node_modules segment: first-party frame.
                continue;
            };
            match self.manifest_for(&package_dir) {
                Some(manifest) => {
                    return Some(PackageIdentity {
                        name,
                        version: manifest
                            .version
                            .unwrap_or_else(|| "unknown".to_string()),
                        path: package_dir,
                    });
                }
                // Missing or malformed manifest: unresolvable for this
                // frame, keep walking.
                None => continue,
            }
        }
        None
    }

    /// Number of cached package directories (diagnostics only).
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn manifest_for(&self, package_dir: &Path) -> Option<Manifest> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(manifest) = cache.get(package_dir) {
                return Some(manifest.clone());
            }
        }

        let manifest_path = package_dir.join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(path = %manifest_path.display(), %err, "manifest read failed");
                return None;
            }
        };
        let manifest: Manifest = match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::debug!(path = %manifest_path.display(), %err, "manifest parse failed");
                return None;
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(package_dir.to_path_buf(), manifest.clone());
        }
        Some(manifest)
    }
}

/// Extract `(package name, package directory)` from a source file path.
///
/// Uses the rightmost `node_modules` segment; a leading `@` segment makes
/// the name scoped (`@scope/name` joins two segments). Returns `None` when
/// the path has no `node_modules` segment or the name segments are missing.
fn split_package_path(file: &Path) -> Option<(String, PathBuf)> {
    let components: Vec<Component<'_>> = file.components().collect();
    let nm_index = components.iter().rposition(|c| match c {
        Component::Normal(seg) => *seg == NODE_MODULES,
        _ => false,
    })?;

    let segment = |index: usize| -> Option<&str> {
        match components.get(index) {
            Some(Component::Normal(seg)) => seg.to_str(),
            _ => None,
        }
    };

    let first = segment(nm_index + 1)?;
    let (name, name_end) = if first.starts_with('@') {
        let second = segment(nm_index + 2)?;
        (format!("{first}/{second}"), nm_index + 2)
    } else {
        (first.to_string(), nm_index + 1)
    };

    let package_dir: PathBuf = components[..=name_end].iter().collect();
    Some((name, package_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), body).unwrap();
    }

    fn stack_of(file: PathBuf) -> CallStack {
        CallStack::from_files([file])
    }

    #[test]
    fn test_plain_package_attribution() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/left-pad");
        write_manifest(&pkg_dir, r#"{"name":"left-pad","version":"1.3.0"}"#);

        let engine = AttributionEngine::new();
        let identity = engine
            .attribute(&stack_of(pkg_dir.join("index.js")))
            .unwrap();
        assert_eq!(identity.name, "left-pad");
        assert_eq!(identity.version, "1.3.0");
        assert_eq!(identity.path, pkg_dir);
    }

    #[test]
    fn test_scoped_package_attribution() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/@acme/lib");
        write_manifest(&pkg_dir, r#"{"version":"2.0.1"}"#);

        let engine = AttributionEngine::new();
        let identity = engine
            .attribute(&stack_of(pkg_dir.join("dist/main.js")))
            .unwrap();
        assert_eq!(identity.name, "@acme/lib");
        assert_eq!(identity.version, "2.0.1");
    }

    #[test]
    fn test_rightmost_node_modules_wins() {
        let root = tempfile::tempdir().unwrap();
        let outer = root.path().join("node_modules/outer");
        let inner = outer.join("node_modules/inner");
        write_manifest(&outer, r#"{"version":"1.0.0"}"#);
        write_manifest(&inner, r#"{"version":"9.9.9"}"#);

        let engine = AttributionEngine::new();
        let identity = engine.attribute(&stack_of(inner.join("index.js"))).unwrap();
        assert_eq!(identity.name, "inner");
        assert_eq!(identity.version, "9.9.9");
    }

    #[test]
    fn test_first_party_frames_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/dep");
        write_manifest(&pkg_dir, r#"{"version":"0.1.0"}"#);

        let engine = AttributionEngine::new();
        let stack = CallStack::from_files([
            root.path().join("src/app.js"),
            pkg_dir.join("index.js"),
        ]);
        let identity = engine.attribute(&stack).unwrap();
        assert_eq!(identity.name, "dep");
    }

    #[test]
    fn test_pure_first_party_stack_is_absent() {
        let engine = AttributionEngine::new();
        let stack = CallStack::from_files(["/app/src/main.js", "/app/src/util.js"]);
        assert!(engine.attribute(&stack).is_none());
    }

    #[test]
    fn test_missing_version_defaults_to_unknown() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/no-version");
        write_manifest(&pkg_dir, r#"{"name":"no-version"}"#);

        let engine = AttributionEngine::new();
        let identity = engine.attribute(&stack_of(pkg_dir.join("a.js"))).unwrap();
        assert_eq!(identity.version, "unknown");
    }

    #[test]
    fn test_malformed_manifest_falls_through_to_next_frame() {
        let root = tempfile::tempdir().unwrap();
        let broken = root.path().join("node_modules/broken");
        let good = root.path().join("node_modules/good");
        write_manifest(&broken, "{not json");
        write_manifest(&good, r#"{"version":"3.0.0"}"#);

        let engine = AttributionEngine::new();
        let stack = CallStack::from_files([broken.join("index.js"), good.join("index.js")]);
        let identity = engine.attribute(&stack).unwrap();
        assert_eq!(identity.name, "good");
    }

    #[test]
    fn test_missing_manifest_is_unresolvable() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/ghost");
        fs::create_dir_all(&pkg_dir).unwrap();

        let engine = AttributionEngine::new();
        assert!(engine.attribute(&stack_of(pkg_dir.join("index.js"))).is_none());
    }

    #[test]
    fn test_cache_survives_manifest_deletion() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("node_modules/cached");
        write_manifest(&pkg_dir, r#"{"version":"1.2.3"}"#);

        let engine = AttributionEngine::new();
        let first = engine.attribute(&stack_of(pkg_dir.join("a.js"))).unwrap();
        assert_eq!(first.version, "1.2.3");
        assert_eq!(engine.cache_len(), 1);

        fs::remove_file(pkg_dir.join("package.json")).unwrap();
        let second = engine.attribute(&stack_of(pkg_dir.join("b.js"))).unwrap();
        assert_eq!(second.version, "1.2.3");
    }

    #[test]
    fn test_bare_node_modules_with_no_package_segment() {
        let engine = AttributionEngine::new();
        assert!(engine
            .attribute(&stack_of(PathBuf::from("/app/node_modules")))
            .is_none());
    }
}
