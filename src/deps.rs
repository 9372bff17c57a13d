//! Dependency health checker.
//!
//! Two independent advisory checks, triggered after every accepted code
//! execution and on explicit `deps:validate` commands:
//!
//! 1. **Staleness** — the installed dependency state no longer matches the
//!    declared manifest; signalled as a `deps:validate:response` with no
//!    package list ("please reinstall").
//! 2. **Undeclared usage** — session code imports packages the manifest never
//!    declares; signalled with the list of missing package names.
//!
//! Both checks are fallible in isolation: a failure is logged with the
//! session id and never affects the triggering command or the other check.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::events::{DepsValidateResponsePayload, Notification};
use crate::channel::EventBus;
use crate::models::Session;
use crate::store::MANIFEST_FILENAME;
use crate::{AppError, Result};

/// Node builtins that never count as undeclared packages.
const BUILTIN_MODULES: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net", "os",
    "path", "process", "readline", "stream", "timers", "tls", "url", "util", "zlib",
];

/// File extensions scanned for imports.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts"];

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(
            r#"(?m)^\s*(?:import\s[^'"]*?from\s*|import\s*|export\s[^'"]*?from\s*)["']([^"']+)["']"#,
        )
        .expect("static import regex")
    })
}

fn require_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r#"require\(\s*["']([^"']+)["']\s*\)"#).expect("static require regex")
    })
}

/// Whether the installed state looks out of date for `dir`.
///
/// Returns `true` when the manifest exists but `node_modules` is missing,
/// the lockfile is missing, or the manifest is newer than the lockfile.
///
/// # Errors
///
/// Returns `AppError::Io` when file metadata cannot be read.
pub fn install_needed(dir: &Path) -> Result<bool> {
    let manifest = dir.join(MANIFEST_FILENAME);
    if !manifest.exists() {
        return Ok(false);
    }
    if !dir.join("node_modules").exists() {
        return Ok(true);
    }

    let lockfile = dir.join("package-lock.json");
    if !lockfile.exists() {
        return Ok(true);
    }

    let manifest_mtime = std::fs::metadata(&manifest)?.modified()?;
    let lockfile_mtime = std::fs::metadata(&lockfile)?.modified()?;
    Ok(manifest_mtime > lockfile_mtime)
}

/// Scan `dir` for imports of packages absent from the manifest.
///
/// Relative and builtin imports are ignored; scoped package names keep their
/// first two segments, everything else the first. The result is sorted and
/// deduplicated.
///
/// # Errors
///
/// Returns `AppError::Io` when the directory cannot be read, or
/// `AppError::Deps` when the manifest is not valid JSON.
pub fn undeclared_imports(dir: &Path) -> Result<Vec<String>> {
    let declared = declared_packages(dir)?;
    let mut missing = BTreeSet::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_script = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
        if !is_script {
            continue;
        }

        let source = std::fs::read_to_string(&path)?;
        for captures in import_regex()
            .captures_iter(&source)
            .chain(require_regex().captures_iter(&source))
        {
            if let Some(spec) = captures.get(1) {
                if let Some(package) = bare_package_name(spec.as_str()) {
                    if !declared.contains(&package) {
                        missing.insert(package);
                    }
                }
            }
        }
    }

    Ok(missing.into_iter().collect())
}

/// Packages declared in the manifest's dependency tables.
fn declared_packages(dir: &Path) -> Result<BTreeSet<String>> {
    let manifest_path = dir.join(MANIFEST_FILENAME);
    if !manifest_path.exists() {
        return Ok(BTreeSet::new());
    }

    let text = std::fs::read_to_string(&manifest_path)?;
    let manifest: serde_json::Value = serde_json::from_str(&text)
        .map_err(|err| AppError::Deps(format!("invalid manifest: {err}")))?;

    let mut declared = BTreeSet::new();
    for table in ["dependencies", "devDependencies"] {
        if let Some(map) = manifest.get(table).and_then(|v| v.as_object()) {
            declared.extend(map.keys().cloned());
        }
    }
    Ok(declared)
}

/// Extract the package name from an import specifier, if it is a bare one.
fn bare_package_name(spec: &str) -> Option<String> {
    if spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    let spec = spec.strip_prefix("node:").unwrap_or(spec);

    let package = if spec.starts_with('@') {
        spec.splitn(3, '/').take(2).collect::<Vec<_>>().join("/")
    } else {
        spec.split('/').next().unwrap_or(spec).to_owned()
    };

    if BUILTIN_MODULES.contains(&package.as_str()) {
        None
    } else {
        Some(package)
    }
}

/// Run both health checks for `session`, broadcasting advisory responses.
///
/// Each check is isolated: a failure is logged and the other check still
/// runs. The scans touch the file system, so they run on the blocking pool.
pub async fn run_checks(session: &Session, bus: &EventBus) {
    let session_id = session.id.clone();
    let dir = session.dir.clone();

    let stale = tokio::task::spawn_blocking({
        let dir = dir.clone();
        move || install_needed(&dir)
    })
    .await;
    match stale {
        Ok(Ok(true)) => {
            bus.publish(
                &session_id,
                Notification::DepsValidateResponse(DepsValidateResponsePayload { packages: None }),
            );
        }
        Ok(Ok(false)) => debug!(session_id, "installed dependencies look current"),
        Ok(Err(err)) => warn!(session_id, %err, "staleness check failed"),
        Err(err) => warn!(session_id, %err, "staleness check panicked"),
    }

    let missing = tokio::task::spawn_blocking(move || undeclared_imports(&dir)).await;
    match missing {
        Ok(Ok(missing)) if !missing.is_empty() => {
            bus.publish(
                &session_id,
                Notification::DepsValidateResponse(DepsValidateResponsePayload {
                    packages: Some(missing),
                }),
            );
        }
        Ok(Ok(_)) => debug!(session_id, "no undeclared imports found"),
        Ok(Err(err)) => warn!(session_id, %err, "undeclared-import scan failed"),
        Err(err) => warn!(session_id, %err, "undeclared-import scan panicked"),
    }
}

/// Fire-and-forget dependency nudge, spawned after every accepted execution.
///
/// Owns its own failure handling so the primary command path never waits on
/// it or sees its errors.
pub fn spawn_nudge(session: Session, bus: EventBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_checks(&session, &bus).await;
    })
}
