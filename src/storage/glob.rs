//! Glob candidate enumeration
//!
//! Given a query path whose suffix carries wildcard placeholders, walk the
//! remote tree under the longest wildcard-free prefix and produce the concrete
//! paths the host can match its patterns against.

use tracing::debug;

use super::error::StorageError;
use super::path_utils::{join_remote_path, normalize_remote_path};
use crate::ftp::SessionHandle;

/// Characters that start a wildcard placeholder in a query path.
const WILDCARD_CHARS: [char; 3] = ['{', '*', '?'];

/// Longest wildcard-free prefix of a query path.
///
/// A partially-literal component is stripped back to the last `/` before the
/// first wildcard, since only whole components can be walked. Paths without
/// wildcards are returned unchanged.
pub fn constant_prefix(path: &str) -> &str {
    match path.find(WILDCARD_CHARS) {
        None => path,
        Some(idx) => match path[..idx].rfind('/') {
            Some(sep) => &path[..=sep],
            None => "",
        },
    }
}

/// Concrete candidate paths for a wildcard-bearing query path.
///
/// - prefix is a directory: every file under it at any depth, plus every
///   empty directory (which would otherwise be invisible to the walk);
///   non-empty directories are never emitted, only their contents
/// - prefix is a file: exactly the prefix
/// - prefix does not exist: nothing
pub(crate) async fn list_candidates(
    session: &SessionHandle,
    path: &str,
) -> Result<Vec<String>, StorageError> {
    let prefix = constant_prefix(path);
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let prefix = normalize_remote_path(prefix);
    debug!("enumerating candidates under {prefix}");

    let mut candidates = Vec::new();
    if session.is_dir(&prefix).await? {
        collect_candidates(session, &prefix, &mut candidates).await?;
    } else if session.exists(&prefix).await? {
        candidates.push(prefix);
    }
    Ok(candidates)
}

async fn collect_candidates(
    session: &SessionHandle,
    dir: &str,
    out: &mut Vec<String>,
) -> Result<(), StorageError> {
    let entries = session.list_dir(dir).await?;
    if entries.is_empty() {
        // An empty directory cannot be refined further; it stands for itself.
        out.push(dir.to_string());
        return Ok(());
    }
    for entry in entries {
        let child = join_remote_path(dir, &entry.name);
        if entry.is_dir() {
            // Boxed to avoid infinite future size.
            Box::pin(collect_candidates(session, &child, out)).await?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}
