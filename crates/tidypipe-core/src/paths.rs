//! Path resolution helpers shared by the filter, limit and report passes.
//!
//! Paths are compared after resolution: made absolute against an anchor,
//! lexically normalized, and with the longest existing ancestor
//! canonicalized so symlinked roots compare equal whether or not the
//! leaf exists yet.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
///
/// Leading `..` on a relative path are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` to an absolute, normalized form, anchoring relative paths on `anchor`.
pub fn resolve_against(anchor: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        anchor.join(path)
    };
    canonicalize_existing_prefix(&normalize_lexically(&joined))
}

/// Resolve `path` against the process working directory.
pub fn resolve(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    resolve_against(&cwd, path)
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest: Vec<std::ffi::OsString> = Vec::new();
    loop {
        if let Ok(canon) = existing.canonicalize() {
            let mut out = canon;
            for seg in rest.iter().rev() {
                out.push(seg);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// True when `dir` is a strict ancestor of `path`.
///
/// Both sides are expected to be resolved already.
pub fn is_under(path: &Path, dir: &Path) -> bool {
    path != dir && path.starts_with(dir)
}

/// True when `path` lies under any of `dirs`.
pub fn is_under_any<'a, I>(path: &Path, dirs: I) -> bool
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    dirs.into_iter().any(|d| is_under(path, d))
}
