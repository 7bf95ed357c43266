//! Path canonicalization for store keys.
//!
//! In memory, entries are keyed by absolute, lexically normalized paths. On
//! disk they are stored relative to the store file's directory with `/`
//! separators, so the database can be committed and moved between checkouts.

use std::path::{Component, Path, PathBuf};

use contentcurator_shared::{CurationError, Result};

/// Make a path absolute (against the working directory) and resolve `.` and
/// `..` lexically. The path does not need to exist.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| CurationError::io(path, e))?;
    Ok(clean(&absolute))
}

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonical in-memory key for a path.
pub fn canonical_key(path: &Path) -> Result<String> {
    Ok(normalize_path(path)?.to_string_lossy().into_owned())
}

/// Express `path` relative to `base`, `/`-separated. Both must be absolute and
/// normalized. Paths on a different root (e.g. another drive) stay absolute.
pub fn relative_key(path: &Path, base: &Path) -> String {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    if path_parts.first() != base_parts.first() {
        return path.to_string_lossy().into_owned();
    }

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat_n("..".to_string(), base_parts.len() - common)
        .collect();
    parts.extend(
        path_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Rehydrate a stored key against the store directory.
pub fn absolute_key(stored: &str, base: &Path) -> String {
    let stored_path = Path::new(stored);
    let joined = if stored_path.is_absolute() {
        stored_path.to_path_buf()
    } else {
        base.join(stored_path)
    };
    clean(&joined).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn clean_resolves_dots() {
        assert_eq!(
            clean(Path::new("/repo/./docs/../guides/a.md")),
            PathBuf::from("/repo/guides/a.md")
        );
        assert_eq!(clean(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[cfg(unix)]
    #[test]
    fn relative_keys() {
        let base = Path::new("/repo/content");
        assert_eq!(relative_key(Path::new("/repo/content/docs/a.md"), base), "docs/a.md");
        assert_eq!(relative_key(Path::new("/repo/blog/b.md"), base), "../blog/b.md");
        assert_eq!(relative_key(Path::new("/repo/content"), base), ".");
    }

    #[cfg(unix)]
    #[test]
    fn absolute_keys() {
        let base = Path::new("/srv/site");
        assert_eq!(absolute_key("docs/a.md", base), "/srv/site/docs/a.md");
        assert_eq!(absolute_key("../blog/b.md", base), "/srv/blog/b.md");
        assert_eq!(absolute_key("/elsewhere/c.md", base), "/elsewhere/c.md");
    }

    #[test]
    fn normalize_makes_absolute() {
        let p = normalize_path(Path::new("docs/./a.md")).expect("normalize");
        assert!(p.is_absolute());
        assert!(p.ends_with("docs/a.md"));
    }
}
