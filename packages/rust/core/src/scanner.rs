//! Discovery of managed documents on disk.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use contentcurator_shared::{ContentConfig, CurationError, Result};
use contentcurator_storage::normalize_path;

/// Finds documents under a base directory by include/exclude globs and
/// reads or writes their text.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    base_dir: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl ContentScanner {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        Ok(Self {
            base_dir: normalize_path(Path::new(&config.base_dir))?,
            include: build_globset(&config.include)?,
            exclude: build_globset(&config.exclude)?,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute paths of every matching file, sorted.
    pub async fn scan_content(&self) -> Result<Vec<PathBuf>> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan_blocking())
            .await
            .map_err(|e| CurationError::validation(format!("scan task failed: {e}")))?
    }

    fn scan_blocking(&self) -> Result<Vec<PathBuf>> {
        if !self.base_dir.is_dir() {
            return Err(CurationError::validation(format!(
                "content directory does not exist: {}",
                self.base_dir.display()
            )));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&self.base_dir) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                CurationError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path
                .strip_prefix(&self.base_dir)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if self.exclude.is_match(&relative) || !self.include.is_match(&relative) {
                continue;
            }
            found.push(path.to_path_buf());
        }

        found.sort();
        debug!(base = %self.base_dir.display(), files = found.len(), "content scanned");
        Ok(found)
    }

    pub async fn read_content(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CurationError::io(path, e))
    }

    /// Replace a document's text, writing through a temporary sibling file.
    pub async fn write_content(&self, path: &Path, text: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| CurationError::validation(format!("not a file path: {}", path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".curating");
        let tmp = path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| CurationError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CurationError::io(path, e))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CurationError::config(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CurationError::config(format!("invalid glob set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fixture() -> PathBuf {
        let root = std::env::temp_dir().join(format!("cc_scan_{}", Uuid::now_v7()));
        for rel in [
            "index.md",
            "guides/setup.mdx",
            "guides/notes.txt",
            "node_modules/pkg/readme.md",
            "blog/2024/post.md",
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("# {rel}\n")).unwrap();
        }
        root
    }

    fn scanner(root: &Path) -> ContentScanner {
        ContentScanner::new(&ContentConfig {
            base_dir: root.to_string_lossy().into_owned(),
            ..ContentConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn scans_with_include_and_exclude() {
        let root = fixture();
        let found = scanner(&root).scan_content().await.unwrap();
        let rel: Vec<String> = found
            .iter()
            .map(|p| {
                p.strip_prefix(&root)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        assert_eq!(rel, vec!["blog/2024/post.md", "guides/setup.mdx", "index.md"]);
        assert!(found.iter().all(|p| p.is_absolute()));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn missing_base_dir_is_an_error() {
        let root = std::env::temp_dir().join(format!("cc_scan_missing_{}", Uuid::now_v7()));
        let err = scanner(&root).scan_content().await.unwrap_err();
        assert!(matches!(err, CurationError::Validation { .. }));
    }

    #[tokio::test]
    async fn write_then_read() {
        let root = fixture();
        let scanner = scanner(&root);
        let path = root.join("index.md");
        scanner.write_content(&path, "# New\n").await.unwrap();
        assert_eq!(scanner.read_content(&path).await.unwrap(), "# New\n");
        assert!(!root.join("index.md.curating").exists());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn bad_glob_is_a_config_error() {
        let err = ContentScanner::new(&ContentConfig {
            include: vec!["[".into()],
            ..ContentConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, CurationError::Config { .. }));
    }
}
