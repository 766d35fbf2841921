use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{sha256_hex, sha256_hex_file};

/// Entry names skipped at every depth of a content tree.
pub const IGNORED_ENTRY_NAMES: [&str; 3] = [".codepushrelease", ".DS_Store", "__MACOSX"];

const MANIFEST_PREFIX: &str = "www";

pub trait ContentHasher: Send + Sync {
    fn compute_manifest_hash(&self, root: &Path) -> Result<String>;
}

/// Hashes a content tree as the SHA-256 of its sorted `path:digest` manifest.
///
/// Each file contributes `www/<relative path>:<sha256 hex>`; the sorted list
/// is serialized as a JSON array and that text is digested again.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestHasher;

impl ManifestHasher {
    pub fn manifest_entries(&self, root: &Path) -> Result<Vec<String>> {
        if !root.is_dir() {
            anyhow::bail!("content root is not a directory: {}", root.display());
        }

        let mut entries = Vec::new();
        let mut queue: VecDeque<(PathBuf, String)> = VecDeque::new();
        queue.push_back((root.to_path_buf(), MANIFEST_PREFIX.to_string()));

        while let Some((dir, prefix)) = queue.pop_front() {
            for entry in fs::read_dir(&dir)
                .with_context(|| format!("failed reading content directory {}", dir.display()))?
            {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if IGNORED_ENTRY_NAMES.contains(&name.as_str()) {
                    continue;
                }

                let path = entry.path();
                let relative = format!("{prefix}/{name}");
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    queue.push_back((path, relative));
                } else if file_type.is_file() {
                    let digest = sha256_hex_file(&path)?;
                    entries.push(format!("{relative}:{digest}"));
                }
            }
        }

        entries.sort();
        Ok(entries)
    }
}

impl ContentHasher for ManifestHasher {
    fn compute_manifest_hash(&self, root: &Path) -> Result<String> {
        let entries = self.manifest_entries(root)?;
        let manifest =
            serde_json::to_string(&entries).context("failed to serialize content manifest")?;
        tracing::debug!(
            root = %root.display(),
            entries = entries.len(),
            "computed content manifest"
        );
        Ok(sha256_hex(manifest.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn test_dir() -> PathBuf {
        let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "hotswap-security-manifest-{}-{}",
            std::process::id(),
            sequence
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("must create test dir");
        dir
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("must create parent");
        fs::write(path, contents).expect("must write file");
    }

    #[test]
    fn manifest_entries_are_sorted_and_prefixed() {
        let root = test_dir();
        write(&root, "js/app.js", "console.log(1)");
        write(&root, "index.html", "<html></html>");

        let entries = ManifestHasher
            .manifest_entries(&root)
            .expect("must list entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            format!("www/index.html:{}", sha256_hex(b"<html></html>"))
        );
        assert_eq!(
            entries[1],
            format!("www/js/app.js:{}", sha256_hex(b"console.log(1)"))
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn manifest_hash_matches_digest_of_json_array() {
        let root = test_dir();
        write(&root, "index.html", "hello");

        let expected_manifest = format!(r#"["www/index.html:{}"]"#, sha256_hex(b"hello"));
        let hash = ManifestHasher
            .compute_manifest_hash(&root)
            .expect("must hash");
        assert_eq!(hash, sha256_hex(expected_manifest.as_bytes()));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn ignored_entries_do_not_change_the_hash() {
        let root = test_dir();
        write(&root, "index.html", "hello");
        let before = ManifestHasher
            .compute_manifest_hash(&root)
            .expect("must hash");

        write(&root, ".DS_Store", "finder junk");
        write(&root, "__MACOSX/index.html", "resource fork");
        write(&root, "assets/.codepushrelease", "release marker");
        let after = ManifestHasher
            .compute_manifest_hash(&root)
            .expect("must hash");
        assert_eq!(before, after);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn content_change_changes_the_hash() {
        let root = test_dir();
        write(&root, "index.html", "hello");
        let before = ManifestHasher
            .compute_manifest_hash(&root)
            .expect("must hash");
        write(&root, "index.html", "hello, world");
        let after = ManifestHasher
            .compute_manifest_hash(&root)
            .expect("must hash");
        assert_ne!(before, after);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = test_dir().join("missing");
        let err = ManifestHasher
            .compute_manifest_hash(&root)
            .expect_err("missing root must fail");
        assert!(err.to_string().contains("content root is not a directory"));
    }
}
