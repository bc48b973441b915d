// src/bootstrap/mirror.rs

//! Mirror synchronisation
//!
//! Spack keeps every source archive it downloads in `var/spack/cache`.
//! Copying new or changed files from there into the local mirror lets the
//! next tree build offline. Files are compared by SHA-256 so unchanged
//! archives are not copied again.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Spack's download cache, relative to the Spack root
pub const SOURCE_CACHE_DIR: &str = "var/spack/cache";

/// Summary of a sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files copied into the mirror, relative to the cache
    pub copied: Vec<PathBuf>,
    /// Files already present with identical content
    pub unchanged: usize,
}

/// Copy new or changed files from `<root>/var/spack/cache` into `mirror`
///
/// A missing cache directory is not an error; nothing has been downloaded yet.
pub fn sync_cache_to_mirror(root: &Path, mirror: &Path) -> Result<SyncReport> {
    let cache = root.join(SOURCE_CACHE_DIR);
    let mut report = SyncReport::default();

    if !cache.is_dir() {
        info!("No source cache at {}, nothing to mirror", cache.display());
        return Ok(report);
    }

    for entry in WalkDir::new(&cache).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", cache.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&cache)
            .map_err(|e| Error::IoError(e.to_string()))?
            .to_path_buf();
        let dest = mirror.join(&relative);

        if dest.is_file() && sha256_file(&dest)? == sha256_file(entry.path())? {
            report.unchanged += 1;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
        }
        debug!("Mirroring {}", relative.display());
        fs::copy(entry.path(), &dest).map_err(|e| Error::io("copy", entry.path(), e))?;
        report.copied.push(relative);
    }

    info!(
        "Mirrored {} file(s), {} unchanged",
        report.copied.len(),
        report.unchanged
    );
    Ok(report)
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io("open", path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io("read", path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_cache_is_empty_sync() {
        let temp = tempfile::tempdir().unwrap();
        let report = sync_cache_to_mirror(temp.path(), &temp.path().join("mirror")).unwrap();
        assert_eq!(report, SyncReport::default());
    }

    #[test]
    fn test_copies_new_and_changed_files_only() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("spack");
        let mirror = temp.path().join("mirror");
        let cache = root.join(SOURCE_CACHE_DIR);

        write(&cache.join("zlib/zlib-1.2.11.tar.gz"), "zlib");
        write(&cache.join("jq/jq-1.6.tar.gz"), "jq");
        write(&cache.join("tree/tree-1.8.0.tgz"), "tree-new");
        write(&mirror.join("zlib/zlib-1.2.11.tar.gz"), "zlib");
        write(&mirror.join("tree/tree-1.8.0.tgz"), "tree-old");

        let report = sync_cache_to_mirror(&root, &mirror).unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(
            report.copied,
            vec![
                PathBuf::from("jq/jq-1.6.tar.gz"),
                PathBuf::from("tree/tree-1.8.0.tgz"),
            ]
        );
        assert_eq!(
            fs::read_to_string(mirror.join("tree/tree-1.8.0.tgz")).unwrap(),
            "tree-new"
        );
    }

    #[test]
    fn test_second_sync_copies_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("spack");
        let mirror = temp.path().join("mirror");
        write(&root.join(SOURCE_CACHE_DIR).join("a/a.tar.gz"), "a");

        sync_cache_to_mirror(&root, &mirror).unwrap();
        let report = sync_cache_to_mirror(&root, &mirror).unwrap();

        assert!(report.copied.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn test_sha256_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
