// src/bootstrap/manifest.rs

//! Package manifest parsing
//!
//! The manifest is a plain text file with one Spack spec per line. Lines
//! whose first non-blank character is `#` are comments, blank lines are
//! ignored, and only the first whitespace-separated token of a line is the
//! spec; anything after it is a free-form annotation.

use crate::error::{Error, Result};
use std::path::Path;

/// A single package to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Spack spec passed to `spack install`
    pub spec: String,
    /// 1-based line number in the manifest
    pub line: usize,
}

/// Ordered list of packages; file order is install order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    entries: Vec<ManifestEntry>,
}

impl PackageManifest {
    /// Parse manifest text
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let line = line.trim_start();
                if line.starts_with('#') {
                    return None;
                }
                line.split_whitespace().next().map(|spec| ManifestEntry {
                    spec: spec.to_string(),
                    line: idx + 1,
                })
            })
            .collect();

        Self { entries }
    }

    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read manifest", path, e))?;
        Ok(Self::parse(&content))
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Specs in install order
    pub fn specs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.spec.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_blanks_and_annotations() {
        let manifest = PackageManifest::parse("# comment\npkg-a@1.0\n\npkg-b +variant\n");
        assert_eq!(manifest.specs(), vec!["pkg-a@1.0", "pkg-b"]);
    }

    #[test]
    fn test_parse_keeps_file_order_and_lines() {
        let manifest = PackageManifest::parse("zlib\n  # indented comment\n   cmake@3.18.4  # build tool\nhdf5+mpi\n");
        assert_eq!(
            manifest.entries(),
            &[
                ManifestEntry {
                    spec: "zlib".to_string(),
                    line: 1
                },
                ManifestEntry {
                    spec: "cmake@3.18.4".to_string(),
                    line: 3
                },
                ManifestEntry {
                    spec: "hdf5+mpi".to_string(),
                    line: 4
                },
            ]
        );
    }

    #[test]
    fn test_parse_whitespace_only() {
        let manifest = PackageManifest::parse(" \n\t\n#only comments\n");
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let err = PackageManifest::load(&temp.path().join("packages.txt")).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_load_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("packages.txt");
        std::fs::write(&path, "tree\njq\n").unwrap();

        let manifest = PackageManifest::load(&path).unwrap();
        assert_eq!(manifest.len(), 2);
    }
}
