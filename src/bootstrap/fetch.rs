// src/bootstrap/fetch.rs

//! Spack source tree fetching
//!
//! The Spack root is created once and then reused: if the path exists, the
//! fetcher does nothing. Its contents are never validated. Otherwise the
//! source archive is obtained, extracted into a staging directory next to
//! the root, and its single top-level directory is renamed into place.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::{debug, info};

/// Connect timeout for the archive download; the transfer itself is unbounded
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Somewhere a Spack source archive (`.tar.gz`) can be obtained from
pub trait ArchiveSource {
    /// Write the archive to `dest`
    fn fetch_to(&self, dest: &Path) -> Result<()>;

    /// Where the archive comes from, for logging
    fn describe(&self) -> String;
}

/// Archive downloaded over HTTP(S)
pub struct HttpArchive {
    url: String,
    client: Client,
    show_progress: bool,
}

impl HttpArchive {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr during the download
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total_size: Option<u64>) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = match total_size {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
                ) {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            }
            // Unknown size - show bytes downloaded without percentage
            None => ProgressBar::new_spinner(),
        };
        pb.set_message("Downloading Spack");
        Some(pb)
    }
}

impl ArchiveSource for HttpArchive {
    fn fetch_to(&self, dest: &Path) -> Result<()> {
        info!("Downloading {}", self.url);

        let mut response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let progress = self.progress_bar(response.content_length());
        let mut file = File::create(dest).map_err(|e| Error::io("create", dest, e))?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| Error::NetworkError(format!("Failed to read response: {e}")))?;
            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read])
                .map_err(|e| Error::io("write", dest, e))?;
            downloaded += bytes_read as u64;

            if let Some(pb) = &progress {
                pb.set_position(downloaded);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        info!("Downloaded {} bytes", downloaded);
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Archive already present on the local filesystem
pub struct LocalArchive {
    path: PathBuf,
}

impl LocalArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArchiveSource for LocalArchive {
    fn fetch_to(&self, dest: &Path) -> Result<()> {
        info!("Copying {}", self.path.display());
        fs::copy(&self.path, dest).map_err(|e| Error::io("copy archive", &self.path, e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick the archive source for a URL or path
///
/// `http://` and `https://` download; `file://` URLs and bare paths copy.
pub fn source_for(location: &str, show_progress: bool) -> Result<Box<dyn ArchiveSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Box::new(HttpArchive::new(location)?.with_progress(show_progress)));
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    if path.is_empty() || (location.contains("://") && !location.starts_with("file://")) {
        return Err(Error::ConfigError(format!(
            "unsupported archive source '{}'",
            location
        )));
    }
    Ok(Box::new(LocalArchive::new(path)))
}

/// Result of [`Fetcher::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The root already existed; nothing was fetched
    AlreadyPresent,
    /// The archive was fetched and extracted into the root
    Fetched,
}

/// Ensures a Spack source tree exists at a root path
pub struct Fetcher;

impl Fetcher {
    /// Fetch `source` into `root` unless `root` already exists
    pub fn ensure(root: &Path, source: &dyn ArchiveSource) -> Result<FetchOutcome> {
        if root.exists() {
            info!("Directory {} exists, skipping download", root.display());
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;

        // Stage next to the root so the final rename never crosses filesystems
        let staging = tempfile::Builder::new()
            .prefix(".spacktree-")
            .tempdir_in(parent)
            .map_err(|e| Error::io("create staging directory in", parent, e))?;

        let archive_path = staging.path().join("spack.tar.gz");
        info!("Fetching Spack from {}", source.describe());
        source.fetch_to(&archive_path)?;

        let extract_dir = staging.path().join("extract");
        fs::create_dir(&extract_dir).map_err(|e| Error::io("create directory", &extract_dir, e))?;
        info!("Unpacking Spack");
        extract_tar_gz(&archive_path, &extract_dir)?;

        let top = single_top_level_dir(&extract_dir)?;
        debug!("Moving {} to {}", top.display(), root.display());
        fs::rename(&top, root).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {}",
                top.display(),
                root.display(),
                e
            ))
        })?;

        Ok(FetchOutcome::Fetched)
    }
}

/// Unpack a gzip-compressed tarball into `dest`
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io("open", archive, e))?;
    let mut archive_reader = Archive::new(GzDecoder::new(io::BufReader::new(file)));
    archive_reader.set_preserve_permissions(true);

    archive_reader.unpack(dest).map_err(|e| {
        Error::ArchiveError(format!("Failed to unpack {}: {}", archive.display(), e))
    })
}

/// The one directory an archive extracted into
fn single_top_level_dir(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::io("read", dir, e))?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::io("read", dir, e))?;

    match entries.as_slice() {
        [only] if only.path().is_dir() => Ok(only.path()),
        [only] => Err(Error::ArchiveError(format!(
            "archive top-level entry {} is not a directory",
            only.file_name().to_string_lossy()
        ))),
        [] => Err(Error::ArchiveError("archive is empty".to_string())),
        many => Err(Error::ArchiveError(format!(
            "expected a single top-level directory, found {} entries",
            many.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::Cell;

    /// Build a .tar.gz holding the given (path, contents) files
    fn make_archive(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    struct CountingSource {
        inner: LocalArchive,
        calls: Cell<usize>,
    }

    impl ArchiveSource for CountingSource {
        fn fetch_to(&self, dest: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            self.inner.fetch_to(dest)
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_fetch_extracts_and_renames() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("spack.tar.gz");
        make_archive(
            &archive,
            &[
                ("spack-develop/bin/spack", "#!/bin/sh\n"),
                ("spack-develop/etc/spack/defaults/config.yaml", "config: {}\n"),
            ],
        );

        let root = temp.path().join("tree/spack");
        let outcome = Fetcher::ensure(&root, &LocalArchive::new(&archive)).unwrap();

        assert_eq!(outcome, FetchOutcome::Fetched);
        assert!(root.join("bin/spack").is_file());
        assert!(root.join("etc/spack/defaults/config.yaml").is_file());

        // Staging directory is cleaned up
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("tree"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("spack")]);
    }

    #[test]
    fn test_second_fetch_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("spack.tar.gz");
        make_archive(&archive, &[("spack-develop/bin/spack", "#!/bin/sh\n")]);

        let source = CountingSource {
            inner: LocalArchive::new(&archive),
            calls: Cell::new(0),
        };
        let root = temp.path().join("spack");

        assert_eq!(Fetcher::ensure(&root, &source).unwrap(), FetchOutcome::Fetched);
        assert_eq!(
            Fetcher::ensure(&root, &source).unwrap(),
            FetchOutcome::AlreadyPresent
        );
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_existing_root_is_not_inspected() {
        let temp = tempfile::tempdir().unwrap();
        let source = LocalArchive::new(temp.path().join("does-not-exist.tar.gz"));

        let outcome = Fetcher::ensure(temp.path(), &source).unwrap();
        assert_eq!(outcome, FetchOutcome::AlreadyPresent);
    }

    #[test]
    fn test_corrupt_archive() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("spack.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = Fetcher::ensure(&temp.path().join("spack"), &LocalArchive::new(&archive))
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveError(_)));
        assert!(!temp.path().join("spack").exists());
    }

    #[test]
    fn test_archive_with_two_top_level_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("spack.tar.gz");
        make_archive(&archive, &[("a/file", "x"), ("b/file", "y")]);

        let err = Fetcher::ensure(&temp.path().join("spack"), &LocalArchive::new(&archive))
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveError(ref m) if m.contains("2 entries")));
    }

    #[test]
    fn test_missing_local_archive_is_io_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = Fetcher::ensure(
            &temp.path().join("spack"),
            &LocalArchive::new(temp.path().join("missing.tar.gz")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_source_for() {
        assert_eq!(
            source_for("https://example.com/spack.tar.gz", false)
                .unwrap()
                .describe(),
            "https://example.com/spack.tar.gz"
        );
        assert_eq!(
            source_for("file:///srv/spack.tar.gz", false).unwrap().describe(),
            "/srv/spack.tar.gz"
        );
        assert_eq!(
            source_for("./spack.tar.gz", false).unwrap().describe(),
            "./spack.tar.gz"
        );
        assert!(source_for("ftp://example.com/spack.tar.gz", false).is_err());
    }
}
