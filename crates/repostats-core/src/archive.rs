//! Zip packaging of fetched reports.
//!
//! The archive is named `{repo}.{ref}.{run_id}.zip` and holds the report files
//! as flat entries. Entry timestamps are pinned to the zip epoch so the same
//! inputs always produce the same bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::RunIdentity;
use crate::error::PackagingError;
use crate::obs;

/// A built archive on local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    /// Archive file name.
    pub name: String,

    /// Full path of the archive file.
    pub path: PathBuf,

    /// SHA-256 of the archive bytes (hex).
    pub digest: String,

    /// Size of the archive in bytes.
    pub size_bytes: u64,

    /// Entry names, in archive order.
    pub entries: Vec<String>,
}

/// Strip `refs/heads/` or `refs/tags/` and flatten `/` so the ref is one path component.
pub fn normalize_ref(git_ref: &str) -> String {
    let trimmed = git_ref.trim();
    let short = trimmed
        .strip_prefix("refs/heads/")
        .or_else(|| trimmed.strip_prefix("refs/tags/"))
        .unwrap_or(trimmed);
    short.replace('/', "-")
}

/// Deterministic archive name for a run.
pub fn archive_name(identity: &RunIdentity) -> Result<String, PackagingError> {
    let repo = identity.repository.name.trim();
    let git_ref = normalize_ref(&identity.git_ref);
    let run_id = identity.run_id.trim();

    for (field, value) in [("repo", repo), ("ref", git_ref.as_str()), ("run_id", run_id)] {
        if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
            return Err(PackagingError::InvalidName {
                field,
                value: value.to_string(),
            });
        }
    }

    Ok(format!("{repo}.{git_ref}.{run_id}.zip"))
}

/// Builds the run archive from report files.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    name: String,
}

impl ArchiveBuilder {
    pub fn new(identity: &RunIdentity) -> Result<Self, PackagingError> {
        Ok(ArchiveBuilder {
            name: archive_name(identity)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `out_dir/<name>` containing every file in `inputs`.
    ///
    /// All inputs are checked before the archive file is created. The archive
    /// is written under a temporary name and renamed once complete, so a
    /// failure never leaves a file at the final path.
    pub fn build(&self, inputs: &[PathBuf], out_dir: &Path) -> Result<Archive, PackagingError> {
        let mut entries = Vec::with_capacity(inputs.len());
        let mut seen = HashSet::new();
        for input in inputs {
            if !input.exists() {
                return Err(PackagingError::MissingInput(input.display().to_string()));
            }
            if !input.is_file() {
                return Err(PackagingError::NotAFile(input.display().to_string()));
            }
            let entry = input
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| PackagingError::NotAFile(input.display().to_string()))?
                .to_string();
            if !seen.insert(entry.clone()) {
                return Err(PackagingError::Zip(format!("duplicate entry {entry}")));
            }
            entries.push(entry);
        }

        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(&self.name);
        if path.exists() {
            return Err(PackagingError::AlreadyExists(path.display().to_string()));
        }

        let partial = out_dir.join(format!(".{}.partial", self.name));
        if let Err(err) = write_zip(&partial, inputs, &entries) {
            let _ = std::fs::remove_file(&partial);
            return Err(err);
        }
        std::fs::rename(&partial, &path)?;

        let bytes = std::fs::read(&path)?;
        let digest = hex::encode(Sha256::digest(&bytes));
        let archive = Archive {
            name: self.name.clone(),
            path,
            digest,
            size_bytes: bytes.len() as u64,
            entries,
        };

        obs::emit_archive_built(&archive.name, archive.size_bytes, &archive.digest);
        Ok(archive)
    }
}

fn write_zip(dest: &Path, inputs: &[PathBuf], entries: &[String]) -> Result<(), PackagingError> {
    let file = File::create(dest)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for (input, entry) in inputs.iter().zip(entries) {
        debug!(entry = %entry, "Adding archive entry");
        writer.start_file(entry.as_str(), options)?;
        let mut reader = File::open(input)?;
        std::io::copy(&mut reader, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(())
}
