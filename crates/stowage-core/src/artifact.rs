//! Primary artifact selection and staging.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StowageError};

/// File extension of packaged build outputs.
pub const ARTIFACT_EXTENSION: &str = "jar";

/// Name fragments marking secondary artifacts that are never shipped.
const SECONDARY_MARKERS: [&str; 2] = ["sources", "javadoc"];

/// A build output copied into the shared artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedArtifact {
    pub path: PathBuf,
    /// SHA-256 hex digest of the staged file.
    pub sha256: String,
}

pub fn is_secondary_artifact(file_name: &str) -> bool {
    SECONDARY_MARKERS
        .iter()
        .any(|marker| file_name.contains(marker))
}

/// Pick the primary artifact from candidate file names: secondary variants
/// are excluded and the first remaining name in lexical order wins.
pub fn select_primary_artifact<S: AsRef<str>>(candidates: &[S]) -> Option<&str> {
    candidates
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|name| !is_secondary_artifact(name))
        .min()
}

/// Locate the primary artifact in a build output directory.
pub fn find_primary_artifact(output_dir: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    if output_dir.is_dir() {
        for entry in fs::read_dir(output_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map(|e| e == ARTIFACT_EXTENSION).unwrap_or(false) {
                candidates.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }

    select_primary_artifact(&candidates)
        .map(|name| output_dir.join(name))
        .ok_or_else(|| StowageError::ArtifactNotFound(output_dir.to_path_buf()))
}

/// File name an artifact is staged under for a given repository.
pub fn staged_file_name(repo: &str) -> String {
    format!("{repo}.{ARTIFACT_EXTENSION}")
}

/// Copy `source` into `artifact_dir` under the repository's staged name.
pub fn stage_artifact(source: &Path, artifact_dir: &Path, repo: &str) -> Result<StagedArtifact> {
    fs::create_dir_all(artifact_dir)?;
    let dest = artifact_dir.join(staged_file_name(repo));
    fs::copy(source, &dest)?;
    let sha256 = file_sha256(&dest)?;
    Ok(StagedArtifact { path: dest, sha256 })
}

fn file_sha256(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(fs::read(path)?);
    Ok(hex::encode(hasher.finalize()))
}
