//! Work directory and scoped audio artifacts
//!
//! Every downloaded or synthesized file lives under one work directory and is
//! owned by an [`Artifact`]. Dropping the artifact removes the file (through
//! [`tempfile::TempPath`]), so a pipeline run cleans up after itself on every
//! exit path.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::{Error, Result};

/// Directory holding the relay's temporary audio files
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
    keep_artifacts: bool,
}

impl WorkDir {
    /// Create the work directory if it is missing
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn create(root: impl Into<PathBuf>, keep_artifacts: bool) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(path = %root.display(), keep_artifacts, "work directory ready");
        Ok(Self {
            root,
            keep_artifacts,
        })
    }

    /// Root path of the work directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a file named `file_name` inside the work directory
    ///
    /// Path separators and other unsafe characters in `file_name` are
    /// replaced so the result never escapes the root.
    #[must_use]
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(sanitize_file_name(file_name))
    }

    /// Create a new, uniquely named file `<stem>-<random>.<extension>`
    ///
    /// The returned path removes the file when dropped, so a download that
    /// fails midway leaves nothing behind. Hand it to [`WorkDir::artifact`]
    /// once the file is complete.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn create_file(&self, stem: &str, extension: &str) -> Result<(std::fs::File, TempPath)> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize_file_name(stem)))
            .suffix(&format!(".{}", sanitize_file_name(extension)))
            .tempfile_in(&self.root)?;
        Ok(file.into_parts())
    }

    /// Take ownership of a finished file inside the work directory
    ///
    /// # Errors
    ///
    /// Returns error if the file should be kept but cannot be detached from
    /// its cleanup guard
    pub fn artifact(&self, temp: TempPath) -> Result<Artifact> {
        if self.keep_artifacts {
            let path = temp.keep().map_err(|e| Error::Io(e.error))?;
            Ok(Artifact::retained(path))
        } else {
            Ok(Artifact {
                inner: ArtifactPath::Scoped(temp),
            })
        }
    }
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // "." and ".." would resolve to the directory itself or its parent
    if cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

/// A local audio file owned by one pipeline run
#[derive(Debug)]
pub struct Artifact {
    inner: ArtifactPath,
}

#[derive(Debug)]
enum ArtifactPath {
    /// Deleted when the artifact is dropped
    Scoped(TempPath),
    /// Left on disk
    Retained(PathBuf),
}

impl Artifact {
    /// Artifact whose file is deleted on drop
    #[must_use]
    pub fn scoped(path: PathBuf) -> Self {
        Self {
            inner: ArtifactPath::Scoped(TempPath::from_path(path)),
        }
    }

    /// Artifact whose file stays on disk
    #[must_use]
    pub const fn retained(path: PathBuf) -> Self {
        Self {
            inner: ArtifactPath::Retained(path),
        }
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        match &self.inner {
            ArtifactPath::Scoped(temp) => &**temp,
            ArtifactPath::Retained(path) => path.as_path(),
        }
    }

    /// File name component, used as the display name of voice replies
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map_or_else(|| "audio".to_string(), |n| n.to_string_lossy().into_owned())
    }
}
