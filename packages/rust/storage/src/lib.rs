//! Per-user output store.
//!
//! Every user owns a directory tree under the output root:
//!
//! ```text
//! <root>/<user_id>/
//! ├── data/    keyword research JSON
//! ├── crew/    generated Markdown reports (analysis, ad copy, outlines, ...)
//! └── blogs/   standalone blog generation (search log, blog log, post)
//! ```
//!
//! Workspaces are created lazily and never deleted here. Artifact writes are
//! atomic (temp file, then rename) and last-write-wins.

mod artifact;
mod lock;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use contentcrew_shared::{ContentCrewError, Result, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

pub use artifact::{ArtifactPath, WORKSPACE_DIRS};
pub use lock::{LOCK_FILE_NAME, RunLock};

// ---------------------------------------------------------------------------
// OutputStore
// ---------------------------------------------------------------------------

/// Age after which a run lock is considered abandoned.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Root of the per-user output tree (`outputs/` by default).
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    lock_ttl: Duration,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Reclaim run locks older than `ttl` even if their owner looks alive.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (if needed) and return the workspace of `user_id`. Idempotent.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub fn ensure_workspace(&self, user_id: &UserId) -> Result<Workspace> {
        let workspace = Workspace {
            user_id: user_id.clone(),
            root: self.root.join(user_id.as_str()),
            lock_ttl: self.lock_ttl,
        };

        for dir in WORKSPACE_DIRS {
            let path = workspace.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| ContentCrewError::io(&path, e))?;
        }

        debug!(path = %workspace.root.display(), "workspace ready");
        Ok(workspace)
    }

    /// Open an existing workspace without creating anything.
    pub fn open_workspace(&self, user_id: &UserId) -> Result<Workspace> {
        let root = self.root.join(user_id.as_str());
        if !root.is_dir() {
            return Err(ContentCrewError::not_found(root));
        }
        Ok(Workspace {
            user_id: user_id.clone(),
            root,
            lock_ttl: self.lock_ttl,
        })
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Handle to one user's directory subtree.
#[derive(Debug, Clone)]
pub struct Workspace {
    user_id: UserId,
    root: PathBuf,
    lock_ttl: Duration,
}

impl Workspace {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact.
    pub fn path_of(&self, artifact: ArtifactPath) -> PathBuf {
        artifact.under(&self.root)
    }

    pub fn exists(&self, artifact: ArtifactPath) -> bool {
        self.path_of(artifact).is_file()
    }

    /// Take the per-user run lock.
    pub fn lock(&self) -> Result<RunLock> {
        RunLock::acquire(&self.root, self.user_id.as_str(), self.lock_ttl)
    }

    /// Write an artifact atomically, replacing any previous version.
    pub fn write_artifact(&self, artifact: ArtifactPath, content: &str) -> Result<PathBuf> {
        let path = self.path_of(artifact);
        write_atomic(&path, content.as_bytes())?;
        info!(artifact = %artifact, bytes = content.len(), "wrote artifact");
        Ok(path)
    }

    /// Serialize `data` as pretty-printed JSON into an artifact.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        artifact: ArtifactPath,
        data: &T,
    ) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(data).map_err(|e| {
            ContentCrewError::validation(format!("JSON serialization failed: {e}"))
        })?;
        self.write_artifact(artifact, &json)
    }

    /// Read an artifact. Missing file is [`ContentCrewError::NotFound`].
    pub fn read_artifact(&self, artifact: ArtifactPath) -> Result<String> {
        read_file(&self.path_of(artifact))
    }

    /// Read and decode a JSON artifact.
    pub fn read_json<T: DeserializeOwned>(&self, artifact: ArtifactPath) -> Result<T> {
        let content = self.read_artifact(artifact)?;
        serde_json::from_str(&content)
            .map_err(|e| ContentCrewError::parse(format!("invalid {artifact}: {e}")))
    }

    /// Read any file under the workspace root, such as one a user added next
    /// to the generated artifacts.
    pub fn read_relative(&self, relative: &str) -> Result<String> {
        read_file(&self.resolve_relative(relative)?)
    }

    /// Join `relative` under the root, refusing anything that could escape it.
    fn resolve_relative(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let normal_only = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if relative.is_empty() || !normal_only {
            return Err(ContentCrewError::validation(format!(
                "'{relative}' is not a plain relative path inside the workspace"
            )));
        }
        Ok(self.root.join(rel))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target.parent().ok_or_else(|| {
        ContentCrewError::validation(format!("{} has no parent", target.display()))
    })?;
    std::fs::create_dir_all(dir).map_err(|e| ContentCrewError::io(dir, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(ContentCrewError::io(&temp, e));
    }

    std::fs::rename(&temp, target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        ContentCrewError::io(target, e)
    })
}

fn read_file(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ContentCrewError::not_found(path))
        }
        Err(e) => Err(ContentCrewError::io(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
