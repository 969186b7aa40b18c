//! Per-user run lock.
//!
//! One pipeline run per user at a time. The lock is a file created with
//! `create_new`, so a second process racing for the same workspace fails
//! instead of interleaving writes. Removed when the guard drops.
//!
//! A process that dies without unwinding leaves its lock behind. The file
//! records the owner's pid and start time; a lock whose owner is gone, or
//! that is older than the store's TTL, is reclaimed.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use contentcrew_shared::{ContentCrewError, Result};
use tracing::{debug, warn};

/// Lock file name at the workspace root.
pub const LOCK_FILE_NAME: &str = ".run.lock";

/// Guard for an exclusive pipeline run in one workspace.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub(crate) fn acquire(workspace_root: &Path, user_id: &str, ttl: Duration) -> Result<Self> {
        let path = workspace_root.join(LOCK_FILE_NAME);

        if let Some(lock) = try_create(&path)? {
            return Ok(lock);
        }

        if let Some(reason) = stale_reason(&path, ttl) {
            warn!(path = %path.display(), reason, "reclaiming stale run lock");
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ContentCrewError::io(&path, e)),
            }
            if let Some(lock) = try_create(&path)? {
                return Ok(lock);
            }
        }

        Err(ContentCrewError::WorkspaceBusy {
            user_id: user_id.to_string(),
            lock_path: path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

/// `None` when another holder already owns the file.
fn try_create(path: &Path) -> Result<Option<RunLock>> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(ContentCrewError::io(path, e)),
    };

    // Guard first, so a failed stamp write still removes the file.
    let lock = RunLock {
        path: path.to_path_buf(),
    };
    file.write_all(LockStamp::current().render().as_bytes())
        .map_err(|e| ContentCrewError::io(path, e))?;

    debug!(path = %path.display(), "acquired run lock");
    Ok(Some(lock))
}

fn stale_reason(path: &Path, ttl: Duration) -> Option<&'static str> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Some("released"),
        Err(_) => return None,
    };

    match LockStamp::parse(&content) {
        Some(stamp) if !process_alive(stamp.pid) => Some("owner process exited"),
        Some(stamp) if stamp.is_older_than(ttl) => Some("expired"),
        Some(_) => None,
        // Unstamped: the holder may still be writing it. Fall back to mtime.
        None => {
            let age = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())?;
            (age > ttl).then_some("expired")
        }
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Without procfs only the age check applies.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Stamp
// ---------------------------------------------------------------------------

/// Contents of a lock file: `pid=<pid> started_at=<rfc3339>`.
#[derive(Debug, Clone, PartialEq)]
struct LockStamp {
    pid: u32,
    started_at: DateTime<Utc>,
}

impl LockStamp {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    fn render(&self) -> String {
        format!("pid={} started_at={}\n", self.pid, self.started_at.to_rfc3339())
    }

    fn parse(content: &str) -> Option<Self> {
        let mut pid = None;
        let mut started_at = None;
        for field in content.split_whitespace() {
            match field.split_once('=') {
                Some(("pid", value)) => pid = value.parse().ok(),
                Some(("started_at", value)) => {
                    started_at = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|t| t.with_timezone(&Utc));
                }
                _ => {}
            }
        }
        Some(Self {
            pid: pid?,
            started_at: started_at?,
        })
    }

    fn is_older_than(&self, ttl: Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.started_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cc-lock-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn plant(root: &Path, stamp: &LockStamp) {
        std::fs::write(root.join(LOCK_FILE_NAME), stamp.render()).unwrap();
    }

    #[test]
    fn stamp_roundtrips() {
        let stamp = LockStamp::current();
        assert_eq!(LockStamp::parse(&stamp.render()), Some(stamp));
        assert_eq!(LockStamp::parse("garbage"), None);
        assert_eq!(LockStamp::parse("pid=12"), None);
    }

    #[test]
    fn expired_lock_is_reclaimed() {
        let root = temp_root();
        plant(
            &root,
            &LockStamp {
                pid: std::process::id(),
                started_at: Utc::now() - chrono::Duration::hours(2),
            },
        );

        let lock = RunLock::acquire(&root, "u1", HOUR).unwrap();
        let stamp = LockStamp::parse(&std::fs::read_to_string(lock.path()).unwrap()).unwrap();
        assert!(!stamp.is_older_than(HOUR));

        drop(lock);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lock_of_exited_process_is_reclaimed() {
        // Above the largest pid_max Linux allows, so never a live process.
        let dead_pid = 4_294_967;
        let root = temp_root();
        plant(
            &root,
            &LockStamp {
                pid: dead_pid,
                started_at: Utc::now(),
            },
        );

        let lock = RunLock::acquire(&root, "u1", HOUR).unwrap();
        let stamp = LockStamp::parse(&std::fs::read_to_string(lock.path()).unwrap()).unwrap();
        assert_eq!(stamp.pid, std::process::id());

        drop(lock);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn fresh_lock_of_live_process_is_busy() {
        let root = temp_root();
        let held = LockStamp::current();
        plant(&root, &held);

        let err = RunLock::acquire(&root, "u1", HOUR).unwrap_err();
        assert!(matches!(err, ContentCrewError::WorkspaceBusy { .. }));
        let on_disk = std::fs::read_to_string(root.join(LOCK_FILE_NAME)).unwrap();
        assert_eq!(LockStamp::parse(&on_disk), Some(held));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn fresh_unstamped_lock_is_busy() {
        let root = temp_root();
        std::fs::write(root.join(LOCK_FILE_NAME), "").unwrap();

        let err = RunLock::acquire(&root, "u1", HOUR).unwrap_err();
        assert!(matches!(err, ContentCrewError::WorkspaceBusy { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }
}
