//! Exclusive lock on the cache, with a marker file naming the holder.
//!
//! The marker sits next to the cache as `<cache>.lock`, the same file the
//! feed reader itself locks while it runs. Two concerns live in it:
//!
//! - the kernel advisory lock on the open marker, which is authoritative;
//! - the holder's PID written into the marker, which is for operators only.
//!
//! A marker left behind by a crashed holder carries no lock and is simply
//! re-locked and overwritten. Its existence never gates access.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Appended to the cache path to form the marker path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Upper bound on how much of a foreign marker is read for diagnostics.
const MAX_HOLDER_LEN: u64 = 1024;

/// How often to reopen a marker that was unlinked or replaced between our
/// open and our lock.
const MAX_ATTEMPTS: usize = 3;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock; `holder` is whatever it wrote into the marker
    #[error("The cache is opened by another process (PID: {holder})")]
    Busy { holder: String, marker: PathBuf },

    /// The marker could not be opened, locked or written
    #[error("Failed to use lock file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Marker path for a cache file: the cache path with [`LOCK_SUFFIX`] appended.
pub fn marker_path_for(cache_path: &Path) -> PathBuf {
    let mut marker = cache_path.as_os_str().to_owned();
    marker.push(LOCK_SUFFIX);
    PathBuf::from(marker)
}

// ============================================================================
// CacheLock
// ============================================================================

/// A held exclusive lock on a cache.
///
/// Dropping the guard deletes the marker (while the lock is still held) and
/// then closes the handle, which releases the lock. Deletion failures are
/// logged and otherwise ignored: a stale marker is harmless because the next
/// run only needs the lock to be free.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
    marker: PathBuf,
}

impl CacheLock {
    /// Try to take the lock for `cache_path` without blocking.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Busy` with the recorded holder if the lock is
    /// taken; the marker is left exactly as the holder wrote it. Any other
    /// failure (missing directory, permissions) is `LockError::Io`.
    pub fn acquire(cache_path: &Path) -> Result<Self, LockError> {
        let marker = marker_path_for(cache_path);
        tracing::debug!(path = %marker.display(), "Trying to lock cache");

        for _ in 0..MAX_ATTEMPTS {
            let file = open_marker(&marker).map_err(|e| LockError::io(&marker, e))?;
            match lock_opened(file, &marker).map_err(|e| LockError::io(&marker, e))? {
                Attempt::Locked(file) => return Self::claim(file, marker),
                Attempt::Busy(holder) => {
                    tracing::debug!(path = %marker.display(), holder = %holder, "Cache is locked by another process");
                    return Err(LockError::Busy { holder, marker });
                }
                Attempt::Replaced => {
                    tracing::debug!(path = %marker.display(), "Lock marker was replaced while locking, retrying");
                }
            }
        }

        // The marker keeps being swapped out under us: someone else is cycling it.
        Err(LockError::Busy {
            holder: "unknown".to_string(),
            marker,
        })
    }

    /// Record our PID in a marker we hold the lock on.
    fn claim(mut file: File, marker: PathBuf) -> Result<Self, LockError> {
        let pid = std::process::id().to_string();
        let written = file
            .set_len(0)
            .and_then(|()| file.write_all(pid.as_bytes()))
            .and_then(|()| file.flush());
        if let Err(e) = written {
            // We own the lock, so the half-written marker is ours to remove.
            fs::remove_file(&marker).ok();
            return Err(LockError::io(&marker, e));
        }

        tracing::debug!(path = %marker.display(), pid = %pid, "Locked cache");
        Ok(Self {
            _file: file,
            marker,
        })
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.marker) {
            Ok(()) => tracing::debug!(path = %self.marker.display(), "Removed lock marker"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.marker.display(), "Lock marker already gone");
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.marker.display(),
                    error = %e,
                    "Failed to remove lock marker"
                );
            }
        }
        // `_file` is closed after this body runs, releasing the lock.
    }
}

/// Result of locking one opened marker handle.
enum Attempt {
    Locked(File),
    Busy(String),
    /// The handle's file is no longer the one at the marker path
    Replaced,
}

fn lock_opened(mut file: File, marker: &Path) -> io::Result<Attempt> {
    if !try_lock_exclusive(&file)? {
        return Ok(Attempt::Busy(read_holder(&mut file)));
    }
    // A previous holder unlinks the marker on release. If that happened after
    // our open, we locked an orphaned file that nobody else will ever look at.
    if !is_current_marker(&file, marker)? {
        return Ok(Attempt::Replaced);
    }
    Ok(Attempt::Locked(file))
}

#[cfg(unix)]
fn is_current_marker(file: &File, marker: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(marker) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Open files cannot be deleted out from under a handle on Windows.
#[cfg(not(unix))]
fn is_current_marker(_file: &File, _marker: &Path) -> io::Result<bool> {
    Ok(true)
}

fn open_marker(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn read_holder(file: &mut File) -> String {
    let mut buf = Vec::new();
    if let Err(e) = Read::take(&mut *file, MAX_HOLDER_LEN).read_to_end(&mut buf) {
        tracing::debug!(error = %e, "Could not read lock holder");
    }
    let holder = String::from_utf8_lossy(&buf).trim().to_string();
    if holder.is_empty() {
        "unknown".to_string()
    } else {
        holder
    }
}

/// Non-blocking exclusive lock over the whole marker.
///
/// Returns `Ok(false)` when another holder has it. On Unix this is an
/// `fcntl` record lock so that it conflicts with the feed reader's `lockf`.
/// Linux uses open-file-description locks, which also conflict between two
/// handles inside one process.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    const SET_LOCK: libc::c_int = libc::F_OFD_SETLK;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    const SET_LOCK: libc::c_int = libc::F_SETLK;

    // SAFETY: `libc::flock` is a plain C struct; all-zero bytes is a valid
    // value (l_start = 0 and l_len = 0 span the whole file, l_pid = 0 as OFD
    // locks require).
    let mut region: libc::flock = unsafe { std::mem::zeroed() };
    region.l_type = libc::F_WRLCK as libc::c_short;
    region.l_whence = libc::SEEK_SET as libc::c_short;

    // SAFETY: the descriptor belongs to `file`, which outlives the call, and
    // `region` is a valid `flock` that fcntl only reads for F_SETLK commands.
    let rc = unsafe {
        libc::fcntl(
            file.as_raw_fd(),
            SET_LOCK,
            &region as *const libc::flock,
        )
    };
    if rc == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EAGAIN || code == libc::EACCES => Ok(false),
        _ => Err(err),
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use fs4::fs_std::FileExt;

    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) if e.raw_os_error() == fs4::lock_contended_error().raw_os_error() => Ok(false),
        Err(e) => Err(e),
    }
}
