//! Advisory file locking for the file-backed store.
//!
//! Every [`FileStore`](super::FileStore) operation takes the lock for its own
//! duration only: shared for reads, exclusive for writes. A conflicting holder
//! is waited out for a bounded time; only a lock held past that is reported as
//! contention, so the caller can decide to retry.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILENAME: &str = ".lock";

const INITIAL_POLL: Duration = Duration::from_millis(1);
const MAX_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// Written into the lock file by exclusive holders.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub operation: String,
  pub store: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreLockError {
  #[error("store {store} is locked by PID {pid} ({operation}, started at unix time {started_at_unix})")]
  Contention {
    operation: String,
    pid: u32,
    started_at_unix: u64,
    store: PathBuf,
  },

  #[error("store is locked (could not read lock metadata from {lock_path})")]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create store directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

impl StoreLockError {
  pub fn is_contention(&self) -> bool {
    matches!(self, Self::Contention { .. } | Self::ContentionUnknown { .. })
  }
}

/// A held lock. Released on drop.
pub struct StoreLock {
  file: File,
  lock_path: PathBuf,
}

impl StoreLock {
  /// Take the lock or fail at once if another holder conflicts.
  pub fn acquire(store: &Path, mode: LockMode, operation: &str) -> Result<Self, StoreLockError> {
    Self::acquire_within(store, mode, operation, Duration::ZERO)
  }

  /// Take the lock, waiting up to `timeout` for conflicting holders to let go.
  ///
  /// Blocks the calling thread; async callers run this on a blocking task.
  pub fn acquire_within(
    store: &Path,
    mode: LockMode,
    operation: &str,
    timeout: Duration,
  ) -> Result<Self, StoreLockError> {
    let lock_path = store.join(LOCK_FILENAME);

    if !store.exists() {
      std::fs::create_dir_all(store).map_err(StoreLockError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(StoreLockError::OpenFile)?;

    let deadline = Instant::now() + timeout;
    let mut poll = INITIAL_POLL;
    loop {
      match try_lock(&file, mode) {
        Ok(()) => break,
        Err(err) if is_would_block(&err) => {
          let now = Instant::now();
          if now >= deadline {
            return Err(read_contention_error(&lock_path, store));
          }
          thread::sleep(poll.min(deadline - now));
          poll = (poll * 2).min(MAX_POLL);
        }
        Err(err) => return Err(StoreLockError::LockFailed(err)),
      }
    }

    if mode == LockMode::Exclusive {
      write_metadata(&file, operation, store)?;
    }

    Ok(StoreLock { file, lock_path })
  }

  /// Reads the lock metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, operation: &str, store: &Path) -> Result<(), StoreLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    operation: operation.to_string(),
    store: store.to_path_buf(),
  };

  file.set_len(0).map_err(StoreLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer(&mut writer, &metadata).map_err(|e| StoreLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(StoreLockError::WriteMetadata)?;

  Ok(())
}

fn read_contention_error(lock_path: &Path, store: &Path) -> StoreLockError {
  if let Ok(mut file) = File::open(lock_path) {
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_ok()
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      return StoreLockError::Contention {
        operation: metadata.operation,
        pid: metadata.pid,
        started_at_unix: metadata.started_at_unix,
        store: store.to_path_buf(),
      };
    }
  }

  StoreLockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn is_would_block(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn is_would_block(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;

  err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: OVERLAPPED is valid when zero-initialized and the handle is owned by `file`.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
