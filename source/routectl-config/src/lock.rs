//! Directory locking: an advisory `flock` on a sentinel file
//! inside the live directory, guarding a whole merge/remove/backup/restart
//! cycle against concurrent invocations.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use tracing::debug;

use crate::error::{Result, RouterConfigError};

const LOCK_FILE_NAME: &str = ".lock";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct LockTimeout(pub Duration);

impl Default for LockTimeout {
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}

/// An RAII exclusive lock on `<live_dir>/.lock`. Released automatically
/// on drop. Fails fast, never blocks indefinitely, returning
/// `RouterConfigError::Busy` once `timeout` elapses.
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    pub fn acquire(live_dir: &Path, timeout: LockTimeout) -> Result<Self> {
        std::fs::create_dir_all(live_dir).map_err(|e| RouterConfigError::io(live_dir, e))?;
        let path = live_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| RouterConfigError::io(&path, e))?;

        let deadline = Instant::now() + timeout.0;
        loop {
            match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
                Ok(()) => return Ok(Self { file, path }),
                Err(Errno::EWOULDBLOCK) => {
                    if Instant::now() >= deadline {
                        return Err(RouterConfigError::Busy {
                            path,
                            timeout_ms: timeout.0.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(errno) => {
                    return Err(RouterConfigError::io(&path, std::io::Error::from(errno)));
                }
            }
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "releasing directory lock");
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_and_release_round_trips() {
        let dir = tempdir().unwrap();
        let lock = DirLock::acquire(dir.path(), LockTimeout::default()).unwrap();
        drop(lock);
        let lock2 = DirLock::acquire(dir.path(), LockTimeout::default()).unwrap();
        drop(lock2);
    }

    #[test]
    fn second_acquire_times_out_while_first_held() {
        let dir = tempdir().unwrap();
        let _held = DirLock::acquire(dir.path(), LockTimeout::default()).unwrap();
        let err = DirLock::acquire(dir.path(), LockTimeout(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, RouterConfigError::Busy { .. }));
    }
}
