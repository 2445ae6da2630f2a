//! Advisory lock file shared by every palbot process on the host.
//!
//! Held with `flock(2)`, so the kernel releases it when the holder exits,
//! crashed or not. The file keeps a one-line description of the holder.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Exclusive hold on a lock file; released on drop.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

#[derive(Debug)]
pub enum LockAttempt {
    Acquired(LockFile),
    /// Someone else holds it; carries the holder line, possibly empty
    Held(String),
}

impl LockFile {
    /// Non-blocking attempt. `holder` is written into the file on success.
    pub fn try_acquire(path: &Path, holder: &str) -> io::Result<LockAttempt> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                let holder = fs::read_to_string(path).unwrap_or_default();
                return Ok(LockAttempt::Held(holder.trim().to_string()));
            }
            return Err(err);
        }

        file.set_len(0)?;
        writeln!(file, "{}", holder)?;
        tracing::debug!(path = %path.display(), holder, "Lock acquired");
        Ok(LockAttempt::Acquired(LockFile {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        tracing::debug!(path = %self.path.display(), "Lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifecycle.lock");

        let first = match LockFile::try_acquire(&path, "pid 1: restart").unwrap() {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Held(holder) => panic!("unexpectedly held by {}", holder),
        };
        assert_eq!(first.path(), path);

        match LockFile::try_acquire(&path, "pid 2: stop").unwrap() {
            LockAttempt::Held(holder) => assert_eq!(holder, "pid 1: restart"),
            LockAttempt::Acquired(_) => panic!("lock acquired twice"),
        }

        drop(first);
        assert!(matches!(
            LockFile::try_acquire(&path, "pid 2: stop").unwrap(),
            LockAttempt::Acquired(_)
        ));
    }
}
