//! Cross-process shared-mode coordination. Per spec §4.11: a connection
//! opened with `connection=shared` acquires a named OS-global mutex so two
//! processes can safely open the same file concurrently, instead of the
//! `direct` mode's single-process assumption.
//!
//! No existing named-mutex crate in the pack, so this is built directly
//! from the algorithmic description: derive a filesystem-safe name from
//! the database path, falling back to a SHA-1 digest past the Windows
//! named-object length limit (kept even though this crate only targets
//! Unix, since the limit is the contract spec §4.11 names), then realize
//! "named mutex" as an advisory `flock` on a well-known path under
//! `std::env::temp_dir()`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::common::{Error, Result};

const PREFIX: &str = "interchangedb-";
const SUFFIX: &str = ".lock";
const WINDOWS_NAME_LIMIT: usize = 250;

/// The filesystem-safe name derived from a database path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMutexName(String);

impl SharedMutexName {
    pub fn derive(path: &Path) -> Self {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let normalized = canonical.to_string_lossy().to_lowercase();
        let encoded = percent_encode(&normalized);

        if PREFIX.len() + encoded.len() + SUFFIX.len() > WINDOWS_NAME_LIMIT {
            let digest = Sha1::digest(normalized.as_bytes());
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            Self(format!("sha1-{hex}"))
        } else {
            Self(encoded)
        }
    }

    pub fn lock_file_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("{PREFIX}{}{SUFFIX}", self.0))
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// A held advisory lock on the shared-mutex file; dropping it releases
/// the lock. On Unix this is `flock(2)`; other platforms aren't supported
/// by this crate (`Error::PlatformNotSupported`), matching spec §4.11's
/// note that the Windows named-mutex branch is documented, not built,
/// outside a Windows target.
pub struct ProcessLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl ProcessLock {
    #[cfg(unix)]
    pub fn try_acquire(name: &SharedMutexName) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let path = name.lock_file_path();
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(Error::LockTimeout);
        }
        Ok(Self { file })
    }

    #[cfg(not(unix))]
    pub fn try_acquire(_name: &SharedMutexName) -> Result<Self> {
        Err(Error::PlatformNotSupported)
    }
}

#[cfg(unix)]
impl Drop for ProcessLock {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_short_path_is_percent_encoded_not_hashed() {
        let name = SharedMutexName::derive(&PathBuf::from("/tmp/my.db"));
        assert!(!name.0.starts_with("sha1-"));
    }

    #[test]
    fn test_long_path_falls_back_to_sha1() {
        let long = "a".repeat(400);
        let name = SharedMutexName::derive(&PathBuf::from(format!("/tmp/{long}.db")));
        assert!(name.0.starts_with("sha1-"));
    }

    #[test]
    fn test_same_path_derives_same_name() {
        let a = SharedMutexName::derive(&PathBuf::from("/tmp/same.db"));
        let b = SharedMutexName::derive(&PathBuf::from("/tmp/same.db"));
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(unix)]
    fn test_second_lock_on_same_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let name = SharedMutexName::derive(&dir.path().join("db.litedb"));
        let _first = ProcessLock::try_acquire(&name).unwrap();
        assert!(ProcessLock::try_acquire(&name).is_err());
    }
}
