//! Scoped ownership of a job's working directory.
//!
//! Acquiring takes an exclusive `.lock` file; dropping releases it and purges
//! the directory unless the retention policy says to keep it.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    cache,
    error::{Result, SlidecastError},
};

#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub keep_artifacts: bool,
    pub preserve_on_failure: bool,
    pub purge: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    lock: PathBuf,
    retention: Retention,
    outcome: Outcome,
}

impl WorkDir {
    pub fn acquire(path: impl Into<PathBuf>, retention: Retention) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(cache::frames_dir(&path))?;
        fs::create_dir_all(cache::audio_dir(&path))?;

        let lock = cache::lock_path(&path);
        if let Err(e) = take_lock(&lock) {
            if e.kind() != ErrorKind::AlreadyExists {
                return Err(e.into());
            }
            if !lock_is_stale(&lock) {
                return Err(SlidecastError::WorkDirBusy { path });
            }
            warn!(lock = %lock.display(), "removing stale working directory lock");
            fs::remove_file(&lock)?;
            take_lock(&lock).map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => SlidecastError::WorkDirBusy { path: path.clone() },
                _ => e.into(),
            })?;
        }

        debug!(path = %path.display(), "acquired working directory");
        Ok(Self {
            path,
            lock,
            retention,
            outcome: Outcome::Pending,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mark_succeeded(&mut self) {
        self.outcome = Outcome::Succeeded;
    }

    pub fn mark_failed(&mut self) {
        self.outcome = Outcome::Failed;
    }

    /// Whether the directory survives this handle being dropped.
    pub fn retained(&self) -> bool {
        if self.retention.purge {
            return false;
        }
        match self.outcome {
            Outcome::Succeeded => self.retention.keep_artifacts,
            Outcome::Failed | Outcome::Pending => self.retention.preserve_on_failure,
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(error = %e, "failed to release working directory lock");
        }
        if self.retained() {
            return;
        }
        debug!(path = %self.path.display(), "purging working directory");
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to purge working directory");
        }
    }
}

fn take_lock(lock: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(lock)?;
    writeln!(file, "{}", std::process::id())
}

/// A lock is stale when the pid it records no longer exists.
fn lock_is_stale(lock: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(lock) else {
        return false;
    };
    match contents.trim().parse::<u32>() {
        Ok(pid) => !process_alive(pid),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks that the pid exists.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
