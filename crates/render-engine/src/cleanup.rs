//! Scoped teardown for a render run.
//!
//! [`CleanupGuard`] owns the run's [`ProcessRegistry`]. It is created once
//! at the top of the run and fires when explicitly asked or when dropped,
//! whichever comes first. Dropping covers early `?` returns and
//! cancellation of the run future by a shutdown signal.
//!
//! Termination is a single SIGTERM per still-running render. There is no
//! SIGKILL escalation, so a render tool that ignores SIGTERM can outlive
//! scenemux.

use std::path::PathBuf;

use scenemux_common::config::Retention;

use crate::registry::{ProcessRegistry, SceneTask, TaskState};

/// What one firing of the guard did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Scenes that were sent a termination request.
    pub terminated: Vec<String>,

    /// Temp files deleted from disk.
    pub removed_files: Vec<PathBuf>,

    /// Temp files left in place because retention was requested.
    pub retained_files: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn terminate_requests(&self) -> usize {
        self.terminated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminated.is_empty() && self.removed_files.is_empty() && self.retained_files.is_empty()
    }
}

/// Owner of the run's registry; tears it down exactly once.
#[derive(Debug)]
pub struct CleanupGuard {
    registry: ProcessRegistry,
    retention: Retention,
    fired: bool,
}

impl CleanupGuard {
    pub fn new(retention: Retention) -> Self {
        Self::with_registry(ProcessRegistry::new(), retention)
    }

    pub fn with_registry(registry: ProcessRegistry, retention: Retention) -> Self {
        Self {
            registry,
            retention,
            fired: false,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProcessRegistry {
        &mut self.registry
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Terminate still-running renders and remove temp files.
    ///
    /// Only the first call does anything; later calls return an empty report.
    pub fn fire(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.fired {
            return report;
        }
        self.fired = true;

        for task in self.registry.tasks_mut() {
            if task.state() != TaskState::Running || task.terminate_requested() {
                continue;
            }
            if task.has_exited() {
                continue;
            }
            request_termination(task);
            task.mark_terminate_requested();
            report.terminated.push(task.scene().name.clone());
        }

        let temp_files: Vec<PathBuf> = self.registry.temp_files().iter().cloned().collect();
        for path in temp_files {
            if self.retention.keeps_files() {
                if path.exists() {
                    report.retained_files.push(path);
                }
                continue;
            }

            self.registry.forget_temp_file(&path);
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed_files.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        if !report.terminated.is_empty() {
            tracing::warn!(
                scenes = ?report.terminated,
                "Sent termination request to running renders"
            );
        }
        for path in &report.retained_files {
            tracing::info!(path = %path.display(), "Keeping temp file");
        }
        tracing::debug!(
            removed = report.removed_files.len(),
            retained = report.retained_files.len(),
            "Cleanup finished"
        );

        report
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(unix)]
fn request_termination(task: &mut SceneTask) {
    let Some(pid) = task.pid() else {
        return;
    };
    // Errors (ESRCH for an already-reaped process) are ignored.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    tracing::debug!(scene = %task.scene().name, pid, rc, "SIGTERM sent");
}

#[cfg(not(unix))]
fn request_termination(task: &mut SceneTask) {
    let scene = task.scene().name.clone();
    if let Some(child) = task.child_mut() {
        if let Err(e) = child.start_kill() {
            tracing::debug!(scene = %scene, error = %e, "Termination request failed");
        }
    }
}
