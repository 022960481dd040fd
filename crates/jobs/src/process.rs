//! Subprocess spawning and graceful termination for supervised jobs
//! (§4.10). Each job runs as a re-exec of the current binary invoked with
//! `job-worker --job-id <id>`, its stdout/stderr appended to the job's
//! log file.

use std::path::Path;
use std::process::Stdio;

use booking_domain::{Error, Result};
use tokio::process::Command;

/// Spawns the worker subprocess for `job_id`, redirecting combined
/// stdout/stderr to `log_path`, and returns its pid.
pub fn spawn_worker(job_id: &str, log_path: &Path) -> Result<u32> {
    let exe = std::env::current_exe().map_err(Error::Io)?;
    let log_file = std::fs::File::create(log_path).map_err(Error::Io)?;
    let stderr_file = log_file.try_clone().map_err(Error::Io)?;

    let child = Command::new(exe)
        .arg("job-worker")
        .arg("--job-id")
        .arg(job_id)
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(stderr_file))
        .stdin(Stdio::null())
        .spawn()
        .map_err(Error::Io)?;

    let pid = child
        .id()
        .ok_or_else(|| Error::Other("spawned worker has no pid".into()))?;

    // Detach: the supervisor tracks liveness by pid, not by owning the
    // tokio::process::Child handle (it would otherwise reap on drop).
    std::mem::forget(child);

    Ok(pid)
}

/// True if a process with this pid is still alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Sends SIGTERM, waits `grace` for the process to exit, then SIGKILL if
/// it is still alive (§4.10 "stop is graceful").
#[cfg(unix)]
pub async fn stop_gracefully(pid: u32, grace: std::time::Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let nix_pid = Pid::from_raw(pid as i32);
    if kill(nix_pid, Signal::SIGTERM).is_err() {
        return; // already gone
    }

    tokio::time::sleep(grace).await;

    if is_alive(pid) {
        let _ = kill(nix_pid, Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
pub async fn stop_gracefully(_pid: u32, grace: std::time::Duration) {
    tokio::time::sleep(grace).await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn is_alive_true_for_current_process() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn is_alive_false_for_implausible_pid() {
        // PID_MAX on Linux never reaches this; a reused PID collision is
        // astronomically unlikely in a short-lived test run.
        assert!(!is_alive(i32::MAX as u32 - 1));
    }
}
