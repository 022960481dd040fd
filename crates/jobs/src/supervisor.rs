//! Job Supervisor (C10): owns the job registry and the lifecycle of
//! every long-running worker subprocess.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use booking_domain::models::{Job, JobStatus, JobType};
use booking_domain::trace::TraceEvent;
use booking_domain::Result;

use crate::process::{is_alive, spawn_worker, stop_gracefully};
use crate::registry::JobRegistry;

const DEAD_PROCESS_MESSAGE: &str = "进程意外终止";

pub struct JobSupervisor {
    registry: JobRegistry,
    stop_grace: Duration,
}

impl JobSupervisor {
    pub fn new(data_dir: impl AsRef<std::path::Path>, stop_grace_secs: u64) -> Result<Self> {
        Ok(Self {
            registry: JobRegistry::new(data_dir)?,
            stop_grace: Duration::from_secs(stop_grace_secs),
        })
    }

    pub fn create_job(&self, job_type: JobType, name: String, config: Value, auto_start: bool) -> Result<Job> {
        let job = self.registry.create(job_type, name, config, auto_start)?;
        info!(job_id = %job.job_id, ?job_type, "job created");
        if auto_start {
            self.start_job(&job.job_id)?;
        }
        Ok(self.registry.get(&job.job_id).unwrap_or(job))
    }

    pub fn start_job(&self, job_id: &str) -> Result<bool> {
        let Some(job) = self.registry.get(job_id) else {
            return Ok(false);
        };
        if job.status == JobStatus::Running {
            return Ok(true);
        }

        let log_path = self.registry.log_path(job_id);
        match spawn_worker(job_id, &log_path) {
            Ok(pid) => {
                self.registry.update(job_id, |j| {
                    j.pid = Some(pid);
                    j.status = JobStatus::Running;
                    j.started_at = Some(chrono::Utc::now());
                    j.stopped_at = None;
                    j.error_message = None;
                })?;
                TraceEvent::JobStateChanged {
                    job_id: job_id.to_string(),
                    job_type: format!("{:?}", job.job_type),
                    from: format!("{:?}", job.status),
                    to: "Running".into(),
                }
                .emit();
                info!(job_id, pid, "job started");
                Ok(true)
            }
            Err(e) => {
                self.registry.update(job_id, |j| {
                    j.status = JobStatus::Failed;
                    j.stopped_at = Some(chrono::Utc::now());
                    j.error_message = Some(e.to_string());
                })?;
                warn!(job_id, error = %e, "failed to start job");
                Ok(false)
            }
        }
    }

    pub async fn stop_job(&self, job_id: &str) -> Result<bool> {
        let Some(job) = self.registry.get(job_id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Running {
            return Ok(true);
        }

        if let Some(pid) = job.pid {
            stop_gracefully(pid, self.stop_grace).await;
        }

        self.registry.update(job_id, |j| {
            j.status = JobStatus::Stopped;
            j.stopped_at = Some(chrono::Utc::now());
        })?;
        TraceEvent::JobStateChanged {
            job_id: job_id.to_string(),
            job_type: format!("{:?}", job.job_type),
            from: "Running".into(),
            to: "Stopped".into(),
        }
        .emit();
        info!(job_id, "job stopped");
        Ok(true)
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<bool> {
        if let Some(job) = self.registry.get(job_id) {
            if job.status == JobStatus::Running {
                self.stop_job(job_id).await?;
            }
        }
        self.registry.remove(job_id)
    }

    pub async fn delete_all_jobs(&self, job_type: Option<JobType>) -> Result<usize> {
        let jobs = self.registry.list(job_type);
        let mut deleted = 0;
        for job in jobs {
            if self.delete_job(&job.job_id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    pub fn list_jobs(&self, job_type: Option<JobType>) -> Vec<Job> {
        self.registry.list(job_type)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.registry.get(job_id)
    }

    /// Overwrites a job's `config` with the state a worker just ticked
    /// (e.g. an updated `MonitorState`/`ScheduleState` snapshot).
    pub fn update_config(&self, job_id: &str, config: Value) -> Result<()> {
        self.registry.update(job_id, |j| j.config = config)?;
        Ok(())
    }

    pub fn mark_completed(&self, job_id: &str) -> Result<()> {
        self.registry.update(job_id, |j| {
            j.status = JobStatus::Completed;
            j.stopped_at = Some(chrono::Utc::now());
        })?;
        Ok(())
    }

    pub fn mark_failed(&self, job_id: &str, message: String) -> Result<()> {
        self.registry.update(job_id, |j| {
            j.status = JobStatus::Failed;
            j.stopped_at = Some(chrono::Utc::now());
            j.error_message = Some(message);
        })?;
        Ok(())
    }

    pub fn get_job_logs(&self, job_id: &str, lines: usize) -> Vec<String> {
        let log_path = self.registry.log_path(job_id);
        let Ok(text) = std::fs::read_to_string(&log_path) else {
            return Vec::new();
        };
        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].iter().map(|l| l.to_string()).collect()
    }

    /// Transitions any Running job whose recorded pid is no longer alive
    /// to Failed with the dead-process message (§4.10 step 2, §10.5).
    pub fn cleanup_dead_jobs(&self) -> Result<usize> {
        let mut cleaned = 0;
        for job in self.registry.list(None) {
            if job.status == JobStatus::Running {
                let alive = job.pid.map(is_alive).unwrap_or(false);
                if !alive {
                    self.registry.update(&job.job_id, |j| {
                        j.status = JobStatus::Failed;
                        j.stopped_at = Some(chrono::Utc::now());
                        j.error_message = Some(DEAD_PROCESS_MESSAGE.to_string());
                    })?;
                    cleaned += 1;
                }
            }
        }
        if cleaned > 0 {
            info!(cleaned, "cleaned up dead jobs");
        }
        Ok(cleaned)
    }

    /// Supervisor startup sequence (§4.10): reconcile dead Running jobs,
    /// then auto-recover any KeepAlive job left Failed/Stopped (§10.5).
    pub fn reconcile_on_startup(&self) -> Result<()> {
        self.cleanup_dead_jobs()?;

        let mut recovered = 0;
        for job in self.registry.list(Some(JobType::KeepAlive)) {
            if matches!(job.status, JobStatus::Failed | JobStatus::Stopped) {
                if let Some(pid) = job.pid {
                    if is_alive(pid) {
                        self.registry.update(&job.job_id, |j| j.status = JobStatus::Running)?;
                        recovered += 1;
                        continue;
                    }
                }
                info!(job_id = %job.job_id, "auto-recovering keep-alive job");
                if self.start_job(&job.job_id)? {
                    recovered += 1;
                }
            }
        }
        if recovered > 0 {
            info!(recovered, "auto-recovered keep-alive jobs on startup");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cleanup_marks_dead_running_job_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = JobSupervisor::new(dir.path(), 2).unwrap();
        let job = supervisor
            .create_job(JobType::Monitor, "m".into(), json!({}), false)
            .unwrap();
        supervisor
            .registry
            .update(&job.job_id, |j| {
                j.status = JobStatus::Running;
                j.pid = Some(999_999_999);
            })
            .unwrap();

        let cleaned = supervisor.cleanup_dead_jobs().unwrap();
        assert_eq!(cleaned, 1);
        let job = supervisor.get_job(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(DEAD_PROCESS_MESSAGE));
    }

    #[test]
    fn reconcile_restarts_dead_keep_alive_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = JobSupervisor::new(dir.path(), 2).unwrap();
        let job = supervisor
            .create_job(JobType::KeepAlive, "ka".into(), json!({}), false)
            .unwrap();
        supervisor
            .registry
            .update(&job.job_id, |j| j.status = JobStatus::Failed)
            .unwrap();

        // current_exe() in a test binary still exists, so start_job
        // succeeds at spawning; we only assert the status transitions
        // away from Failed/Stopped.
        supervisor.reconcile_on_startup().unwrap();
        let job = supervisor.get_job(&job.job_id).unwrap();
        assert_ne!(job.status, JobStatus::Failed);
    }
}
