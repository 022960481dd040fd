//! Job registry: a single JSON document mapping job id to `Job`, with
//! atomic writes and smallest-unused-integer id assignment (§4.10).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use booking_domain::models::{Job, JobStatus, JobType};
use booking_domain::{Error, Result};

pub struct JobRegistry {
    path: PathBuf,
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    /// Loads `<data_dir>/jobs.json`, creating the directory and an empty
    /// registry file if neither exists yet.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(Error::Io)?;
        let path = data_dir.join("jobs.json");

        let jobs = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(Error::Io)?;
            if text.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            jobs: RwLock::new(jobs),
        })
    }

    pub fn log_path(&self, job_id: &str) -> PathBuf {
        self.path.with_file_name(format!("{job_id}.log"))
    }

    fn persist(&self) -> Result<()> {
        let jobs = self.jobs.read();
        let text = serde_json::to_string_pretty(&*jobs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }

    /// Smallest unused non-negative integer, string-serialised.
    fn next_id(&self) -> String {
        let jobs = self.jobs.read();
        let mut used: Vec<i64> = jobs.keys().filter_map(|k| k.parse::<i64>().ok()).collect();
        used.sort_unstable();
        let mut candidate = 0i64;
        for id in used.drain(..) {
            if id == candidate {
                candidate += 1;
            } else if id > candidate {
                break;
            }
        }
        candidate.to_string()
    }

    pub fn create(&self, job_type: JobType, name: String, config: Value, auto_start: bool) -> Result<Job> {
        let job_id = self.next_id();
        let job = Job {
            job_id: job_id.clone(),
            job_type,
            name,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            stopped_at: None,
            pid: None,
            config,
            error_message: None,
            auto_start,
        };
        self.jobs.write().insert(job_id, job.clone());
        self.persist()?;
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn list(&self, job_type: Option<JobType>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .values()
            .filter(|j| job_type.map(|t| j.job_type == t).unwrap_or(true))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn remove(&self, job_id: &str) -> Result<bool> {
        let removed = self.jobs.write().remove(job_id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Applies `update` to the stored job (if present) and persists the
    /// result atomically.
    pub fn update(&self, job_id: &str, update: impl FnOnce(&mut Job)) -> Result<Option<Job>> {
        let result = {
            let mut jobs = self.jobs.write();
            match jobs.get_mut(job_id) {
                Some(job) => {
                    update(job);
                    Some(job.clone())
                }
                None => None,
            }
        };
        if result.is_some() {
            self.persist()?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_assigned_as_smallest_unused_integer() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new(dir.path()).unwrap();
        let a = registry.create(JobType::Monitor, "a".into(), json!({}), false).unwrap();
        let b = registry.create(JobType::Monitor, "b".into(), json!({}), false).unwrap();
        assert_eq!(a.job_id, "0");
        assert_eq!(b.job_id, "1");
        registry.remove(&a.job_id).unwrap();
        let c = registry.create(JobType::Monitor, "c".into(), json!({}), false).unwrap();
        assert_eq!(c.job_id, "0");
    }

    #[test]
    fn registry_reloads_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = JobRegistry::new(dir.path()).unwrap();
            registry.create(JobType::Schedule, "daily".into(), json!({"hour": 12}), true).unwrap();
        }
        let reopened = JobRegistry::new(dir.path()).unwrap();
        let jobs = reopened.list(None);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "daily");
    }

    #[test]
    fn update_mutates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new(dir.path()).unwrap();
        let job = registry.create(JobType::KeepAlive, "ka".into(), json!({}), true).unwrap();
        registry
            .update(&job.job_id, |j| j.status = JobStatus::Running)
            .unwrap();
        assert_eq!(registry.get(&job.job_id).unwrap().status, JobStatus::Running);
    }
}
