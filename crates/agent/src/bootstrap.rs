//! Composition root (§9 "replace module-level globals with a
//! composition root constructed once at startup and passed by
//! dependency"): builds every shared collaborator once from [`Config`]
//! and hands out an [`AppContext`] to the CLI, the job-worker dispatch,
//! and the facade.

use std::sync::Arc;
use std::time::Duration;

use booking_credentials::CredentialStore;
use booking_domain::config::Config;
use booking_domain::Result;
use booking_jobs::JobSupervisor;
use booking_notifier::Notifier;

use crate::login_session::LoginSessionManager;
use crate::records::BookingRecordLog;

/// Every long-lived collaborator the facade and the job workers share.
/// Built once per process; cheap to clone (everything is an `Arc`).
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub supervisor: Arc<JobSupervisor>,
    pub notifier: Arc<Notifier>,
    pub records: Arc<BookingRecordLog>,
    pub login_sessions: Arc<LoginSessionManager>,
}

/// The login session idle timeout (§5): 10 minutes.
const LOGIN_SESSION_IDLE_SECS: u64 = 600;

impl AppContext {
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let secret = secret_from_env(&config.credentials.secret_env);
        let credentials = Arc::new(CredentialStore::new(config.credentials.path.clone(), secret)?);

        let supervisor = Arc::new(JobSupervisor::new(&config.jobs.data_dir, config.jobs.stop_grace_secs)?);

        let notifier = Arc::new(Notifier::new(config.notifier.clone()));

        let records = Arc::new(BookingRecordLog::new(&config.jobs.data_dir)?);

        let login_sessions = Arc::new(LoginSessionManager::new(
            config.login.clone(),
            credentials.clone(),
            Duration::from_secs(LOGIN_SESSION_IDLE_SECS),
        )?);

        Ok(Self {
            config,
            credentials,
            supervisor,
            notifier,
            records,
            login_sessions,
        })
    }

    /// Supervisor startup sequence (§4.10): reconcile dead Running jobs,
    /// auto-recover KeepAlive jobs, and make sure a KeepAlive job exists
    /// at all (the source always runs one in the background).
    pub fn reconcile_on_startup(&self) -> Result<()> {
        self.supervisor.reconcile_on_startup()?;
        self.ensure_keep_alive_job()?;
        Ok(())
    }

    /// Creates the singleton KeepAlive job if the registry has none yet.
    fn ensure_keep_alive_job(&self) -> Result<()> {
        let existing = self
            .supervisor
            .list_jobs(Some(booking_domain::models::JobType::KeepAlive));
        if existing.is_empty() {
            self.supervisor.create_job(
                booking_domain::models::JobType::KeepAlive,
                "keep-alive".into(),
                serde_json::json!({ "interval_seconds": self.config.jobs.keep_alive_interval_secs }),
                true,
            )?;
        }
        Ok(())
    }
}

/// Reads the at-rest encryption secret named by `credentials.secret_env`,
/// when the env var is both configured and present (§4.1).
fn secret_from_env(var_name: &str) -> Option<String> {
    if var_name.is_empty() {
        return None;
    }
    std::env::var(var_name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.credentials.path = dir.join("credentials.json").to_string_lossy().into_owned();
        config.jobs.data_dir = dir.join("jobs").to_string_lossy().into_owned();
        config
    }

    #[test]
    fn build_creates_a_keep_alive_job_on_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::build(test_config(dir.path())).unwrap();
        ctx.reconcile_on_startup().unwrap();

        let jobs = ctx.supervisor.list_jobs(Some(booking_domain::models::JobType::KeepAlive));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn reconcile_is_idempotent_on_keep_alive_job_count() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::build(test_config(dir.path())).unwrap();
        ctx.reconcile_on_startup().unwrap();
        ctx.reconcile_on_startup().unwrap();

        let jobs = ctx.supervisor.list_jobs(Some(booking_domain::models::JobType::KeepAlive));
        assert_eq!(jobs.len(), 1);
    }
}
