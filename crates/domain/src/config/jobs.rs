use serde::{Deserialize, Serialize};

/// Job Supervisor (C10) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Root directory for `jobs.json` and per-job log files.
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    /// Grace period between SIGTERM and SIGKILL on stop.
    #[serde(default = "d_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// Default keep-alive interval, seconds.
    #[serde(default = "d_keep_alive_interval_secs")]
    pub keep_alive_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
            stop_grace_secs: d_stop_grace_secs(),
            keep_alive_interval_secs: d_keep_alive_interval_secs(),
        }
    }
}

fn d_data_dir() -> String {
    "./data/jobs".into()
}
fn d_stop_grace_secs() -> u64 {
    2
}
fn d_keep_alive_interval_secs() -> u64 {
    900
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keep_alive_interval_is_fifteen_minutes() {
        assert_eq!(JobsConfig::default().keep_alive_interval_secs, 900);
    }

    #[test]
    fn default_stop_grace_is_two_seconds() {
        assert_eq!(JobsConfig::default().stop_grace_secs, 2);
    }
}
