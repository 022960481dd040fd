pub mod config;
pub mod doctor;
pub mod login;
pub mod pid;
pub mod systemd;

use clap::{Parser, Subcommand, ValueEnum};

use booking_domain::models::JobType;

/// booking-agent — an automated reservation agent for a university
/// sports-venue booking platform.
#[derive(Debug, Parser)]
#[command(name = "booking-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the supervisor and keep running (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Authenticate interactively and store the resulting session cookie.
    Login {
        /// Username (prompted if omitted).
        #[arg(long)]
        username: Option<String>,
        /// Password (prompted if omitted).
        #[arg(long)]
        password: Option<String>,
    },
    /// Internal entry point re-exec'd by the job supervisor; not meant
    /// to be invoked directly.
    #[command(hide = true)]
    JobWorker {
        #[arg(long = "job-id")]
        job_id: String,
    },
    /// Job management.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// List available slots for a venue/field type.
    Slots {
        #[arg(long)]
        preset: Option<i64>,
        #[arg(long)]
        venue_id: Option<String>,
        #[arg(long)]
        field_type_id: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        start_hour: Option<u32>,
        /// Include fully booked slots in the listing.
        #[arg(long)]
        show_full: bool,
        #[arg(long)]
        user: Option<String>,
    },
    /// Attempt a single immediate booking.
    Order {
        #[arg(long)]
        preset: Option<i64>,
        #[arg(long)]
        date: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the most recent booking outcomes.
    Bookings {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print version information.
    Version,
    /// Systemd service management.
    #[command(subcommand)]
    Systemd(SystemdCommand),
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List jobs, optionally filtered by type.
    List {
        #[arg(long, value_enum)]
        job_type: Option<JobTypeArg>,
    },
    /// Stop a running job's worker subprocess.
    Stop { job_id: String },
    /// Start (or restart) a job's worker subprocess.
    Start { job_id: String },
    /// Delete a job, stopping it first if it is running.
    Delete { job_id: String },
    /// Print a job's recent log lines.
    Logs {
        job_id: String,
        #[arg(long, default_value_t = 100)]
        lines: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum JobTypeArg {
    Monitor,
    Schedule,
    AutoBooking,
    KeepAlive,
}

impl From<JobTypeArg> for JobType {
    fn from(value: JobTypeArg) -> Self {
        match value {
            JobTypeArg::Monitor => JobType::Monitor,
            JobTypeArg::Schedule => JobType::Schedule,
            JobTypeArg::AutoBooking => JobType::AutoBooking,
            JobTypeArg::KeepAlive => JobType::KeepAlive,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SystemdCommand {
    /// Generate a systemd unit file and print it to stdout.
    Generate {
        /// Linux user to run the service as.
        #[arg(long, default_value = "booking-agent")]
        user: String,
        /// Working directory for the service.
        #[arg(long)]
        working_dir: Option<String>,
        /// Path to the config file.
        #[arg(long, default_value = "config.toml")]
        config: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `BOOKING_CONFIG`
/// (or `config.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
///
/// Shared by `serve`, `doctor`, and `config` subcommands so the logic
/// lives in one place.
pub fn load_config() -> anyhow::Result<(booking_domain::config::Config, String)> {
    let config_path = std::env::var("BOOKING_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        booking_domain::config::Config::default()
    };

    Ok((config, config_path))
}
