mod bootstrap;
mod cli;
mod facade;
mod login_session;
mod records;
mod worker;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use booking_domain::config::ConfigSeverity;
use booking_domain::models::JobType;

use bootstrap::AppContext;
use cli::{Cli, Command, ConfigCommand, JobsCommand, SystemdCommand};
use facade::ServiceFacade;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            run_serve(config).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            let valid = cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Login { username, password }) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            let facade = ServiceFacade::new(ctx);
            let ok = cli::login::login(&facade, username, password).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::JobWorker { job_id }) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            if let Err(e) = worker::run(&job_id, &ctx).await {
                tracing::error!(job_id = %job_id, error = %e, "job worker exited with error");
                if let Err(mark_err) = ctx.supervisor.mark_failed(&job_id, e.to_string()) {
                    tracing::warn!(job_id = %job_id, error = %mark_err, "failed to record job failure");
                }
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Jobs(sub)) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            let facade = ServiceFacade::new(ctx);
            run_jobs_command(&facade, sub).await
        }
        Some(Command::Slots {
            preset,
            venue_id,
            field_type_id,
            date,
            start_hour,
            show_full,
            user,
        }) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            let facade = ServiceFacade::new(ctx);
            let result = facade
                .list_slots(preset, venue_id, field_type_id, date, start_hour, show_full, user.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Some(Command::Order { preset, date, start, end, user }) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            let facade = ServiceFacade::new(ctx);
            let result = facade.order_once(preset, date, start, end, user.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Bookings { limit }) => {
            let (config, _config_path) = cli::load_config()?;
            let ctx = AppContext::build(config)?;
            let facade = ServiceFacade::new(ctx);
            let records = facade.recent_bookings(limit);
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("booking-agent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Command::Systemd(SystemdCommand::Generate { user, working_dir, config })) => {
            cli::systemd::generate(&user, working_dir.as_deref(), &config);
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for commands that run for a
/// while: `serve`, `job-worker`, `login`, `jobs`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,booking_agent=debug")))
        .json()
        .init();
}

/// Builds the composition root, reconciles the job supervisor, writes
/// the PID file, and blocks until interrupted (§4.10, §9).
async fn run_serve(config: booking_domain::config::Config) -> anyhow::Result<()> {
    tracing::info!("booking-agent starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let pid_path = std::path::Path::new(&config.jobs.data_dir).join("booking-agent.pid");
    let ctx = AppContext::build(config)?;
    let _pid_handle = cli::pid::write_pid_file(&pid_path)?;

    ctx.reconcile_on_startup()?;
    tracing::info!("job supervisor reconciled, keep-alive job ensured");

    // Periodic dead-worker sweep: a Monitor/Schedule/AutoBooking worker
    // that crashed is marked Failed instead of staying Running forever.
    {
        let supervisor = ctx.supervisor.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                match supervisor.cleanup_dead_jobs() {
                    Ok(0) => {}
                    Ok(n) => tracing::warn!(count = n, "marked dead job(s) as failed"),
                    Err(e) => tracing::warn!(error = %e, "dead-job cleanup failed"),
                }
            }
        });
    }

    tracing::info!("booking-agent supervising jobs; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    cli::pid::remove_pid_file(&pid_path, _pid_handle);
    Ok(())
}

async fn run_jobs_command(facade: &ServiceFacade, command: JobsCommand) -> anyhow::Result<()> {
    match command {
        JobsCommand::List { job_type } => {
            let jobs = facade.list_jobs(job_type.map(JobType::from));
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        JobsCommand::Stop { job_id } => {
            let stopped = facade.stop_monitor(&job_id).await?;
            println!("{}", if stopped { "stopped" } else { "job was not running" });
        }
        JobsCommand::Start { job_id } => {
            let started = facade.resume_monitor(&job_id)?;
            println!("{}", if started { "started" } else { "job was already running" });
        }
        JobsCommand::Delete { job_id } => {
            let deleted = facade.cancel_scheduled_job(&job_id).await?;
            println!("{}", if deleted { "deleted" } else { "job not found" });
        }
        JobsCommand::Logs { job_id, lines } => {
            for line in facade.job_logs(&job_id, lines) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
