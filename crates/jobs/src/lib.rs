//! Job orchestration: the supervised subprocess lifecycle (C10), plus the
//! per-job-type runtimes it spawns into (Keep-Alive C6, Cron C9, Monitor
//! C8) and the order-retry policy they share (§4.4.1).

pub mod attempt;
pub mod autobooking;
pub mod cron;
pub mod keepalive;
pub mod monitor;
pub mod process;
pub mod registry;
pub mod schedule;
pub mod supervisor;

pub use attempt::attempt_order_with_retry;
pub use autobooking::{run_autobooking_sweep, AutoBookingContext, AutoBookingOutcome};
pub use monitor::{run_monitor_tick, MonitorContext};
pub use registry::JobRegistry;
pub use schedule::{run_schedule_fire, ScheduleContext};
pub use supervisor::JobSupervisor;
