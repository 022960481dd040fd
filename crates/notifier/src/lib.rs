//! Notifier (C11): broadcasts order and monitor outcomes to an
//! OneBot-compatible chat bot.

pub mod client;
pub mod message;

pub use client::Notifier;
pub use message::{build_monitor_message, build_order_message, MonitorNotification, MonitorSlotLine, OrderNotification};
