//! # Mailgate Scheduler
//!
//! Owns the recurring scan loop: a lightweight cron parser computes the
//! next wake time, a cancellable sleep waits for it, one scan cycle runs,
//! and any newly discovered alerts are handed to the webhook notifier.
//! The loop survives every transient failure — recovery is always the
//! next tick.

pub mod cron;
pub mod poll;

pub use cron::next_occurrence;
pub use poll::run_scan_loop;
