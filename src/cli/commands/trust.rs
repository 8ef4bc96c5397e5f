//! CLI arguments tuning the trust-decision pipelines.

use anyhow::Result;
use clap::{Arg, Command, value_parser};

pub const ARG_ADMIN_CHECK_ATTEMPTS: &str = "admin-check-attempts";
pub const ARG_ADMIN_CHECK_WINDOW_SECONDS: &str = "admin-check-window-seconds";
pub const ARG_REGISTER_ATTEMPTS: &str = "register-attempts";
pub const ARG_REGISTER_WINDOW_SECONDS: &str = "register-window-seconds";
pub const ARG_AUDIT_QUEUE_CAPACITY: &str = "audit-queue-capacity";
pub const ARG_AUDIT_MAX_ATTEMPTS: &str = "audit-max-attempts";
pub const ARG_HEARTBEAT_SECONDS: &str = "heartbeat-seconds";
pub const ARG_RECOVERY_DEBOUNCE_MILLIS: &str = "recovery-debounce-millis";

#[derive(Debug)]
pub struct Options {
    pub admin_check_attempts: u32,
    pub admin_check_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub audit_queue_capacity: usize,
    pub audit_max_attempts: u32,
    pub heartbeat_seconds: u64,
    pub recovery_debounce_millis: u64,
}

impl Options {
    /// # Errors
    /// Currently infallible; kept fallible for parity with the other option groups.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            admin_check_attempts: matches
                .get_one::<u32>(ARG_ADMIN_CHECK_ATTEMPTS)
                .copied()
                .unwrap_or(10),
            admin_check_window_seconds: matches
                .get_one::<u64>(ARG_ADMIN_CHECK_WINDOW_SECONDS)
                .copied()
                .unwrap_or(60),
            register_attempts: matches
                .get_one::<u32>(ARG_REGISTER_ATTEMPTS)
                .copied()
                .unwrap_or(30),
            register_window_seconds: matches
                .get_one::<u64>(ARG_REGISTER_WINDOW_SECONDS)
                .copied()
                .unwrap_or(3600),
            audit_queue_capacity: matches
                .get_one::<usize>(ARG_AUDIT_QUEUE_CAPACITY)
                .copied()
                .unwrap_or(1024),
            audit_max_attempts: matches
                .get_one::<u32>(ARG_AUDIT_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            heartbeat_seconds: matches
                .get_one::<u64>(ARG_HEARTBEAT_SECONDS)
                .copied()
                .unwrap_or(240),
            recovery_debounce_millis: matches
                .get_one::<u64>(ARG_RECOVERY_DEBOUNCE_MILLIS)
                .copied()
                .unwrap_or(2000),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_CHECK_ATTEMPTS)
                .long(ARG_ADMIN_CHECK_ATTEMPTS)
                .help("Max admin access checks per client IP inside the window")
                .env("SENTINELA_ADMIN_CHECK_ATTEMPTS")
                .default_value("10")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ADMIN_CHECK_WINDOW_SECONDS)
                .long(ARG_ADMIN_CHECK_WINDOW_SECONDS)
                .help("Admin access check rate-limit window in seconds")
                .env("SENTINELA_ADMIN_CHECK_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REGISTER_ATTEMPTS)
                .long(ARG_REGISTER_ATTEMPTS)
                .help("Max registration validations per client IP inside the window")
                .env("SENTINELA_REGISTER_ATTEMPTS")
                .default_value("30")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_REGISTER_WINDOW_SECONDS)
                .long(ARG_REGISTER_WINDOW_SECONDS)
                .help("Registration rate-limit window in seconds")
                .env("SENTINELA_REGISTER_WINDOW_SECONDS")
                .default_value("3600")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_AUDIT_QUEUE_CAPACITY)
                .long(ARG_AUDIT_QUEUE_CAPACITY)
                .help("Bounded capacity of the in-process audit queue")
                .env("SENTINELA_AUDIT_QUEUE_CAPACITY")
                .default_value("1024")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_AUDIT_MAX_ATTEMPTS)
                .long(ARG_AUDIT_MAX_ATTEMPTS)
                .help("Max write attempts per audit record before it is counted as dropped")
                .env("SENTINELA_AUDIT_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_HEARTBEAT_SECONDS)
                .long(ARG_HEARTBEAT_SECONDS)
                .help("Session continuity heartbeat interval in seconds")
                .env("SENTINELA_HEARTBEAT_SECONDS")
                .default_value("240")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RECOVERY_DEBOUNCE_MILLIS)
                .long(ARG_RECOVERY_DEBOUNCE_MILLIS)
                .help("Delay before reacting to an unexpected sign-out, in milliseconds")
                .env("SENTINELA_RECOVERY_DEBOUNCE_MILLIS")
                .default_value("2000")
                .value_parser(value_parser!(u64)),
        )
}
