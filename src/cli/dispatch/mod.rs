//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{identity, trust};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let identity_opts = identity::Options::parse(matches)?;
    let trust_opts = trust::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        identity_url: identity_opts.url,
        identity_credential: identity_opts.credential,
        client_class: identity_opts.client_class,
        admin_check_attempts: trust_opts.admin_check_attempts,
        admin_check_window_seconds: trust_opts.admin_check_window_seconds,
        register_attempts: trust_opts.register_attempts,
        register_window_seconds: trust_opts.register_window_seconds,
        audit_queue_capacity: trust_opts.audit_queue_capacity,
        audit_max_attempts: trust_opts.audit_max_attempts,
        heartbeat_seconds: trust_opts.heartbeat_seconds,
        recovery_debounce_millis: trust_opts.recovery_debounce_millis,
    }))
}
