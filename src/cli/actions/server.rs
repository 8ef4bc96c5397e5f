use crate::{
    api,
    api::handlers::auth::{TrustConfig, audit::AuditWorkerConfig},
    continuity::{ClientClass, ContinuityConfig},
};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub identity_url: String,
    pub identity_credential: Option<SecretString>,
    pub client_class: String,
    pub admin_check_attempts: u32,
    pub admin_check_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub audit_queue_capacity: usize,
    pub audit_max_attempts: u32,
    pub heartbeat_seconds: u64,
    pub recovery_debounce_millis: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database pool or the server cannot be started.
pub async fn execute(args: Args) -> Result<()> {
    let trust_config = TrustConfig::new(args.identity_url)
        .with_admin_check_attempts(args.admin_check_attempts)
        .with_admin_check_window_seconds(args.admin_check_window_seconds)
        .with_register_attempts(args.register_attempts)
        .with_register_window_seconds(args.register_window_seconds);

    let audit_config = AuditWorkerConfig::new()
        .with_queue_capacity(args.audit_queue_capacity)
        .with_max_attempts(args.audit_max_attempts);

    let continuity_config = ContinuityConfig::new(ClientClass::parse(&args.client_class))
        .with_heartbeat_seconds(args.heartbeat_seconds)
        .with_debounce_millis(args.recovery_debounce_millis);

    api::new(
        args.port,
        args.dsn,
        trust_config,
        audit_config,
        continuity_config,
        args.identity_credential,
    )
    .await
}
