//! Trust pipeline state and configuration.

use super::{
    access::AccessDecisionEngine, audit::AuditSink, identity::IdentityClient,
    oracle::TrustOracle, rate_limit::RateLimiter, registration::RegistrationGuard,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ADMIN_CHECK_ATTEMPTS: u32 = 10;
const DEFAULT_ADMIN_CHECK_WINDOW_SECONDS: u64 = 60;
const DEFAULT_REGISTER_ATTEMPTS: u32 = 30;
const DEFAULT_REGISTER_WINDOW_SECONDS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct TrustConfig {
    identity_url: String,
    admin_check_attempts: u32,
    admin_check_window: Duration,
    register_attempts: u32,
    register_window: Duration,
}

impl TrustConfig {
    #[must_use]
    pub fn new(identity_url: String) -> Self {
        Self {
            identity_url,
            admin_check_attempts: DEFAULT_ADMIN_CHECK_ATTEMPTS,
            admin_check_window: Duration::from_secs(DEFAULT_ADMIN_CHECK_WINDOW_SECONDS),
            register_attempts: DEFAULT_REGISTER_ATTEMPTS,
            register_window: Duration::from_secs(DEFAULT_REGISTER_WINDOW_SECONDS),
        }
    }

    #[must_use]
    pub fn with_admin_check_attempts(mut self, attempts: u32) -> Self {
        self.admin_check_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_admin_check_window_seconds(mut self, seconds: u64) -> Self {
        self.admin_check_window = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_register_attempts(mut self, attempts: u32) -> Self {
        self.register_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_register_window_seconds(mut self, seconds: u64) -> Self {
        self.register_window = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }

    #[must_use]
    pub fn admin_check_attempts(&self) -> u32 {
        self.admin_check_attempts
    }

    #[must_use]
    pub fn admin_check_window(&self) -> Duration {
        self.admin_check_window
    }

    #[must_use]
    pub fn register_attempts(&self) -> u32 {
        self.register_attempts
    }

    #[must_use]
    pub fn register_window(&self) -> Duration {
        self.register_window
    }
}

pub struct TrustState {
    config: TrustConfig,
    identity: Arc<dyn IdentityClient>,
    access: AccessDecisionEngine,
    registration: RegistrationGuard,
    rate_limiter: RateLimiter,
}

impl TrustState {
    #[must_use]
    pub fn new(
        config: TrustConfig,
        identity: Arc<dyn IdentityClient>,
        oracle: Arc<dyn TrustOracle>,
        audit: Arc<dyn AuditSink>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            config,
            identity,
            access: AccessDecisionEngine::new(oracle.clone(), audit.clone()),
            registration: RegistrationGuard::new(oracle, audit),
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &dyn IdentityClient {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn access(&self) -> &AccessDecisionEngine {
        &self.access
    }

    #[must_use]
    pub fn registration(&self) -> &RegistrationGuard {
        &self.registration
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
