//! Deterministic stand-ins for engine and handler tests.

use super::audit::MemoryAuditSink;
use super::identity::{Identity, IdentityClient, IdentityError};
use super::oracle::{FraudReport, IpQuota, OracleError, RiskReport, TrustOracle};
use super::rate_limit::{InMemoryRateLimitStore, RateLimiter};
use super::state::{TrustConfig, TrustState};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Oracle whose answers are fixed up front; `None` means "this call errors".
/// Call counters let tests assert short-circuit behavior.
pub(crate) struct StubOracle {
    pub eligible: Option<bool>,
    pub risk: Option<RiskReport>,
    pub quota: Option<IpQuota>,
    pub fraud: Option<FraudReport>,
    pub taken: Option<bool>,
    pub eligibility_calls: AtomicUsize,
    pub risk_calls: AtomicUsize,
    pub quota_calls: AtomicUsize,
    pub fraud_calls: AtomicUsize,
    pub taken_calls: AtomicUsize,
}

pub(crate) fn fresh_quota() -> IpQuota {
    IpQuota {
        can_register: true,
        is_blocked: false,
        registration_count: 0,
        reason: None,
        blocked_until: None,
    }
}

impl Default for StubOracle {
    fn default() -> Self {
        Self {
            eligible: Some(false),
            risk: Some(RiskReport::default()),
            quota: Some(fresh_quota()),
            fraud: Some(FraudReport::default()),
            taken: Some(false),
            eligibility_calls: AtomicUsize::new(0),
            risk_calls: AtomicUsize::new(0),
            quota_calls: AtomicUsize::new(0),
            fraud_calls: AtomicUsize::new(0),
            taken_calls: AtomicUsize::new(0),
        }
    }
}

fn answer<T: Clone>(value: &Option<T>) -> Result<T, OracleError> {
    value
        .clone()
        .ok_or_else(|| OracleError("stub oracle failure".to_string()))
}

/// Identity client returning a fixed identity, or failing when `identity`
/// is `None`.
pub(crate) struct StubIdentityClient {
    pub identity: Option<Identity>,
}

impl StubIdentityClient {
    pub(crate) fn admin() -> Self {
        Self {
            identity: Some(Identity {
                id: Uuid::new_v4(),
                email: "root@example.com".to_string(),
                is_admin: true,
                role: "admin".to_string(),
            }),
        }
    }

    pub(crate) fn unauthenticated() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl IdentityClient for StubIdentityClient {
    async fn resolve(&self, _token: &str) -> Result<Identity, IdentityError> {
        self.identity
            .clone()
            .ok_or(IdentityError::Unauthenticated)
    }
}

/// Trust state wired entirely from stand-ins. The throttle allows two
/// attempts per window so tests can exercise the limit cheaply.
pub(crate) fn trust_state(oracle: StubOracle, identity: StubIdentityClient) -> Arc<TrustState> {
    let config = TrustConfig::new("http://identity.invalid".to_string())
        .with_admin_check_attempts(2)
        .with_register_attempts(2);
    Arc::new(TrustState::new(
        config,
        Arc::new(identity),
        Arc::new(oracle),
        Arc::new(MemoryAuditSink::new()),
        RateLimiter::new(Arc::new(InMemoryRateLimitStore::new())),
    ))
}

#[async_trait]
impl TrustOracle for StubOracle {
    async fn check_eligibility(&self, _user_id: Uuid) -> Result<bool, OracleError> {
        self.eligibility_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.eligible)
    }

    async fn check_risk(&self, _user_id: Uuid) -> Result<RiskReport, OracleError> {
        self.risk_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.risk)
    }

    async fn check_ip_quota(&self, _ip: &str) -> Result<IpQuota, OracleError> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.quota)
    }

    async fn check_fraud(
        &self,
        _ip: &str,
        _user_agent: Option<&str>,
    ) -> Result<FraudReport, OracleError> {
        self.fraud_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.fraud)
    }

    async fn identity_taken(&self, _handle: &str) -> Result<bool, OracleError> {
        self.taken_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.taken)
    }
}
