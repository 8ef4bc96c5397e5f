//! Registration fraud-prevention guard.
//!
//! Checks short-circuit in a fixed order: field presence, duplicate identity,
//! per-IP quota, fraud patterns. Resolution priority is blocked, quota
//! exceeded, repeat-or-medium (CAPTCHA), high risk, allow. Every attempt is
//! logged for downstream fraud analytics regardless of the branch taken;
//! account creation itself happens downstream, so the logged success flag is
//! always false here.

use super::{
    audit::{AuditRecord, AuditSink, Severity},
    oracle::{FraudReport, RiskLevel, TrustOracle},
    utils::normalize_handle,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub const REASON_MISSING_FIELDS: &str = "missing_fields";
pub const REASON_DUPLICATE_IDENTITY: &str = "duplicate_identity";
pub const REASON_IP_BLOCKED: &str = "ip_blocked";
pub const REASON_LIMIT_EXCEEDED: &str = "limit_exceeded";
pub const REASON_HIGH_RISK: &str = "high_risk";

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Transient registration input; never stored verbatim beyond the audit log.
#[derive(Clone, Debug)]
pub struct RegistrationAttempt {
    pub institutional_user: String,
    pub display_name: String,
    pub pin: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RegistrationDecision {
    pub can_register: bool,
    pub requires_captcha: bool,
    pub message: String,
    pub reason: Option<String>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RegistrationDecision {
    fn deny(message: &str, reason: &str) -> Self {
        Self {
            can_register: false,
            requires_captcha: false,
            message: message.to_string(),
            reason: Some(reason.to_string()),
            blocked_until: None,
        }
    }

    fn allow() -> Self {
        Self {
            can_register: true,
            requires_captcha: false,
            message: "Registration allowed".to_string(),
            reason: None,
            blocked_until: None,
        }
    }

    fn challenge() -> Self {
        Self {
            can_register: true,
            requires_captcha: true,
            message: "Additional verification required".to_string(),
            reason: None,
            blocked_until: None,
        }
    }
}

pub struct RegistrationGuard {
    oracle: Arc<dyn TrustOracle>,
    audit: Arc<dyn AuditSink>,
}

impl RegistrationGuard {
    #[must_use]
    pub fn new(oracle: Arc<dyn TrustOracle>, audit: Arc<dyn AuditSink>) -> Self {
        Self { oracle, audit }
    }

    /// Evaluate a candidate registration.
    ///
    /// # Errors
    /// Returns `RegistrationError::StoreUnavailable` when the uniqueness or
    /// quota oracle cannot answer; fraud-oracle failures degrade to low risk.
    pub async fn evaluate(
        &self,
        attempt: &RegistrationAttempt,
    ) -> Result<RegistrationDecision, RegistrationError> {
        let outcome = self.resolve(attempt).await;
        self.log_attempt(attempt, &outcome);
        outcome
    }

    async fn resolve(
        &self,
        attempt: &RegistrationAttempt,
    ) -> Result<RegistrationDecision, RegistrationError> {
        // Cheap rejection before touching external state.
        if attempt.institutional_user.trim().is_empty()
            || attempt.display_name.trim().is_empty()
            || attempt.pin.trim().is_empty()
        {
            return Ok(RegistrationDecision::deny(
                "All identity fields are required",
                REASON_MISSING_FIELDS,
            ));
        }

        // Uniqueness failures are definitive, not a risk signal: no CAPTCHA.
        let handle = normalize_handle(&attempt.institutional_user);
        let taken = self
            .oracle
            .identity_taken(&handle)
            .await
            .map_err(|err| RegistrationError::StoreUnavailable(err.to_string()))?;
        if taken {
            return Ok(RegistrationDecision::deny(
                "An account with this identity already exists",
                REASON_DUPLICATE_IDENTITY,
            ));
        }

        let quota = self
            .oracle
            .check_ip_quota(&attempt.ip_address)
            .await
            .map_err(|err| RegistrationError::StoreUnavailable(err.to_string()))?;

        // Fraud scoring augments, it does not gate: degrade to low on error.
        let fraud = match self
            .oracle
            .check_fraud(&attempt.ip_address, attempt.user_agent.as_deref())
            .await
        {
            Ok(report) => report,
            Err(err) => {
                warn!("fraud oracle degraded, using low risk: {err}");
                FraudReport::default()
            }
        };

        // Strict priority: blocked, quota, repeat-or-medium, high risk, allow.
        if quota.is_blocked {
            let mut decision = RegistrationDecision::deny(
                "This address is temporarily blocked from registering",
                REASON_IP_BLOCKED,
            );
            decision.blocked_until = quota.blocked_until;
            return Ok(decision);
        }

        if quota.reason.as_deref() == Some(REASON_LIMIT_EXCEEDED) {
            return Ok(RegistrationDecision::deny(
                "Maximum of 3 registrations per IP address",
                REASON_LIMIT_EXCEEDED,
            ));
        }

        if quota.registration_count >= 1 || fraud.risk_level == RiskLevel::Medium {
            return Ok(RegistrationDecision::challenge());
        }

        if fraud.risk_level == RiskLevel::High {
            return Ok(RegistrationDecision::deny(
                "Registration denied due to suspicious activity",
                REASON_HIGH_RISK,
            ));
        }

        Ok(RegistrationDecision::allow())
    }

    fn log_attempt(
        &self,
        attempt: &RegistrationAttempt,
        outcome: &Result<RegistrationDecision, RegistrationError>,
    ) {
        let (can_register, reason) = match outcome {
            Ok(decision) => (decision.can_register, decision.reason.clone()),
            Err(err) => (false, Some(err.to_string())),
        };
        self.audit.record(
            AuditRecord::new("registration_attempt", Severity::Info)
                .with_ip(Some(attempt.ip_address.clone()))
                .with_details(json!({
                    "institutional_user": normalize_handle(&attempt.institutional_user),
                    "success": false,
                    "can_register": can_register,
                    "reason": reason,
                    "user_agent": attempt.user_agent,
                })),
        );
    }
}
