//! Admin access decision engine.
//!
//! Flow Overview:
//! 1) Record the check in the audit trail before evaluating anything.
//! 2) Ask the eligibility oracle (fatal on error) and the risk oracle
//!    (degrades to the safe default on error).
//! 3) Apply the decision rule: eligibility is checked first and exempts, so
//!    confirmed admins are never blocked on risk score alone; suspicious
//!    non-admins with `should_block` are.
//! 4) Mint a validation token only for valid decisions.
//!
//! Decisions are computed atomically from a single risk snapshot and are
//! immutable once constructed. Every branch writes exactly one terminal
//! audit record.

use super::{
    audit::{AuditRecord, AuditSink, Severity},
    identity::Identity,
    oracle::{RiskReport, TrustOracle},
    token::ValidationToken,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("admin eligibility verification failed")]
    VerificationFailed,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of one admin access check.
#[derive(Clone, Debug)]
pub struct AccessDecision {
    pub is_valid: bool,
    pub user_id: Uuid,
    pub risk_score: f64,
    pub is_suspicious: bool,
    pub blocked: bool,
    pub validation_token: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct AccessDecisionEngine {
    oracle: Arc<dyn TrustOracle>,
    audit: Arc<dyn AuditSink>,
}

impl AccessDecisionEngine {
    #[must_use]
    pub fn new(oracle: Arc<dyn TrustOracle>, audit: Arc<dyn AuditSink>) -> Self {
        Self { oracle, audit }
    }

    /// Evaluate admin access for a resolved identity.
    ///
    /// # Errors
    /// Returns `AccessError::VerificationFailed` when the eligibility oracle
    /// cannot answer; risk-oracle failures degrade to the safe default.
    pub async fn evaluate(
        &self,
        identity: &Identity,
        client_ip: Option<&str>,
    ) -> Result<AccessDecision, AccessError> {
        // Observability precedes judgment: failed paths stay traceable.
        self.audit.record(
            AuditRecord::new("admin_access_check", Severity::Info)
                .with_user(identity.id)
                .with_ip(client_ip.map(str::to_string)),
        );

        let eligible = match self.oracle.check_eligibility(identity.id).await {
            Ok(eligible) => eligible,
            Err(err) => {
                self.audit.record(
                    AuditRecord::new("admin_access_error", Severity::Critical)
                        .with_user(identity.id)
                        .with_ip(client_ip.map(str::to_string))
                        .with_details(json!({ "error": err.to_string() })),
                );
                return Err(AccessError::VerificationFailed);
            }
        };

        let risk = match self.oracle.check_risk(identity.id).await {
            Ok(report) => report,
            Err(err) => {
                // Never let a risk-oracle outage alone flip the decision.
                warn!("risk oracle degraded, using safe default: {err}");
                RiskReport::default()
            }
        };

        if !eligible && risk.should_block {
            self.audit.record(
                AuditRecord::new("admin_access_blocked", Severity::Critical)
                    .with_user(identity.id)
                    .with_ip(client_ip.map(str::to_string))
                    .with_details(json!({
                        "risk_score": risk.risk_score,
                        "is_suspicious": risk.is_suspicious,
                    })),
            );
            return Ok(AccessDecision {
                is_valid: false,
                user_id: identity.id,
                risk_score: risk.risk_score,
                is_suspicious: risk.is_suspicious,
                blocked: true,
                validation_token: None,
                timestamp: Utc::now(),
            });
        }

        if eligible {
            let token = ValidationToken::mint(identity.id)
                .map_err(|err| AccessError::Internal(err.to_string()))?;
            self.audit.record(
                AuditRecord::new("admin_access_granted", Severity::Info)
                    .with_user(identity.id)
                    .with_ip(client_ip.map(str::to_string))
                    .with_details(json!({ "risk_score": risk.risk_score })),
            );
            Ok(AccessDecision {
                is_valid: true,
                user_id: identity.id,
                risk_score: risk.risk_score,
                is_suspicious: risk.is_suspicious,
                blocked: false,
                validation_token: Some(token),
                timestamp: Utc::now(),
            })
        } else {
            self.audit.record(
                AuditRecord::new("admin_access_denied", Severity::Warning)
                    .with_user(identity.id)
                    .with_ip(client_ip.map(str::to_string))
                    .with_details(json!({ "risk_score": risk.risk_score })),
            );
            Ok(AccessDecision {
                is_valid: false,
                user_id: identity.id,
                risk_score: risk.risk_score,
                is_suspicious: risk.is_suspicious,
                blocked: false,
                validation_token: None,
                timestamp: Utc::now(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::audit::MemoryAuditSink;
    use crate::api::handlers::auth::test_support::StubOracle;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "root@example.com".to_string(),
            is_admin: true,
            role: "admin".to_string(),
        }
    }

    fn engine(oracle: StubOracle) -> (AccessDecisionEngine, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        (
            AccessDecisionEngine::new(Arc::new(oracle), audit.clone()),
            audit,
        )
    }

    #[tokio::test]
    async fn admins_are_exempt_from_risk_blocking() {
        let (engine, audit) = engine(StubOracle {
            eligible: Some(true),
            risk: Some(RiskReport {
                risk_score: 87.0,
                is_suspicious: true,
                should_block: true,
            }),
            ..StubOracle::default()
        });

        let decision = engine
            .evaluate(&identity(), Some("1.2.3.4"))
            .await
            .expect("evaluate");
        assert!(decision.is_valid);
        assert!(!decision.blocked);
        assert!(decision.validation_token.is_some());
        assert!((decision.risk_score - 87.0).abs() < f64::EPSILON);
        assert_eq!(
            audit.actions(),
            vec!["admin_access_check", "admin_access_granted"]
        );
    }

    #[tokio::test]
    async fn suspicious_non_admins_are_blocked() {
        let (engine, audit) = engine(StubOracle {
            eligible: Some(false),
            risk: Some(RiskReport {
                risk_score: 95.0,
                is_suspicious: true,
                should_block: true,
            }),
            ..StubOracle::default()
        });

        let decision = engine.evaluate(&identity(), None).await.expect("evaluate");
        assert!(!decision.is_valid);
        assert!(decision.blocked);
        assert!(decision.validation_token.is_none());
        assert_eq!(
            audit.actions(),
            vec!["admin_access_check", "admin_access_blocked"]
        );
    }

    #[tokio::test]
    async fn non_admins_without_block_flag_are_plainly_denied() {
        let (engine, audit) = engine(StubOracle {
            eligible: Some(false),
            risk: Some(RiskReport {
                risk_score: 95.0,
                is_suspicious: true,
                should_block: false,
            }),
            ..StubOracle::default()
        });

        let decision = engine.evaluate(&identity(), None).await.expect("evaluate");
        assert!(!decision.is_valid);
        assert!(!decision.blocked);
        assert!(decision.validation_token.is_none());
        assert_eq!(
            audit.actions(),
            vec!["admin_access_check", "admin_access_denied"]
        );
    }

    #[tokio::test]
    async fn eligibility_oracle_failure_is_fatal() {
        let (engine, audit) = engine(StubOracle {
            eligible: None,
            ..StubOracle::default()
        });

        let result = engine.evaluate(&identity(), None).await;
        assert!(matches!(result, Err(AccessError::VerificationFailed)));
        assert_eq!(
            audit.actions(),
            vec!["admin_access_check", "admin_access_error"]
        );
    }

    #[tokio::test]
    async fn risk_oracle_failure_degrades_to_safe_default() {
        // Degraded risk must not block a non-admin...
        let (nonadmin_engine, _) = engine(StubOracle {
            eligible: Some(false),
            risk: None,
            ..StubOracle::default()
        });
        let decision = nonadmin_engine
            .evaluate(&identity(), None)
            .await
            .expect("evaluate");
        assert!(!decision.blocked);
        assert!(!decision.is_suspicious);

        // ...and must not deny an eligible admin.
        let (engine, _) = engine(StubOracle {
            eligible: Some(true),
            risk: None,
            ..StubOracle::default()
        });
        let decision = engine.evaluate(&identity(), None).await.expect("evaluate");
        assert!(decision.is_valid);
        assert!((decision.risk_score - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn minted_token_carries_the_user_id() {
        let (engine, _) = engine(StubOracle {
            eligible: Some(true),
            ..StubOracle::default()
        });
        let subject = identity();
        let decision = engine.evaluate(&subject, None).await.expect("evaluate");
        let token = decision.validation_token.expect("token present");
        let claims = ValidationToken::decode(&token).expect("decode");
        assert_eq!(claims.user_id, subject.id);
    }
}
