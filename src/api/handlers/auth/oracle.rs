//! Black-box risk and quota oracles backed by stored procedures.
//!
//! The relational store owns the scoring formulas; this module only defines
//! the capability interface and the contract applied to oracle outputs, so
//! the decision engines stay testable with deterministic stand-ins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Instrument, info_span};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("oracle call failed: {0}")]
pub struct OracleError(pub String);

impl From<sqlx::Error> for OracleError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Privilege-escalation risk signal, computed fresh on every admin check and
/// never persisted here. The default is the documented safe fallback when the
/// risk oracle is degraded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RiskReport {
    pub risk_score: f64,
    pub is_suspicious: bool,
    pub should_block: bool,
}

/// Per-IP registration quota state, mutated by the store as a side effect of
/// each check; consulted, never owned.
#[derive(Clone, Debug, PartialEq)]
pub struct IpQuota {
    pub can_register: bool,
    pub is_blocked: bool,
    pub registration_count: i64,
    pub reason: Option<String>,
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse the store's textual level; unknown values read as low.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Low,
        }
    }
}

/// Per-IP fraud heuristic. The default is the non-fatal fallback when the
/// fraud oracle is degraded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FraudReport {
    pub risk_level: RiskLevel,
    pub fraud_score: f64,
}

impl Default for FraudReport {
    fn default() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            fraud_score: 0.0,
        }
    }
}

/// Capability interface over the external store's decision procedures.
#[async_trait]
pub trait TrustOracle: Send + Sync {
    /// Authoritative "is this identity a valid admin" answer.
    async fn check_eligibility(&self, user_id: Uuid) -> Result<bool, OracleError>;
    /// Escalation-risk analysis, independent of eligibility.
    async fn check_risk(&self, user_id: Uuid) -> Result<RiskReport, OracleError>;
    /// Per-IP registration quota check; counts this attempt as a side effect.
    async fn check_ip_quota(&self, ip: &str) -> Result<IpQuota, OracleError>;
    /// Per-IP fraud-pattern heuristic.
    async fn check_fraud(&self, ip: &str, user_agent: Option<&str>)
    -> Result<FraudReport, OracleError>;
    /// Whether a normalized institutional handle is already registered.
    async fn identity_taken(&self, handle: &str) -> Result<bool, OracleError>;
}

/// Production oracle invoking stored procedures on the relational store.
#[derive(Debug, Clone)]
pub struct PgTrustOracle {
    pool: PgPool,
}

impl PgTrustOracle {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrustOracle for PgTrustOracle {
    async fn check_eligibility(&self, user_id: Uuid) -> Result<bool, OracleError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query("SELECT check_admin_access($1) AS is_admin_secure")
            .bind(user_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.get("is_admin_secure"))
    }

    async fn check_risk(&self, user_id: Uuid) -> Result<RiskReport, OracleError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(
            "SELECT risk_score, is_suspicious, should_block FROM analyze_privilege_escalation($1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .instrument(span)
        .await?;
        Ok(RiskReport {
            risk_score: row.get("risk_score"),
            is_suspicious: row.get("is_suspicious"),
            should_block: row.get("should_block"),
        })
    }

    async fn check_ip_quota(&self, ip: &str) -> Result<IpQuota, OracleError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(
            "SELECT can_register, is_blocked, registration_count, reason, blocked_until
             FROM check_registration_allowed($1::inet)",
        )
        .bind(ip)
        .fetch_one(&self.pool)
        .instrument(span)
        .await?;
        Ok(IpQuota {
            can_register: row.get("can_register"),
            is_blocked: row.get("is_blocked"),
            registration_count: row.get("registration_count"),
            reason: row.get("reason"),
            blocked_until: row.get("blocked_until"),
        })
    }

    async fn check_fraud(
        &self,
        ip: &str,
        user_agent: Option<&str>,
    ) -> Result<FraudReport, OracleError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(
            "SELECT risk_level, fraud_score FROM analyze_registration_fraud($1::inet, $2)",
        )
        .bind(ip)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .instrument(span)
        .await?;
        let level: String = row.get("risk_level");
        Ok(FraudReport {
            risk_level: RiskLevel::parse(&level),
            fraud_score: row.get("fraud_score"),
        })
    }

    async fn identity_taken(&self, handle: &str) -> Result<bool, OracleError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(
            "SELECT EXISTS (
                 SELECT 1 FROM profiles
                 WHERE lower(trim(institutional_user)) = $1
             ) AS taken",
        )
        .bind(handle)
        .fetch_one(&self.pool)
        .instrument(span)
        .await?;
        Ok(row.get("taken"))
    }
}
