//! Request/response types for the trust endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub risk_score: f64,
    pub is_suspicious: bool,
    pub validation_token: Option<String>,
}

/// Failure payload for the admin check; `blocked` is set only on the
/// suspicious-activity branch.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckFailure {
    pub is_valid: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegistrationValidateRequest {
    pub institutional_user: String,
    pub display_name: String,
    pub pin: String,
    pub user_agent: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationValidateResponse {
    pub success: bool,
    pub can_register: bool,
    pub requires_captcha: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub success: bool,
    pub can_access: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn access_check_response_uses_camel_case() -> Result<()> {
        let response = AccessCheckResponse {
            is_valid: true,
            user_id: Some("0193b0c8".to_string()),
            timestamp: Utc::now(),
            risk_score: 87.0,
            is_suspicious: true,
            validation_token: Some("token".to_string()),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("isValid").is_some());
        assert!(value.get("riskScore").is_some());
        assert!(value.get("validationToken").is_some());
        assert!(value.get("is_valid").is_none());
        Ok(())
    }

    #[test]
    fn failure_payload_omits_blocked_when_unset() -> Result<()> {
        let failure = AccessCheckFailure {
            is_valid: false,
            error: "Unauthenticated".to_string(),
            blocked: None,
        };
        let value = serde_json::to_value(&failure)?;
        assert!(value.get("blocked").is_none());
        Ok(())
    }

    #[test]
    fn registration_request_uses_snake_case_fields() -> Result<()> {
        let request: RegistrationValidateRequest = serde_json::from_value(serde_json::json!({
            "institutional_user": "vitor.souza",
            "display_name": "Vitor Souza",
            "pin": "4821",
        }))?;
        assert_eq!(request.institutional_user, "vitor.souza");
        assert!(request.user_agent.is_none());
        Ok(())
    }

    #[test]
    fn registration_response_round_trips() -> Result<()> {
        let response = RegistrationValidateResponse {
            success: true,
            can_register: false,
            requires_captcha: false,
            message: "An account with this identity already exists".to_string(),
            reason: Some("duplicate_identity".to_string()),
            blocked_until: None,
        };
        let value = serde_json::to_value(&response)?;
        let reason = value
            .get("reason")
            .and_then(serde_json::Value::as_str)
            .context("missing reason")?;
        assert_eq!(reason, "duplicate_identity");
        assert!(value.get("canRegister").is_some());
        assert!(value.get("blockedUntil").is_none());
        Ok(())
    }
}
