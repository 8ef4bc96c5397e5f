//! Admin access check endpoint.
//!
//! Flow Overview:
//! 1) Throttle per client IP before any external call.
//! 2) Resolve the bearer credential to an identity (with the mobile retry).
//! 3) Run the access decision engine and map its outcome to HTTP.

use super::{
    access::AccessError,
    identity,
    state::TrustState,
    types::{AccessCheckFailure, AccessCheckResponse},
    utils::{client_ip_or_loopback, extract_client_ip},
};
use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    post,
    path = "/v1/trust/admin/check",
    params(
        ("Authorization" = String, Header, description = "Bearer credential"),
        ("X-Client-Class" = Option<String>, Header, description = "Client reliability hint"),
    ),
    responses(
        (status = 200, description = "Access decision with validation token", body = AccessCheckResponse),
        (status = 401, description = "Missing or invalid credential", body = AccessCheckFailure),
        (status = 403, description = "Denied or blocked", body = AccessCheckFailure),
        (status = 429, description = "Too many attempts", body = AccessCheckFailure),
        (status = 500, description = "Eligibility verification failed", body = AccessCheckFailure),
    ),
    tag = "trust"
)]
pub async fn admin_check(
    headers: HeaderMap,
    state: Extension<Arc<TrustState>>,
) -> impl IntoResponse {
    let client_ip = extract_client_ip(&headers);
    let limiter_key = format!("admin_check:{}", client_ip_or_loopback(&headers));
    if !state.rate_limiter().allow(
        &limiter_key,
        state.config().admin_check_attempts(),
        state.config().admin_check_window(),
    ) {
        return failure(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts, slow down",
            None,
        );
    }

    let identity = match identity::verify(&headers, state.identity()).await {
        Ok(identity) => identity,
        Err(_) => return failure(StatusCode::UNAUTHORIZED, "Unauthenticated", None),
    };

    match state.access().evaluate(&identity, client_ip.as_deref()).await {
        Ok(decision) if decision.blocked => failure(
            StatusCode::FORBIDDEN,
            "Access blocked due to suspicious activity",
            Some(true),
        ),
        Ok(decision) if !decision.is_valid => {
            failure(StatusCode::FORBIDDEN, "Admin privileges required", None)
        }
        Ok(decision) => {
            let response = AccessCheckResponse {
                is_valid: true,
                user_id: Some(decision.user_id.to_string()),
                timestamp: decision.timestamp,
                risk_score: decision.risk_score,
                is_suspicious: decision.is_suspicious,
                validation_token: decision.validation_token,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(AccessError::VerificationFailed) => failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Eligibility verification failed",
            None,
        ),
        Err(AccessError::Internal(err)) => {
            error!("admin check failed: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", None)
        }
    }
}

fn failure(status: StatusCode, error: &str, blocked: Option<bool>) -> axum::response::Response {
    (
        status,
        Json(AccessCheckFailure {
            is_valid: false,
            error: error.to_string(),
            blocked,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::oracle::RiskReport;
    use crate::api::handlers::auth::test_support::{StubIdentityClient, StubOracle, trust_state};
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn bearer_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn eligible_admin_gets_token_despite_block_flag() {
        let state = trust_state(
            StubOracle {
                eligible: Some(true),
                risk: Some(RiskReport {
                    risk_score: 87.0,
                    is_suspicious: true,
                    should_block: true,
                }),
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );

        let response = admin_check(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["isValid"], true);
        assert_eq!(body["riskScore"], 87.0);
        assert!(body["validationToken"].is_string());
        assert!(body.get("blocked").is_none());
    }

    #[tokio::test]
    async fn suspicious_non_admin_is_blocked_with_403() {
        let state = trust_state(
            StubOracle {
                eligible: Some(false),
                risk: Some(RiskReport {
                    risk_score: 95.0,
                    is_suspicious: true,
                    should_block: true,
                }),
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );

        let response = admin_check(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["isValid"], false);
        assert_eq!(body["blocked"], true);
    }

    #[tokio::test]
    async fn missing_credential_is_unauthenticated() {
        let state = trust_state(StubOracle::default(), StubIdentityClient::admin());
        let response = admin_check(HeaderMap::new(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unauthenticated");
        assert!(body.get("validationToken").is_none());
    }

    #[tokio::test]
    async fn oracle_outage_maps_to_500() {
        let state = trust_state(
            StubOracle {
                eligible: None,
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );
        let response = admin_check(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn repeated_checks_hit_the_throttle() {
        let state = trust_state(
            StubOracle {
                eligible: Some(true),
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );

        // The stub state allows two checks per window.
        for _ in 0..2 {
            let response = admin_check(bearer_headers(), Extension(state.clone()))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = admin_check(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
