//! Dashboard access check endpoint.
//!
//! Same decision pipeline as the admin check, shaped for UI consumption:
//! the profile is only populated when access is granted.

use super::{
    identity,
    state::TrustState,
    types::{DashboardResponse, UserProfile},
    utils::extract_client_ip,
};
use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/trust/dashboard",
    params(
        ("Authorization" = String, Header, description = "Bearer credential"),
    ),
    responses(
        (status = 200, description = "Access granted with profile", body = DashboardResponse),
        (status = 401, description = "Missing or invalid credential", body = DashboardResponse),
        (status = 403, description = "Denied or blocked", body = DashboardResponse),
        (status = 500, description = "Eligibility verification failed", body = DashboardResponse),
    ),
    tag = "trust"
)]
pub async fn dashboard(headers: HeaderMap, state: Extension<Arc<TrustState>>) -> impl IntoResponse {
    let identity = match identity::verify(&headers, state.identity()).await {
        Ok(identity) => identity,
        Err(_) => return refusal(StatusCode::UNAUTHORIZED, "Authentication required"),
    };

    let client_ip = extract_client_ip(&headers);
    match state.access().evaluate(&identity, client_ip.as_deref()).await {
        Ok(decision) if decision.is_valid => {
            let response = DashboardResponse {
                success: true,
                can_access: true,
                message: "Access granted".to_string(),
                user_profile: Some(UserProfile {
                    id: identity.id.to_string(),
                    email: identity.email,
                    role: identity.role,
                }),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(decision) if decision.blocked => refusal(
            StatusCode::FORBIDDEN,
            "Access blocked due to suspicious activity",
        ),
        Ok(_) => refusal(StatusCode::FORBIDDEN, "Admin privileges required"),
        Err(_) => refusal(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Verification temporarily unavailable",
        ),
    }
}

fn refusal(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(DashboardResponse {
            success: false,
            can_access: false,
            message: message.to_string(),
            user_profile: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn granted_access_includes_profile() {
        let state = trust_state(
            StubOracle {
                eligible: Some(true),
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );

        let response = dashboard(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["canAccess"], true);
        assert_eq!(body["userProfile"]["email"], "root@example.com");
        assert_eq!(body["userProfile"]["role"], "admin");
    }

    #[tokio::test]
    async fn denied_access_has_no_profile() {
        let state = trust_state(
            StubOracle {
                eligible: Some(false),
                ..StubOracle::default()
            },
            StubIdentityClient::admin(),
        );

        let response = dashboard(bearer_headers(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["canAccess"], false);
        assert!(body.get("userProfile").is_none());
    }

    #[tokio::test]
    async fn missing_credential_requires_authentication() {
        let state = trust_state(StubOracle::default(), StubIdentityClient::unauthenticated());
        let response = dashboard(HeaderMap::new(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Authentication required");
    }
}
