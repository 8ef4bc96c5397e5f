//! Registration validation endpoint.

use super::{
    registration::{REASON_MISSING_FIELDS, RegistrationAttempt},
    state::TrustState,
    types::{RegistrationValidateRequest, RegistrationValidateResponse},
    utils::client_ip_or_loopback,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    post,
    path = "/v1/trust/register/validate",
    request_body = RegistrationValidateRequest,
    responses(
        (status = 200, description = "Validation decision", body = RegistrationValidateResponse),
        (status = 400, description = "Missing payload or required fields", body = RegistrationValidateResponse),
        (status = 429, description = "Too many attempts", body = RegistrationValidateResponse),
        (status = 500, description = "Validation store unavailable", body = RegistrationValidateResponse),
    ),
    tag = "trust"
)]
pub async fn register_validate(
    headers: HeaderMap,
    state: Extension<Arc<TrustState>>,
    payload: Option<Json<RegistrationValidateRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return refusal(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let ip_address = client_ip_or_loopback(&headers);
    let limiter_key = format!("register:{ip_address}");
    if !state.rate_limiter().allow(
        &limiter_key,
        state.config().register_attempts(),
        state.config().register_window(),
    ) {
        return refusal(StatusCode::TOO_MANY_REQUESTS, "Too many attempts, slow down");
    }

    // Body-provided agent wins; the header is the fallback for thin clients.
    let user_agent = request.user_agent.clone().or_else(|| {
        headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });

    let attempt = RegistrationAttempt {
        institutional_user: request.institutional_user,
        display_name: request.display_name,
        pin: request.pin,
        ip_address,
        user_agent,
    };

    match state.registration().evaluate(&attempt).await {
        Ok(decision) => {
            let status = if decision.reason.as_deref() == Some(REASON_MISSING_FIELDS) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            let response = RegistrationValidateResponse {
                success: status == StatusCode::OK,
                can_register: decision.can_register,
                requires_captcha: decision.requires_captcha,
                message: decision.message,
                reason: decision.reason,
                blocked_until: decision.blocked_until,
            };
            (status, Json(response)).into_response()
        }
        Err(err) => {
            error!("registration validation failed: {err}");
            refusal(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Validation temporarily unavailable",
            )
        }
    }
}

fn refusal(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(RegistrationValidateResponse {
            success: false,
            can_register: false,
            requires_captcha: false,
            message: message.to_string(),
            reason: None,
            blocked_until: None,
        }),
    )
        .into_response()
}
