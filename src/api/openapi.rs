//! OpenAPI document for the served routes.

use crate::api::handlers::{auth, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::admin::admin_check,
        auth::register::register_validate,
        auth::dashboard::dashboard,
    ),
    components(schemas(
        health::Health,
        auth::types::AccessCheckResponse,
        auth::types::AccessCheckFailure,
        auth::types::RegistrationValidateRequest,
        auth::types::RegistrationValidateResponse,
        auth::types::DashboardResponse,
        auth::types::UserProfile,
    )),
    tags(
        (name = "trust", description = "Trust decision endpoints"),
        (name = "health", description = "Service health probes"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_trust_routes() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/v1/trust/admin/check"));
        assert!(
            paths
                .iter()
                .any(|p| p.as_str() == "/v1/trust/register/validate")
        );
        assert!(paths.iter().any(|p| p.as_str() == "/v1/trust/dashboard"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
