use crate::{
    api::handlers::{auth, health, preflight, root},
    continuity::{self, ContinuityConfig, ContinuitySignal},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

// Keep these internal to the crate while allowing CLI/server wiring to reference them.
pub(crate) mod handlers;
// OpenAPI document generation lives in openapi.rs.
mod openapi;

pub use openapi::openapi;

const RATE_LIMIT_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    trust_config: auth::TrustConfig,
    audit_config: auth::audit::AuditWorkerConfig,
    continuity_config: ContinuityConfig,
    identity_credential: Option<SecretString>,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let oracle = Arc::new(auth::oracle::PgTrustOracle::new(pool.clone()));

    // Background worker drains the bounded audit queue into audit_log,
    // retrying failed writes with exponential backoff.
    let audit_store = Arc::new(auth::audit::PgAuditStore::new(pool.clone()));
    let (audit, _audit_worker) = auth::audit::QueuedAuditSink::spawn(audit_store, audit_config);

    let rate_limit_store: Arc<dyn auth::rate_limit::RateLimitStore> =
        Arc::new(auth::rate_limit::InMemoryRateLimitStore::new());
    auth::rate_limit::spawn_housekeeping(rate_limit_store.clone(), RATE_LIMIT_SWEEP_PERIOD);
    let rate_limiter = auth::rate_limit::RateLimiter::new(rate_limit_store);

    let identity_client = Arc::new(auth::identity::HttpIdentityClient::new(
        trust_config.identity_url(),
    )?);

    // Continuity watchdog keeping this process's own identity credential
    // alive across flaky network conditions.
    if let Some(credential) = identity_credential {
        let keeper = Arc::new(auth::identity::CredentialKeeper::new(
            trust_config.identity_url(),
            credential,
        )?);
        let (handle, mut signals) = continuity::spawn(continuity_config, keeper);
        handle.signed_in();
        tokio::spawn(async move {
            // Holding the handle keeps the watchdog's event channel open for
            // the process lifetime.
            let _handle = handle;
            while let Some(signal) = signals.recv().await {
                match signal {
                    ContinuitySignal::RecoveryExhausted => {
                        error!(
                            "identity session recovery exhausted; manual re-authentication required"
                        );
                    }
                }
            }
        });
    }

    let state = Arc::new(auth::TrustState::new(
        trust_config,
        identity_client,
        oracle,
        audit,
        rate_limiter,
    ));

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any);

    let app = Router::new()
        .route(
            "/v1/trust/admin/check",
            post(auth::admin::admin_check).options(preflight),
        )
        .route(
            "/v1/trust/register/validate",
            post(auth::register::register_validate).options(preflight),
        )
        .route(
            "/v1/trust/dashboard",
            get(auth::dashboard::dashboard).options(preflight),
        )
        .route("/health", get(health::health))
        .route("/", get(root))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
