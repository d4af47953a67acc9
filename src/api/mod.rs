//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Health check
//! - Auth (register, login, logout, current user)
//! - Availability (professors declare windows, anyone signed in browses)
//! - Appointments (students book, professors cancel)

pub mod appointments;
pub mod auth;
pub mod availability;
pub mod health;
pub mod middleware;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let professor_routes = Router::new()
        .nest("/availability", availability::professor_router())
        .nest("/appointments", appointments::professor_router())
        .route_layer(axum_middleware::from_fn(middleware::require_professor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let student_routes = Router::new()
        .nest("/appointments", appointments::student_router())
        .route_layer(axum_middleware::from_fn(middleware::require_student))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/availability", availability::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/health", health::router())
        .nest("/auth", auth::public_router())
        .merge(professor_routes)
        .merge(student_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
///
/// # Errors
///
/// Returns an error if `cors_origin` is not a valid header value.
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // Credentials allowed so the session cookie works cross-origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::{header, Method, StatusCode};

    #[tokio::test]
    async fn test_session_cookie_authenticates() {
        let (app, _state) = test_app().await;
        register(&app, "cookie_user", "student").await;
        let token = login(&app, "cookie_user").await;

        let request = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/api/v1/auth/me")
            .header(header::COOKIE, format!("session={}", token))
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _state) = test_app().await;
        let (status, _) = send(&app, Method::GET, "/api/v1/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_build_router_rejects_bad_origin() {
        let state = test_state().await;
        assert!(super::build_router(state, "bad\norigin").is_err());
    }
}
