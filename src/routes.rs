use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, bookings, dashboard, events, health, profile, providers};
use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let dashboards = Router::new()
        .route("/dashboard", get(dashboard::home))
        .route("/dashboard/customer", get(dashboard::customer_home))
        .route("/dashboard/customer/bookings", get(dashboard::customer_bookings))
        .route("/dashboard/provider", get(dashboard::provider_home))
        .route("/dashboard/provider/bookings", get(dashboard::provider_bookings))
        .route("/dashboard/provider/earnings", get(dashboard::provider_earnings))
        .route("/dashboard/admin", get(dashboard::admin_home))
        .route("/dashboard/admin/providers", get(dashboard::admin_providers))
        .route("/dashboard/*rest", get(dashboard::not_found))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            dashboard::require_role,
        ));

    let api = Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/api/providers", get(providers::list_providers))
        .route("/api/provider/earnings", get(providers::get_earnings))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/events", get(bookings::get_booking_events))
        .route("/api/bookings/:id/accept", post(bookings::accept_booking))
        .route("/api/bookings/:id/decline", post(bookings::decline_booking))
        .route("/api/bookings/:id/start", post(bookings::start_booking))
        .route("/api/bookings/:id/complete", post(bookings::complete_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/:id/payment/claim", post(bookings::claim_payment))
        .route(
            "/api/bookings/:id/payment/confirm",
            post(bookings::confirm_payment),
        )
        .route(
            "/api/bookings/:id/payment/reject",
            post(bookings::reject_payment),
        )
        .route("/api/bookings/:id/payment/link", get(bookings::payment_link))
        .route("/api/bookings/:id/rating", post(bookings::rate_booking))
        .route("/api/admin/providers", get(admin::list_providers))
        .route(
            "/api/admin/providers/:id",
            delete(admin::remove_provider),
        )
        .route(
            "/api/admin/providers/:id/verify",
            post(admin::verify_provider),
        )
        .route("/api/events", get(events::events_stream));

    let mut router = dashboards
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if let Some(origin) = state.config.cors_origin.as_deref() {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                router = router.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers(Any),
                );
            }
            Err(e) => tracing::warn!(error = %e, origin, "ignoring invalid CORS_ORIGIN"),
        }
    }

    router
}
