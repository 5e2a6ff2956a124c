//! Role-scoped dashboard pages and the guard in front of them.
//!
//! Every `/dashboard` request passes [`require_role`] first. A caller with
//! no usable session goes to `/login`; a caller in the wrong area goes to
//! their own dashboard. Pages behind the guard return JSON payloads.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{self, Session};
use crate::db::queries::{self, AdminStats, Earnings};
use crate::errors::AppError;
use crate::handlers::bookings::BookingResponse;
use crate::handlers::providers::{self, CatalogueQuery, ProviderCard};
use crate::models::{JobTab, Profile, Role};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/login";
const DASHBOARD_PREFIX: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// Decides what happens to a request for `path` given the role claim of
/// its session, if any.
pub fn resolve(path: &str, role: Option<&str>) -> RouteDecision {
    if !under(path, DASHBOARD_PREFIX) {
        return RouteDecision::Allow;
    }

    let Some(role) = role.and_then(Role::parse) else {
        return RouteDecision::Redirect(LOGIN_PATH);
    };

    let area = [Role::Customer, Role::Provider, Role::Admin]
        .into_iter()
        .find(|r| under(path, r.dashboard_path()));

    match area {
        Some(required) if required != role => RouteDecision::Redirect(role.dashboard_path()),
        _ => RouteDecision::Allow,
    }
}

/// `path` is `prefix` or sits below it on a segment boundary.
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub async fn require_role(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let claims = auth::session_token(&parts)
        .and_then(|token| auth::decode_claims(&state.config.session_secret, &token).ok());

    let path = parts.uri.path().to_string();
    if let RouteDecision::Redirect(to) = resolve(&path, claims.as_ref().map(|c| c.role.as_str())) {
        tracing::debug!(path = %path, to, "dashboard redirect");
        return Redirect::to(to).into_response();
    }

    let Some(session) = claims.and_then(|c| Session::from_claims(c).ok()) else {
        return Redirect::to(LOGIN_PATH).into_response();
    };
    if let Err(e) = auth::touch_profile(&state, &session) {
        return e.into_response();
    }

    parts.extensions.insert(session);
    next.run(Request::from_parts(parts, body)).await
}

// GET /dashboard
pub async fn home(session: Session) -> Redirect {
    Redirect::to(session.role.dashboard_path())
}

// GET /dashboard/*rest that no page claims
pub async fn not_found() -> AppError {
    AppError::NotFound("no such dashboard page".to_string())
}

// ── Customer ──

#[derive(Serialize)]
pub struct CustomerDashboard {
    name: String,
    category: Option<String>,
    q: Option<String>,
    providers: Vec<ProviderCard>,
}

// GET /dashboard/customer
pub async fn customer_home(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CatalogueQuery>,
) -> Result<Json<CustomerDashboard>, AppError> {
    let providers = providers::catalogue(&state, &query)?;
    let profile = own_profile(&state, &session)?;

    Ok(Json(CustomerDashboard {
        name: profile.display_name().to_string(),
        category: query.category,
        q: query.q,
        providers,
    }))
}

// GET /dashboard/customer/bookings
pub async fn customer_bookings(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let db = state.db()?;
    let bookings = queries::list_customer_bookings(&db, &session.user_id)?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

// ── Provider ──

#[derive(Serialize)]
pub struct ProviderDashboard {
    name: String,
    average_rating: f64,
    total_reviews: i64,
    is_verified: bool,
    is_complete: bool,
    earnings: Earnings,
    pending_requests: usize,
}

// GET /dashboard/provider
pub async fn provider_home(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ProviderDashboard>, AppError> {
    let profile = own_profile(&state, &session)?;
    let (earnings, pending_requests) = {
        let db = state.db()?;
        (
            queries::provider_earnings(&db, &session.user_id)?,
            queries::list_provider_bookings(&db, &session.user_id, Some(JobTab::Requests))?.len(),
        )
    };

    Ok(Json(ProviderDashboard {
        name: profile.display_name().to_string(),
        average_rating: profile.average_rating,
        total_reviews: profile.total_reviews,
        is_verified: profile.is_verified,
        is_complete: profile.is_complete(),
        earnings,
        pending_requests,
    }))
}

#[derive(Deserialize)]
pub struct JobsQuery {
    pub tab: Option<JobTab>,
}

#[derive(Serialize, Default)]
pub struct TabCounts {
    requests: usize,
    active: usize,
    history: usize,
}

#[derive(Serialize)]
pub struct ProviderJobs {
    tab: JobTab,
    counts: TabCounts,
    bookings: Vec<BookingResponse>,
}

// GET /dashboard/provider/bookings
pub async fn provider_bookings(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<JobsQuery>,
) -> Result<Json<ProviderJobs>, AppError> {
    let tab = query.tab.unwrap_or(JobTab::Requests);
    let all = {
        let db = state.db()?;
        queries::list_provider_bookings(&db, &session.user_id, None)?
    };

    let mut counts = TabCounts::default();
    for row in &all {
        match JobTab::of(row.booking.status) {
            JobTab::Requests => counts.requests += 1,
            JobTab::Active => counts.active += 1,
            JobTab::History => counts.history += 1,
        }
    }

    let bookings = all
        .into_iter()
        .filter(|row| JobTab::of(row.booking.status) == tab)
        .map(Into::into)
        .collect();

    Ok(Json(ProviderJobs {
        tab,
        counts,
        bookings,
    }))
}

// GET /dashboard/provider/earnings
pub async fn provider_earnings(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Earnings>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::provider_earnings(&db, &session.user_id)?))
}

// ── Admin ──

// GET /dashboard/admin
pub async fn admin_home(State(state): State<Arc<AppState>>) -> Result<Json<AdminStats>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::get_admin_stats(&db)?))
}

// GET /dashboard/admin/providers
pub async fn admin_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_providers(&db)?))
}

fn own_profile(state: &AppState, session: &Session) -> Result<Profile, AppError> {
    let db = state.db()?;
    queries::get_profile(&db, &session.user_id)?
        .ok_or_else(|| AppError::NotFound("profile not found".to_string()))
}
