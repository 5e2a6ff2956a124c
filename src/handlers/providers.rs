use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Session;
use crate::db::queries::{self, Earnings};
use crate::errors::AppError;
use crate::models::{Profile, Role};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CatalogueQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

impl CatalogueQuery {
    /// "all" and blank mean no category filter.
    fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Serialize)]
pub struct ProviderCard {
    id: String,
    name: String,
    service_category: Option<String>,
    service_area: Option<String>,
    price_range: Option<String>,
    experience_years: Option<i64>,
    bio: Option<String>,
    is_verified: bool,
    average_rating: f64,
    total_reviews: i64,
}

impl From<Profile> for ProviderCard {
    fn from(p: Profile) -> Self {
        Self {
            name: p.display_name().to_string(),
            id: p.id,
            service_category: p.service_category,
            service_area: p.service_area,
            price_range: p.price_range,
            experience_years: p.experience_years,
            bio: p.bio,
            is_verified: p.is_verified,
            average_rating: p.average_rating,
            total_reviews: p.total_reviews,
        }
    }
}

pub fn catalogue(state: &AppState, query: &CatalogueQuery) -> Result<Vec<ProviderCard>, AppError> {
    let db = state.db()?;
    let providers = queries::search_providers(&db, query.category(), query.search())?;
    Ok(providers.into_iter().map(Into::into).collect())
}

// GET /api/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Query(query): Query<CatalogueQuery>,
) -> Result<Json<Vec<ProviderCard>>, AppError> {
    Ok(Json(catalogue(&state, &query)?))
}

// GET /api/provider/earnings
pub async fn get_earnings(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Earnings>, AppError> {
    session.require(Role::Provider)?;
    let db = state.db()?;
    Ok(Json(queries::provider_earnings(&db, &session.user_id)?))
}
