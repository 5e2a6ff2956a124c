use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::Session;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::json::OptionalJson;
use crate::models::{Profile, Role};
use crate::state::AppState;

// POST /api/admin/providers/:id/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(default = "default_verified")]
    pub verified: bool,
}

impl Default for VerifyRequest {
    fn default() -> Self {
        Self { verified: true }
    }
}

fn default_verified() -> bool {
    true
}

pub async fn verify_provider(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require(Role::Admin)?;
    let verified = body.verified;

    let updated = {
        let db = state.db()?;
        queries::set_provider_verified(&db, &id, verified)?
    };
    if !updated {
        return Err(AppError::NotFound("provider not found".to_string()));
    }

    tracing::info!(
        provider_id = %id,
        verified,
        admin = %session.user_id,
        "provider verification changed"
    );
    Ok(Json(serde_json::json!({ "ok": true, "verified": verified })))
}

// DELETE /api/admin/providers/:id
pub async fn remove_provider(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require(Role::Admin)?;

    let suspended = {
        let db = state.db()?;
        queries::suspend_provider(&db, &id)?
    };
    if !suspended {
        return Err(AppError::NotFound("provider not found".to_string()));
    }

    tracing::info!(provider_id = %id, admin = %session.user_id, "provider removed");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/admin/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Profile>>, AppError> {
    session.require(Role::Admin)?;
    let db = state.db()?;
    Ok(Json(queries::list_providers(&db)?))
}
