use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::Session;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::json::JsonBody;
use crate::models::{Profile, ProfileUpdate};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    profile: Profile,
    display_name: String,
    is_complete: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            display_name: profile.display_name().to_string(),
            is_complete: profile.is_complete(),
            profile,
        }
    }
}

// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ProfileResponse>, AppError> {
    let db = state.db()?;
    let profile = queries::get_profile(&db, &session.user_id)?
        .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;
    Ok(Json(profile.into()))
}

// PUT /api/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    let db = state.db()?;
    let mut profile = queries::get_profile(&db, &session.user_id)?
        .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;

    if let Some(years) = update.experience_years {
        if years < 0 {
            return Err(AppError::BadRequest(
                "experience_years cannot be negative".to_string(),
            ));
        }
    }

    profile.apply(update);
    queries::save_profile(&db, &profile)?;
    tracing::info!(user_id = %profile.id, role = profile.role.as_str(), "profile updated");

    let saved = queries::get_profile(&db, &session.user_id)?
        .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;
    Ok(Json(saved.into()))
}
