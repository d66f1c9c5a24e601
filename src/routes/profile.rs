use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::{get_row, update_row};
use crate::schemas::{remove_nulls, serialize_to_map, UpdateHotelProfileInput};
use crate::state::AppState;

// Single configuration record keyed by a fixed id; replaces the hardcoded
// hotel constants the public site used to carry.
const PROFILE_ID: &str = "default";

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/hotel-profile", axum::routing::get(get_public_profile))
        .route(
            "/admin/hotel-profile",
            axum::routing::patch(update_profile),
        )
}

async fn get_public_profile(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let profile = get_row(pool, "hotel_profile", PROFILE_ID, "id").await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateHotelProfileInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = update_row(pool, "hotel_profile", PROFILE_ID, &patch, "id").await?;
    Ok(Json(updated))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
