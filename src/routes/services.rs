use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::{create_row, delete_row, list_rows, update_row};
use crate::schemas::{
    remove_nulls, serialize_to_map, validate_input, CreateServiceInput, ServicePath,
    UpdateServiceInput,
};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/admin/services",
            axum::routing::get(list_services).post(create_service),
        )
        .route(
            "/admin/services/{service_id}",
            axum::routing::patch(update_service).delete(delete_service),
        )
}

async fn list_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let items = list_rows(pool, "services", None, 500, 0, "name", true).await?;
    Ok(Json(json!({ "items": items })))
}

async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateServiceInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let record = serialize_to_map(&payload);
    let created = create_row(pool, "services", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn update_service(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateServiceInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = update_row(pool, "services", &path.service_id, &patch, "id").await?;
    Ok(Json(updated))
}

async fn delete_service(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    // Line-item snapshots reference services; the FK turns this into a 409
    // instead of orphaning historical bookings.
    let deleted = delete_row(pool, "services", &path.service_id, "id").await?;
    Ok(Json(deleted))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
