use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::{create_row, delete_row, get_row, list_rows, update_row};
use crate::schemas::{
    remove_nulls, serialize_to_map, validate_input, CreateRoomInput, RoomPath, UpdateRoomInput,
};
use crate::state::AppState;

pub const ROOM_STATUSES: &[&str] = &["AVAILABLE", "OCCUPIED", "MAINTENANCE", "INACTIVE"];

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/rooms", axum::routing::get(list_public_rooms))
        .route(
            "/admin/rooms",
            axum::routing::get(list_rooms).post(create_room),
        )
        .route(
            "/admin/rooms/{room_id}",
            axum::routing::get(get_room)
                .patch(update_room)
                .delete(delete_room),
        )
}

/// Rooms a guest can book right now. MAINTENANCE and INACTIVE rooms never
/// appear; OCCUPIED rooms are hidden too since the site books current dates.
async fn list_public_rooms(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let mut filters = Map::new();
    filters.insert("status".to_string(), json!("AVAILABLE"));
    let items = list_rows(pool, "rooms", Some(&filters), 200, 0, "number", true).await?;
    Ok(Json(json!({ "items": items })))
}

async fn list_rooms(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let items = list_rows(pool, "rooms", None, 500, 0, "number", true).await?;
    Ok(Json(json!({ "items": items })))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    ensure_known_status(&payload.status)?;
    let pool = db_pool(&state)?;

    let record = remove_nulls(serialize_to_map(&payload));
    let created = create_row(pool, "rooms", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_room(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let room = get_row(pool, "rooms", &path.room_id, "id").await?;
    Ok(Json(room))
}

async fn update_room(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRoomInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    if let Some(status) = payload.status.as_deref() {
        ensure_known_status(status)?;
    }
    let pool = db_pool(&state)?;

    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = update_row(pool, "rooms", &path.room_id, &patch, "id").await?;
    Ok(Json(updated))
}

async fn delete_room(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    // Rooms with bookings are protected by the FK and surface as 409.
    let deleted = delete_row(pool, "rooms", &path.room_id, "id").await?;
    Ok(Json(deleted))
}

fn ensure_known_status(status: &str) -> AppResult<()> {
    if ROOM_STATUSES.contains(&status) {
        return Ok(());
    }
    Err(AppError::BadRequest(format!(
        "Unknown room status '{status}'."
    )))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{ensure_known_status, ROOM_STATUSES};
    use crate::services::lifecycle::UNAVAILABLE_PUBLIC_ROOM_STATUSES;

    #[test]
    fn status_vocabulary_is_closed() {
        for status in ROOM_STATUSES {
            assert!(ensure_known_status(status).is_ok());
        }
        assert!(ensure_known_status("RETIRED").is_err());
    }

    #[test]
    fn unavailable_statuses_are_a_subset() {
        for status in UNAVAILABLE_PUBLIC_ROOM_STATUSES {
            assert!(ROOM_STATUSES.contains(status));
        }
    }
}
