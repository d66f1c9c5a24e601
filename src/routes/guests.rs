use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::{get_row, list_rows};
use crate::schemas::{clamp_limit, GuestPath, GuestsQuery};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/admin/guests", axum::routing::get(list_guests))
        .route("/admin/guests/{guest_id}", axum::routing::get(get_guest))
}

async fn list_guests(
    State(state): State<AppState>,
    Query(query): Query<GuestsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let limit = clamp_limit(query.limit);

    let items = match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => list_rows(pool, "guests", None, limit, 0, "name", true).await?,
        Some(search) => {
            // Match on name, email or phone; merged client-side since the
            // table service composes filters with AND.
            let pattern = format!("%{search}%");
            let mut merged: Vec<Value> = Vec::new();
            for column in ["name__ilike", "email__ilike", "phone__ilike"] {
                let mut filters = serde_json::Map::new();
                filters.insert(column.to_string(), json!(pattern.clone()));
                for row in list_rows(pool, "guests", Some(&filters), limit, 0, "name", true).await? {
                    let id = row.get("id").and_then(Value::as_str).unwrap_or_default();
                    let seen = merged
                        .iter()
                        .any(|existing| existing.get("id").and_then(Value::as_str) == Some(id));
                    if !seen {
                        merged.push(row);
                    }
                }
            }
            merged.truncate(limit as usize);
            merged
        }
    };

    Ok(Json(json!({ "items": items })))
}

async fn get_guest(
    State(state): State<AppState>,
    Path(path): Path<GuestPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let guest = get_row(pool, "guests", &path.guest_id, "id").await?;
    Ok(Json(guest))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
