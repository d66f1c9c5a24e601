use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::auth::{require_admin, sign_admin_token};
use crate::error::{AppError, AppResult};
use crate::repository::table_service::list_rows;
use crate::schemas::{validate_input, LoginInput};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/admin/auth/login", axum::routing::post(login))
        .route("/admin/auth/me", axum::routing::get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert("email".to_string(), json!(payload.email));
    filters.insert("is_active".to_string(), json!(true));
    let admins = list_rows(pool, "admin_users", Some(&filters), 1, 0, "email", true).await?;
    let admin = admins
        .first()
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials.".to_string()))?;

    let stored_hash = field_str(admin, "password_hash");
    let parsed = PasswordHash::new(&stored_hash)
        .map_err(|_| AppError::Unauthorized("Invalid credentials.".to_string()))?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized("Invalid credentials.".to_string()))?;

    let admin_id = field_str(admin, "id");
    let email = field_str(admin, "email");
    let role = field_str(admin, "role");
    let token = sign_admin_token(&state, &admin_id, &email, &role)?;

    Ok(Json(json!({
        "token": token,
        "admin": {
            "id": admin_id,
            "name": field_str(admin, "name"),
            "email": email,
            "role": role,
        }
    })))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let claims = require_admin(&state, &headers)?;
    Ok(Json(json!({
        "id": claims.sub,
        "email": claims.email,
        "role": claims.role,
    })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

fn field_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
