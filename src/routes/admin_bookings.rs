use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::{get_row, list_rows, update_row};
use crate::schemas::{clamp_limit, AdminBookingsQuery, BookingPath, UpdateBookingInput};
use crate::services::calendar::{add_days, parse_date_only};
use crate::services::enrichment::enrich_bookings;
use crate::services::lifecycle::{allowed_transition, is_booking_status, is_payment_status};
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/admin/bookings", axum::routing::get(list_bookings))
        .route(
            "/admin/bookings/{booking_id}",
            axum::routing::get(get_booking).patch(update_booking),
        )
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<AdminBookingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(status) = query.status.as_deref().map(str::trim) {
        if !status.is_empty() {
            if !is_booking_status(status) {
                return Err(AppError::BadRequest(format!(
                    "Unknown booking status '{status}'."
                )));
            }
            filters.insert("status".to_string(), json!(status));
        }
    }
    if let Some(from) = query.from.as_deref() {
        let from = parse_date_only(from)?;
        filters.insert(
            "check_in__gte".to_string(),
            json!(from.format("%Y-%m-%d").to_string()),
        );
    }
    if let Some(to) = query.to.as_deref() {
        // Inclusive end date: stays checking out on `to` itself still match.
        let to = add_days(parse_date_only(to)?, 1);
        filters.insert(
            "check_out__lte".to_string(),
            json!(to.format("%Y-%m-%d").to_string()),
        );
    }

    let limit = clamp_limit(query.limit);
    let bookings = list_rows(pool, "bookings", Some(&filters), limit, 0, "check_in", false).await?;
    let items = enrich_bookings(pool, bookings).await?;
    Ok(Json(json!({ "items": items })))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let booking = get_row(pool, "bookings", &path.booking_id, "id").await?;
    let enriched = enrich_bookings(pool, vec![booking]).await?;
    enriched
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))
}

async fn update_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBookingInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let booking = get_row(pool, "bookings", &path.booking_id, "id").await?;
    let patch = build_booking_patch(&booking, &payload)?;

    let updated = update_row(pool, "bookings", &path.booking_id, &patch, "id").await?;
    let enriched = enrich_bookings(pool, vec![updated]).await?;
    enriched
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))
}

/// Status changes go through the transition table; payment status only needs
/// to be a known value; notes are free text.
fn build_booking_patch(
    booking: &Value,
    payload: &UpdateBookingInput,
) -> AppResult<Map<String, Value>> {
    let mut patch = Map::new();

    if let Some(next) = payload.status.as_deref() {
        if !is_booking_status(next) {
            return Err(AppError::BadRequest(format!(
                "Unknown booking status '{next}'."
            )));
        }
        let current = booking
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !allowed_transition(current, next) {
            return Err(AppError::UnprocessableEntity(format!(
                "Invalid status transition from {current} to {next}."
            )));
        }
        patch.insert("status".to_string(), json!(next));
    }

    if let Some(payment) = payload.payment_status.as_deref() {
        if !is_payment_status(payment) {
            return Err(AppError::BadRequest(format!(
                "Unknown payment status '{payment}'."
            )));
        }
        patch.insert("payment_status".to_string(), json!(payment));
    }

    if let Some(notes) = payload.notes.as_deref() {
        patch.insert("notes".to_string(), json!(notes));
    }

    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    Ok(patch)
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::build_booking_patch;
    use crate::error::AppError;
    use crate::schemas::UpdateBookingInput;

    fn booking(status: &str) -> serde_json::Value {
        json!({ "id": "b-1", "status": status, "payment_status": "PENDING_WHATSAPP" })
    }

    fn input(
        status: Option<&str>,
        payment_status: Option<&str>,
        notes: Option<&str>,
    ) -> UpdateBookingInput {
        UpdateBookingInput {
            status: status.map(str::to_string),
            payment_status: payment_status.map(str::to_string),
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn legal_transitions_build_a_patch() {
        let patch =
            build_booking_patch(&booking("PENDING"), &input(Some("CONFIRMED"), None, None))
                .unwrap();
        assert_eq!(patch.get("status"), Some(&json!("CONFIRMED")));
    }

    #[test]
    fn skipping_states_is_rejected() {
        let result =
            build_booking_patch(&booking("PENDING"), &input(Some("CHECKED_OUT"), None, None));
        match result {
            Err(AppError::UnprocessableEntity(message)) => {
                assert!(message.contains("PENDING"), "{message}");
                assert!(message.contains("CHECKED_OUT"), "{message}");
            }
            other => panic!("expected unprocessable entity, got {other:?}"),
        }
    }

    #[test]
    fn same_state_update_is_a_no_op_patch() {
        let patch =
            build_booking_patch(&booking("CONFIRMED"), &input(Some("CONFIRMED"), None, None))
                .unwrap();
        assert_eq!(patch.get("status"), Some(&json!("CONFIRMED")));
    }

    #[test]
    fn payment_status_is_vocabulary_checked_only() {
        let patch = build_booking_patch(
            &booking("CHECKED_OUT"),
            &input(None, Some("REFUNDED"), Some("charge reversed")),
        )
        .unwrap();
        assert_eq!(patch.get("payment_status"), Some(&json!("REFUNDED")));
        assert_eq!(patch.get("notes"), Some(&json!("charge reversed")));

        assert!(build_booking_patch(&booking("PENDING"), &input(None, Some("DUE"), None)).is_err());
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(build_booking_patch(&booking("PENDING"), &input(None, None, None)).is_err());
    }
}
