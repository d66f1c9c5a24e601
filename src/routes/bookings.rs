//! Public booking flow: create a reservation, look bookings up by email, and
//! rebuild the WhatsApp payment link for an existing code.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};

use crate::error::{AppError, AppResult};
use crate::repository::table_service::{
    count_rows, create_row_tx, get_row, list_rows, map_db_error,
};
use crate::schemas::{
    validate_input, BookingCodePath, BookingLookupQuery, CreateBookingInput, ServiceItemInput,
};
use crate::services::booking_codes::next_booking_code;
use crate::services::calendar::{ensure_checkout_after_checkin, parse_date_only};
use crate::services::lifecycle::{
    ACTIVE_BOOKING_STATUSES, INITIAL_BOOKING_STATUS, INITIAL_PAYMENT_STATUS,
};
use crate::services::pricing::{normalize_service_items, quote_booking, BookingQuote};
use crate::services::whatsapp::{booking_message, build_whatsapp_url, BookingMessage};
use crate::state::AppState;

const BOOKING_SOURCE_WEB: &str = "WEB";
const CODE_RETRY_ATTEMPTS: usize = 3;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/bookings", axum::routing::post(create_booking))
        .route("/bookings/lookup", axum::routing::get(lookup_bookings))
        .route(
            "/bookings/{booking_code}/whatsapp-link",
            axum::routing::get(whatsapp_link),
        )
}

async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let document = normalize_document(payload.guest_document.as_deref())?;
    let check_in = parse_date_only(&payload.check_in)?;
    let check_out = parse_date_only(&payload.check_out)?;
    ensure_checkout_after_checkin(check_in, check_out)?;

    let pool = db_pool(&state)?;
    let room = get_row(pool, "rooms", &payload.room_id, "id")
        .await
        .map_err(|error| match error {
            AppError::NotFound(_) => AppError::NotFound("Room not found.".to_string()),
            other => other,
        })?;

    let items = normalize_service_items(payload.service_items.as_deref().unwrap_or_default());
    let active_services = fetch_active_services(pool, &items).await?;
    let quote = quote_booking(
        &room,
        check_in,
        check_out,
        payload.guests_count,
        &items,
        &active_services,
    )?;

    ensure_room_is_free(pool, &payload.room_id, check_in, check_out).await?;

    // The unique constraint on booking_code is the real guard; a same-day
    // concurrent creation can collide, so the whole unit of work retries.
    let mut booking = None;
    for attempt in 1..=CODE_RETRY_ATTEMPTS {
        match insert_booking(pool, &state, &payload, document.as_deref(), &quote).await {
            Ok(created) => {
                booking = Some(created);
                break;
            }
            Err(AppError::Conflict(message)) if attempt < CODE_RETRY_ATTEMPTS => {
                tracing::warn!(attempt, %message, "Booking code collision, retrying");
            }
            Err(error) => return Err(error),
        }
    }
    let booking = booking
        .ok_or_else(|| AppError::Conflict("Could not allocate a booking code.".to_string()))?;

    let booking_code = field_str(&booking, "booking_code");
    let phone = resolve_hotel_phone(&state).await;
    let message = booking_message(&BookingMessage {
        booking_code: &booking_code,
        guest_name: &payload.guest_name,
        guest_email: &payload.guest_email,
        room_number: &field_str(&room, "number"),
        check_in: &payload.check_in,
        check_out: &payload.check_out,
        total_cents: quote.total_cents,
    });
    let whatsapp_url = build_whatsapp_url(&phone, &message)?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "bookingCode": booking_code,
            "status": field_str(&booking, "status"),
            "paymentStatus": field_str(&booking, "payment_status"),
            "whatsappUrl": whatsapp_url,
        })),
    ))
}

async fn lookup_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingLookupQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let pool = db_pool(&state)?;

    let mut guest_filters = Map::new();
    guest_filters.insert("email".to_string(), json!(query.email));
    let guests = list_rows(pool, "guests", Some(&guest_filters), 1, 0, "email", true).await?;
    let Some(guest) = guests.first() else {
        return Ok(Json(json!({ "items": [] })));
    };

    let mut filters = Map::new();
    filters.insert("guest_id".to_string(), json!(field_str(guest, "id")));
    if let Some(code) = query.booking_code.as_deref().map(str::trim) {
        if !code.is_empty() {
            filters.insert("booking_code".to_string(), json!(code));
        }
    }
    let bookings = list_rows(pool, "bookings", Some(&filters), 100, 0, "created_at", false).await?;

    let rooms = fetch_rooms_for(pool, &bookings).await?;
    let items = bookings
        .iter()
        .map(|booking| booking_summary(booking, &rooms))
        .collect::<Vec<_>>();
    Ok(Json(json!({ "items": items })))
}

async fn whatsapp_link(
    State(state): State<AppState>,
    Path(path): Path<BookingCodePath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert("booking_code".to_string(), json!(path.booking_code));
    let bookings = list_rows(pool, "bookings", Some(&filters), 1, 0, "created_at", false).await?;
    let booking = bookings
        .first()
        .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;

    let guest = get_row(pool, "guests", &field_str(booking, "guest_id"), "id").await?;
    let room = get_row(pool, "rooms", &field_str(booking, "room_id"), "id").await?;

    let phone = resolve_hotel_phone(&state).await;
    let message = booking_message(&BookingMessage {
        booking_code: &field_str(booking, "booking_code"),
        guest_name: &field_str(&guest, "name"),
        guest_email: &field_str(&guest, "email"),
        room_number: &field_str(&room, "number"),
        check_in: &field_str(booking, "check_in"),
        check_out: &field_str(booking, "check_out"),
        total_cents: booking.get("total_cents").and_then(Value::as_i64).unwrap_or(0),
    });
    let url = build_whatsapp_url(&phone, &message)?;
    Ok(Json(json!({ "url": url })))
}

// ── Creation internals ──────────────────────────────────────────────

async fn insert_booking(
    pool: &PgPool,
    state: &AppState,
    payload: &CreateBookingInput,
    document: Option<&str>,
    quote: &BookingQuote,
) -> AppResult<Value> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let guest = upsert_guest(
        &mut tx,
        &payload.guest_name,
        &payload.guest_email,
        &payload.guest_phone,
        document,
    )
    .await?;

    let booking_code =
        next_booking_code(&mut tx, &state.config.booking_code_prefix, Utc::now()).await?;

    let mut record = Map::new();
    record.insert("booking_code".to_string(), json!(booking_code));
    record.insert("guest_id".to_string(), json!(field_str(&guest, "id")));
    record.insert("room_id".to_string(), json!(payload.room_id));
    record.insert("check_in".to_string(), json!(payload.check_in));
    record.insert("check_out".to_string(), json!(payload.check_out));
    record.insert("guests_count".to_string(), json!(payload.guests_count));
    record.insert("status".to_string(), json!(INITIAL_BOOKING_STATUS));
    record.insert("payment_status".to_string(), json!(INITIAL_PAYMENT_STATUS));
    record.insert("source".to_string(), json!(BOOKING_SOURCE_WEB));
    record.insert(
        "nightly_rate_cents".to_string(),
        json!(quote.nightly_rate_cents),
    );
    record.insert(
        "extra_services_cents".to_string(),
        json!(quote.extra_services_cents),
    );
    record.insert("total_cents".to_string(), json!(quote.total_cents));
    if let Some(notes) = payload.notes.as_deref() {
        record.insert("notes".to_string(), json!(notes));
    }
    let booking = create_row_tx(&mut tx, "bookings", &record).await?;

    let booking_id = field_str(&booking, "id");
    for line in &quote.lines {
        let mut line_record = Map::new();
        line_record.insert("booking_id".to_string(), json!(booking_id));
        line_record.insert("service_id".to_string(), json!(line.service_id));
        line_record.insert("quantity".to_string(), json!(line.quantity));
        line_record.insert(
            "unit_price_cents".to_string(),
            json!(line.unit_price_cents),
        );
        line_record.insert("total_cents".to_string(), json!(line.total_cents));
        create_row_tx(&mut tx, "booking_services", &line_record).await?;
    }

    tx.commit().await.map_err(map_db_error)?;
    Ok(booking)
}

/// Guest records are keyed by email; a repeat booking refreshes the contact
/// fields but never rewrites the email itself.
async fn upsert_guest(
    conn: &mut sqlx::PgConnection,
    name: &str,
    email: &str,
    phone: &str,
    document: Option<&str>,
) -> AppResult<Value> {
    let row = sqlx::query(
        "INSERT INTO guests (name, email, phone, document) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (email) DO UPDATE SET \
             name = EXCLUDED.name, \
             phone = EXCLUDED.phone, \
             document = COALESCE(EXCLUDED.document, guests.document) \
         RETURNING row_to_json(guests.*) AS row",
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(document)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)?;

    row.try_get::<Option<Value>, _>("row")
        .ok()
        .flatten()
        .ok_or_else(|| AppError::Internal("Could not upsert guest record.".to_string()))
}

/// Rejects dates that intersect a PENDING / CONFIRMED / CHECKED_IN booking of
/// the same room. Half-open stays: checking in on another stay's checkout day
/// is fine.
async fn ensure_room_is_free(
    pool: &PgPool,
    room_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> AppResult<()> {
    let mut filters = Map::new();
    filters.insert("room_id".to_string(), json!(room_id));
    filters.insert("status__in".to_string(), json!(ACTIVE_BOOKING_STATUSES));
    filters.insert(
        "check_in__lt".to_string(),
        json!(check_out.format("%Y-%m-%d").to_string()),
    );
    filters.insert(
        "check_out__gt".to_string(),
        json!(check_in.format("%Y-%m-%d").to_string()),
    );
    let overlapping = count_rows(pool, "bookings", Some(&filters)).await?;
    if overlapping > 0 {
        return Err(AppError::Conflict(
            "Room is not available for the selected dates.".to_string(),
        ));
    }
    Ok(())
}

async fn fetch_active_services(
    pool: &PgPool,
    items: &[ServiceItemInput],
) -> AppResult<Vec<Value>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let ids = items
        .iter()
        .map(|item| json!(item.service_id))
        .collect::<Vec<_>>();
    let mut filters = Map::new();
    filters.insert("id__in".to_string(), Value::Array(ids));
    filters.insert("is_active".to_string(), json!(true));
    list_rows(pool, "services", Some(&filters), 500, 0, "name", true).await
}

/// CPF (11 digits) or CNPJ (14 digits) after stripping punctuation; absent is
/// fine, anything else is rejected.
fn normalize_document(document: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = document.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 || digits.len() == 14 {
        return Ok(Some(digits));
    }
    Err(AppError::BadRequest(
        "Guest document must be a valid CPF or CNPJ.".to_string(),
    ))
}

// ── Lookup internals ────────────────────────────────────────────────

async fn fetch_rooms_for(pool: &PgPool, bookings: &[Value]) -> AppResult<Vec<Value>> {
    let mut ids = Vec::new();
    for booking in bookings {
        let id = field_str(booking, "room_id");
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut filters = Map::new();
    filters.insert(
        "id__in".to_string(),
        Value::Array(ids.into_iter().map(Value::String).collect()),
    );
    list_rows(pool, "rooms", Some(&filters), 500, 0, "number", true).await
}

fn booking_summary(booking: &Value, rooms: &[Value]) -> Value {
    let room_id = field_str(booking, "room_id");
    let room = rooms
        .iter()
        .find(|candidate| field_str(candidate, "id") == room_id);
    json!({
        "bookingCode": field_str(booking, "booking_code"),
        "status": field_str(booking, "status"),
        "paymentStatus": field_str(booking, "payment_status"),
        "checkIn": field_str(booking, "check_in"),
        "checkOut": field_str(booking, "check_out"),
        "guestsCount": booking.get("guests_count").and_then(Value::as_i64).unwrap_or(0),
        "totalCents": booking.get("total_cents").and_then(Value::as_i64).unwrap_or(0),
        "roomNumber": room.map(|value| field_str(value, "number")),
        "roomName": room.map(|value| field_str(value, "name")),
        "createdAt": field_str(booking, "created_at"),
    })
}

/// Profile phone when a profile record exists and carries one, otherwise the
/// configured fallback number.
async fn resolve_hotel_phone(state: &AppState) -> String {
    if let Ok(pool) = db_pool(state) {
        if let Ok(profile) = get_row(pool, "hotel_profile", "default", "id").await {
            let phone = field_str(&profile, "phone");
            if !phone.trim().is_empty() {
                return phone;
            }
        }
    }
    state.config.whatsapp_phone.clone()
}

fn db_pool(state: &AppState) -> AppResult<&PgPool> {
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{booking_summary, normalize_document};

    #[test]
    fn normalizes_cpf_and_cnpj_documents() {
        assert_eq!(
            normalize_document(Some("123.456.789-01")).unwrap(),
            Some("12345678901".to_string())
        );
        assert_eq!(
            normalize_document(Some("12.345.678/0001-90")).unwrap(),
            Some("12345678000190".to_string())
        );
        assert_eq!(normalize_document(None).unwrap(), None);
        assert_eq!(normalize_document(Some("   ")).unwrap(), None);
        assert!(normalize_document(Some("12345")).is_err());
        assert!(normalize_document(Some("123456789012")).is_err());
    }

    #[test]
    fn summaries_use_wire_casing_and_resolve_the_room() {
        let booking = json!({
            "booking_code": "HSA-20260315-001",
            "status": "PENDING",
            "payment_status": "PENDING_WHATSAPP",
            "check_in": "2026-03-15",
            "check_out": "2026-03-17",
            "guests_count": 2,
            "total_cents": 63_500,
            "room_id": "room-1",
            "created_at": "2026-03-01T12:00:00+00:00",
        });
        let rooms = vec![json!({"id": "room-1", "number": "001", "name": "Standard"})];

        let summary = booking_summary(&booking, &rooms);
        assert_eq!(summary["bookingCode"], "HSA-20260315-001");
        assert_eq!(summary["checkIn"], "2026-03-15");
        assert_eq!(summary["roomNumber"], "001");
        assert_eq!(summary["totalCents"], 63_500);
        assert!(summary.get("booking_code").is_none());
    }
}
