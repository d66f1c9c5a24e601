//! Attaches related records to booking rows so admin and lookup responses
//! carry guest, room and priced service lines in one payload.

use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::repository::table_service::list_rows;

/// Enriches each booking with `guest`, `room` and `services` (line items,
/// each carrying its `service` record). Bookings referencing missing rows
/// keep a null slot rather than failing the whole response.
pub async fn enrich_bookings(pool: &PgPool, bookings: Vec<Value>) -> AppResult<Vec<Value>> {
    if bookings.is_empty() {
        return Ok(bookings);
    }

    let guest_ids = collect_ids(&bookings, "guest_id");
    let room_ids = collect_ids(&bookings, "room_id");
    let booking_ids = collect_ids(&bookings, "id");

    let guests = fetch_by_ids(pool, "guests", "id", &guest_ids).await?;
    let rooms = fetch_by_ids(pool, "rooms", "id", &room_ids).await?;
    let lines = fetch_by_ids(pool, "booking_services", "booking_id", &booking_ids).await?;

    let service_ids = collect_ids(&lines, "service_id");
    let services = fetch_by_ids(pool, "services", "id", &service_ids).await?;
    let services_by_id = index_by(&services, "id");

    let mut lines_by_booking: HashMap<String, Vec<Value>> = HashMap::new();
    for line in lines {
        let booking_id = field_str(&line, "booking_id");
        let mut entry = line;
        if let Some(object) = entry.as_object_mut() {
            let service = services_by_id
                .get(&field_str_map(object, "service_id"))
                .cloned()
                .unwrap_or(Value::Null);
            object.insert("service".to_string(), service);
        }
        lines_by_booking.entry(booking_id).or_default().push(entry);
    }

    let guests_by_id = index_by(&guests, "id");
    let rooms_by_id = index_by(&rooms, "id");

    let enriched = bookings
        .into_iter()
        .map(|mut booking| {
            let guest_id = field_str(&booking, "guest_id");
            let room_id = field_str(&booking, "room_id");
            let booking_id = field_str(&booking, "id");
            if let Some(object) = booking.as_object_mut() {
                object.insert(
                    "guest".to_string(),
                    guests_by_id.get(&guest_id).cloned().unwrap_or(Value::Null),
                );
                object.insert(
                    "room".to_string(),
                    rooms_by_id.get(&room_id).cloned().unwrap_or(Value::Null),
                );
                object.insert(
                    "services".to_string(),
                    Value::Array(lines_by_booking.remove(&booking_id).unwrap_or_default()),
                );
            }
            booking
        })
        .collect();

    Ok(enriched)
}

async fn fetch_by_ids(
    pool: &PgPool,
    table: &str,
    key: &str,
    ids: &[String],
) -> AppResult<Vec<Value>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut filters = Map::new();
    filters.insert(
        format!("{key}__in"),
        Value::Array(ids.iter().cloned().map(Value::String).collect()),
    );
    list_rows(
        pool,
        table,
        Some(&filters),
        ids.len().max(1) as i64 * 8,
        0,
        key,
        true,
    )
    .await
}

fn collect_ids(rows: &[Value], key: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for row in rows {
        let id = field_str(row, key);
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn index_by(rows: &[Value], key: &str) -> HashMap<String, Value> {
    rows.iter()
        .map(|row| (field_str(row, key), row.clone()))
        .collect()
}

fn field_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn field_str_map(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
