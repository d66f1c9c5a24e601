//! Booking price computation. All money is integer cents; decimal currency
//! only exists at presentation boundaries (the WhatsApp message).

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::schemas::ServiceItemInput;
use crate::services::calendar::nights_between;
use crate::services::lifecycle::UNAVAILABLE_PUBLIC_ROOM_STATUSES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedServiceLine {
    pub service_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingQuote {
    pub nights: i64,
    pub nightly_rate_cents: i64,
    pub lodging_cents: i64,
    pub extra_services_cents: i64,
    pub total_cents: i64,
    pub lines: Vec<PricedServiceLine>,
}

/// Drops zero/negative quantities and merges duplicate service ids.
pub fn normalize_service_items(items: &[ServiceItemInput]) -> Vec<ServiceItemInput> {
    let mut normalized: Vec<ServiceItemInput> = Vec::new();
    for item in items {
        if item.quantity <= 0 {
            continue;
        }
        if let Some(existing) = normalized
            .iter_mut()
            .find(|candidate| candidate.service_id == item.service_id)
        {
            existing.quantity += item.quantity;
        } else {
            normalized.push(item.clone());
        }
    }
    normalized
}

/// Prices a stay against a room row and the resolved active service rows.
/// `active_services` must already be filtered to `is_active = true`; any
/// requested id missing from it rejects the whole booking.
pub fn quote_booking(
    room: &Value,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests_count: i32,
    items: &[ServiceItemInput],
    active_services: &[Value],
) -> AppResult<BookingQuote> {
    let room_status = field_str(room, "status");
    if UNAVAILABLE_PUBLIC_ROOM_STATUSES.contains(&room_status.as_str()) {
        return Err(AppError::UnprocessableEntity(
            "Room is unavailable.".to_string(),
        ));
    }

    let capacity = field_i64(room, "capacity");
    if i64::from(guests_count) > capacity {
        return Err(AppError::UnprocessableEntity(
            "Guests count exceeds room capacity.".to_string(),
        ));
    }

    let nights = nights_between(check_in, check_out);
    let nightly_rate_cents = match room.get("seasonal_price_cents").and_then(Value::as_i64) {
        Some(seasonal) => seasonal,
        None => field_i64(room, "base_price_cents"),
    };
    let lodging_cents = nights * nightly_rate_cents;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let service = active_services
            .iter()
            .find(|candidate| field_str(candidate, "id") == item.service_id)
            .ok_or_else(|| {
                AppError::UnprocessableEntity(
                    "One or more services are invalid or inactive.".to_string(),
                )
            })?;
        let unit_price_cents = field_i64(service, "price_cents");
        lines.push(PricedServiceLine {
            service_id: item.service_id.clone(),
            quantity: item.quantity,
            unit_price_cents,
            total_cents: unit_price_cents * item.quantity,
        });
    }

    let extra_services_cents = lines.iter().map(|line| line.total_cents).sum::<i64>();

    Ok(BookingQuote {
        nights,
        nightly_rate_cents,
        lodging_cents,
        extra_services_cents,
        total_cents: lodging_cents + extra_services_cents,
        lines,
    })
}

fn field_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn field_i64(row: &Value, key: &str) -> i64 {
    row.get(key).and_then(Value::as_i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use super::{normalize_service_items, quote_booking};
    use crate::schemas::ServiceItemInput;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn room(status: &str, capacity: i64, base: i64, seasonal: Option<i64>) -> Value {
        json!({
            "id": "room-1",
            "number": "001",
            "status": status,
            "capacity": capacity,
            "base_price_cents": base,
            "seasonal_price_cents": seasonal,
        })
    }

    fn item(service_id: &str, quantity: i64) -> ServiceItemInput {
        ServiceItemInput {
            service_id: service_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn prices_the_reference_scenario() {
        // Room 001, 30000 cents/night, 2 nights, one 3500-cent service.
        let services = vec![json!({"id": "svc-1", "price_cents": 3500, "is_active": true})];
        let quote = quote_booking(
            &room("AVAILABLE", 4, 30_000, None),
            date("2026-03-15"),
            date("2026-03-17"),
            2,
            &[item("svc-1", 1)],
            &services,
        )
        .unwrap();

        assert_eq!(quote.nights, 2);
        assert_eq!(quote.nightly_rate_cents, 30_000);
        assert_eq!(quote.lodging_cents, 60_000);
        assert_eq!(quote.extra_services_cents, 3_500);
        assert_eq!(quote.total_cents, 63_500);
    }

    #[test]
    fn seasonal_price_overrides_base() {
        let quote = quote_booking(
            &room("AVAILABLE", 2, 18_000, Some(15_000)),
            date("2026-03-15"),
            date("2026-03-18"),
            2,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(quote.nightly_rate_cents, 15_000);
        assert_eq!(quote.total_cents, 45_000);
    }

    #[test]
    fn total_is_linear_in_nights_and_quantities() {
        let services = vec![json!({"id": "svc-1", "price_cents": 1_000})];
        let quote = quote_booking(
            &room("AVAILABLE", 4, 10_000, None),
            date("2026-01-01"),
            date("2026-01-06"),
            1,
            &[item("svc-1", 3)],
            &services,
        )
        .unwrap();
        assert_eq!(quote.total_cents, 5 * 10_000 + 3 * 1_000);
        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.lines[0].total_cents, 3_000);
    }

    #[test]
    fn rejects_over_capacity_and_unavailable_rooms() {
        let over = quote_booking(
            &room("AVAILABLE", 2, 10_000, None),
            date("2026-01-01"),
            date("2026-01-02"),
            3,
            &[],
            &[],
        );
        assert!(over.is_err());

        for status in ["MAINTENANCE", "INACTIVE"] {
            let unavailable = quote_booking(
                &room(status, 4, 10_000, None),
                date("2026-01-01"),
                date("2026-01-02"),
                1,
                &[],
                &[],
            );
            assert!(unavailable.is_err(), "{status} should refuse bookings");
        }
    }

    #[test]
    fn rejects_unknown_service_ids() {
        let result = quote_booking(
            &room("AVAILABLE", 4, 10_000, None),
            date("2026-01-01"),
            date("2026-01-03"),
            2,
            &[item("missing", 1)],
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn normalizes_quantities_and_duplicates() {
        let normalized = normalize_service_items(&[
            item("a", 2),
            item("b", 0),
            item("a", 1),
            item("c", -4),
        ]);
        assert_eq!(normalized.len(), 1); // a merged, b and c dropped
        assert_eq!(normalized[0].service_id, "a");
        assert_eq!(normalized[0].quantity, 3);
    }
}
