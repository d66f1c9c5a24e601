//! Occupancy and revenue summary over an inclusive date range.
//!
//! Revenue counts the full booking total for any stay intersecting the window;
//! occupancy prorates to the nights actually inside it.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::auth::require_admin;
use crate::error::{AppError, AppResult};
use crate::repository::table_service::list_rows;
use crate::schemas::ReportQuery;
use crate::services::calendar::{add_days, nights_between, overlap_nights, parse_date_only};
use crate::services::lifecycle::NON_REPORTABLE_STATUSES;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/admin/reports/summary", axum::routing::get(summary))
}

const REPORT_PAGE_SIZE: i64 = 1000;

/// Drains every page of a listing so wide report windows aggregate over the
/// full result set rather than the first page.
async fn fetch_all_rows<F, Fut>(mut fetch_page: F) -> AppResult<Vec<Value>>
where
    F: FnMut(i64) -> Fut,
    Fut: std::future::Future<Output = AppResult<Vec<Value>>>,
{
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch_page(offset).await?;
        let page_len = page.len() as i64;
        rows.extend(page);
        if page_len < REPORT_PAGE_SIZE {
            return Ok(rows);
        }
        offset += REPORT_PAGE_SIZE;
    }
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let from = parse_date_only(&query.from)?;
    let to = parse_date_only(&query.to)?;
    if to < from {
        return Err(AppError::BadRequest(
            "to must be greater than or equal to from.".to_string(),
        ));
    }
    let to_exclusive = add_days(to, 1);

    let mut room_filters = Map::new();
    room_filters.insert("status__ne".to_string(), json!("INACTIVE"));
    let active_rooms = fetch_all_rows(|offset| {
        let filters = room_filters.clone();
        async move {
            list_rows(
                pool,
                "rooms",
                Some(&filters),
                REPORT_PAGE_SIZE,
                offset,
                "number",
                true,
            )
            .await
        }
    })
    .await?;

    let mut booking_filters = Map::new();
    booking_filters.insert(
        "check_in__lt".to_string(),
        json!(to_exclusive.format("%Y-%m-%d").to_string()),
    );
    booking_filters.insert(
        "check_out__gt".to_string(),
        json!(from.format("%Y-%m-%d").to_string()),
    );
    booking_filters.insert(
        "status__not_in".to_string(),
        json!(NON_REPORTABLE_STATUSES),
    );
    let bookings = fetch_all_rows(|offset| {
        let filters = booking_filters.clone();
        async move {
            list_rows(
                pool,
                "bookings",
                Some(&filters),
                REPORT_PAGE_SIZE,
                offset,
                "check_in",
                true,
            )
            .await
        }
    })
    .await?;

    Ok(Json(summarize(
        &bookings,
        &active_rooms,
        from,
        to_exclusive,
    )))
}

/// Aggregates pre-filtered bookings over the half-open window
/// `[from, to_exclusive)`. Callers pass rooms with status other than INACTIVE
/// and bookings whose status is reportable.
fn summarize(
    bookings: &[Value],
    active_rooms: &[Value],
    from: NaiveDate,
    to_exclusive: NaiveDate,
) -> Value {
    let period_nights = nights_between(from, to_exclusive);
    let room_count = active_rooms.len() as i64;

    let mut total_revenue_cents = 0i64;
    let mut total_bookings = 0i64;
    let mut occupied_nights = 0i64;
    let mut per_room: Map<String, Value> = Map::new();

    for room in active_rooms {
        let room_id = field_str(room, "id");
        per_room.insert(
            room_id.clone(),
            json!({
                "roomId": room_id,
                "roomNumber": field_str(room, "number"),
                "bookings": 0,
                "revenueCents": 0,
                "occupancyRate": 0.0,
            }),
        );
    }

    let mut nights_by_room: Map<String, Value> = Map::new();
    for booking in bookings {
        let Some((check_in, check_out)) = stay_dates(booking) else {
            continue;
        };
        let nights_inside = overlap_nights(from, to_exclusive, check_in, check_out);
        if nights_inside == 0 {
            continue;
        }

        let revenue = booking
            .get("total_cents")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        total_revenue_cents += revenue;
        total_bookings += 1;
        occupied_nights += nights_inside;

        let room_id = field_str(booking, "room_id");
        // Bookings group by room unconditionally; a stay on a room that has
        // since been retired still belongs in the breakdown.
        if !per_room.contains_key(&room_id) {
            per_room.insert(
                room_id.clone(),
                json!({
                    "roomId": room_id.clone(),
                    "roomNumber": Value::Null,
                    "bookings": 0,
                    "revenueCents": 0,
                    "occupancyRate": 0.0,
                }),
            );
        }
        if let Some(entry) = per_room.get_mut(&room_id).and_then(Value::as_object_mut) {
            bump(entry, "bookings", 1);
            bump(entry, "revenueCents", revenue);
        }
        let prior = nights_by_room
            .get(&room_id)
            .and_then(Value::as_i64)
            .unwrap_or(0);
        nights_by_room.insert(room_id, json!(prior + nights_inside));
    }

    for (room_id, entry) in per_room.iter_mut() {
        if let Some(object) = entry.as_object_mut() {
            let nights = nights_by_room
                .get(room_id)
                .and_then(Value::as_i64)
                .unwrap_or(0);
            object.insert(
                "occupancyRate".to_string(),
                json!(occupancy_rate(nights, period_nights)),
            );
        }
    }

    json!({
        "from": from.format("%Y-%m-%d").to_string(),
        "to": to_exclusive.pred_opt().map(|date| date.format("%Y-%m-%d").to_string()),
        "totalRevenueCents": total_revenue_cents,
        "totalBookings": total_bookings,
        "occupancyRate": occupancy_rate(occupied_nights, room_count * period_nights),
        "byRoom": per_room.values().cloned().collect::<Vec<_>>(),
    })
}

/// Percentage rounded to two decimals; 0 when there is nothing to occupy.
fn occupancy_rate(occupied_nights: i64, available_nights: i64) -> f64 {
    if available_nights <= 0 {
        return 0.0;
    }
    let rate = occupied_nights as f64 / available_nights as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

fn stay_dates(booking: &Value) -> Option<(NaiveDate, NaiveDate)> {
    let check_in = parse_date_only(booking.get("check_in")?.as_str()?).ok()?;
    let check_out = parse_date_only(booking.get("check_out")?.as_str()?).ok()?;
    Some((check_in, check_out))
}

fn bump(entry: &mut Map<String, Value>, key: &str, amount: i64) {
    let current = entry.get(key).and_then(Value::as_i64).unwrap_or(0);
    entry.insert(key.to_string(), json!(current + amount));
}

fn field_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use super::{fetch_all_rows, occupancy_rate, summarize, REPORT_PAGE_SIZE};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn room(id: &str, number: &str) -> Value {
        json!({ "id": id, "number": number, "status": "AVAILABLE" })
    }

    fn booking(room_id: &str, check_in: &str, check_out: &str, total_cents: i64) -> Value {
        json!({
            "room_id": room_id,
            "check_in": check_in,
            "check_out": check_out,
            "total_cents": total_cents,
            "status": "CONFIRMED",
        })
    }

    #[test]
    fn occupancy_is_bounded_and_rounded() {
        assert_eq!(occupancy_rate(0, 44), 0.0);
        assert_eq!(occupancy_rate(44, 44), 100.0);
        assert_eq!(occupancy_rate(2, 44), 4.55);
        assert_eq!(occupancy_rate(1, 3), 33.33);
        // nothing available, nothing occupied
        assert_eq!(occupancy_rate(0, 0), 0.0);
    }

    #[test]
    fn twenty_two_rooms_one_two_night_stay() {
        let rooms = (1..=22)
            .map(|index| room(&format!("room-{index}"), &format!("{index:03}")))
            .collect::<Vec<_>>();
        let bookings = vec![booking("room-1", "2026-03-15", "2026-03-17", 63_500)];

        // Window 2026-03-15..=2026-03-16 → exclusive end 2026-03-17, 2 nights.
        let summary = summarize(&bookings, &rooms, date("2026-03-15"), date("2026-03-17"));
        assert_eq!(summary["totalRevenueCents"], 63_500);
        assert_eq!(summary["totalBookings"], 1);
        assert_eq!(summary["occupancyRate"], 4.55);
    }

    #[test]
    fn full_house_hits_one_hundred_percent() {
        let rooms = vec![room("room-1", "001"), room("room-2", "002")];
        let bookings = vec![
            booking("room-1", "2026-03-10", "2026-03-12", 10_000),
            booking("room-2", "2026-03-10", "2026-03-12", 12_000),
        ];
        let summary = summarize(&bookings, &rooms, date("2026-03-10"), date("2026-03-12"));
        assert_eq!(summary["occupancyRate"], 100.0);
        assert_eq!(summary["totalRevenueCents"], 22_000);
    }

    #[test]
    fn empty_window_reports_zero_occupancy() {
        let rooms = vec![room("room-1", "001")];
        let summary = summarize(&[], &rooms, date("2026-03-10"), date("2026-03-12"));
        assert_eq!(summary["occupancyRate"], 0.0);
        assert_eq!(summary["totalRevenueCents"], 0);
        assert_eq!(summary["totalBookings"], 0);
    }

    #[test]
    fn revenue_counts_full_totals_but_occupancy_prorates() {
        // Stay straddles the window start: only one night inside.
        let rooms = vec![room("room-1", "001")];
        let bookings = vec![booking("room-1", "2026-03-08", "2026-03-11", 90_000)];
        let summary = summarize(&bookings, &rooms, date("2026-03-10"), date("2026-03-12"));
        assert_eq!(summary["totalRevenueCents"], 90_000);
        assert_eq!(summary["occupancyRate"], 50.0);
    }

    #[tokio::test]
    async fn drains_every_page_of_a_listing() {
        let page_size = REPORT_PAGE_SIZE as usize;
        let total = page_size * 2 + 3;
        let mut calls = 0;

        let rows = fetch_all_rows(|offset| {
            calls += 1;
            let start = offset as usize;
            let end = (start + page_size).min(total);
            let page = (start..end)
                .map(|index| json!({ "id": format!("row-{index}") }))
                .collect::<Vec<Value>>();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(rows.len(), total);
        assert_eq!(calls, 3);
        assert_eq!(rows[0]["id"], "row-0");
        assert_eq!(rows[total - 1]["id"], format!("row-{}", total - 1));
    }

    #[tokio::test]
    async fn a_short_first_page_stops_immediately() {
        let mut calls = 0;
        let rows = fetch_all_rows(|_offset| {
            calls += 1;
            async move { Ok(vec![json!({ "id": "only" })]) }
        })
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retired_room_bookings_stay_in_the_breakdown() {
        let rooms = vec![room("room-1", "001")];
        let bookings = vec![booking("room-gone", "2026-03-10", "2026-03-12", 5_000)];
        let summary = summarize(&bookings, &rooms, date("2026-03-10"), date("2026-03-12"));

        assert_eq!(summary["totalRevenueCents"], 5_000);
        assert_eq!(summary["totalBookings"], 1);

        let by_room = summary["byRoom"].as_array().unwrap();
        let gone = by_room
            .iter()
            .find(|entry| entry["roomId"] == "room-gone")
            .unwrap();
        assert_eq!(gone["bookings"], 1);
        assert_eq!(gone["revenueCents"], 5_000);
        assert_eq!(gone["occupancyRate"], 100.0);
        assert!(gone["roomNumber"].is_null());

        // the breakdown still sums to the totals
        let revenue_sum: i64 = by_room
            .iter()
            .filter_map(|entry| entry["revenueCents"].as_i64())
            .sum();
        assert_eq!(revenue_sum, 5_000);
    }

    #[test]
    fn per_room_breakdown_carries_its_own_rate() {
        let rooms = vec![room("room-1", "001"), room("room-2", "002")];
        let bookings = vec![booking("room-1", "2026-03-10", "2026-03-12", 40_000)];
        let summary = summarize(&bookings, &rooms, date("2026-03-10"), date("2026-03-12"));

        let by_room = summary["byRoom"].as_array().unwrap();
        let first = by_room
            .iter()
            .find(|entry| entry["roomId"] == "room-1")
            .unwrap();
        let second = by_room
            .iter()
            .find(|entry| entry["roomId"] == "room-2")
            .unwrap();
        assert_eq!(first["occupancyRate"], 100.0);
        assert_eq!(first["revenueCents"], 40_000);
        assert_eq!(first["bookings"], 1);
        assert_eq!(second["occupancyRate"], 0.0);
        assert_eq!(second["bookings"], 0);
    }
}
