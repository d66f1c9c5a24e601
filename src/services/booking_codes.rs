//! Human-readable booking codes: `<PREFIX>-<YYYYMMDD>-<seq>`, where `seq`
//! counts bookings created since UTC midnight plus one, zero-padded to three
//! digits. Uniqueness is ultimately guaranteed by the constraint on
//! `bookings.booking_code`; the creation flow retries on a collision.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::PgConnection;

use crate::error::AppResult;
use crate::repository::table_service::count_rows_tx;

pub fn format_booking_code(prefix: &str, now: DateTime<Utc>, created_today: i64) -> String {
    format!(
        "{prefix}-{}-{:03}",
        now.format("%Y%m%d"),
        created_today + 1
    )
}

/// Derives the next code from the same-day booking count, inside the caller's
/// transaction so the count sees its own earlier inserts.
pub async fn next_booking_code(
    conn: &mut PgConnection,
    prefix: &str,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let day_end = day_start + chrono::Duration::days(1);

    let mut filters = Map::new();
    filters.insert(
        "created_at__gte".to_string(),
        json!(day_start.to_rfc3339()),
    );
    filters.insert("created_at__lt".to_string(), json!(day_end.to_rfc3339()));
    let created_today = count_rows_tx(conn, "bookings", Some(&filters)).await?;

    Ok(format_booking_code(prefix, now, created_today))
}
