//! Date-only arithmetic for stays and report windows.
//!
//! Everything works on `NaiveDate` (UTC calendar days), so night counts never
//! drift across timezones or DST.

use chrono::{Days, NaiveDate};

use crate::error::{AppError, AppResult};

/// Strict `YYYY-MM-DD` parsing; anything else is a client error.
pub fn parse_date_only(value: &str) -> AppResult<NaiveDate> {
    let well_formed = value.len() == 10
        && value.bytes().enumerate().all(|(index, byte)| match index {
            4 | 7 => byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !well_formed {
        return Err(AppError::BadRequest(
            "Invalid date format. Expected YYYY-MM-DD.".to_string(),
        ));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{value}'.")))
}

pub fn ensure_checkout_after_checkin(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<()> {
    if check_out <= check_in {
        return Err(AppError::BadRequest(
            "checkOut must be greater than checkIn.".to_string(),
        ));
    }
    Ok(())
}

pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

pub fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// Nights a booking contributes inside a half-open window; 0 when disjoint.
pub fn overlap_nights(
    period_start: NaiveDate,
    period_end_exclusive: NaiveDate,
    booking_start: NaiveDate,
    booking_end_exclusive: NaiveDate,
) -> i64 {
    let start = period_start.max(booking_start);
    let end = period_end_exclusive.min(booking_end_exclusive);
    if end <= start {
        return 0;
    }
    (end - start).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> chrono::NaiveDate {
        parse_date_only(value).unwrap()
    }

    #[test]
    fn parses_strict_dates_only() {
        assert!(parse_date_only("2026-03-15").is_ok());
        assert!(parse_date_only("2026-3-15").is_err());
        assert!(parse_date_only("2026/03/15").is_err());
        assert!(parse_date_only("2026-03-15T00:00:00Z").is_err());
        assert!(parse_date_only("2026-02-30").is_err());
        assert!(parse_date_only("").is_err());
    }

    #[test]
    fn counts_nights_in_whole_days() {
        assert_eq!(nights_between(date("2026-03-15"), date("2026-03-17")), 2);
        assert_eq!(nights_between(date("2026-03-15"), date("2026-03-16")), 1);
        assert_eq!(nights_between(date("2026-02-27"), date("2026-03-02")), 3);
        assert_eq!(nights_between(date("2026-12-30"), date("2027-01-02")), 3);
    }

    #[test]
    fn checkout_must_follow_checkin() {
        assert!(ensure_checkout_after_checkin(date("2026-03-15"), date("2026-03-16")).is_ok());
        assert!(ensure_checkout_after_checkin(date("2026-03-15"), date("2026-03-15")).is_err());
        assert!(ensure_checkout_after_checkin(date("2026-03-16"), date("2026-03-15")).is_err());
    }

    #[test]
    fn overlap_clips_to_the_window() {
        let from = date("2026-03-10");
        let to = date("2026-03-20");
        // fully inside
        assert_eq!(overlap_nights(from, to, date("2026-03-12"), date("2026-03-14")), 2);
        // straddles the start
        assert_eq!(overlap_nights(from, to, date("2026-03-08"), date("2026-03-12")), 2);
        // straddles the end
        assert_eq!(overlap_nights(from, to, date("2026-03-18"), date("2026-03-25")), 2);
        // covers the whole window
        assert_eq!(overlap_nights(from, to, date("2026-03-01"), date("2026-03-31")), 10);
        // disjoint and touching boundaries
        assert_eq!(overlap_nights(from, to, date("2026-03-20"), date("2026-03-22")), 0);
        assert_eq!(overlap_nights(from, to, date("2026-03-01"), date("2026-03-10")), 0);
    }

    #[test]
    fn adds_days_across_month_boundaries() {
        assert_eq!(add_days(date("2026-03-31"), 1), date("2026-04-01"));
        assert_eq!(add_days(date("2026-12-31"), 1), date("2027-01-01"));
    }
}
