//! Booking lifecycle vocabulary and the status transition table.
//!
//! This is the only state machine in the system and it is enforced before any
//! status mutation is persisted, regardless of which caller asks for it.
//! Payment status deliberately has no transition rules.

pub const INITIAL_BOOKING_STATUS: &str = "PENDING";
pub const INITIAL_PAYMENT_STATUS: &str = "PENDING_WHATSAPP";

pub const BOOKING_STATUSES: &[&str] = &[
    "PENDING",
    "CONFIRMED",
    "CHECKED_IN",
    "CHECKED_OUT",
    "CANCELED",
    "NO_SHOW",
];

pub const PAYMENT_STATUSES: &[&str] = &["PENDING_WHATSAPP", "PAID", "CANCELED", "REFUNDED"];

/// Statuses that keep a room blocked for its dates.
pub const ACTIVE_BOOKING_STATUSES: &[&str] = &["PENDING", "CONFIRMED", "CHECKED_IN"];

/// Statuses excluded from revenue/occupancy reporting.
pub const NON_REPORTABLE_STATUSES: &[&str] = &["CANCELED", "NO_SHOW"];

/// Room statuses that refuse public bookings.
pub const UNAVAILABLE_PUBLIC_ROOM_STATUSES: &[&str] = &["MAINTENANCE", "INACTIVE"];

pub fn is_booking_status(value: &str) -> bool {
    BOOKING_STATUSES.contains(&value)
}

pub fn is_payment_status(value: &str) -> bool {
    PAYMENT_STATUSES.contains(&value)
}

/// Directed transition table. A same-state update is always a permitted no-op.
pub fn allowed_transition(current: &str, next: &str) -> bool {
    if current == next {
        return true;
    }
    match current {
        "PENDING" => matches!(next, "CONFIRMED" | "CANCELED" | "NO_SHOW"),
        "CONFIRMED" => matches!(next, "CHECKED_IN" | "CANCELED" | "NO_SHOW"),
        "CHECKED_IN" => next == "CHECKED_OUT",
        // CHECKED_OUT, CANCELED and NO_SHOW are terminal
        _ => false,
    }
}
