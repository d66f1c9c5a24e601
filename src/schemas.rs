use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::BadRequest(format!("Validation error: {errors}")))
}

/// Serializes an input struct to a column map for the table service.
pub fn serialize_to_map<T: Serialize>(input: &T) -> Map<String, Value> {
    match serde_json::to_value(input) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Drops nulls so optional fields absent from a PATCH never overwrite columns.
pub fn remove_nulls(mut map: Map<String, Value>) -> Map<String, Value> {
    map.retain(|_, value| !value.is_null());
    map
}

pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 500)
}

fn default_limit_100() -> i64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_room_status() -> String {
    "AVAILABLE".to_string()
}

// ── Public booking flow (camelCase wire format, see original site API) ──

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct ServiceItemInput {
    #[validate(length(min = 1))]
    pub service_id: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct CreateBookingInput {
    #[validate(length(min = 2, max = 255))]
    pub guest_name: String,
    #[validate(email)]
    pub guest_email: String,
    #[validate(length(min = 8, max = 32))]
    pub guest_phone: String,
    pub guest_document: Option<String>,
    #[validate(length(min = 1))]
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    #[validate(range(min = 1))]
    pub guests_count: i32,
    pub notes: Option<String>,
    #[validate(nested)]
    pub service_items: Option<Vec<ServiceItemInput>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct BookingLookupQuery {
    #[validate(email)]
    pub email: String,
    pub booking_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingCodePath {
    pub booking_code: String,
}

// ── Admin bookings ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBookingsQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct BookingPath {
    pub booking_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UpdateBookingInput {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub notes: Option<String>,
}

// ── Rooms ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct CreateRoomInput {
    #[validate(length(min = 1, max = 16))]
    pub number: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub base_price_cents: i64,
    #[validate(range(min = 0))]
    pub seasonal_price_cents: Option<i64>,
    #[serde(default = "default_room_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UpdateRoomInput {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub room_type: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub base_price_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub seasonal_price_cents: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomPath {
    pub room_id: String,
}

// ── Guests ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GuestsQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct GuestPath {
    pub guest_id: String,
}

// ── Services ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct CreateServiceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UpdateServiceInput {
    pub name: Option<String>,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ServicePath {
    pub service_id: String,
}

// ── Auth / profile / reports ────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UpdateHotelProfileInput {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address_line: Option<String>,
    pub google_maps_url: Option<String>,
    pub google_business_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportQuery {
    pub from: String,
    pub to: String,
}
