use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod admin_bookings;
pub mod auth;
pub mod bookings;
pub mod guests;
pub mod health;
pub mod profile;
pub mod reports;
pub mod rooms;
pub mod services;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(auth::router())
        .merge(profile::router())
        .merge(rooms::router())
        .merge(guests::router())
        .merge(services::router())
        .merge(bookings::router())
        .merge(admin_bookings::router())
        .merge(reports::router())
}
