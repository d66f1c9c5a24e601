pub mod booking_codes;
pub mod calendar;
pub mod enrichment;
pub mod lifecycle;
pub mod pricing;
pub mod whatsapp;
