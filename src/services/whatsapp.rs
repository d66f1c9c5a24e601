//! WhatsApp payment handoff. The backend never sends a message; it only
//! builds a `wa.me` deep link the guest's own client opens.

use url::Url;

use crate::error::{AppError, AppResult};

pub struct BookingMessage<'a> {
    pub booking_code: &'a str,
    pub guest_name: &'a str,
    pub guest_email: &'a str,
    pub room_number: &'a str,
    pub check_in: &'a str,
    pub check_out: &'a str,
    pub total_cents: i64,
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

pub fn build_whatsapp_url(phone: &str, message: &str) -> AppResult<String> {
    let digits = normalize_phone(phone);
    let mut url = Url::parse(&format!("https://wa.me/{digits}"))
        .map_err(|error| AppError::Internal(format!("Could not build WhatsApp URL: {error}")))?;
    url.query_pairs_mut().append_pair("text", message);
    Ok(url.into())
}

pub fn booking_message(params: &BookingMessage<'_>) -> String {
    [
        "Ola! Gostaria de confirmar o pagamento da minha reserva.".to_string(),
        format!("Codigo: {}", params.booking_code),
        format!("Hospede: {}", params.guest_name),
        format!("Email: {}", params.guest_email),
        format!("Quarto: {}", params.room_number),
        format!("Check-in: {}", params.check_in),
        format!("Check-out: {}", params.check_out),
        format!("Total: R$ {}", format_currency(params.total_cents)),
    ]
    .join("\n")
}

fn format_currency(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::{booking_message, build_whatsapp_url, format_currency, normalize_phone, BookingMessage};

    #[test]
    fn strips_everything_but_digits() {
        assert_eq!(normalize_phone("+55 63 8121-7810"), "556381217810");
        assert_eq!(normalize_phone("(11) 99999-0000"), "11999990000");
        assert_eq!(normalize_phone("abc"), "");
    }

    #[test]
    fn builds_an_encoded_deep_link() {
        let url = build_whatsapp_url("+55 63 8121-7810", "Codigo: HSA-20260315-001").unwrap();
        assert!(url.starts_with("https://wa.me/556381217810?text="), "{url}");
        assert!(!url.contains(' '), "spaces must be encoded: {url}");
        assert!(url.contains("HSA-20260315-001"));
    }

    #[test]
    fn formats_cents_as_decimal_currency() {
        assert_eq!(format_currency(63_500), "635.00");
        assert_eq!(format_currency(30_005), "300.05");
        assert_eq!(format_currency(0), "0.00");
    }

    #[test]
    fn message_carries_all_booking_fields() {
        let message = booking_message(&BookingMessage {
            booking_code: "HSA-20260315-001",
            guest_name: "Maria Silva",
            guest_email: "maria@example.com",
            room_number: "001",
            check_in: "2026-03-15",
            check_out: "2026-03-17",
            total_cents: 63_500,
        });
        for expected in [
            "HSA-20260315-001",
            "Maria Silva",
            "maria@example.com",
            "Quarto: 001",
            "Check-in: 2026-03-15",
            "Check-out: 2026-03-17",
            "Total: R$ 635.00",
        ] {
            assert!(message.contains(expected), "missing {expected}: {message}");
        }
    }
}
