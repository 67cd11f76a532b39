use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use html_escape::encode_text;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use infra::models::UserContactRow;
use infra::Money;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error (status {status}): {body}")]
    ApiError { status: u16, body: String },
}

#[derive(Clone)]
pub struct EmailConfig {
    pub scw_secret_key: String,
    pub scw_project_id: String,
    pub scw_region: String,
    pub sender_email: String,
    pub sender_name: String,
}

impl EmailConfig {
    pub fn from_env() -> Option<Self> {
        let scw_secret_key = std::env::var("SCW_SECRET_KEY").ok()?;
        let scw_project_id = std::env::var("SCW_DEFAULT_PROJECT_ID").ok()?;
        let sender_email = std::env::var("SCW_SENDER_EMAIL").ok()?;

        Some(Self {
            scw_secret_key,
            scw_project_id,
            scw_region: std::env::var("SCW_REGION").unwrap_or_else(|_| "fr-par".to_string()),
            sender_email,
            sender_name: std::env::var("SCW_SENDER_NAME")
                .unwrap_or_else(|_| "SportGrid".to_string()),
        })
    }
}

/// Everything the confirmation email shows about a booking.
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub booking_id: i64,
    pub venue_name: String,
    pub venue_address: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Money,
    pub ticket_url: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        to: &UserContactRow,
        booking: &BookingConfirmation,
    ) -> Result<(), EmailError>;
}

pub const CONFIRMATION_SUBJECT: &str = "Booking Confirmed! - SportGrid";

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Times in emails are shown in India Standard Time.
fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or(Utc.fix())
}

fn local_date(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&ist()).format("%d %b %Y").to_string()
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&ist()).format("%I:%M %p").to_string()
}

// ── HTML building blocks ────────────────────────────────────────────

fn wrap_in_layout(heading: &str, body_html: &str, footer: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{heading}</title>
</head>
<body style="margin:0;padding:0;background-color:#f4f6f5;color:#1f2933;font-family:Arial,Helvetica,sans-serif;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0" border="0" style="background-color:#f4f6f5;">
<tr><td align="center" style="padding:32px 16px;">
  <table role="presentation" width="560" cellpadding="0" cellspacing="0" border="0" style="max-width:560px;background-color:#ffffff;border-radius:8px;border-top:4px solid #16a34a;">
    <tr><td style="padding:28px 36px 0;">
      <h1 style="margin:0;font-size:22px;color:#14532d;">{heading}</h1>
    </td></tr>
    <tr><td style="padding:20px 36px 8px;">
      {body_html}
    </td></tr>
    <tr><td align="center" style="padding:16px 36px 28px;">
      <p style="margin:0;font-size:11px;color:#7b8794;">{footer}</p>
    </td></tr>
  </table>
</td></tr>
</table>
</body>
</html>"##
    )
}

fn paragraph(text: &str) -> String {
    format!(r#"<p style="margin:0 0 16px;font-size:15px;line-height:1.6;">{text}</p>"#)
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding:6px 0;font-size:13px;color:#7b8794;width:120px;">{label}</td><td style="padding:6px 0;font-size:14px;font-weight:bold;">{value}</td></tr>"#
    )
}

fn cta_button(href: &str, label: &str) -> String {
    format!(
        r#"<table role="presentation" cellpadding="0" cellspacing="0" border="0" style="margin:8px 0 16px;">
<tr><td style="background-color:#16a34a;border-radius:4px;">
  <a href="{href}" target="_blank" style="display:inline-block;padding:12px 28px;font-size:14px;font-weight:bold;color:#ffffff;text-decoration:none;">{label}</a>
</td></tr>
</table>"#
    )
}

pub fn render_confirmation(to_name: &str, booking: &BookingConfirmation) -> (String, String) {
    let safe_name = encode_text(to_name);
    let safe_venue = encode_text(&booking.venue_name);
    let safe_address = encode_text(&booking.venue_address);
    let date = local_date(booking.start_time);
    let slot = format!(
        "{} - {}",
        local_time(booking.start_time),
        local_time(booking.end_time)
    );
    let price = booking.total_price.to_string();

    let details = format!(
        r#"<table role="presentation" cellpadding="0" cellspacing="0" border="0" style="margin:0 0 16px;">{}{}{}{}{}</table>"#,
        detail_row("Booking", &format!("#{}", booking.booking_id)),
        detail_row("Venue", &safe_venue),
        detail_row("Address", &safe_address),
        detail_row("Date", &date),
        detail_row("Time", &slot),
    );

    let body_html = format!(
        "{}{}{}{}{}",
        paragraph(&format!("Hi {},", safe_name)),
        paragraph("Your booking is confirmed. Here are the details:"),
        details,
        paragraph(&format!("Amount: <strong>{}</strong>", price)),
        cta_button(&encode_text(&booking.ticket_url), "Download Ticket"),
    );

    let html = wrap_in_layout("Booking Confirmed", &body_html, "SportGrid &middot; Book. Play. Repeat.");

    let text = format!(
        "Hi {},\n\nYour booking is confirmed.\n\nBooking: #{}\nVenue: {}\nAddress: {}\nDate: {}\nTime: {}\nAmount: {}\n\nDownload your ticket: {}\n\n-- SportGrid",
        to_name,
        booking.booking_id,
        booking.venue_name,
        booking.venue_address,
        date,
        slot,
        price,
        booking.ticket_url
    );

    (html, text)
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn send_email(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<(), EmailError> {
        let url = format!(
            "https://api.scaleway.com/transactional-email/v1alpha1/regions/{}/emails",
            self.config.scw_region
        );

        let body = json!({
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name,
            },
            "to": [{
                "email": to_email,
                "name": to_name,
            }],
            "subject": subject,
            "html": html,
            "text": text,
            "project_id": self.config.scw_project_id,
        });

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.config.scw_secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::ApiError { status, body });
        }

        info!("Email sent to {} ({})", to_email, subject);
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_booking_confirmation(
        &self,
        to: &UserContactRow,
        booking: &BookingConfirmation,
    ) -> Result<(), EmailError> {
        let to_name = match &to.last_name {
            Some(last) => format!("{} {}", to.first_name, last),
            None => to.first_name.clone(),
        };
        let (html, text) = render_confirmation(&to_name, booking);

        self.send_email(&to.email, &to_name, CONFIRMATION_SUBJECT, &html, &text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking() -> BookingConfirmation {
        BookingConfirmation {
            booking_id: 12,
            venue_name: "Smash <Arena>".into(),
            venue_address: "MG Road".into(),
            start_time: Utc.with_ymd_and_hms(2030, 1, 2, 12, 30, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2030, 1, 2, 14, 30, 0).unwrap(),
            total_price: Money::from_major(1_000),
            ticket_url: "https://courts.example/bookings/12/ticket?download=true&token=12%7Cab".into(),
        }
    }

    #[test]
    fn renders_times_in_ist() {
        let (html, text) = render_confirmation("Asha", &booking());
        assert!(text.contains("Date: 02 Jan 2030"));
        assert!(text.contains("Time: 06:00 PM - 08:00 PM"));
        assert!(text.contains("Amount: 1000.00"));
        assert!(html.contains("Download Ticket"));
    }

    #[test]
    fn escapes_user_content_in_html() {
        let (html, _) = render_confirmation("<b>Asha</b>", &booking());
        assert!(html.contains("&lt;b&gt;Asha&lt;/b&gt;"));
        assert!(html.contains("Smash &lt;Arena&gt;"));
    }

    #[test]
    fn text_part_carries_ticket_link() {
        let (_, text) = render_confirmation("Asha", &booking());
        assert!(text.contains(
            "Download your ticket: https://courts.example/bookings/12/ticket?download=true&token=12%7Cab"
        ));
        assert!(text.ends_with("-- SportGrid"));
    }
}
