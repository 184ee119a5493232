//! SMTP delivery and the price-drop message.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;
use crate::extract::draft::truncate_chars;
use crate::types::ProductRecord;

const SUBJECT_NAME_CHARS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError>;
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// STARTTLS relay with credentials. The connection is opened lazily on first send.
    pub fn new(cfg: &SmtpConfig) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self {
            transport,
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when SMTP credentials are missing: logs the message instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), EmailError> {
        info!("[EMAIL] SMTP credentials not configured, simulated send to {to}: {subject}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Subject and HTML body for a target-price crossing.
pub fn price_drop_email(
    product: &ProductRecord,
    old_price: f64,
    new_price: f64,
    app_base_url: &str,
) -> (String, String) {
    let subject = format!(
        "Price Drop Alert: {}...",
        truncate_chars(&product.name, SUBJECT_NAME_CHARS)
    );

    let currency = escape(&product.currency);
    let name = escape(&product.name);
    let url = escape(&product.url);
    let savings = old_price - new_price;
    let image = product
        .image_url
        .as_deref()
        .map(|src| {
            format!(
                r#"<img src="{}" alt="{name}" style="max-width: 100px; max-height: 100px; object-fit: contain; float: left; margin-right: 15px;">"#,
                escape(src)
            )
        })
        .unwrap_or_default();
    let target = product
        .target_price
        .map(|t| format!("<p>Target price was: {currency} {t:.2}</p>"))
        .unwrap_or_default();
    let dashboard = format!("{}/products/{}", app_base_url.trim_end_matches('/'), product.id);

    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #2563eb;">Good news! A price you are tracking has dropped.</h2>
  <div style="border: 1px solid #e5e7eb; padding: 15px; border-radius: 8px; margin: 20px 0;">
    {image}
    <div style="overflow: hidden;">
      <h3 style="margin-top: 0;"><a href="{url}" style="text-decoration: none; color: #111827;">{name}</a></h3>
      <p style="font-size: 1.1em;">
        <span style="text-decoration: line-through; color: #6b7280;">{currency} {old_price:.2}</span>
        <span style="color: #ef4444; font-weight: bold; margin-left: 10px;">{currency} {new_price:.2}</span>
      </p>
      <p style="color: #059669; font-weight: bold;">You save {currency} {savings:.2}!</p>
    </div>
    <div style="clear: both;"></div>
  </div>
  {target}
  <div style="text-align: center; margin-top: 30px;">
    <a href="{url}" style="background-color: #2563eb; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; font-weight: bold;">View Deal</a>
  </div>
  <hr style="margin-top: 40px; border: none; border-top: 1px solid #e5e7eb;">
  <p style="font-size: 0.8em; color: #9ca3af; text-align: center;">You are receiving this because you enabled alerts for this product. <a href="{dashboard}">Manage alerts</a></p>
</div>"#
    );
    (subject, html)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
