// storefront/src/services/email_brevo.rs

use crate::config::BrevoSettings;
use crate::errors::{AppError, Result};
use crate::services::email::{EmailMessage, Mailer};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Brevo transactional email API (`POST /v3/smtp/email`).
pub struct BrevoMailer {
  http: Client,
  settings: BrevoSettings,
  from_email: String,
  from_name: String,
}

impl BrevoMailer {
  pub fn new(settings: BrevoSettings, from_email: String, from_name: String) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| AppError::Config(format!("cannot build mail client: {}", e)))?;
    Ok(Self {
      http,
      settings,
      from_email,
      from_name,
    })
  }
}

#[async_trait]
impl Mailer for BrevoMailer {
  #[instrument(name = "brevo::send", skip(self, message), fields(to = %message.to), err(Display))]
  async fn send(&self, message: &EmailMessage) -> Result<()> {
    let body = json!({
      "sender": { "name": self.from_name, "email": self.from_email },
      "to": [{ "email": message.to }],
      "subject": message.subject,
      "textContent": message.text,
      "htmlContent": message.html,
    });
    let response = self
      .http
      .post(format!("{}/v3/smtp/email", self.settings.api_base.trim_end_matches('/')))
      .header("api-key", &self.settings.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| AppError::upstream("mailer", e))?;

    let status = response.status();
    if status.is_success() {
      info!("Email accepted by Brevo.");
      return Ok(());
    }
    let detail = response.text().await.unwrap_or_default();
    warn!(%status, %detail, "Brevo refused the email.");
    if status.is_server_error() || status.as_u16() == 429 {
      Err(AppError::upstream("mailer", format!("HTTP {}", status)))
    } else {
      Err(AppError::Internal(format!("mail provider rejected the message: HTTP {} {}", status, detail)))
    }
  }
}
