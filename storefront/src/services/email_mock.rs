// storefront/src/services/email_mock.rs

use crate::errors::{AppError, Result};
use crate::services::email::{EmailMessage, Mailer};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Logs messages instead of sending them and keeps a copy for inspection.
#[derive(Default)]
pub struct MockMailer {
  outbox: Mutex<Vec<EmailMessage>>,
  fail_next: Mutex<bool>,
}

impl MockMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn sent(&self) -> Vec<EmailMessage> {
    self.outbox.lock().await.clone()
  }

  /// Makes the next `send` fail as an unavailable provider would.
  pub async fn fail_next_send(&self) {
    *self.fail_next.lock().await = true;
  }
}

#[async_trait]
impl Mailer for MockMailer {
  async fn send(&self, message: &EmailMessage) -> Result<()> {
    let preview: String = message.text.chars().take(50).collect();
    {
      let mut fail = self.fail_next.lock().await;
      if *fail {
        *fail = false;
        warn!(to = %message.to, subject = %message.subject, "Simulated email failure.");
        return Err(AppError::upstream("mailer", "simulated send failure"));
      }
    }
    info!(to = %message.to, subject = %message.subject, %preview, "Mock email sent.");
    self.outbox.lock().await.push(message.clone());
    Ok(())
  }
}
