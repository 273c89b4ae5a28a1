// storefront/src/services/email.rs

use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
  pub to: String,
  pub subject: String,
  pub text: String,
  pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// A file the customer can download, as listed in the delivery email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLink {
  pub name: String,
  pub url: String,
}

pub fn escape_html(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#039;"),
      other => out.push(other),
    }
  }
  out
}

/// Message body followed by one numbered link per file, as text and HTML.
pub fn delivery_email(to: &str, subject: &str, message: &str, links: &[DeliveryLink], signature: &str) -> EmailMessage {
  let listing = links
    .iter()
    .enumerate()
    .map(|(i, link)| format!("{}. {}\n{}", i + 1, link.name, link.url))
    .collect::<Vec<_>>()
    .join("\n\n");
  let text = format!("{}\n\n{}\n\nBest regards,\n{}", message, listing, signature);

  let items: String = links
    .iter()
    .map(|link| {
      let url = escape_html(&link.url);
      format!(
        "<li><strong>{}</strong><br/><a href=\"{}\" target=\"_blank\" rel=\"noreferrer\">{}</a></li>",
        escape_html(&link.name),
        url,
        url
      )
    })
    .collect();
  let html = format!(
    "<p>{}</p><ol>{}</ol><p>Best regards,<br/>{}</p>",
    escape_html(message).replace('\n', "<br/>"),
    items,
    escape_html(signature)
  );

  EmailMessage {
    to: to.to_string(),
    subject: subject.to_string(),
    text,
    html,
  }
}

/// Sent once a payment settles.
pub fn payment_confirmation_email(to: &str, order_id: &str, amount_display: &str, store_name: &str) -> EmailMessage {
  let text = format!(
    "Thank you for your order {} ({}).\n\nYour payment has been received. Your photos will be delivered by email shortly.\n\n{}",
    order_id, amount_display, store_name
  );
  let html = format!(
    "<p>Thank you for your order <strong>{}</strong> ({}).</p><p>Your payment has been received. Your photos will be delivered by email shortly.</p><p>{}</p>",
    escape_html(order_id),
    escape_html(amount_display),
    escape_html(store_name)
  );
  EmailMessage {
    to: to.to_string(),
    subject: format!("{}: order {} confirmed", store_name, order_id),
    text,
    html,
  }
}
