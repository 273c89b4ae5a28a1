// storefront/src/config.rs

use crate::errors::{AppError, Result};
use crate::pricing::PriceTable;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StripeSettings {
  pub secret_key: String,
  pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseSettings {
  pub url: String,
  pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct BrevoSettings {
  pub api_key: String,
  pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Public site URL, used for the gateway's success and cancel redirects.
  pub app_base_url: String,
  pub log_json: bool,

  /// `None` runs on the in-memory order store.
  pub database_url: Option<String>,
  pub run_migrations: bool,

  pub store_name: String,
  pub currency: String,
  pub price_table: PriceTable,
  pub max_photos_per_order: u32,

  /// `None` runs on the mock gateway.
  pub stripe: Option<StripeSettings>,
  pub webhook_secret: String,
  pub webhook_tolerance: Duration,

  /// `None` keeps deliveries in memory.
  pub supabase: Option<SupabaseSettings>,
  pub delivery_bucket: String,
  pub signed_url_expiry: Duration,
  pub max_upload_bytes: usize,

  /// `None` logs emails through the mock mailer.
  pub brevo: Option<BrevoSettings>,
  pub email_from: String,
  pub email_from_name: String,

  /// Argon2 PHC string of the admin bearer token. Without it every admin call is refused.
  pub admin_token_hash: Option<String>,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let cfg = Self::from_lookup(|name| env::var(name).ok())?;
    tracing::info!(
      persistent_store = cfg.database_url.is_some(),
      stripe = cfg.stripe.is_some(),
      supabase = cfg.supabase.is_some(),
      brevo = cfg.brevo.is_some(),
      "Application configuration loaded."
    );
    Ok(cfg)
  }

  /// Builds the configuration from an arbitrary variable source. Blank values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let app_base_url = get("APP_BASE_URL")
      .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();
    let log_json = get_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json");

    let database_url = get("DATABASE_URL");
    let run_migrations = parse_var("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "false"))?;

    let price_table = match get("PRICE_TABLE") {
      Some(raw) => parse_price_table(&raw)?,
      None => PriceTable::standard(),
    };
    let max_photos_per_order = parse_var("MAX_PHOTOS_PER_ORDER", &get_or("MAX_PHOTOS_PER_ORDER", "1000"))?;
    if max_photos_per_order == 0 {
      return Err(AppError::Config("MAX_PHOTOS_PER_ORDER must be positive".to_string()));
    }

    let stripe = get("STRIPE_SECRET_KEY").map(|secret_key| StripeSettings {
      secret_key,
      api_base: get_or("STRIPE_API_BASE", "https://api.stripe.com"),
    });
    let webhook_secret = match (&stripe, get("STRIPE_WEBHOOK_SECRET")) {
      (_, Some(secret)) => secret,
      (None, None) => "whsec_mock".to_string(),
      (Some(_), None) => {
        return Err(AppError::Config(
          "STRIPE_WEBHOOK_SECRET is required when STRIPE_SECRET_KEY is set".to_string(),
        ))
      }
    };
    let webhook_tolerance = Duration::from_secs(parse_var(
      "WEBHOOK_TOLERANCE_SECS",
      &get_or("WEBHOOK_TOLERANCE_SECS", "300"),
    )?);

    let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
      (Some(url), Some(service_role_key)) => Some(SupabaseSettings {
        url: url.trim_end_matches('/').to_string(),
        service_role_key,
      }),
      (None, None) => None,
      _ => {
        return Err(AppError::Config(
          "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together".to_string(),
        ))
      }
    };
    let signed_url_expiry = Duration::from_secs(parse_var(
      "SIGNED_URL_EXPIRES",
      &get_or("SIGNED_URL_EXPIRES", "86400"),
    )?);
    let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &get_or("MAX_UPLOAD_BYTES", "67108864"))?;

    let brevo = get("BREVO_API_KEY").map(|api_key| BrevoSettings {
      api_key,
      api_base: get_or("BREVO_API_BASE", "https://api.brevo.com"),
    });

    Ok(Self {
      server_host,
      server_port,
      app_base_url,
      log_json,
      database_url,
      run_migrations,
      store_name: get_or("STORE_NAME", "Lightbox"),
      currency: get_or("STORE_CURRENCY", "eur").to_ascii_lowercase(),
      price_table,
      max_photos_per_order,
      stripe,
      webhook_secret,
      webhook_tolerance,
      supabase,
      delivery_bucket: get_or("DELIVERY_BUCKET", "deliveries"),
      signed_url_expiry,
      max_upload_bytes,
      brevo,
      email_from: get_or("EMAIL_FROM", "noreply@example.com"),
      email_from_name: get_or("EMAIL_FROM_NAME", "Lightbox"),
      admin_token_hash: get("ADMIN_TOKEN_HASH"),
    })
  }

  pub fn success_url(&self) -> String {
    format!("{}/success", self.app_base_url)
  }

  pub fn cancel_url(&self) -> String {
    format!("{}/cart", self.app_base_url)
  }

  /// Where a customer lands when checkout is retried for an order that is already paid.
  pub fn completed_url(&self, order_id: &str) -> String {
    format!("{}/success?order={}", self.app_base_url, order_id)
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

fn parse_price_table(raw: &str) -> Result<PriceTable> {
  let prices = raw
    .split(',')
    .map(|p| Decimal::from_str(p.trim()).map_err(|e| AppError::Config(format!("Invalid PRICE_TABLE entry '{}': {}", p, e))))
    .collect::<Result<Vec<_>>>()?;
  PriceTable::new(prices).map_err(|e| AppError::Config(format!("Invalid PRICE_TABLE: {}", e)))
}
