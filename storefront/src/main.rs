// storefront/src/main.rs

use anyhow::Context;
use lightbox::config::AppConfig;
use lightbox::errors::AppError;
use lightbox::pipelines;
use lightbox::services::auth_service::{hash_token, TokenAuthority};
use lightbox::services::email_brevo::BrevoMailer;
use lightbox::services::email_mock::MockMailer;
use lightbox::services::payment::WebhookVerifier;
use lightbox::services::payment_mock::MockGateway;
use lightbox::services::payment_stripe::StripeGateway;
use lightbox::services::storage_memory::MemoryBlobStore;
use lightbox::services::storage_supabase::SupabaseStorage;
use lightbox::services::store_memory::MemoryOrderStore;
use lightbox::services::store_pg::PgOrderStore;
use lightbox::services::{BlobStore, Mailer, OrderStore, PaymentGateway};
use lightbox::state::AppState;
use lightbox::web::{configure_app_routes, json_config};
use lightbox_flow::Registry;

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

async fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
  let orders: Arc<dyn OrderStore> = match &config.database_url {
    Some(url) => {
      let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("connecting to the database")?;
      if config.run_migrations {
        sqlx::migrate!("./migrations")
          .run(&pool)
          .await
          .context("running migrations")?;
        tracing::info!("Database migrations applied.");
      }
      Arc::new(PgOrderStore::new(pool))
    }
    None => {
      tracing::warn!("DATABASE_URL not set; orders are kept in memory.");
      Arc::new(MemoryOrderStore::new())
    }
  };

  let verifier = WebhookVerifier::new(config.webhook_secret.clone(), config.webhook_tolerance);
  let payments: Arc<dyn PaymentGateway> = match &config.stripe {
    Some(settings) => Arc::new(StripeGateway::new(settings.clone(), verifier)?),
    None => {
      tracing::warn!("STRIPE_SECRET_KEY not set; using the mock payment gateway.");
      Arc::new(MockGateway::new(config.app_base_url.clone(), verifier))
    }
  };
  tracing::info!(gateway = payments.name(), "Payment gateway configured.");

  let blobs: Arc<dyn BlobStore> = match &config.supabase {
    Some(settings) => Arc::new(SupabaseStorage::new(settings.clone())?),
    None => Arc::new(MemoryBlobStore::new()),
  };

  let mailer: Arc<dyn Mailer> = match &config.brevo {
    Some(settings) => Arc::new(BrevoMailer::new(
      settings.clone(),
      config.email_from.clone(),
      config.email_from_name.clone(),
    )?),
    None => Arc::new(MockMailer::new()),
  };

  if config.admin_token_hash.is_none() {
    tracing::warn!("ADMIN_TOKEN_HASH not set; admin endpoints will refuse every request.");
  }
  let admins = Arc::new(TokenAuthority::new(config.admin_token_hash.clone()));

  let flows = Arc::new(Registry::<AppError>::new());
  pipelines::register_all_pipelines(&flows);

  Ok(AppState {
    config,
    flows,
    orders,
    payments,
    blobs,
    mailer,
    admins,
  })
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // `lightbox_server hash-token <token>` prints the value for ADMIN_TOKEN_HASH.
  let args: Vec<String> = std::env::args().collect();
  if args.get(1).map(String::as_str) == Some("hash-token") {
    let token = args.get(2).context("usage: lightbox_server hash-token <token>")?;
    println!("{}", hash_token(token)?);
    return Ok(());
  }

  let app_config = Arc::new(AppConfig::from_env()?);
  init_tracing(app_config.log_json);
  tracing::info!("Starting storefront server...");

  let app_state = build_state(app_config.clone()).await?;

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(json_config(&app_state.config))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("binding {}", server_address))?
  .run()
  .await?;

  Ok(())
}
