// storefront/src/services/mod.rs

//! Collaborator seams and their adapters. Each trait has a production adapter and an
//! in-process one used for development and tests.

pub mod auth_service;
pub mod email;
pub mod email_brevo;
pub mod email_mock;
pub mod order_store;
pub mod payment;
pub mod payment_mock;
pub mod payment_stripe;
pub mod storage;
pub mod storage_memory;
pub mod storage_supabase;
pub mod store_memory;
pub mod store_pg;

pub use auth_service::{AdminAuthority, TokenAuthority};
pub use email::{EmailMessage, Mailer};
pub use order_store::OrderStore;
pub use payment::PaymentGateway;
pub use storage::BlobStore;
