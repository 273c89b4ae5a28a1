// storefront/src/lib.rs

//! Storefront backend for watermarked photo bundles.
//!
//! Customers buy packs of photos at curated bundle prices, pay through a hosted checkout
//! page, and receive the originals by email once an administrator uploads them.

pub mod config;
pub mod errors;
pub mod models;
pub mod operations;
pub mod pipelines;
pub mod pricing;
pub mod services;
pub mod state;
pub mod web;
