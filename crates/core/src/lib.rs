//! Apoteka Core - Shared types library.
//!
//! This crate provides common types used across all Apoteka components:
//! - `storefront` - Public-facing pharmacy storefront
//! - `cli` - Command-line tools for migrations and sync maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for catalog IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
