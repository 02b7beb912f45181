//! # coffer-core
//!
//! Core crate for the Coffer storage engine. Contains traits, configuration
//! schemas, domain events, pagination types, checksum and path utilities,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Coffer crates.

pub mod checksum;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod result;
pub mod sanitize;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
