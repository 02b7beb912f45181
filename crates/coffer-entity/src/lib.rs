//! # coffer-entity
//!
//! Domain entity models for Coffer. Every struct in this crate represents
//! a database table row, an object-store document, or a domain value
//! object. All entities derive `Debug`, `Clone`, `Serialize`,
//! `Deserialize`, and database entities additionally derive
//! `sqlx::FromRow`.

pub mod backup;
pub mod entity;
pub mod file;
