//! # coffer-database
//!
//! PostgreSQL connection management, migration runner, and repository
//! implementations for the Coffer metadata store. Repository traits are
//! defined next to their Pg implementations so the service layer can be
//! exercised against in-memory fakes.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
