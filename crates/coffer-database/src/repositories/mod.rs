//! Repository traits and PostgreSQL implementations.
//!
//! Each module defines the repository trait for one aggregate next to its
//! Pg implementation. The service layer depends only on the traits.

pub mod entity;
pub mod file;
pub mod version;

pub use entity::{EntityRepository, PgEntityRepository};
pub use file::{FileRepository, PgFileRepository};
pub use version::{PgVersionRepository, VersionRepository};

use coffer_core::error::{AppError, ErrorKind};

/// Map a sqlx error into the engine taxonomy, preserving the source.
///
/// Pool and transport failures are retryable; everything else is an
/// uncategorized backend failure.
pub(crate) fn db_err(context: &str, e: sqlx::Error) -> AppError {
    let kind = match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ErrorKind::Unavailable
        }
        _ => ErrorKind::Operation,
    };
    AppError::with_source(kind, context, e)
}
