//! # coffer-storage
//!
//! Object-store adapter implementations for Coffer: an S3-compatible
//! backend and a local filesystem backend (also the test backend), both
//! behind the [`coffer_core::traits::ObjectStore`] trait, plus the object
//! key layout used across the engine.

pub mod layout;
pub mod providers;
