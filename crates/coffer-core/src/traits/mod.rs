//! Core trait definitions implemented by the backend crates.

pub mod cache;
pub mod object_store;

pub use cache::CacheProvider;
pub use object_store::{ByteRange, ByteStream, ObjectInfo, ObjectStore, PutOutcome};
