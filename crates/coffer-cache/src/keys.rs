//! Cache key and namespace builders.
//!
//! Centralising key construction prevents typos and makes it easy to find
//! every key the engine uses. The namespaced layer composes a full key as
//! `<namespace>:<key>`; the LRU index for a namespace lives beside it.

use uuid::Uuid;

// ── Namespaces ─────────────────────────────────────────────

/// Namespace holding one entity's cached file metadata.
pub fn entity_files(entity_id: Uuid) -> String {
    format!("entity:{entity_id}:files")
}

// ── Keys within a namespace ────────────────────────────────

/// Key for a file's metadata by logical path.
pub fn file_by_path(path: &str) -> String {
    format!("file:{path}")
}

// ── Layer internals ────────────────────────────────────────

/// The LRU index key tracking a namespace's members.
pub fn lru_index(namespace: &str) -> String {
    format!("lru:{namespace}")
}

/// Compose a namespaced value key.
pub fn namespaced(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Pattern matching every value key in a namespace.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{namespace}:*")
}
