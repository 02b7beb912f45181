//! Object key layout.
//!
//! Centralising key construction keeps every locator the engine mints in
//! one place:
//!
//! - current content: `files/<entity_id>/<file_id>/<uuid>-<name>`
//! - version objects: `<versions_prefix>/<file_id>/<sanitized_path>/<version_id>`
//! - backup objects:  `<prefix>/<backup_id>/manifest.json` and
//!   `<prefix>/<backup_id>/files/<entity_id>/<sanitized_path>`

use uuid::Uuid;

use coffer_core::sanitize::{sanitize_key_path, sanitize_key_segment};

/// Mint a collision-resistant locator for a file's current content.
///
/// The random component makes every upload land on a fresh key, so the
/// previous content is never overwritten in place.
pub fn file_locator(entity_id: Uuid, file_id: Uuid, path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    format!(
        "files/{entity_id}/{file_id}/{}-{}",
        Uuid::new_v4(),
        sanitize_key_segment(name)
    )
}

/// Key for one version object.
pub fn version_key(versions_prefix: &str, file_id: Uuid, path: &str, version_id: Uuid) -> String {
    format!(
        "{versions_prefix}/{file_id}/{}/{version_id}",
        sanitize_key_path(path)
    )
}

/// Key of a backup's manifest object — the backup's commit record.
pub fn backup_manifest_key(prefix: &str, backup_id: Uuid) -> String {
    format!("{prefix}/{backup_id}/manifest.json")
}

/// Key of one captured file inside a backup.
pub fn backup_file_key(prefix: &str, backup_id: Uuid, entity_id: Uuid, path: &str) -> String {
    format!(
        "{prefix}/{backup_id}/files/{entity_id}/{}",
        sanitize_key_path(path)
    )
}

/// Prefix under which a backup's captured files live.
pub fn backup_files_prefix(prefix: &str, backup_id: Uuid) -> String {
    format!("{prefix}/{backup_id}/files/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_locators_are_unique() {
        let entity = Uuid::new_v4();
        let file = Uuid::new_v4();
        let a = file_locator(entity, file, "docs/report.pdf");
        let b = file_locator(entity, file, "docs/report.pdf");
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("files/{entity}/{file}/")));
        assert!(a.ends_with("-report.pdf"));
    }

    #[test]
    fn test_version_key_sanitizes_path() {
        let file = Uuid::nil();
        let version = Uuid::nil();
        let key = version_key("versions", file, "docs/q3 report.pdf", version);
        assert_eq!(
            key,
            format!("versions/{file}/docs/q3_report.pdf/{version}")
        );
    }

    #[test]
    fn test_backup_layout() {
        let backup = Uuid::nil();
        let entity = Uuid::nil();
        assert_eq!(
            backup_manifest_key("backups", backup),
            format!("backups/{backup}/manifest.json")
        );
        let file_key = backup_file_key("backups", backup, entity, "a/b.txt");
        assert!(file_key.starts_with(&backup_files_prefix("backups", backup)));
        assert!(file_key.ends_with("a/b.txt"));
    }
}
