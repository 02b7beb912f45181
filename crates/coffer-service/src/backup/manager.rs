//! Backup manager — manifest-based snapshot and restore.
//!
//! Creation is a two-phase protocol: every captured file object is
//! written first, then the manifest as the durability commit record. A
//! backup whose manifest object is absent is nonexistent, regardless of
//! orphaned file objects. Deletion inverts the order: manifest first,
//! then file objects, so a partially deleted backup is never
//! discoverable as valid.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use coffer_core::checksum;
use coffer_core::config::backup::BackupConfig;
use coffer_core::config::storage::StorageConfig;
use coffer_core::error::{AppError, ErrorKind};
use coffer_core::events::{BackupEvent, DomainEvent, EventPayload, EventSink};
use coffer_core::result::AppResult;
use coffer_core::traits::object_store::ObjectStore;
use coffer_database::repositories::{EntityRepository, FileRepository};
use coffer_entity::backup::{
    BackupManifest, BackupRecord, BackupStatus, BackupType, BackupVerification, ManifestEntry,
    RestoreReport,
};
use coffer_entity::file::File;
use coffer_entity::file::kind::content_type_from_path;
use coffer_storage::layout;

use crate::file::{FileManager, UploadParams};

use super::progress::{BackupProgress, ProgressCallback};
use super::tracker::ActiveBackups;

/// Parameters for creating a backup.
#[derive(Debug, Clone)]
pub struct CreateBackupParams {
    /// Scope to one entity, or system-wide when absent.
    pub entity_id: Option<Uuid>,
    /// Full, or incremental over the configured look-back window.
    pub backup_type: BackupType,
    /// Re-read and verify the manifest before returning.
    pub verify: bool,
}

/// Parameters for restoring from a backup.
#[derive(Debug, Clone)]
pub struct RestoreBackupParams {
    /// The backup to restore from.
    pub backup_id: Uuid,
    /// Restore only entries captured from this entity.
    pub entity_id: Option<Uuid>,
    /// Upload into this entity instead of each entry's own.
    pub target_entity_id: Option<Uuid>,
    /// Verify the backup before restoring anything.
    pub verify: bool,
}

/// Orchestrates backup creation, restore, verification, and deletion.
#[derive(Clone)]
pub struct BackupManager {
    /// Entity repository.
    entities: Arc<dyn EntityRepository>,
    /// File repository (candidate selection).
    files: Arc<dyn FileRepository>,
    /// File manager (restore goes through the normal write path).
    file_manager: Arc<FileManager>,
    /// Object store.
    store: Arc<dyn ObjectStore>,
    /// Source bucket settings.
    storage: StorageConfig,
    /// Backup bucket, prefix, batching.
    config: BackupConfig,
    /// In-flight run registry.
    tracker: Arc<ActiveBackups>,
    /// Optional notification hook.
    events: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager").finish()
    }
}

impl BackupManager {
    /// Creates a new backup manager.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        files: Arc<dyn FileRepository>,
        file_manager: Arc<FileManager>,
        store: Arc<dyn ObjectStore>,
        storage: StorageConfig,
        config: BackupConfig,
        tracker: Arc<ActiveBackups>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            entities,
            files,
            file_manager,
            store,
            storage,
            config,
            tracker,
            events,
        }
    }

    /// Creates a backup of one entity (or the whole system), copying each
    /// candidate's current blob into the backup bucket in bounded
    /// concurrent batches and committing the manifest last.
    pub async fn create_backup(
        &self,
        params: CreateBackupParams,
        progress: Option<ProgressCallback>,
    ) -> AppResult<BackupRecord> {
        if let Some(entity_id) = params.entity_id {
            self.entities
                .find_by_id(entity_id)
                .await?
                .ok_or_else(|| AppError::not_found("Entity not found"))?;
        }

        let modified_since = match params.backup_type {
            BackupType::Full => None,
            BackupType::Incremental => {
                Some(Utc::now() - Duration::hours(self.config.incremental_window_hours))
            }
        };
        let candidates = self
            .files
            .list_for_backup(params.entity_id, modified_since)
            .await?;

        let backup_id = Uuid::new_v4();
        let created_at = Utc::now();
        let _active = self.tracker.begin(backup_id);
        self.store.create_bucket(&self.config.bucket).await?;

        info!(
            backup_id = %backup_id,
            backup_type = %params.backup_type,
            candidates = candidates.len(),
            "Backup started"
        );

        let total = candidates.len() as u64;
        // Increment and emit under one short lock so the callback only
        // ever observes monotonically increasing counts.
        let completed = Mutex::new(0u64);
        let results: Vec<Option<ManifestEntry>> = stream::iter(candidates)
            .map(|file| {
                let completed = &completed;
                let progress = progress.as_ref();
                async move {
                    let result = self.copy_candidate(backup_id, &file).await;
                    {
                        let mut done = completed
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        *done += 1;
                        if let Some(callback) = progress {
                            callback(BackupProgress {
                                backup_id,
                                completed: *done,
                                total,
                            });
                        }
                    }
                    match result {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            warn!(
                                backup_id = %backup_id,
                                entity_id = %file.entity_id,
                                path = %file.path,
                                error = %e,
                                "Backup candidate failed and was excluded"
                            );
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent_transfers.max(1))
            .collect()
            .await;

        let entries: Vec<ManifestEntry> = results.into_iter().flatten().collect();
        let failed_count = total - entries.len() as u64;
        let manifest =
            BackupManifest::assemble(backup_id, params.backup_type, created_at, entries);

        // The manifest write is the commit step.
        let manifest_key = layout::backup_manifest_key(&self.config.prefix, backup_id);
        let body = serde_json::to_vec(&manifest)?;
        if let Err(e) = self
            .store
            .put(
                &self.config.bucket,
                &manifest_key,
                body.into(),
                Some("application/json"),
                None,
            )
            .await
        {
            error!(backup_id = %backup_id, error = %e, "Manifest write failed; backup is void");
            return Ok(BackupRecord {
                backup_id,
                backup_type: params.backup_type,
                status: BackupStatus::Failed,
                file_count: 0,
                failed_count: total,
                total_size_bytes: 0,
                error: Some(format!("Manifest write failed: {e}")),
                created_at,
            });
        }

        if params.verify {
            let verification = self.verify_backup(backup_id).await?;
            if !verification.passed() {
                return Err(AppError::integrity(format!(
                    "Backup {backup_id} failed post-creation verification \
                     (manifest_valid={}, files_present={}, checksum_valid={})",
                    verification.manifest_valid,
                    verification.files_present,
                    verification.checksum_valid
                )));
            }
        }

        self.emit(EventPayload::Backup(BackupEvent::Completed {
            backup_id,
            file_count: manifest.file_count,
            failed_count,
            total_size_bytes: manifest.total_size_bytes,
        }));
        info!(
            backup_id = %backup_id,
            files = manifest.file_count,
            failed = failed_count,
            total_size = manifest.total_size_bytes,
            "Backup completed"
        );

        Ok(BackupRecord {
            backup_id,
            backup_type: params.backup_type,
            status: BackupStatus::Completed,
            file_count: manifest.file_count,
            failed_count,
            total_size_bytes: manifest.total_size_bytes,
            error: None,
            created_at,
        })
    }

    /// Copy one candidate's current content into the backup bucket.
    async fn copy_candidate(&self, backup_id: Uuid, file: &File) -> AppResult<ManifestEntry> {
        let content = self
            .store
            .get_bytes(&self.storage.bucket, &file.storage_key)
            .await?;
        let key = layout::backup_file_key(
            &self.config.prefix,
            backup_id,
            file.entity_id,
            &file.path,
        );
        let digest = checksum::sha256_hex(&content);
        let size_bytes = content.len() as i64;

        self.store
            .put(
                &self.config.bucket,
                &key,
                content,
                file.content_type.as_deref(),
                None,
            )
            .await?;

        Ok(ManifestEntry {
            entity_id: file.entity_id,
            path: file.path.clone(),
            key,
            size_bytes,
            checksum_sha256: digest,
        })
    }

    /// Restores files from a backup by re-uploading each captured blob
    /// through the normal write path — every restored file gains a new
    /// version. Per-entry failures are recorded and skipped; files
    /// already restored stay in place.
    pub async fn restore_backup(
        &self,
        params: RestoreBackupParams,
        progress: Option<ProgressCallback>,
    ) -> AppResult<RestoreReport> {
        let manifest = self.read_manifest(params.backup_id).await?;

        if params.verify {
            let verification = self.verify_backup(params.backup_id).await?;
            if !verification.passed() {
                return Err(AppError::integrity(format!(
                    "Backup {} failed verification before restore",
                    params.backup_id
                )));
            }
        }

        let entries: Vec<&ManifestEntry> = manifest
            .entries
            .iter()
            .filter(|e| params.entity_id.is_none_or(|id| e.entity_id == id))
            .collect();

        let total = entries.len() as u64;
        let mut report = RestoreReport {
            backup_id: params.backup_id,
            restored_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let target = params.target_entity_id.unwrap_or(entry.entity_id);
            match self.restore_entry(params.backup_id, target, entry).await {
                Ok(()) => report.restored_count += 1,
                Err(e) => {
                    report.failed_count += 1;
                    report
                        .errors
                        .push(format!("{} -> {target}: {e}", entry.path));
                    warn!(
                        backup_id = %params.backup_id,
                        path = %entry.path,
                        error = %e,
                        "Restore entry failed; continuing"
                    );
                }
            }
            if let Some(callback) = &progress {
                callback(BackupProgress {
                    backup_id: params.backup_id,
                    completed: index as u64 + 1,
                    total,
                });
            }
        }

        self.emit(EventPayload::Backup(BackupEvent::Restored {
            backup_id: params.backup_id,
            restored_count: report.restored_count,
            failed_count: report.failed_count,
        }));
        info!(
            backup_id = %params.backup_id,
            restored = report.restored_count,
            failed = report.failed_count,
            "Restore completed"
        );
        Ok(report)
    }

    async fn restore_entry(
        &self,
        backup_id: Uuid,
        target_entity_id: Uuid,
        entry: &ManifestEntry,
    ) -> AppResult<()> {
        let content = self.store.get_bytes(&self.config.bucket, &entry.key).await?;
        self.file_manager
            .upload(
                target_entity_id,
                UploadParams {
                    path: entry.path.clone(),
                    content,
                    content_type: content_type_from_path(&entry.path),
                    metadata: None,
                    tags: Vec::new(),
                    visibility: None,
                    author: Some("backup-restore".to_string()),
                    comment: Some(format!("restored from backup {backup_id}")),
                },
            )
            .await?;
        Ok(())
    }

    /// Runs the three independent verification checks: manifest
    /// well-formedness, per-file object existence, and checksum
    /// recomputation. Passes only if all three hold.
    pub async fn verify_backup(&self, backup_id: Uuid) -> AppResult<BackupVerification> {
        let manifest_key = layout::backup_manifest_key(&self.config.prefix, backup_id);
        let raw = self
            .store
            .get_bytes(&self.config.bucket, &manifest_key)
            .await
            .map_err(|e| Self::map_missing_manifest(backup_id, e))?;

        let manifest: BackupManifest = match serde_json::from_slice(&raw) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(backup_id = %backup_id, error = %e, "Backup manifest is unparseable");
                return Ok(BackupVerification {
                    backup_id,
                    manifest_valid: false,
                    files_present: false,
                    checksum_valid: false,
                    missing_keys: Vec::new(),
                });
            }
        };

        let manifest_valid = manifest.backup_id == backup_id && manifest.counts_consistent();
        let checksum_valid = manifest.checksum_valid();

        let mut missing_keys = Vec::new();
        for entry in &manifest.entries {
            match self.store.stat(&self.config.bucket, &entry.key).await {
                Ok(_) => {}
                Err(e) if e.kind == ErrorKind::NotFound => {
                    missing_keys.push(entry.key.clone());
                }
                Err(e) => {
                    warn!(
                        backup_id = %backup_id,
                        key = %entry.key,
                        error = %e,
                        "Existence check failed; counting as missing"
                    );
                    missing_keys.push(entry.key.clone());
                }
            }
        }
        let files_present = missing_keys.is_empty();

        Ok(BackupVerification {
            backup_id,
            manifest_valid,
            files_present,
            checksum_valid,
            missing_keys,
        })
    }

    /// Deletes a backup: NotFound if the manifest is missing, else the
    /// manifest object first, then every per-file object. Partial
    /// failures are logged, not rolled back. Returns objects removed.
    pub async fn delete_backup(&self, backup_id: Uuid) -> AppResult<u64> {
        let manifest_key = layout::backup_manifest_key(&self.config.prefix, backup_id);
        self.store
            .stat(&self.config.bucket, &manifest_key)
            .await
            .map_err(|e| Self::map_missing_manifest(backup_id, e))?;

        // Manifest first: once it is gone the backup is nonexistent.
        self.store
            .remove(&self.config.bucket, &manifest_key)
            .await?;
        let mut removed = 1u64;

        let files_prefix = layout::backup_files_prefix(&self.config.prefix, backup_id);
        let objects = self
            .store
            .list(&self.config.bucket, &files_prefix, true)
            .await?;
        for object in objects {
            match self.store.remove(&self.config.bucket, &object.key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    backup_id = %backup_id,
                    key = %object.key,
                    error = %e,
                    "Failed to remove backup object"
                ),
            }
        }

        self.emit(EventPayload::Backup(BackupEvent::Deleted {
            backup_id,
            removed_objects: removed,
        }));
        info!(backup_id = %backup_id, removed, "Backup deleted");
        Ok(removed)
    }

    /// Read and parse a manifest; NotFound if absent, Integrity if
    /// unreadable.
    async fn read_manifest(&self, backup_id: Uuid) -> AppResult<BackupManifest> {
        let manifest_key = layout::backup_manifest_key(&self.config.prefix, backup_id);
        let raw = self
            .store
            .get_bytes(&self.config.bucket, &manifest_key)
            .await
            .map_err(|e| Self::map_missing_manifest(backup_id, e))?;

        serde_json::from_slice(&raw).map_err(|e| {
            AppError::with_source(
                ErrorKind::Integrity,
                format!("Backup {backup_id} manifest is unreadable"),
                e,
            )
        })
    }

    fn map_missing_manifest(backup_id: Uuid, e: AppError) -> AppError {
        if e.kind == ErrorKind::NotFound {
            AppError::not_found(format!("Backup {backup_id} not found"))
        } else {
            e
        }
    }

    fn emit(&self, payload: EventPayload) {
        if let Some(sink) = &self.events {
            sink.publish(DomainEvent::new(payload));
        }
    }
}
