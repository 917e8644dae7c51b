//! Campaign config synchronisation.
//!
//! Before a scenario runs, the object store prefix must hold exactly the
//! configs the scenario names, with placeholders resolved. Uploads are
//! skipped when the stored body already hashes the same.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use esp_fixtures::{PlaceholderResolver, ResolutionContext};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::store::ObjectStore;

/// What a sync pass changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Keys written.
    pub uploaded: Vec<String>,
    /// Keys whose stored content already matched.
    pub unchanged: Vec<String>,
    /// Obsolete keys removed from the prefix.
    pub deleted: Vec<String>,
    /// Placeholders resolved across the batch.
    pub context: ResolutionContext,
}

impl SyncReport {
    /// True when nothing was uploaded or deleted.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.uploaded.is_empty() && self.deleted.is_empty()
    }
}

/// Keeps an object store prefix in step with local config files.
#[derive(Clone)]
pub struct ConfigSync {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    resolver: PlaceholderResolver,
}

impl std::fmt::Debug for ConfigSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSync")
            .field("prefix", &self.prefix)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ConfigSync {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        resolver: PlaceholderResolver,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            resolver,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key for a config file name.
    #[must_use]
    pub fn key_for(&self, filename: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{prefix}/{filename}")
        }
    }

    /// Make the prefix hold exactly `filenames` from `local_dir`.
    ///
    /// Keys under the prefix that are not wanted are deleted first. Each file
    /// is resolved with one context shared across the batch and uploaded as
    /// pretty JSON unless the stored copy already has the same SHA-256.
    pub async fn sync_configs(
        &self,
        filenames: &[String],
        local_dir: &Path,
    ) -> E2eResult<SyncReport> {
        let mut report = SyncReport::default();
        let desired: BTreeSet<String> = filenames.iter().map(|f| self.key_for(f)).collect();

        let obsolete: Vec<String> = self
            .store
            .list_keys(&self.prefix)
            .await?
            .into_iter()
            .filter(|key| !desired.contains(key))
            .collect();
        if !obsolete.is_empty() {
            self.store.delete_objects(&obsolete).await?;
            info!(count = obsolete.len(), keys = ?obsolete, "deleted obsolete configs");
            report.deleted = obsolete;
        }

        for filename in filenames {
            let key = self.key_for(filename);
            let path = local_dir.join(filename);
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| E2eError::io(&path, err))?;
            let raw: Value = serde_json::from_str(&text)?;
            let resolved = self
                .resolver
                .resolve_value(raw, Some(&mut report.context), Some(filename));
            let body = serde_json::to_string_pretty(&resolved)?;

            let remote = self.store.get_object(&key).await?;
            if remote.is_some_and(|stored| content_hash(&stored) == content_hash(body.as_bytes())) {
                debug!(key = %key, "config unchanged, skipping upload");
                report.unchanged.push(key);
            } else {
                self.store.put_object(&key, Bytes::from(body)).await?;
                info!(key = %key, "uploaded config");
                report.uploaded.push(key);
            }
        }

        Ok(report)
    }

    /// Remove every object under the prefix.
    pub async fn delete_all(&self) -> E2eResult<Vec<String>> {
        let keys = self.store.list_keys(&self.prefix).await?;
        if keys.is_empty() {
            info!(prefix = %self.prefix, "nothing to delete");
        } else {
            self.store.delete_objects(&keys).await?;
            info!(prefix = %self.prefix, count = keys.len(), "deleted configs");
        }
        Ok(keys)
    }
}

/// Hex SHA-256 of content with surrounding whitespace ignored.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content.trim_ascii()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_trailing_newline() {
        assert_eq!(content_hash(b"{}\n"), content_hash(b"{}"));
        assert_ne!(content_hash(b"{}"), content_hash(b"[]"));
    }

    #[test]
    fn keys_join_prefix() {
        let store: Arc<dyn ObjectStore> = Arc::new(crate::store::InMemoryObjectStore::new());
        let resolver = PlaceholderResolver::at_current_time();
        assert_eq!(
            ConfigSync::new(store.clone(), "campaigns/", resolver).key_for("RSV.json"),
            "campaigns/RSV.json"
        );
        assert_eq!(
            ConfigSync::new(store, "", resolver).key_for("RSV.json"),
            "RSV.json"
        );
    }
}
