//! File-backed implementation of the policy store.
//!
//! # Purpose
//! Persists the policy set as a JSON [`PolicyDocument`] so rules added by an
//! administrative caller survive restarts, while keeping the same in-memory
//! snapshot model for reads.
//!
//! # Durability and consistency
//! - Every accepted insert rewrites the document to a sibling temporary file,
//!   syncs it, and renames it over the original, so a crash leaves either the old or the
//!   new document on disk.
//! - The in-memory snapshot is only swapped after the write succeeds; a failed
//!   write surfaces as [`StoreError::Unavailable`] and changes nothing.
//! - On open the document is replayed through the dedupe and cycle checks, so a
//!   hand-edited file with a cycle is rejected instead of loaded.
use super::{PolicyStore, record_counts};
use crate::policy::{GroupingRule, PolicyRule};
use crate::snapshot::{PolicyDocument, PolicySnapshot};
use crate::{AddOutcome, StoreError, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

pub struct FilePolicyStore {
    path: PathBuf,
    current: RwLock<Arc<PolicySnapshot>>,
}

impl FilePolicyStore {
    /// Open the document at `path`, creating an empty policy set if it is missing.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: PolicyDocument = serde_json::from_slice(&bytes)
                    .map_err(|err| StoreError::unavailable("decode policy file", err))?;
                PolicySnapshot::from_document(document)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PolicySnapshot::new(),
            Err(err) => return Err(StoreError::unavailable("read policy file", err)),
        };
        tracing::info!(
            path = %path.display(),
            rules = snapshot.rule_count(),
            groupings = snapshot.grouping_count(),
            "opened policy file"
        );
        record_counts(&snapshot);
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn update<F>(&self, apply: F) -> StoreResult<AddOutcome>
    where
        F: FnOnce(&mut PolicySnapshot) -> StoreResult<AddOutcome> + Send,
    {
        let mut current = self.current.write().await;
        let mut next = PolicySnapshot::clone(&current);
        let outcome = apply(&mut next)?;
        if outcome.is_inserted() {
            persist(&self.path, &next.to_document()).await?;
            record_counts(&next);
            *current = Arc::new(next);
        }
        Ok(outcome)
    }
}

async fn persist(path: &Path, document: &PolicyDocument) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|err| StoreError::unavailable("encode policy file", err))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|err| StoreError::unavailable("create policy file", err))?;
    file.write_all(&bytes)
        .await
        .map_err(|err| StoreError::unavailable("write policy file", err))?;
    // The rename must not become visible before the contents are on disk.
    file.sync_all()
        .await
        .map_err(|err| StoreError::unavailable("sync policy file", err))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| StoreError::unavailable("replace policy file", err))?;
    Ok(())
}

#[async_trait]
impl PolicyStore for FilePolicyStore {
    async fn add_policy(&self, rule: PolicyRule) -> StoreResult<AddOutcome> {
        if self.current.read().await.contains_rule(&rule) {
            tracing::debug!(subject = %rule.subject, domain = %rule.domain, "duplicate policy ignored");
            return Ok(AddOutcome::Duplicate);
        }
        self.update(move |snapshot| snapshot.insert_rule(rule)).await
    }

    async fn add_grouping_policy(&self, grouping: GroupingRule) -> StoreResult<AddOutcome> {
        if self.current.read().await.contains_grouping(&grouping) {
            tracing::debug!(child = %grouping.child, parent = %grouping.parent, "duplicate grouping ignored");
            return Ok(AddOutcome::Duplicate);
        }
        self.update(move |snapshot| snapshot.insert_grouping(grouping))
            .await
    }

    async fn snapshot(&self) -> StoreResult<Arc<PolicySnapshot>> {
        Ok(self.current.read().await.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|err| StoreError::unavailable("stat policy directory", err))?;
        if !metadata.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
