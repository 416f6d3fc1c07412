// src/checkpoint.rs
//! On-disk snapshot of the in-flight batch.
//!
//! The file is rewritten wholesale after every delivered report: a temp
//! sibling is written and fsynced, then renamed over the real path, so a
//! crash leaves either the old or the new snapshot, never a torn one.
//! Anything unreadable is treated as "no checkpoint".

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::report::Batch;

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// The saved batch for `target_date`, if there is a usable one.
    pub fn load(&self, target_date: &str) -> Option<Batch> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no checkpoint");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "checkpoint unreadable; starting fresh");
                return None;
            }
        };

        let batch: Batch = match serde_json::from_str(&raw) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "checkpoint corrupt; starting fresh");
                return None;
            }
        };

        if !batch.is_consistent() {
            tracing::warn!(
                items = batch.items.len(),
                "checkpoint references items that do not exist; starting fresh"
            );
            return None;
        }
        if batch.date_key != target_date {
            tracing::info!(
                saved = %batch.date_key,
                target_date,
                "checkpoint is for another day; ignoring"
            );
            return None;
        }

        tracing::info!(
            date_key = %batch.date_key,
            completed = batch.completed.len(),
            total = batch.items.len(),
            "resuming from checkpoint"
        );
        Some(batch)
    }

    pub fn save(&self, batch: &Batch) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating checkpoint dir {}", dir.display()))?;
        }

        let json = serde_json::to_vec_pretty(batch).context("serializing checkpoint")?;
        let tmp = self.tmp_path();
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(&json).context("writing checkpoint")?;
            f.sync_all().context("syncing checkpoint")?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        tracing::debug!(
            completed = batch.completed.len(),
            total = batch.items.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Remove the checkpoint. A missing file is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
