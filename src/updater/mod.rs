//! Price catalog updater.
//!
//! A cycle fans out to every configured [`PriceSource`] concurrently, diffs
//! each candidate document against the file on disk and rewrites only the
//! files that changed. Source failures are isolated: one source timing out
//! never affects another source's report.
//!
//! The orchestrator admits one cycle at a time. A trigger that arrives while
//! a cycle is running is rejected with [`UpdateError::AlreadyRunning`].

mod sources;
mod worker;

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
pub use sources::{
    AzureSource, OpenRouterSource, PriceSource, SourceError, StaticSource, default_sources,
};
use tokio::io::AsyncWriteExt;
pub use worker::start_update_worker;

use crate::{
    catalog::{CatalogDocument, CatalogRegistry, catalog_file},
    config::UpdaterConfig,
};

/// Changed keys listed in a report before the list is truncated.
const MAX_REPORT_DETAILS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("an update cycle is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Success,
    Failed,
    NoChange,
}

/// Outcome of one source in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub source: String,
    pub updated_at: DateTime<Utc>,
    pub items_updated: usize,
    pub status: UpdateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl UpdateReport {
    fn new(source: &str, status: UpdateStatus) -> Self {
        Self {
            source: source.to_string(),
            updated_at: Utc::now(),
            items_updated: 0,
            status,
            message: None,
            details: Vec::new(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateCycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sources: Vec<UpdateReport>,
    /// Whether the in-memory catalog was reloaded after the cycle.
    pub catalog_reloaded: bool,
}

impl UpdateCycleReport {
    pub fn files_written(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| r.status == UpdateStatus::Success)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| r.status == UpdateStatus::Failed)
            .count()
    }
}

/// Snapshot of the orchestrator state for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatusSnapshot {
    pub is_updating: bool,
    pub last_result: Option<UpdateCycleReport>,
}

/// Fetch timing and reload behaviour for a cycle.
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub fetch_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub reload_catalog: bool,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self::from(&UpdaterConfig::default())
    }
}

impl From<&UpdaterConfig> for UpdateSettings {
    fn from(config: &UpdaterConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_retries: config.max_retries,
            reload_catalog: config.reload_catalog,
        }
    }
}

/// Clears the running flag when dropped, including on panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UpdateOrchestrator {
    data_dir: PathBuf,
    sources: Vec<Arc<dyn PriceSource>>,
    settings: UpdateSettings,
    registry: Option<CatalogRegistry>,
    running: AtomicBool,
    last_result: RwLock<Option<UpdateCycleReport>>,
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("data_dir", &self.data_dir)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("running", &self.is_running())
            .finish()
    }
}

impl UpdateOrchestrator {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        sources: Vec<Arc<dyn PriceSource>>,
        settings: UpdateSettings,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            sources,
            settings,
            registry: None,
            running: AtomicBool::new(false),
            last_result: RwLock::new(None),
        }
    }

    /// Reload `registry` after cycles that wrote files, if enabled.
    pub fn with_registry(mut self, registry: CatalogRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_result(&self) -> Option<UpdateCycleReport> {
        self.last_result.read().clone()
    }

    pub fn status(&self) -> UpdateStatusSnapshot {
        UpdateStatusSnapshot {
            is_updating: self.is_running(),
            last_result: self.last_result(),
        }
    }

    /// Run one update cycle across all sources.
    pub async fn run_cycle(&self) -> Result<UpdateCycleReport, UpdateError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UpdateError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            sources = self.sources.len(),
            data_dir = %self.data_dir.display(),
            "Starting price catalog update cycle"
        );

        let reports = join_all(
            self.sources
                .iter()
                .map(|source| self.update_source(source.as_ref())),
        )
        .await;

        let mut cycle = UpdateCycleReport {
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            sources: reports,
            catalog_reloaded: false,
        };

        if cycle.files_written() > 0
            && self.settings.reload_catalog
            && let Some(registry) = &self.registry
        {
            let registry = registry.clone();
            match tokio::task::spawn_blocking(move || registry.reload()).await {
                Ok(Ok(())) => cycle.catalog_reloaded = true,
                Ok(Err(e)) => tracing::warn!(error = %e, "Catalog reload after update failed"),
                Err(e) => tracing::error!(error = %e, "Catalog reload task failed"),
            }
        }

        tracing::info!(
            duration_ms = cycle.duration_ms,
            written = cycle.files_written(),
            failed = cycle.failures(),
            reloaded = cycle.catalog_reloaded,
            "Price catalog update cycle complete"
        );

        *self.last_result.write() = Some(cycle.clone());
        Ok(cycle)
    }

    fn file_path(&self, source: &str) -> PathBuf {
        let file_name = catalog_file(source)
            .map(|f| f.file_name.to_string())
            .unwrap_or_else(|| format!("{source}.json"));
        self.data_dir.join(file_name)
    }

    async fn update_source(&self, source: &dyn PriceSource) -> UpdateReport {
        let name = source.name();
        let path = self.file_path(name);
        let current = read_document(&path).await;
        let base = current
            .clone()
            .or_else(|| catalog_file(name).and_then(|f| f.parse_embedded().ok()));

        let mut candidate = match self.fetch_with_retry(source, base.as_ref()).await {
            Ok(candidate) => candidate,
            Err(SourceError::Malformed(reason)) => {
                tracing::warn!(source = name, reason = %reason, "Source returned malformed data");
                return UpdateReport::new(name, UpdateStatus::NoChange)
                    .with_message(format!("malformed response ignored: {reason}"));
            }
            Err(e) => {
                tracing::warn!(source = name, error = %e, "Price source failed");
                return UpdateReport::new(name, UpdateStatus::Failed).with_message(e.to_string());
            }
        };

        let changed = diff_items(current.as_ref(), &candidate);
        if changed.is_empty() {
            tracing::debug!(source = name, "No price changes");
            return UpdateReport::new(name, UpdateStatus::NoChange);
        }

        candidate.set_updated_at(Utc::now());
        if let Err(e) = write_document(&path, &candidate).await {
            tracing::error!(
                source = name,
                path = %path.display(),
                error = %e,
                "Failed to write catalog file"
            );
            return UpdateReport::new(name, UpdateStatus::Failed)
                .with_message(format!("write failed: {e}"));
        }

        tracing::info!(source = name, items = changed.len(), "Catalog file updated");
        let mut report = UpdateReport::new(name, UpdateStatus::Success);
        report.items_updated = changed.len();
        report.details = changed.into_iter().take(MAX_REPORT_DETAILS).collect();
        report
    }

    async fn fetch_with_retry(
        &self,
        source: &dyn PriceSource,
        base: Option<&CatalogDocument>,
    ) -> Result<CatalogDocument, SourceError> {
        let timeout = self.settings.fetch_timeout;
        let max_attempts = self.settings.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, source.fetch(base)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(timeout)),
            };
            match result {
                Ok(doc) => return Ok(doc),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(
                        source = source.name(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "Retrying price source"
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Keys whose values were added, removed or changed.
fn diff_items(current: Option<&CatalogDocument>, candidate: &CatalogDocument) -> Vec<String> {
    let new_items = candidate.items();
    let Some(current) = current else {
        return new_items.into_keys().collect();
    };
    let old_items = current.items();

    let keys: BTreeSet<&String> = old_items.keys().chain(new_items.keys()).collect();
    keys.into_iter()
        .filter(|key| old_items.get(*key) != new_items.get(*key))
        .cloned()
        .collect()
}

async fn read_document(path: &Path) -> Option<CatalogDocument> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&contents) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed catalog file");
            None
        }
    }
}

/// Write via a sibling temp file, fsync, then rename over the target.
async fn write_document(path: &Path, document: &CatalogDocument) -> std::io::Result<()> {
    let mut json = serde_json::to_vec_pretty(document)?;
    json.push(b'\n');

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = match write_synced(&tmp, &json).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        // The target is untouched; drop the partial copy.
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
