//! Replication engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteAuthority;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use travelstore_core::{
    ChangeLog, RecordId, RecordMeta, RowImage, Store, SyncTable, TableName, Timestamp,
};

/// The current state of the replication engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, no cycle has run yet.
    Idle,
    /// A cycle is in progress.
    Syncing,
    /// The last cycle completed without transport errors.
    Synced,
    /// The last cycle hit at least one error.
    Error,
}

impl SyncState {
    /// Returns true if a cycle is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if the engine can start a new cycle.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Statistics accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of cycles completed.
    pub cycles_completed: u64,
    /// Total number of rows pushed.
    pub rows_pushed: u64,
    /// Total number of rows pulled.
    pub rows_pulled: u64,
    /// Total number of conflicts recorded.
    pub conflicts_detected: u64,
    /// Total number of failed push or pull calls.
    pub transport_failures: u64,
    /// End of the last completed cycle.
    pub last_sync_at: Option<Timestamp>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// A version conflict found while pulling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// Table of the row.
    pub table: TableName,
    /// Conflicting row.
    pub record_id: RecordId,
    /// Version kept locally.
    pub local_version: u64,
    /// Version offered by the remote.
    pub remote_version: u64,
    /// Short hex digest of the local content.
    pub local_hash: String,
    /// Short hex digest of the remote content.
    pub remote_hash: String,
}

/// Result of pulling one table.
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    /// Rows fetched from the remote.
    pub pulled: usize,
    /// Rows inserted because they did not exist locally.
    pub inserted: usize,
    /// Local rows replaced by a newer remote version.
    pub overwritten: usize,
    /// Rows already at the remote version.
    pub unchanged: usize,
    /// Rows kept locally because their version is ahead of the remote.
    pub conflicts: Vec<ConflictReport>,
}

/// Result of one push-then-pull pass over a table.
#[derive(Debug, Clone)]
pub struct TableSyncReport {
    /// Table synced.
    pub table: TableName,
    /// Dirty rows sent to the remote.
    pub pushed: usize,
    /// Push failure, if any. The pushed rows stay dirty.
    pub push_error: Option<String>,
    /// Pull outcome.
    pub pull: PullReport,
    /// Pull failure, if any. The watermark was not advanced.
    pub pull_error: Option<String>,
}

impl TableSyncReport {
    fn new(table: TableName) -> Self {
        Self {
            table,
            pushed: 0,
            push_error: None,
            pull: PullReport::default(),
            pull_error: None,
        }
    }

    /// Returns true if the push or the pull failed.
    pub fn has_errors(&self) -> bool {
        self.push_error.is_some() || self.pull_error.is_some()
    }
}

/// Result of a full sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Per-table reports, in configured table order.
    pub tables: Vec<TableSyncReport>,
    /// Duration of the cycle.
    pub duration: Duration,
}

impl SyncCycleResult {
    /// Rows pushed across all tables.
    pub fn pushed(&self) -> usize {
        self.tables.iter().map(|t| t.pushed).sum()
    }

    /// Rows pulled across all tables.
    pub fn pulled(&self) -> usize {
        self.tables.iter().map(|t| t.pull.pulled).sum()
    }

    /// Conflicts across all tables.
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictReport> {
        self.tables.iter().flat_map(|t| t.pull.conflicts.iter())
    }

    /// Number of failed push or pull calls.
    pub fn transport_failures(&self) -> usize {
        self.tables
            .iter()
            .map(|t| usize::from(t.push_error.is_some()) + usize::from(t.pull_error.is_some()))
            .sum()
    }

    /// Returns true if every table synced without error.
    pub fn success(&self) -> bool {
        self.tables.iter().all(|t| !t.has_errors())
    }
}

struct Inner<R> {
    config: SyncConfig,
    store: Arc<Store>,
    remote: Arc<R>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

/// The replication engine converges a [`Store`] with one remote authority.
///
/// Each table is synced push-then-pull. Transport errors never escape a
/// cycle: they are logged, reported, and retried on the next cycle.
///
/// The engine is a cheap handle; clones share state.
pub struct ReplicationEngine<R: RemoteAuthority> {
    inner: Arc<Inner<R>>,
}

impl<R: RemoteAuthority> Clone for ReplicationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteAuthority> ReplicationEngine<R> {
    /// Creates a new engine.
    pub fn new(config: SyncConfig, store: Arc<Store>, remote: Arc<R>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                remote,
                state: RwLock::new(SyncState::Idle),
                stats: RwLock::new(SyncStats::default()),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Gets the local store.
    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    /// Gets the remote authority.
    pub fn remote(&self) -> &Arc<R> {
        &self.inner.remote
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.inner.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Cancels the cycle in progress.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.inner.state.write() = state;
    }

    /// Pushes every dirty row of `table`, tombstones included.
    ///
    /// On success the pushed rows are marked clean, unless they were edited
    /// again while the upsert was in flight. On failure nothing changes
    /// locally. Returns the number of rows sent.
    pub async fn push_table(&self, table: TableName) -> SyncResult<usize> {
        let images = self.inner.store.sync_table(table).dirty_images()?;
        if images.is_empty() {
            return Ok(0);
        }

        let pushed: Vec<(RecordId, u64)> = images.iter().map(|i| (i.id(), i.version())).collect();
        self.inner.remote.upsert(table, images).await?;

        let cleaned = self
            .inner
            .store
            .sync_table(table)
            .acknowledge(&pushed, Timestamp::now())?;
        debug!(table = %table, pushed = pushed.len(), cleaned, "pushed dirty rows");
        Ok(pushed.len())
    }

    /// Pulls rows of `table` changed remotely since the last successful pull.
    ///
    /// The higher version wins. A local row ahead of the remote is kept and
    /// a conflict change-log entry is written. The watermark advances to the
    /// time the pull started, and only once every fetched row is applied.
    pub async fn pull_table(&self, table: TableName) -> SyncResult<PullReport> {
        let started = Timestamp::now();
        let since = self.inner.store.sync_cursors().get(table);
        let rows = self.inner.remote.select_changed_since(table, since).await?;

        let local = self.inner.store.sync_table(table);
        let mut report = PullReport::default();
        for image in &rows {
            self.check_cancelled()?;
            if image.table != table {
                warn!(table = %table, image_table = %image.table, record_id = %image.id(), "skipping row from another table");
                continue;
            }
            report.pulled += 1;

            // a refused apply means the row moved locally; arbitrate again
            loop {
                match local.local_meta(image.id()) {
                    None => {
                        if local.apply_remote(image, None, Timestamp::now())? {
                            report.inserted += 1;
                            break;
                        }
                    }
                    Some(meta) if image.version() > meta.version => {
                        if local.apply_remote(image, Some(meta.version), Timestamp::now())? {
                            report.overwritten += 1;
                            break;
                        }
                    }
                    Some(meta) if image.version() < meta.version => {
                        report.conflicts.push(self.record_conflict(local, &meta, image)?);
                        break;
                    }
                    Some(_) => {
                        report.unchanged += 1;
                        break;
                    }
                }
                debug!(table = %table, record_id = %image.id(), "local row changed during pull, retrying");
            }
        }

        self.inner.store.sync_cursors().advance(table, started)?;
        debug!(
            table = %table,
            pulled = report.pulled,
            inserted = report.inserted,
            overwritten = report.overwritten,
            conflicts = report.conflicts.len(),
            "pulled remote changes"
        );
        Ok(report)
    }

    fn record_conflict(
        &self,
        local: &dyn SyncTable,
        meta: &RecordMeta,
        image: &RowImage,
    ) -> SyncResult<ConflictReport> {
        let local_hash = local
            .local_image(image.id())?
            .map(|row| short_hash(&row.content_hash()))
            .unwrap_or_default();
        let conflict = ConflictReport {
            table: image.table,
            record_id: image.id(),
            local_version: meta.version,
            remote_version: image.version(),
            local_hash,
            remote_hash: short_hash(&image.content_hash()),
        };

        self.inner.store.change_logs().create(ChangeLog::conflict(
            conflict.table,
            conflict.record_id,
            format!("v{} {}", conflict.local_version, conflict.local_hash),
            format!("v{} {}", conflict.remote_version, conflict.remote_hash),
        ))?;
        warn!(
            table = %conflict.table,
            record_id = %conflict.record_id,
            local_version = conflict.local_version,
            remote_version = conflict.remote_version,
            "version conflict, keeping local row"
        );
        Ok(conflict)
    }

    /// Runs one push-then-pull pass over `table`.
    ///
    /// Transport errors are captured in the report. When the push fails the
    /// pull is skipped so unpushed rows are not compared against a stale
    /// remote. Local store errors and cancellation are returned.
    pub async fn sync_table(&self, table: TableName) -> SyncResult<TableSyncReport> {
        let mut report = TableSyncReport::new(table);
        self.check_cancelled()?;

        match self.push_table(table).await {
            Ok(pushed) => report.pushed = pushed,
            Err(e @ SyncError::Transport { .. }) => {
                warn!(table = %table, error = %e, "push failed, rows stay dirty");
                report.push_error = Some(e.to_string());
                return Ok(report);
            }
            Err(e) => return Err(e),
        }

        self.check_cancelled()?;

        match self.pull_table(table).await {
            Ok(pull) => report.pull = pull,
            Err(e @ SyncError::Transport { .. }) => {
                warn!(table = %table, error = %e, "pull failed, watermark not advanced");
                report.pull_error = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }

        Ok(report)
    }

    /// Performs a full sync cycle over every configured table.
    pub async fn sync(&self) -> SyncResult<SyncCycleResult> {
        let start = Instant::now();
        self.reset_cancel();

        {
            let mut state = self.inner.state.write();
            if !state.can_start_sync() {
                return Err(SyncError::InvalidStateTransition {
                    from: format!("{:?}", *state),
                    to: format!("{:?}", SyncState::Syncing),
                });
            }
            *state = SyncState::Syncing;
        }

        let tables = if self.inner.config.run_tables_concurrently {
            self.sync_concurrently().await
        } else {
            self.sync_sequentially().await
        };

        let tables = match tables {
            Ok(tables) => tables,
            Err(e) => {
                self.handle_error(&e);
                return Err(e);
            }
        };

        let result = SyncCycleResult {
            tables,
            duration: start.elapsed(),
        };
        let failures = result.transport_failures();
        let conflicts = result.conflicts().count();

        {
            let mut stats = self.inner.stats.write();
            stats.cycles_completed += 1;
            stats.rows_pushed += result.pushed() as u64;
            stats.rows_pulled += result.pulled() as u64;
            stats.conflicts_detected += conflicts as u64;
            stats.transport_failures += failures as u64;
            stats.last_sync_at = Some(Timestamp::now());
            stats.last_error = result
                .tables
                .iter()
                .find_map(|t| t.push_error.clone().or_else(|| t.pull_error.clone()));
        }

        if result.success() {
            self.set_state(SyncState::Synced);
        } else {
            self.set_state(SyncState::Error);
        }

        info!(
            pushed = result.pushed(),
            pulled = result.pulled(),
            conflicts,
            failures,
            duration_ms = result.duration.as_millis() as u64,
            "sync cycle complete"
        );
        Ok(result)
    }

    async fn sync_sequentially(&self) -> SyncResult<Vec<TableSyncReport>> {
        let mut reports = Vec::with_capacity(self.inner.config.tables.len());
        for &table in &self.inner.config.tables {
            reports.push(self.sync_table(table).await?);
        }
        Ok(reports)
    }

    async fn sync_concurrently(&self) -> SyncResult<Vec<TableSyncReport>> {
        let mut tasks = JoinSet::new();
        for &table in &self.inner.config.tables {
            let engine = self.clone();
            tasks.spawn(async move { engine.sync_table(table).await });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let report = joined.map_err(|e| SyncError::Task(e.to_string()))??;
            reports.push(report);
        }

        let order = &self.inner.config.tables;
        reports.sort_by_key(|r| order.iter().position(|t| *t == r.table));
        Ok(reports)
    }

    fn handle_error(&self, error: &SyncError) {
        if matches!(error, SyncError::Cancelled) {
            info!("sync cycle cancelled");
            self.set_state(SyncState::Idle);
            return;
        }
        warn!(error = %error, "sync cycle failed");
        self.set_state(SyncState::Error);
        self.inner.stats.write().last_error = Some(error.to_string());
    }
}

impl<R: RemoteAuthority> std::fmt::Debug for ReplicationEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationEngine")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn short_hash(hash: &[u8; 32]) -> String {
    hash[..8].iter().map(|b| format!("{b:02x}")).collect()
}
