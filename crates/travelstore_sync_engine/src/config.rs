//! Configuration for the sync engine.

use std::time::Duration;
use travelstore_core::TableName;

/// Default time between scheduled sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(120);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between scheduled sync cycles.
    pub sync_interval: Duration,
    /// Tables replicated in each cycle, in order.
    pub tables: Vec<TableName>,
    /// Whether tables of one cycle are synced in parallel.
    pub run_tables_concurrently: bool,
}

impl SyncConfig {
    /// Creates a configuration syncing every table every two minutes.
    pub fn new() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            tables: TableName::ALL.to_vec(),
            run_tables_concurrently: false,
        }
    }

    /// Sets the sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Restricts sync to `tables`.
    pub fn with_tables(mut self, tables: impl IntoIterator<Item = TableName>) -> Self {
        self.tables = tables.into_iter().collect();
        self
    }

    /// Sets whether tables are synced in parallel.
    pub fn with_concurrent_tables(mut self, concurrent: bool) -> Self {
        self.run_tables_concurrently = concurrent;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval, Duration::from_secs(120));
        assert_eq!(config.tables.len(), TableName::ALL.len());
        assert!(!config.run_tables_concurrently);
    }

    #[test]
    fn builder_pattern() {
        let config = SyncConfig::new()
            .with_sync_interval(Duration::from_secs(5))
            .with_tables([TableName::Contracts, TableName::DepositPools])
            .with_concurrent_tables(true);

        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert_eq!(config.tables, vec![TableName::Contracts, TableName::DepositPools]);
        assert!(config.run_tables_concurrently);
    }
}
