//! Per-contract settlement locks.

use crate::record::RecordId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One mutex per contract.
///
/// Settlements drawing on the same contract's pools are serialized;
/// settlements on different contracts run in parallel.
#[derive(Debug, Default)]
pub struct ContractLocks {
    locks: Mutex<HashMap<RecordId, Arc<Mutex<()>>>>,
}

impl ContractLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock of a contract.
    ///
    /// ```rust,ignore
    /// let lock = locks.handle(contract_id);
    /// let _guard = lock.lock();
    /// ```
    pub fn handle(&self, contract_id: RecordId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(contract_id).or_default())
    }
}
