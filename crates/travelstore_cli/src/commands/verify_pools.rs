//! Verify-pools command implementation.

use super::open_store;
use crate::error::CliError;
use std::path::Path;
use travelstore_core::{PoolKind, PoolRow, Row};

/// Runs the verify-pools command.
///
/// Fails if any deposit or stock pool row has a negative balance or one
/// above its initial amount.
pub fn run(path: &Path) -> Result<(), CliError> {
    let store = open_store(path)?;
    println!("Verifying pools at {:?}", path);
    println!();

    let deposit = store.deposit_pools();
    let stock = store.stock_pools();
    let mut violations = 0;
    violations += report("deposit", deposit.count(), &deposit.inconsistent_rows());
    violations += report("stock", stock.count(), &stock.inconsistent_rows());

    println!();
    if violations == 0 {
        println!("✓ Pool verification passed");
        Ok(())
    } else {
        println!("✗ Pool verification failed");
        Err(CliError::PoolInvariant(violations))
    }
}

fn report<K: PoolKind>(name: &str, checked: usize, bad: &[Row<PoolRow<K>>]) -> usize {
    println!("{name} pools: {checked} checked, {} out of bounds", bad.len());
    for row in bad {
        println!(
            "  {} contract {}: remaining {} of {}",
            row.id(),
            row.data.contract_id,
            row.data.amount_remaining,
            row.data.amount_initial
        );
    }
    bad.len()
}
