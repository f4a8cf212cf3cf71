//! Integration tests for push-then-pull replication.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use travelstore_core::{
    Airline, Contract, ContractStatus, ContractType, RecordId, RecordMeta, Row, RowImage, Store,
    SyncStatus, TableName, Timestamp, CONFLICT_COLUMN,
};
use travelstore_sync_engine::{MemoryRemote, RemoteAuthority, ReplicationEngine, SyncConfig};

fn engine_with(
    store: Arc<Store>,
    remote: Arc<MemoryRemote>,
    config: SyncConfig,
) -> ReplicationEngine<MemoryRemote> {
    ReplicationEngine::new(config, store, remote)
}

fn airlines_engine() -> ReplicationEngine<MemoryRemote> {
    engine_with(
        Arc::new(Store::in_memory()),
        Arc::new(MemoryRemote::new()),
        SyncConfig::new().with_tables([TableName::Airlines]),
    )
}

fn airline(code: &str) -> Airline {
    Airline {
        code: code.into(),
        name: None,
    }
}

fn remote_airline(id: RecordId, version: u64, updated_at: Timestamp, code: &str) -> RowImage {
    let mut meta = RecordMeta::fresh(id, Timestamp::from_millis(1), None);
    meta.version = version;
    meta.updated_at = updated_at;
    RowImage::encode(
        TableName::Airlines,
        &Row {
            meta,
            data: airline(code),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn push_marks_rows_clean_and_is_idempotent() {
    let engine = airlines_engine();
    let store = Arc::clone(engine.store());
    let row = store.airlines().create(airline("SA")).unwrap();

    // an earlier attempt delivered the row but the acknowledgement was lost
    let images = store.sync_table(TableName::Airlines).dirty_images().unwrap();
    engine
        .remote()
        .upsert(TableName::Airlines, images)
        .await
        .unwrap();
    let after_first = engine.remote().rows(TableName::Airlines);

    assert_eq!(engine.push_table(TableName::Airlines).await.unwrap(), 1);

    assert_eq!(engine.remote().rows(TableName::Airlines), after_first);
    let local = store.airlines().get_by_id(row.id(), false).unwrap();
    assert_eq!(local.sync_status(), SyncStatus::Clean);
    assert!(local.meta.last_synced_at.is_some());
    assert_eq!(local.version(), 1);

    assert_eq!(engine.push_table(TableName::Airlines).await.unwrap(), 0);
}

#[tokio::test]
async fn remote_behind_local_is_a_conflict() {
    let engine = airlines_engine();
    let store = Arc::clone(engine.store());
    let row = store.airlines().create(airline("ET")).unwrap();
    let v2 = store
        .airlines()
        .update(row.id(), |a| a.name = Some("Ethiopian".into()))
        .unwrap()
        .unwrap();
    engine
        .remote()
        .insert(RowImage::encode(TableName::Airlines, &v2).unwrap());
    store
        .airlines()
        .update(row.id(), |a| a.name = Some("Ethiopian Airlines".into()))
        .unwrap();

    let report = engine.pull_table(TableName::Airlines).await.unwrap();

    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.record_id, row.id());
    assert_eq!(conflict.local_version, 3);
    assert_eq!(conflict.remote_version, 2);
    assert_ne!(conflict.local_hash, conflict.remote_hash);

    let local = store.airlines().get_by_id(row.id(), false).unwrap();
    assert_eq!(local.version(), 3);
    assert_eq!(local.sync_status(), SyncStatus::Dirty);
    assert_eq!(local.data.name.as_deref(), Some("Ethiopian Airlines"));

    let logs = store
        .change_logs()
        .find_by_field("column_name", CONFLICT_COLUMN, false)
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].data.record_id, row.id());
    assert_eq!(logs[0].data.table_name, TableName::Airlines);
    assert!(logs[0].data.old_value.as_deref().unwrap().starts_with("v3 "));
    assert!(logs[0].data.new_value.as_deref().unwrap().starts_with("v2 "));
}

#[tokio::test]
async fn newer_remote_version_wins() {
    let engine = airlines_engine();
    let store = Arc::clone(engine.store());
    let row = store.airlines().create(airline("KQ")).unwrap();
    engine.push_table(TableName::Airlines).await.unwrap();

    engine.remote().insert(remote_airline(
        row.id(),
        2,
        Timestamp::now().plus_millis(1_000),
        "KQX",
    ));
    let report = engine.pull_table(TableName::Airlines).await.unwrap();

    assert_eq!(report.overwritten, 1);
    assert!(report.conflicts.is_empty());
    let local = store.airlines().get_by_id(row.id(), false).unwrap();
    assert_eq!(local.version(), 2);
    assert_eq!(local.data.code, "KQX");
    assert_eq!(local.sync_status(), SyncStatus::Clean);
    assert!(store.airlines().dirty_rows().is_empty());
}

#[tokio::test]
async fn unknown_remote_rows_are_inserted_clean() {
    let engine = airlines_engine();
    let id = RecordId::new();
    engine
        .remote()
        .insert(remote_airline(id, 4, Timestamp::from_millis(500), "AF"));

    let report = engine.pull_table(TableName::Airlines).await.unwrap();

    assert_eq!(report.inserted, 1);
    let local = engine.store().airlines().get_by_id(id, false).unwrap();
    assert_eq!(local.version(), 4);
    assert_eq!(local.data.code, "AF");
    assert_eq!(local.sync_status(), SyncStatus::Clean);
    assert!(local.meta.last_synced_at.is_some());

    // the same version fetched again changes nothing
    engine
        .remote()
        .insert(remote_airline(id, 4, Timestamp::now().plus_millis(60_000), "AF"));
    let report = engine.pull_table(TableName::Airlines).await.unwrap();
    assert_eq!(report.pulled, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(engine.store().airlines().get_by_id(id, false).unwrap(), local);
}

#[tokio::test]
async fn pull_only_fetches_rows_after_the_watermark() {
    let engine = airlines_engine();
    let cursors = engine.store().sync_cursors();
    assert_eq!(cursors.get(TableName::Airlines), None);

    engine.remote().insert(remote_airline(
        RecordId::new(),
        1,
        Timestamp::from_millis(1_000),
        "AT",
    ));
    let before = Timestamp::now();
    let first = engine.pull_table(TableName::Airlines).await.unwrap();
    assert_eq!(first.pulled, 1);
    let watermark = cursors.get(TableName::Airlines).unwrap();
    assert!(watermark >= before);

    engine.remote().insert(remote_airline(
        RecordId::new(),
        1,
        Timestamp::from_millis(2_000),
        "TP",
    ));
    let late = RecordId::new();
    engine.remote().insert(remote_airline(
        late,
        1,
        watermark.plus_millis(60_000),
        "MS",
    ));

    let second = engine.pull_table(TableName::Airlines).await.unwrap();
    assert_eq!(second.pulled, 1);
    assert!(engine.store().airlines().get_by_id(late, false).is_some());
    assert_eq!(engine.store().airlines().count(), 2);
    assert!(cursors.get(TableName::Airlines).unwrap() >= watermark);
}

#[tokio::test]
async fn tombstones_propagate_both_ways() {
    let engine = airlines_engine();
    let store = Arc::clone(engine.store());
    let row = store.airlines().create(airline("QR")).unwrap();
    store.airlines().soft_delete(row.id()).unwrap();

    engine.sync_table(TableName::Airlines).await.unwrap();
    let pushed = engine.remote().get(TableName::Airlines, row.id()).unwrap();
    assert!(pushed.meta.is_deleted);
    assert_eq!(pushed.version(), 2);

    let remote_id = RecordId::new();
    let mut image = remote_airline(remote_id, 2, Timestamp::now().plus_millis(60_000), "EK");
    image.meta.is_deleted = true;
    engine.remote().insert(image);

    engine.sync_table(TableName::Airlines).await.unwrap();
    assert!(store.airlines().get_by_id(remote_id, false).is_none());
    let tombstone = store.airlines().get_by_id(remote_id, true).unwrap();
    assert!(tombstone.is_deleted());
    assert_eq!(tombstone.sync_status(), SyncStatus::Clean);
}

#[tokio::test]
async fn push_failure_keeps_rows_dirty_until_next_cycle() {
    let engine = airlines_engine();
    let store = Arc::clone(engine.store());
    let row = store.airlines().create(airline("WB")).unwrap();
    engine.remote().set_fail_push(true);

    let result = engine.sync().await.unwrap();
    assert!(!result.success());
    assert!(result.tables[0].push_error.is_some());
    assert_eq!(
        store.airlines().get_by_id(row.id(), false).unwrap().sync_status(),
        SyncStatus::Dirty
    );
    assert!(engine.remote().rows(TableName::Airlines).is_empty());
    assert_eq!(store.sync_cursors().get(TableName::Airlines), None);

    engine.remote().set_fail_push(false);
    let result = engine.sync().await.unwrap();
    assert!(result.success());
    assert_eq!(result.pushed(), 1);
    assert_eq!(
        store.airlines().get_by_id(row.id(), false).unwrap().sync_status(),
        SyncStatus::Clean
    );
}

#[tokio::test]
async fn pull_failure_does_not_advance_the_watermark() {
    let engine = airlines_engine();
    engine.sync().await.unwrap();
    let watermark = engine.store().sync_cursors().get(TableName::Airlines).unwrap();

    engine.remote().set_fail_pull(true);
    let result = engine.sync().await.unwrap();
    assert!(result.tables[0].pull_error.is_some());
    assert_eq!(
        engine.store().sync_cursors().get(TableName::Airlines),
        Some(watermark)
    );
    assert_eq!(engine.stats().transport_failures, 1);
}

#[tokio::test]
async fn two_stores_converge_through_the_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let config = SyncConfig::new()
        .with_tables([TableName::Contracts, TableName::DepositPools])
        .with_concurrent_tables(true);
    let office = engine_with(Arc::new(Store::in_memory()), Arc::clone(&remote), config.clone());
    let branch = engine_with(Arc::new(Store::in_memory()), Arc::clone(&remote), config);

    let contract = office
        .store()
        .contracts()
        .create(Contract {
            partner_id: RecordId::new(),
            contract_type: ContractType::DepositOnly,
            status: ContractStatus::Active,
            starts_at: None,
            ends_at: None,
            description: Some("caution 2026".into()),
        })
        .unwrap();
    office
        .store()
        .deposit_pools()
        .create_pool(contract.id(), Decimal::from(500), None)
        .unwrap();

    let pushed = office.sync().await.unwrap();
    assert_eq!(pushed.pushed(), 2);

    let pulled = branch.sync().await.unwrap();
    assert_eq!(pulled.pulled(), 2);
    assert_eq!(
        branch.store().deposit_pools().total_remaining(contract.id()).unwrap(),
        Decimal::from(500)
    );
    let copy = branch.store().contracts().get_by_id(contract.id(), false).unwrap();
    assert_eq!(copy.data, contract.data);
    assert_eq!(copy.sync_status(), SyncStatus::Clean);

    // the branch edits, the office picks the new version up
    tokio::time::sleep(Duration::from_millis(5)).await;
    branch
        .store()
        .contracts()
        .update(contract.id(), |c| c.status = ContractStatus::Exhausted)
        .unwrap();
    branch.sync().await.unwrap();
    let result = office.sync().await.unwrap();
    assert!(result.conflicts().next().is_none());
    let updated = office.store().contracts().get_by_id(contract.id(), false).unwrap();
    assert_eq!(updated.data.status, ContractStatus::Exhausted);
    assert_eq!(updated.version(), 2);
}
