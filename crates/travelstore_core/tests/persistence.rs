//! Integration tests for durable stores.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;
use travelstore_core::{
    Actor, Airline, Contract, ContractStatus, ContractType, NewTransaction, Partner, PartnerKind,
    RecordId, Role, Segment, SegmentPricing, Settlement, SettlementService, Store, StoreConfig,
    SyncStatus, Table, TableName, Timestamp, TransactionStatus,
};

#[test]
fn settlement_survives_reopen() {
    let dir = tempdir().unwrap();
    let (tx_id, contract_id) = {
        let store = Arc::new(Store::open(dir.path(), StoreConfig::default()).unwrap());
        let partner = store
            .partners()
            .create(Partner {
                name: "Lubumbashi Travel".into(),
                kind: PartnerKind::Agency,
            })
            .unwrap();
        let contract = store
            .contracts()
            .create(Contract {
                partner_id: partner.id(),
                contract_type: ContractType::DepositOnly,
                status: ContractStatus::Active,
                starts_at: None,
                ends_at: None,
                description: None,
            })
            .unwrap();
        store
            .deposit_pools()
            .create_pool(contract.id(), Decimal::from(200), None)
            .unwrap();

        let service = SettlementService::new(Arc::clone(&store));
        let agent = Actor::new(RecordId::new(), Role::Agent);
        let tx = service
            .create_transaction(
                &agent,
                NewTransaction {
                    partner_id: Some(partner.id()),
                    service_id: Some(RecordId::new()),
                    contract_id: Some(contract.id()),
                    client_name: "Tshala".into(),
                    requested_at: Timestamp::now(),
                    issued_at: None,
                    total_amount: Decimal::from(120),
                    total_commission: None,
                    total_tax: None,
                    receipt_reference: None,
                    observation: None,
                },
            )
            .unwrap();
        let pricing = SegmentPricing {
            base_fare: Decimal::from(100),
            tax: Decimal::from(20),
            ..SegmentPricing::default()
        };
        service
            .add_segment(&agent, Segment::new(tx.id(), pricing))
            .unwrap();
        service
            .validate(
                &Actor::new(RecordId::new(), Role::Manager),
                Settlement::Ticketed {
                    transaction_id: tx.id(),
                    segments: None,
                },
            )
            .unwrap();
        (tx.id(), contract.id())
    };

    let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
    let tx = store.transactions().get_by_id(tx_id, false).unwrap();
    assert_eq!(tx.data.status, TransactionStatus::Validated);
    assert_eq!(
        store.deposit_pools().total_remaining(contract_id).unwrap(),
        Decimal::from(80)
    );
    assert_eq!(store.ledger().for_contract(contract_id).unwrap().len(), 1);
    assert_eq!(store.audit_logs().count(), 1);
}

#[test]
fn torn_journal_tail_loses_only_the_last_write() {
    let dir = tempdir().unwrap();
    let kept = {
        let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
        store
            .airlines()
            .create(Airline {
                code: "8Z".into(),
                name: Some("Congo Airways".into()),
            })
            .unwrap()
    };

    {
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("airlines.journal"))
            .unwrap();
        file.write_all(b"TSJ1\x40\x00\x00\x00partial").unwrap();
    }

    let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
    assert_eq!(store.airlines().get_by_id(kept.id(), false), Some(kept));
    assert_eq!(store.airlines().count(), 1);
}

#[test]
fn compaction_preserves_rows_and_sync_state() {
    let dir = tempdir().unwrap();
    let id = {
        let store = Store::open(dir.path(), StoreConfig::default().sync_on_write(false)).unwrap();
        let row = store
            .airlines()
            .create(Airline {
                code: "ET".into(),
                name: None,
            })
            .unwrap();
        for i in 0..20 {
            store
                .airlines()
                .update(row.id(), |a| a.name = Some(format!("rev {i}")))
                .unwrap();
        }
        store
            .sync_table(TableName::Airlines)
            .acknowledge(&[(row.id(), 21)], Timestamp::from_millis(1))
            .unwrap();
        store.airlines().compact().unwrap();
        store.airlines().sync().unwrap();
        row.id()
    };

    let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
    let row = store.airlines().get_by_id(id, false).unwrap();
    assert_eq!(row.version(), 21);
    assert_eq!(row.sync_status(), SyncStatus::Clean);
    assert_eq!(row.data.name.as_deref(), Some("rev 19"));
}

#[derive(Debug, Clone)]
enum Op {
    Update(String),
    Delete,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-z]{1,8}".prop_map(Op::Update),
        1 => Just(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn versions_never_decrease(ops in prop::collection::vec(op(), 1..40)) {
        let table = Table::<Airline>::in_memory();
        let row = table.create(Airline { code: "AA".into(), name: None }).unwrap();
        let mut last = row.version();

        for op in ops {
            match op {
                Op::Update(name) => {
                    let updated = table.update(row.id(), |a| a.name = Some(name)).unwrap();
                    let current = table.get_by_id(row.id(), true).unwrap();
                    if current.is_deleted() {
                        prop_assert!(updated.is_none());
                        prop_assert_eq!(current.version(), last);
                    } else {
                        prop_assert_eq!(current.version(), last + 1);
                    }
                }
                Op::Delete => {
                    let was_live = table.get_by_id(row.id(), false).is_some();
                    prop_assert_eq!(table.soft_delete(row.id()).unwrap(), was_live);
                }
            }
            let current = table.get_by_id(row.id(), true).unwrap();
            prop_assert!(current.version() >= last);
            last = current.version();
        }
    }
}
