mod common;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use ulid::Ulid;

use common::{DepositFaults, deposit, deposit_payload, harness, wait_for_transfers, withdrawal};
use remit_core::account::AccountWorkflow;
use remit_core::app::HostConfig;
use remit_core::domain::{
    EventKind, ExecutionId, ExecutionStatus, HistoryEvent, QueryRejectCondition,
};
use remit_core::impls::{FileHistoryStore, InMemoryHistoryStore};
use remit_core::ports::HistoryStore;
use remit_core::typed::Workflow;

fn event(event_id: u64, kind: EventKind) -> HistoryEvent {
    HistoryEvent {
        event_id,
        recorded_at: Utc::now(),
        kind,
    }
}

async fn seed(store: &dyn HistoryStore, kinds: Vec<EventKind>) -> ExecutionId {
    let id = ExecutionId::from_ulid(Ulid::new());
    let started = EventKind::WorkflowStarted {
        workflow_type: AccountWorkflow::TYPE.to_string(),
        input: json!({"amount": "0", "transfers": []}),
    };
    store.create(id, event(1, started)).await.unwrap();
    let mut event_id = 2;
    for kind in kinds {
        store.append(id, event(event_id, kind)).await.unwrap();
        event_id += 1;
    }
    id
}

#[tokio::test]
async fn restart_replays_history_without_reinvoking_activities() {
    let store = InMemoryHistoryStore::new();

    let first = harness(HostConfig::default(), Arc::new(store.clone()), DepositFaults::NONE);
    let id = first.service.create_account().await.unwrap().account_id;
    first.service.deposit(id, deposit(dec!(300), "r1")).await.unwrap();
    first.service.deposit(id, deposit(dec!(100), "r2")).await.unwrap();
    wait_for_transfers(&first.service, id, 2).await;
    assert_eq!(first.deposits(), 2);
    first.host.shutdown().await;

    let second = harness(HostConfig::default(), Arc::new(store.clone()), DepositFaults::NONE);
    assert_eq!(second.host.recover().await.unwrap(), vec![id]);

    let account = second.service.get_account(id).await.unwrap();
    assert_eq!(account.amount, dec!(400));
    assert_eq!(account.transfers.len(), 2);
    assert_eq!(second.deposits(), 0);

    // the recovered execution keeps processing new signals
    second.service.deposit(id, deposit(dec!(100), "r3")).await.unwrap();
    let state = second.host.await_completion(id).await.unwrap();
    assert_eq!(state.status, ExecutionStatus::Completed);
    assert_eq!(second.deposits(), 1);

    second.host.shutdown().await;
}

#[tokio::test]
async fn file_history_survives_a_new_host() {
    let dir = tempfile::tempdir().unwrap();
    let store = || Arc::new(FileHistoryStore::open(dir.path()).unwrap());

    let first = harness(HostConfig::default(), store(), DepositFaults::NONE);
    let id = first.service.create_account().await.unwrap().account_id;
    first.service.deposit(id, deposit(dec!(300), "r1")).await.unwrap();
    first.service.deposit(id, deposit(dec!(300), "r2")).await.unwrap();
    first.service.withdraw(id, withdrawal(dec!(100), "r3")).await.unwrap();
    first.host.await_completion(id).await.unwrap();
    let length = first.host.describe(id).await.unwrap().history_length;
    first.host.shutdown().await;

    let second = harness(HostConfig::default(), store(), DepositFaults::NONE);
    second.host.recover().await.unwrap();

    let described = second.host.describe(id).await.unwrap();
    assert_eq!(described.status, ExecutionStatus::Completed);
    assert_eq!(described.history_length, length);
    assert_eq!(described.workflow_type, AccountWorkflow::TYPE);

    let account = second.service.get_account(id).await.unwrap();
    assert_eq!(account.amount, dec!(500));
    assert_eq!(account.transfers.len(), 3);
    assert_eq!(second.deposits() + second.withdrawals(), 0);

    second.host.shutdown().await;
}

#[tokio::test]
async fn damaged_history_does_not_block_other_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let store = || Arc::new(FileHistoryStore::open(dir.path()).unwrap());

    let first = harness(HostConfig::default(), store(), DepositFaults::NONE);
    let torn = first.service.create_account().await.unwrap().account_id;
    first.service.deposit(torn, deposit(dec!(200), "r1")).await.unwrap();
    wait_for_transfers(&first.service, torn, 1).await;
    let healthy = first.service.create_account().await.unwrap().account_id;
    first.service.deposit(healthy, deposit(dec!(300), "r2")).await.unwrap();
    wait_for_transfers(&first.service, healthy, 1).await;
    first.host.shutdown().await;

    // a crash mid-append leaves a partial last line
    let torn_path = dir.path().join(format!("{torn}.jsonl"));
    let mut file = std::fs::OpenOptions::new().append(true).open(&torn_path).unwrap();
    std::io::Write::write_all(&mut file, br#"{"event_id":99,"recorded_at":"2024"#).unwrap();
    drop(file);

    // damage in the middle of a history cannot be repaired
    let broken = ExecutionId::from_ulid(Ulid::new());
    std::fs::write(
        dir.path().join(format!("{broken}.jsonl")),
        "not json\n{\"event_id\":2}\n",
    )
    .unwrap();

    let second = harness(HostConfig::default(), store(), DepositFaults::NONE);
    let mut recovered = second.host.recover().await.unwrap();
    recovered.sort();
    let mut expected = vec![torn, healthy];
    expected.sort();
    assert_eq!(recovered, expected);

    assert_eq!(second.service.get_account(torn).await.unwrap().amount, dec!(200));
    assert_eq!(second.service.get_account(healthy).await.unwrap().amount, dec!(300));
    assert!(second.service.get_account(broken).await.is_err());

    // the repaired history accepts new events
    second.service.deposit(torn, deposit(dec!(300), "r3")).await.unwrap();
    let state = second.host.await_completion(torn).await.unwrap();
    assert_eq!(state.status, ExecutionStatus::Completed);
    assert_eq!(second.deposits(), 1);

    second.host.shutdown().await;
}

#[tokio::test]
async fn cancelled_execution_replays_to_its_cancel_point() {
    let store = InMemoryHistoryStore::new();
    let config = HostConfig {
        query_reject_condition: QueryRejectCondition::None,
        ..HostConfig::default()
    };

    let first = harness(config.clone(), Arc::new(store.clone()), DepositFaults::NONE);
    let id = first.service.create_account().await.unwrap().account_id;
    first.service.deposit(id, deposit(dec!(100), "r1")).await.unwrap();
    wait_for_transfers(&first.service, id, 1).await;
    first.host.cancel(id).await.unwrap();
    first.host.await_completion(id).await.unwrap();
    first.host.shutdown().await;

    let second = harness(config, Arc::new(store.clone()), DepositFaults::NONE);
    second.host.recover().await.unwrap();

    assert_eq!(
        second.host.describe(id).await.unwrap().status,
        ExecutionStatus::Cancelled
    );
    let account = second.service.get_account(id).await.unwrap();
    assert_eq!(account.amount, dec!(100));
    assert_eq!(second.deposits(), 0);

    second.host.shutdown().await;
}

#[tokio::test]
async fn interrupted_activity_resumes_with_its_attempt_count() {
    let store = InMemoryHistoryStore::new();
    let id = seed(
        &store,
        vec![
            EventKind::SignalReceived {
                signal_name: "TRANSFER_SIGNAL".to_string(),
                payload: deposit_payload("300", "r1"),
            },
            EventKind::ActivityScheduled {
                seq: 0,
                activity_type: "remit.account.apply_deposit.v1".to_string(),
                input: json!({}),
            },
            EventKind::ActivityAttemptFailed {
                seq: 0,
                attempt: 1,
                error: "Transient: worker lost".to_string(),
                retry_in_ms: Some(1),
            },
        ],
    )
    .await;

    let h = harness(HostConfig::default(), Arc::new(store.clone()), DepositFaults::NONE);
    h.host.recover().await.unwrap();

    let account = wait_for_transfers(&h.service, id, 1).await;
    assert_eq!(account.amount, dec!(300));
    assert_eq!(h.deposits(), 1);

    let events = store.load(id).await.unwrap();
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(EventKind::ActivityCompleted { seq: 0, .. })
    ));

    h.host.shutdown().await;
}

#[tokio::test]
async fn history_that_disagrees_with_the_code_fails_the_execution() {
    let store = InMemoryHistoryStore::new();
    let id = seed(
        &store,
        vec![
            EventKind::SignalReceived {
                signal_name: "TRANSFER_SIGNAL".to_string(),
                payload: deposit_payload("300", "r1"),
            },
            EventKind::ActivityScheduled {
                seq: 0,
                activity_type: "remit.account.apply_withdraw.v1".to_string(),
                input: json!({}),
            },
        ],
    )
    .await;

    let h = harness(HostConfig::default(), Arc::new(store.clone()), DepositFaults::NONE);
    h.host.recover().await.unwrap();

    let state = h.host.await_completion(id).await.unwrap();
    assert_eq!(state.status, ExecutionStatus::Failed);
    assert!(state.error.unwrap().contains("history mismatch"));
    assert_eq!(h.deposits() + h.withdrawals(), 0);

    h.host.shutdown().await;
}
