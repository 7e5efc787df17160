#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use remit_core::account::{
    AccountService, AccountState, AccountWorkflow, Amount, ApplyDeposit, ApplyWithdraw,
    DepositHandler, FailureInjector, TransferDetails, WithdrawHandler,
};
use remit_core::app::{Host, HostBuilder, HostConfig};
use remit_core::domain::{ActivityError, ActivityOptions, ErrorKind, ExecutionId, RetryPolicy};
use remit_core::ports::HistoryStore;
use remit_core::typed::{Activity, Handler};

/// Counts every invocation of the wrapped handler, failed ones included.
pub struct Counting<H> {
    inner: H,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl<A, H> Handler<A> for Counting<H>
where
    A: Activity,
    H: Handler<A>,
{
    async fn handle(&self, input: A) -> Result<A::Output, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.handle(input).await
    }
}

pub fn fast_options(maximum_attempts: u32) -> ActivityOptions {
    ActivityOptions {
        start_to_close_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_millis(2),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_millis(20),
            maximum_attempts,
        },
    }
}

/// How the deposit handler misbehaves.
#[derive(Debug, Clone, Copy)]
pub struct DepositFaults {
    pub kind: ErrorKind,
    pub first: u32,
}

impl DepositFaults {
    pub const NONE: Self = Self {
        kind: ErrorKind::Transient,
        first: 0,
    };
}

pub struct Harness {
    pub host: Arc<Host>,
    pub service: AccountService,
    pub deposit_calls: Arc<AtomicU32>,
    pub withdraw_calls: Arc<AtomicU32>,
}

impl Harness {
    pub fn deposits(&self) -> u32 {
        self.deposit_calls.load(Ordering::SeqCst)
    }

    pub fn withdrawals(&self) -> u32 {
        self.withdraw_calls.load(Ordering::SeqCst)
    }
}

pub fn harness(config: HostConfig, store: Arc<dyn HistoryStore>, faults: DepositFaults) -> Harness {
    harness_with_attempts(config, store, faults, 10)
}

pub fn harness_with_attempts(
    config: HostConfig,
    store: Arc<dyn HistoryStore>,
    faults: DepositFaults,
    maximum_attempts: u32,
) -> Harness {
    let deposit_calls = Arc::new(AtomicU32::new(0));
    let withdraw_calls = Arc::new(AtomicU32::new(0));

    let deposit = match faults.kind {
        ErrorKind::Permanent => FailureInjector::permanent(DepositHandler, faults.first),
        _ => FailureInjector::transient(DepositHandler, faults.first),
    };
    let workflow = AccountWorkflow::new(config.signal_channel.clone())
        .with_activity_options(fast_options(maximum_attempts));

    let host = HostBuilder::new(config)
        .with_store(store)
        .register_activity::<ApplyDeposit, _>(Counting {
            inner: deposit,
            calls: deposit_calls.clone(),
        })
        .unwrap()
        .register_activity::<ApplyWithdraw, _>(Counting {
            inner: WithdrawHandler,
            calls: withdraw_calls.clone(),
        })
        .unwrap()
        .register_workflow(workflow)
        .unwrap()
        .expect_activities(&[ApplyDeposit::TYPE, ApplyWithdraw::TYPE])
        .build()
        .unwrap();

    let host = Arc::new(host);
    Harness {
        service: AccountService::new(host.clone()),
        host,
        deposit_calls,
        withdraw_calls,
    }
}

pub fn amount(v: Decimal) -> Amount {
    Amount::new(v).unwrap()
}

pub fn deposit(v: Decimal, reference_id: &str) -> TransferDetails {
    TransferDetails::deposit(amount(v), "acc-to", reference_id)
}

pub fn withdrawal(v: Decimal, reference_id: &str) -> TransferDetails {
    TransferDetails::withdrawal(amount(v), "acc-from", reference_id)
}

pub fn deposit_payload(amount: &str, reference_id: &str) -> Value {
    json!({
        "route": "deposit",
        "transferDetails": {"amount": amount, "toAccount": "acc-to", "referenceId": reference_id},
    })
}

/// Poll `getAccount` until `n` transfers are committed.
pub async fn wait_for_transfers(service: &AccountService, id: ExecutionId, n: usize) -> AccountState {
    let poll = async {
        loop {
            let account = service.get_account(id).await.unwrap();
            if account.transfers.len() >= n {
                return account;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("transfers were not applied in time")
}
