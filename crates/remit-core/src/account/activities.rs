//! Side-effecting account activities.
//!
//! Each activity receives the pre-mutation account snapshot and returns a new
//! one, so any attempt can be retried without double-applying a transfer.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::model::{AccountState, TransferDetails};
use crate::domain::{ActivityError, ErrorKind};
use crate::typed::{Activity, Handler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyWithdraw {
    pub details: TransferDetails,
    pub account: AccountState,
}

impl Activity for ApplyWithdraw {
    const TYPE: &'static str = "remit.account.apply_withdraw.v1";
    type Output = AccountState;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyDeposit {
    pub details: TransferDetails,
    pub account: AccountState,
}

impl Activity for ApplyDeposit {
    const TYPE: &'static str = "remit.account.apply_deposit.v1";
    type Output = AccountState;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WithdrawHandler;

#[async_trait]
impl Handler<ApplyWithdraw> for WithdrawHandler {
    async fn handle(&self, input: ApplyWithdraw) -> Result<AccountState, ActivityError> {
        let ApplyWithdraw {
            details,
            mut account,
        } = input;
        info!(
            amount = %details.amount.value(),
            from_account = %details.from_account,
            reference_id = %details.reference_id,
            "withdrawing from account"
        );
        account
            .withdraw(details)
            .map_err(|e| ActivityError::permanent(e.to_string()))?;
        Ok(account)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepositHandler;

#[async_trait]
impl Handler<ApplyDeposit> for DepositHandler {
    async fn handle(&self, input: ApplyDeposit) -> Result<AccountState, ActivityError> {
        let ApplyDeposit {
            details,
            mut account,
        } = input;
        info!(
            amount = %details.amount.value(),
            to_account = %details.to_account,
            reference_id = %details.reference_id,
            "depositing into account"
        );
        account
            .deposit(details)
            .map_err(|e| ActivityError::permanent(e.to_string()))?;
        Ok(account)
    }
}

/// Wraps a handler and fails its first `n` invocations.
///
/// Used to exercise the retry path from the CLI and tests.
pub struct FailureInjector<H> {
    inner: H,
    remaining: AtomicU32,
    kind: ErrorKind,
}

impl<H> FailureInjector<H> {
    pub fn transient(inner: H, n: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(n),
            kind: ErrorKind::Transient,
        }
    }

    pub fn permanent(inner: H, n: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(n),
            kind: ErrorKind::Permanent,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<A, H> Handler<A> for FailureInjector<H>
where
    A: Activity,
    H: Handler<A>,
{
    async fn handle(&self, input: A) -> Result<A::Output, ActivityError> {
        let left = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if let Ok(left) = left {
            return Err(ActivityError::new(
                self.kind,
                format!("injected failure for {} (left={})", A::TYPE, left - 1),
            ));
        }
        self.inner.handle(input).await
    }
}
