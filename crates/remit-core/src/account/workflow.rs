//! AccountWorkflow - 口座 1 つ分の signal 駆動ステートマシン
//!
//! # ループ
//! 1. signal channel から signal を 1 件受け取る（AWAITING_SIGNAL）
//! 2. SignalRouter で decode。壊れた signal は warn ログだけ出して捨てる
//! 3. route に応じた activity を実行し、結果の AccountState で置き換える
//! 4. 残高がちょうど TARGET_BALANCE なら完了、そうでなければ 1 に戻る
//!
//! 終了条件は「ちょうど一致」です。超えても終わりません。

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, warn};

use super::activities::{ApplyDeposit, ApplyWithdraw};
use super::model::AccountState;
use super::signal::{Signal, SignalRouter};
use crate::app::WorkflowContext;
use crate::domain::{ActivityOptions, RetryPolicy, WorkflowError};
use crate::typed::Workflow;

pub const SIGNAL_CHANNEL: &str = "TRANSFER_SIGNAL";
pub const TASK_QUEUE: &str = "TRANSFER_MONEY_TASK_QUEUE";
pub const QUERY_GET_ACCOUNT: &str = "getAccount";

/// Balance at which the workflow completes. Exact match only.
pub const TARGET_BALANCE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Options the account workflow declares for both activities.
pub fn activity_options() -> ActivityOptions {
    ActivityOptions {
        start_to_close_timeout: Duration::from_secs(60),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 500,
        },
    }
}

#[derive(Debug, Clone)]
pub struct AccountWorkflow {
    signal_channel: String,
    options: ActivityOptions,
}

impl AccountWorkflow {
    pub fn new(signal_channel: impl Into<String>) -> Self {
        Self {
            signal_channel: signal_channel.into(),
            options: activity_options(),
        }
    }

    pub fn with_activity_options(mut self, options: ActivityOptions) -> Self {
        self.options = options;
        self
    }

    pub fn signal_channel(&self) -> &str {
        &self.signal_channel
    }
}

impl Default for AccountWorkflow {
    fn default() -> Self {
        Self::new(SIGNAL_CHANNEL)
    }
}

#[async_trait]
impl Workflow for AccountWorkflow {
    const TYPE: &'static str = "remit.account.transfer_money.v1";

    type Input = AccountState;
    type Output = AccountState;

    async fn run(
        &self,
        mut ctx: WorkflowContext,
        initial: AccountState,
    ) -> Result<AccountState, WorkflowError> {
        let execution_id = ctx.execution_id();
        let mut account = initial;

        // queries read the last committed snapshot, never a half-applied one
        let (snapshot_tx, snapshot_rx) = watch::channel(account.clone());
        ctx.set_query_handler(QUERY_GET_ACCOUNT, move || snapshot_rx.borrow().clone());

        loop {
            let payload = ctx.receive_signal(&self.signal_channel).await?;

            let applied = match SignalRouter::route(&payload) {
                Ok(Signal::Deposit(details)) => {
                    let input = ApplyDeposit {
                        details,
                        account: account.clone(),
                    };
                    account = ctx.execute_activity(input, &self.options).await?;
                    true
                }
                Ok(Signal::Withdraw(details)) => {
                    let input = ApplyWithdraw {
                        details,
                        account: account.clone(),
                    };
                    account = ctx.execute_activity(input, &self.options).await?;
                    true
                }
                Ok(Signal::Unrecognized(route)) => {
                    warn!(%execution_id, %route, "ignoring signal with unrecognized route");
                    false
                }
                Err(err) => {
                    warn!(%execution_id, error = %err, "ignoring malformed signal");
                    false
                }
            };

            if applied {
                snapshot_tx.send_replace(account.clone());
                if !ctx.is_replaying() {
                    info!(%execution_id, amount = %account.amount, transfers = account.transfers.len(), "transfer applied");
                }
            }

            if account.amount == TARGET_BALANCE {
                if !ctx.is_replaying() {
                    info!(%execution_id, amount = %account.amount, "target balance reached");
                }
                return Ok(account);
            }
        }
    }
}
