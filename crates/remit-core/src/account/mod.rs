//! Account - 送金ワークフロー本体
//!
//! - **model**: TransferDetails / AccountState
//! - **signal**: signal payload の decode（SignalRouter）
//! - **activities**: ApplyWithdraw / ApplyDeposit とその handler
//! - **workflow**: AccountWorkflow（signal 駆動のステートマシン）
//! - **service**: 外部境界（create / deposit / withdraw / getAccount）

pub mod activities;
pub mod model;
pub mod service;
pub mod signal;
pub mod workflow;

pub use self::activities::{
    ApplyDeposit, ApplyWithdraw, DepositHandler, FailureInjector, WithdrawHandler,
};
pub use self::model::{AccountState, Amount, BalanceOverflow, NegativeAmount, TransferDetails};
pub use self::service::{AccountService, CreatedAccount, ServiceError};
pub use self::signal::{MoneySignal, Route, Signal, SignalError, SignalRouter};
pub use self::workflow::{
    AccountWorkflow, QUERY_GET_ACCOUNT, SIGNAL_CHANNEL, TARGET_BALANCE, TASK_QUEUE,
    activity_options,
};
