//! SignalRouter - 信頼できない signal payload を型付きの Signal に変換
//!
//! payload は 1 回だけ decode します。route の判定と transfer details の
//! decode を同じパスで行い、結果を `Signal` の各 variant に直接落とします。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::model::TransferDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Deposit,
    Withdraw,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Deposit => "deposit",
            Route::Withdraw => "withdraw",
        }
    }

    fn parse(route: &str) -> Option<Self> {
        match route {
            "deposit" => Some(Route::Deposit),
            "withdraw" => Some(Route::Withdraw),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded transfer signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Deposit(TransferDetails),
    Withdraw(TransferDetails),
    /// Well-formed envelope whose route is neither deposit nor withdraw.
    Unrecognized(String),
}

/// Wire shape of a transfer signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneySignal {
    #[serde(alias = "Route")]
    pub route: String,

    #[serde(default, alias = "TransferDetails", skip_serializing_if = "Option::is_none")]
    pub transfer_details: Option<TransferDetails>,
}

impl MoneySignal {
    pub fn new(route: Route, details: TransferDetails) -> Self {
        Self {
            route: route.as_str().to_string(),
            transfer_details: Some(details),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("undecodable signal payload: {0}")]
    Undecodable(#[from] serde_json::Error),

    #[error("{0} signal carries no transfer details")]
    MissingTransferDetails(Route),
}

pub struct SignalRouter;

impl SignalRouter {
    pub fn route(payload: &Value) -> Result<Signal, SignalError> {
        let message = MoneySignal::deserialize(payload)?;
        let Some(route) = Route::parse(&message.route) else {
            return Ok(Signal::Unrecognized(message.route));
        };
        let details = message
            .transfer_details
            .ok_or(SignalError::MissingTransferDetails(route))?;
        Ok(match route {
            Route::Deposit => Signal::Deposit(details),
            Route::Withdraw => Signal::Withdraw(details),
        })
    }
}
