//! AccountService - 外部（HTTP 層など）から account workflow を操作する境界
//!
//! Host はコンストラクタで明示的に受け取ります（グローバルなクライアントは持たない）。
//! 失敗は全て `{ "error": message }` の形の ServiceError に揃えます。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use super::model::{AccountState, TransferDetails};
use super::signal::{MoneySignal, Route};
use super::workflow::{AccountWorkflow, QUERY_GET_ACCOUNT};
use crate::app::Host;
use crate::domain::{CodecError, ExecutionId, HostError};
use crate::typed::PayloadCodec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAccount {
    #[serde(rename = "accountID")]
    pub account_id: ExecutionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ServiceError {
    pub error: String,
}

impl From<HostError> for ServiceError {
    fn from(err: HostError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

pub struct AccountService {
    host: Arc<Host>,
    signal_channel: String,
}

impl AccountService {
    /// Signals go to the channel named in the host's config.
    pub fn new(host: Arc<Host>) -> Self {
        let signal_channel = host.config().signal_channel.clone();
        Self {
            host,
            signal_channel,
        }
    }

    pub async fn create_account(&self) -> Result<CreatedAccount, ServiceError> {
        let account_id = self
            .host
            .start_workflow::<AccountWorkflow>(&AccountState::default())
            .await
            .inspect_err(|e| error!(error = %e, "unable to start account workflow"))?;
        Ok(CreatedAccount { account_id })
    }

    pub async fn deposit(
        &self,
        account_id: ExecutionId,
        details: TransferDetails,
    ) -> Result<(), ServiceError> {
        self.send(account_id, MoneySignal::new(Route::Deposit, details))
            .await
    }

    pub async fn withdraw(
        &self,
        account_id: ExecutionId,
        details: TransferDetails,
    ) -> Result<(), ServiceError> {
        self.send(account_id, MoneySignal::new(Route::Withdraw, details))
            .await
    }

    pub async fn get_account(&self, account_id: ExecutionId) -> Result<AccountState, ServiceError> {
        let account = self
            .host
            .query_as::<AccountState>(account_id, QUERY_GET_ACCOUNT)
            .await
            .inspect_err(|e| error!(%account_id, error = %e, "unable to query account"))?;
        Ok(account)
    }

    async fn send(&self, account_id: ExecutionId, signal: MoneySignal) -> Result<(), ServiceError> {
        let payload = PayloadCodec::encode(&signal)?;
        self.host
            .signal(account_id, &self.signal_channel, payload)
            .await
            .inspect_err(|e| error!(%account_id, route = %signal.route, error = %e, "unable to signal account"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn created_account_uses_account_id_key() {
        let id = ExecutionId::from_ulid(Ulid::new());
        let v = serde_json::to_value(CreatedAccount { account_id: id }).unwrap();
        assert_eq!(v, json!({"accountID": id.to_string()}));
    }

    #[test]
    fn service_error_is_a_structured_message() {
        let id = ExecutionId::from_ulid(Ulid::new());
        let err = ServiceError::from(HostError::ExecutionNotFound(id));
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v, json!({"error": format!("execution {id} not found")}));
    }
}
