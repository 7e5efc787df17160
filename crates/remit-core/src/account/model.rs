//! Account data model: transfer records and the running ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount must not be negative, got {0}")]
pub struct NegativeAmount(pub Decimal);

/// Applying a transfer would leave the balance outside the `Decimal` range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("balance {balance} cannot absorb {route} of {amount}")]
pub struct BalanceOverflow {
    pub balance: Decimal,
    pub amount: Decimal,
    pub route: &'static str,
}

/// Non-negative money amount carried by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, NegativeAmount> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(NegativeAmount(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = NegativeAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// One requested money movement. Immutable once created.
///
/// Keys are camelCase on the wire; PascalCase keys are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetails {
    #[serde(alias = "Amount")]
    pub amount: Amount,

    /// Empty for deposits.
    #[serde(default, alias = "FromAccount")]
    pub from_account: String,

    /// Empty for withdrawals.
    #[serde(default, alias = "ToAccount")]
    pub to_account: String,

    /// Caller supplied. Not deduplicated.
    #[serde(default, alias = "ReferenceID", alias = "ReferenceId")]
    pub reference_id: String,
}

impl TransferDetails {
    pub fn deposit(amount: Amount, to_account: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            amount,
            from_account: String::new(),
            to_account: to_account.into(),
            reference_id: reference_id.into(),
        }
    }

    pub fn withdrawal(
        amount: Amount,
        from_account: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            from_account: from_account.into(),
            to_account: String::new(),
            reference_id: reference_id.into(),
        }
    }
}

/// Ledger owned by one account workflow.
///
/// `amount` is the sum of deposits minus the sum of withdrawals in `transfers`.
/// Overdraft is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub amount: Decimal,
    pub transfers: Vec<TransferDetails>,
}

impl AccountState {
    /// On overflow the state is left untouched.
    pub fn deposit(&mut self, details: TransferDetails) -> Result<(), BalanceOverflow> {
        let amount = details.amount.value();
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or_else(|| self.overflow(amount, "deposit"))?;
        self.transfers.push(details);
        Ok(())
    }

    pub fn withdraw(&mut self, details: TransferDetails) -> Result<(), BalanceOverflow> {
        let amount = details.amount.value();
        self.amount = self
            .amount
            .checked_sub(amount)
            .ok_or_else(|| self.overflow(amount, "withdrawal"))?;
        self.transfers.push(details);
        Ok(())
    }

    fn overflow(&self, amount: Decimal, route: &'static str) -> BalanceOverflow {
        BalanceOverflow {
            balance: self.amount,
            amount,
            route,
        }
    }
}
