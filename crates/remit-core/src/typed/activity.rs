//! Activity trait - 型付き activity 入力の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Associated Types (`type Output`)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Activity は activity_type と入力・出力の型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ApplyDeposit {
///     details: TransferDetails,
///     account: AccountState,
/// }
///
/// impl Activity for ApplyDeposit {
///     const TYPE: &'static str = "remit.account.apply_deposit.v1";
///     type Output = AccountState;
/// }
/// ```
///
/// 入力は history に記録され、replay 時は記録済みの出力が返ります。
pub trait Activity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// # 命名規約
    /// - `{namespace}.{domain}.{action}.v{major}`
    const TYPE: &'static str;

    type Output: Serialize + DeserializeOwned + Send + 'static;
}
