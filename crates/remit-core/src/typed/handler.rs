//! Handler trait - Activity を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<A>)
//! - Object-safe trait (DynActivity)
//! - Type erasure パターン (TypedHandler<A, H> → DynActivity)

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::activity::Activity;
use super::codec::PayloadCodec;
use crate::domain::ActivityError;

/// Handler は Activity を実行して出力を返す
///
/// エラーの `ErrorKind` で host の retry 判定が決まります。
/// Permanent 以外は retry policy に従って再実行されます。
#[async_trait]
pub trait Handler<A: Activity>: Send + Sync {
    async fn handle(&self, input: A) -> Result<A::Output, ActivityError>;
}

/// DynActivity は object-safe な Handler の抽象化
///
/// worker は activity_type で引いた `Arc<dyn DynActivity>` に JSON を渡すだけです。
#[async_trait]
pub trait DynActivity: Send + Sync {
    async fn handle_dyn(&self, input: Value) -> Result<Value, ActivityError>;
    fn activity_type(&self) -> &str;
}

pub struct TypedHandler<A: Activity, H: Handler<A>> {
    handler: H,
    _marker: PhantomData<A>,
}

impl<A: Activity, H: Handler<A>> TypedHandler<A, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Activity, H: Handler<A>> DynActivity for TypedHandler<A, H> {
    async fn handle_dyn(&self, input: Value) -> Result<Value, ActivityError> {
        // 入力が壊れていたら何度やっても同じなので Permanent
        let input: A = PayloadCodec::decode(input)
            .map_err(|e| ActivityError::permanent(e.to_string()))?;
        let output = self.handler.handle(input).await?;
        PayloadCodec::encode(&output).map_err(|e| ActivityError::permanent(e.to_string()))
    }

    fn activity_type(&self) -> &str {
        A::TYPE
    }
}
