//! Query handlers registered by workflow code.
//!
//! handler は workflow 側が持つ最新のスナップショットを返すだけにすること。
//! host はロックを握らずに呼ぶので、workflow のループを止めません。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::domain::CodecError;
use crate::typed::PayloadCodec;

type QueryFn = dyn Fn() -> Result<Value, CodecError> + Send + Sync;

#[derive(Clone, Default)]
pub struct QueryHandlers {
    handlers: Arc<RwLock<HashMap<String, Arc<QueryFn>>>>,
}

impl QueryHandlers {
    /// Register or replace the handler for `name`.
    pub fn set<F, R>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Serialize,
    {
        let handler: Arc<QueryFn> = Arc::new(move || PayloadCodec::encode(&handler()));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), handler);
    }

    pub fn invoke(&self, name: &str) -> Option<Result<Value, CodecError>> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        Some(handler())
    }
}
