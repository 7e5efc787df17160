//! ActivityRegistry - Handler の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use std::collections::HashMap;
use std::sync::Arc;

use super::activity::Activity;
use super::handler::{DynActivity, Handler, TypedHandler};

/// ActivityRegistry は型付き Handler を登録・管理
///
/// # 使用例
/// ```ignore
/// let mut registry = ActivityRegistry::new();
/// registry.register::<ApplyDeposit, _>(DepositHandler)?;
/// let handler = registry.get(ApplyDeposit::TYPE);
/// ```
#[derive(Default)]
pub struct ActivityRegistry {
    handlers: HashMap<String, Arc<dyn DynActivity>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<A: Activity, H: Handler<A> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let activity_type = A::TYPE.to_string();
        if self.handlers.contains_key(&activity_type) {
            return Err(RegistryError::AlreadyRegistered(activity_type));
        }
        let typed_handler = TypedHandler::<A, H>::new(handler);
        self.handlers.insert(activity_type, Arc::new(typed_handler));
        Ok(())
    }

    pub fn get(&self, activity_type: &str) -> Option<Arc<dyn DynActivity>> {
        self.handlers.get(activity_type).cloned()
    }

    pub fn contains(&self, activity_type: &str) -> bool {
        self.handlers.contains_key(activity_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
