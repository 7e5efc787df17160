//! Workflow trait - 長期間動く決定的なステートマシンの定義
//!
//! Workflow のコードは `WorkflowContext` 経由でのみ外界とやり取りします。
//! signal の受信・activity の実行は全て history に記録され、
//! 再起動後は同じコードを history に沿って replay します。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::codec::PayloadCodec;
use super::registry::RegistryError;
use crate::app::WorkflowContext;
use crate::domain::WorkflowError;

/// Workflow は workflow_type と入力・出力の型、そして本体を対応付ける
///
/// `run` は決定的でなければなりません。時刻・乱数・I/O は activity に追い出すこと。
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn run(
        &self,
        ctx: WorkflowContext,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError>;
}

/// Object-safe form used by the host.
#[async_trait]
pub trait DynWorkflow: Send + Sync {
    async fn run_dyn(&self, ctx: WorkflowContext, input: Value) -> Result<Value, WorkflowError>;
    fn workflow_type(&self) -> &str;
}

struct TypedWorkflow<W: Workflow> {
    workflow: W,
}

#[async_trait]
impl<W: Workflow> DynWorkflow for TypedWorkflow<W> {
    async fn run_dyn(&self, ctx: WorkflowContext, input: Value) -> Result<Value, WorkflowError> {
        let input: W::Input = PayloadCodec::decode(input)?;
        let output = self.workflow.run(ctx, input).await?;
        Ok(PayloadCodec::encode(&output)?)
    }

    fn workflow_type(&self) -> &str {
        W::TYPE
    }
}

#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<dyn DynWorkflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            workflows: HashMap::new(),
        }
    }

    pub fn register<W: Workflow>(&mut self, workflow: W) -> Result<(), RegistryError> {
        let workflow_type = W::TYPE.to_string();
        if self.workflows.contains_key(&workflow_type) {
            return Err(RegistryError::AlreadyRegistered(workflow_type));
        }
        self.workflows.insert(
            workflow_type,
            Arc::new(TypedWorkflow { workflow }),
        );
        Ok(())
    }

    pub fn get(&self, workflow_type: &str) -> Option<Arc<dyn DynWorkflow>> {
        self.workflows.get(workflow_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.workflows.keys().cloned().collect();
        types.sort();
        types
    }
}
