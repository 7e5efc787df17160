//! Typed - 型付き Activity / Workflow API
//!
//! activity_type / workflow_type の typo を型で排除し、
//! Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Activity`, `Handler<A>`, `Workflow` - 型安全
//! - **内部（Dyn）**: `DynActivity`, `DynWorkflow` - object-safe, JSON で type erasure

pub mod activity;
pub mod codec;
pub mod handler;
pub mod registry;
pub mod workflow;

pub use self::activity::Activity;
pub use self::codec::PayloadCodec;
pub use self::handler::{DynActivity, Handler, TypedHandler};
pub use self::registry::{ActivityRegistry, RegistryError};
pub use self::workflow::{DynWorkflow, Workflow, WorkflowRegistry};
