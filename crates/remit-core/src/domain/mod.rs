//! Domain model (IDs, status, retry policy, history, errors).

pub mod errors;
pub mod history;
pub mod ids;
pub mod retry;
pub mod status;

pub use errors::{ActivityError, CodecError, ErrorKind, HostError, StoreError, WorkflowError};
pub use history::{EventKind, ExecutionHistory, HistoryEvent, RecordedActivity, RecordedOutcome};
pub use ids::{ActivityTaskId, ExecutionId, ParseIdError};
pub use retry::{ActivityOptions, RetryPolicy};
pub use status::{ExecutionStatus, QueryRejectCondition};
