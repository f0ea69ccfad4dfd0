use thiserror::Error;

use crate::types::{OperatorId, TaskIndex};

/// Errors reported by the aggregation engine. None of them leave partial state behind.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("task {0} already initialized")]
    TaskAlreadyInitialized(TaskIndex),

    #[error("task {0} not initialized")]
    TaskNotFound(TaskIndex),

    #[error("operator {operator_id} is not part of the quorums of task {task_index}")]
    OperatorNotInQuorum {
        task_index: TaskIndex,
        operator_id: OperatorId,
    },

    #[error("signature of operator {operator_id} for task {task_index} already processed")]
    OperatorAlreadyProcessed {
        task_index: TaskIndex,
        operator_id: OperatorId,
    },

    #[error("signature of operator {operator_id} for task {task_index} failed verification")]
    SignatureVerificationFailed {
        task_index: TaskIndex,
        operator_id: OperatorId,
    },

    #[error("task {0} expired")]
    TaskExpired(TaskIndex),

    #[error("invalid task parameters: {0}")]
    InvalidTaskParameters(String),

    #[error("registry lookup failed: {0:#}")]
    Registry(anyhow::Error),
}
