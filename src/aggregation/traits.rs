use std::future::Future;
use std::time::Duration;

use alloy_primitives::Bytes;

use super::error::AggregationError;
use super::types::{AggregatedResponse, AggregatedResponseReceiver, SignatureStatus};
use crate::crypto::Signature;
use crate::types::{BlockNumber, OperatorId, QuorumNum, TaskIndex, ThresholdPercentage};

/// Interface used by AVS aggregator code to turn operator signatures into quorum certificates.
pub trait BlsAggregation {
    /// Registers a task. It completes once the signers of one response digest hold at least
    /// `quorum_threshold_percentages[i]` percent of the stake of `quorum_numbers[i]`, for
    /// every `i`, and expires after `time_to_expiry` otherwise.
    fn initialize_new_task(
        &self,
        task_index: TaskIndex,
        task_created_block: BlockNumber,
        quorum_numbers: Vec<QuorumNum>,
        quorum_threshold_percentages: Vec<ThresholdPercentage>,
        time_to_expiry: Duration,
    ) -> impl Future<Output = Result<(), AggregationError>> + Send;

    /// Verifies one operator's signature over the digest of `task_response` and folds it into
    /// the aggregate for that digest.
    ///
    /// Only the digest is checked; callers are responsible for the semantic validity of
    /// the response itself.
    fn process_new_signature(
        &self,
        task_index: TaskIndex,
        task_response: Bytes,
        signature: Signature,
        operator_id: OperatorId,
    ) -> impl Future<Output = Result<SignatureStatus, AggregationError>> + Send;

    /// Waits for the task to complete or expire.
    fn get_aggregated_response(
        &self,
        task_index: TaskIndex,
    ) -> impl Future<Output = Result<AggregatedResponse, AggregationError>> + Send;

    /// The queue every completed task is published on, in completion order.
    fn get_aggregated_response_channel(&self) -> AggregatedResponseReceiver;
}
