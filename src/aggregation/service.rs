use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, keccak256};
use commonware_utils::hex;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::AggregationError;
use super::settled::SettledFuture;
use super::traits::BlsAggregation;
use super::types::{
    AggregatedResponse, AggregatedResponseReceiver, DigestAggregate, SignatureStatus,
    stake_threshold_met,
};
use crate::crypto::{G1Point, Signature};
use crate::metrics::AggregatorMetrics;
use crate::registry::AvsRegistry;
use crate::types::{
    BlockNumber, OperatorId, OperatorsAvsState, QuorumNum, SignedTaskResponse, Stake, TaskIndex,
    TaskResponseDigest, ThresholdPercentage,
};

/// Maps a task response to the digest operators sign.
pub type TaskResponseHasher = Arc<dyn Fn(&[u8]) -> TaskResponseDigest + Send + Sync>;

pub fn keccak_hasher() -> TaskResponseHasher {
    Arc::new(|response: &[u8]| keccak256(response))
}

/// Immutable task snapshot plus the mutable aggregation state behind its own lock.
struct Task {
    task_created_block: BlockNumber,
    quorum_numbers: Vec<QuorumNum>,
    quorum_threshold_percentages: BTreeMap<QuorumNum, ThresholdPercentage>,
    operators: OperatorsAvsState,
    total_stake_per_quorum: BTreeMap<QuorumNum, Stake>,
    quorum_apks_g1: Vec<G1Point>,
    response: SettledFuture<AggregatedResponse>,
    state: Mutex<TaskState>,
}

#[derive(Default)]
struct TaskState {
    aggregated_operators: HashMap<TaskResponseDigest, DigestAggregate>,
    /// Every operator whose signature was accepted, whatever digest it signed.
    processed_operators: HashSet<OperatorId>,
}

impl Task {
    fn stake_thresholds_met(&self, aggregate: &DigestAggregate) -> bool {
        self.quorum_threshold_percentages
            .iter()
            .all(|(quorum, threshold)| {
                let Some(total) = self.total_stake_per_quorum.get(quorum) else {
                    return false;
                };
                let signed = aggregate
                    .signers_total_stake_per_quorum
                    .get(quorum)
                    .copied()
                    .unwrap_or_default();
                stake_threshold_met(signed, *total, *threshold)
            })
    }

    fn deadline_passed(&self) -> bool {
        Instant::now() >= self.response.deadline()
    }

    fn terminal_status(&self) -> Option<SignatureStatus> {
        if self.response.is_resolved() {
            Some(SignatureStatus::AlreadyResponded)
        } else if self.response.is_settled() || self.deadline_passed() {
            Some(SignatureStatus::Expired)
        } else {
            None
        }
    }
}

/// BLS aggregation engine.
///
/// Tasks are independent: each one is mutated under its own lock, and the task table is only
/// locked long enough to look a task up or insert a new one.
pub struct BlsAggregator<R> {
    registry: Arc<R>,
    hasher: TaskResponseHasher,
    metrics: AggregatorMetrics,
    tasks: RwLock<HashMap<TaskIndex, Arc<Task>>>,
    responses: mpsc::UnboundedSender<AggregatedResponse>,
    receiver: AggregatedResponseReceiver,
}

impl<R: AvsRegistry> BlsAggregator<R> {
    pub fn new(registry: Arc<R>, hasher: TaskResponseHasher, metrics: AggregatorMetrics) -> Self {
        let (responses, receiver) = mpsc::unbounded_channel();
        Self {
            registry,
            hasher,
            metrics,
            tasks: RwLock::new(HashMap::new()),
            responses,
            receiver: AggregatedResponseReceiver::new(receiver),
        }
    }

    /// Engine hashing responses with keccak256 and reporting to unregistered metrics.
    pub fn with_keccak(registry: Arc<R>) -> Self {
        Self::new(registry, keccak_hasher(), AggregatorMetrics::default())
    }

    /// Digest that operators are expected to sign for `task_response`.
    pub fn digest(&self, task_response: &[u8]) -> TaskResponseDigest {
        (self.hasher)(task_response)
    }

    /// Processes a submission in its wire form.
    ///
    /// # Errors
    ///
    /// See [`BlsAggregation::process_new_signature`].
    pub async fn process_signed_response(
        &self,
        submission: SignedTaskResponse,
    ) -> Result<SignatureStatus, AggregationError> {
        self.process_new_signature(
            submission.task_index,
            submission.task_response,
            submission.signature,
            submission.operator_id,
        )
        .await
    }

    async fn task(&self, task_index: TaskIndex) -> Result<Arc<Task>, AggregationError> {
        self.tasks
            .read()
            .await
            .get(&task_index)
            .cloned()
            .ok_or(AggregationError::TaskNotFound(task_index))
    }

    async fn aggregate_signature(
        &self,
        task_index: TaskIndex,
        task: &Task,
        task_response: Bytes,
        signature: Signature,
        operator_id: OperatorId,
    ) -> Result<SignatureStatus, AggregationError> {
        let mut state = task.state.lock().await;
        if let Some(status) = task.terminal_status() {
            return Ok(status);
        }

        let operator =
            task.operators
                .get(&operator_id)
                .ok_or(AggregationError::OperatorNotInQuorum {
                    task_index,
                    operator_id,
                })?;
        if state.processed_operators.contains(&operator_id) {
            return Err(AggregationError::OperatorAlreadyProcessed {
                task_index,
                operator_id,
            });
        }

        let digest = self.digest(&task_response);
        if !signature.verify(
            &operator.operator_info.pub_keys.g2_pub_key,
            digest.as_slice(),
        ) {
            return Err(AggregationError::SignatureVerificationFailed {
                task_index,
                operator_id,
            });
        }

        // Work on a copy so a failed completion leaves the task untouched.
        let mut aggregate = state
            .aggregated_operators
            .get(&digest)
            .cloned()
            .unwrap_or_default();
        aggregate.add_signer(operator, &signature);

        if !task.stake_thresholds_met(&aggregate) {
            debug!(
                task_index,
                digest = hex(digest.as_slice()),
                signers = aggregate.signers_operator_ids.len(),
                "aggregated signature, threshold not reached"
            );
            state.processed_operators.insert(operator_id);
            state.aggregated_operators.insert(digest, aggregate);
            return Ok(SignatureStatus::Accepted);
        }

        let non_signer_ids: Vec<OperatorId> = task
            .operators
            .keys()
            .filter(|id| !aggregate.signers_operator_ids.contains(*id))
            .copied()
            .collect();
        let proof_indices = self
            .registry
            .get_check_signatures_indices(
                task.task_created_block,
                &task.quorum_numbers,
                &non_signer_ids,
            )
            .await
            .map_err(AggregationError::Registry)?;
        let non_signers_pub_keys_g1 = non_signer_ids
            .iter()
            .filter_map(|id| task.operators.get(id))
            .map(|operator| operator.operator_info.pub_keys.g1_pub_key)
            .collect();

        let response = AggregatedResponse {
            task_index,
            task_response,
            task_response_digest: digest,
            non_signers_pub_keys_g1,
            quorum_apks_g1: task.quorum_apks_g1.clone(),
            signers_apk_g2: aggregate.signers_apk_g2,
            signers_agg_sig_g1: aggregate.signers_agg_sig_g1,
            proof_indices,
        };
        // The deadline may have passed while the indices were fetched.
        if task.deadline_passed() || !task.response.resolve(response.clone()) {
            return Ok(SignatureStatus::Expired);
        }

        state.processed_operators.insert(operator_id);
        state.aggregated_operators.insert(digest, aggregate);
        drop(state);

        self.metrics.tasks_completed.inc();
        self.metrics.active_tasks.dec();
        info!(
            task_index,
            digest = hex(digest.as_slice()),
            non_signers = non_signer_ids.len(),
            signature = %response.signers_agg_sig_g1,
            "task reached stake threshold"
        );
        if self.responses.send(response).is_err() {
            warn!(task_index, "response channel closed, aggregated response dropped");
        }
        Ok(SignatureStatus::Completed)
    }
}

/// Pairs quorum numbers with their thresholds, rejecting inconsistent input.
fn threshold_map(
    quorum_numbers: &[QuorumNum],
    quorum_threshold_percentages: &[ThresholdPercentage],
) -> Result<BTreeMap<QuorumNum, ThresholdPercentage>, AggregationError> {
    if quorum_numbers.is_empty() {
        return Err(AggregationError::InvalidTaskParameters(
            "a task needs at least one quorum".to_string(),
        ));
    }
    if quorum_numbers.len() != quorum_threshold_percentages.len() {
        return Err(AggregationError::InvalidTaskParameters(format!(
            "{} quorum numbers but {} threshold percentages",
            quorum_numbers.len(),
            quorum_threshold_percentages.len()
        )));
    }
    let mut thresholds = BTreeMap::new();
    for (quorum, threshold) in quorum_numbers.iter().zip(quorum_threshold_percentages) {
        if *threshold > 100 {
            return Err(AggregationError::InvalidTaskParameters(format!(
                "threshold {threshold}% for quorum {quorum} exceeds 100%"
            )));
        }
        if thresholds.insert(*quorum, *threshold).is_some() {
            return Err(AggregationError::InvalidTaskParameters(format!(
                "quorum {quorum} listed more than once"
            )));
        }
    }
    Ok(thresholds)
}

impl<R: AvsRegistry> BlsAggregation for BlsAggregator<R> {
    async fn initialize_new_task(
        &self,
        task_index: TaskIndex,
        task_created_block: BlockNumber,
        quorum_numbers: Vec<QuorumNum>,
        quorum_threshold_percentages: Vec<ThresholdPercentage>,
        time_to_expiry: Duration,
    ) -> Result<(), AggregationError> {
        let quorum_threshold_percentages =
            threshold_map(&quorum_numbers, &quorum_threshold_percentages)?;
        if self.tasks.read().await.contains_key(&task_index) {
            return Err(AggregationError::TaskAlreadyInitialized(task_index));
        }

        let (operators, quorums) = self
            .registry
            .get_operators_and_quorums_state_at_block(&quorum_numbers, task_created_block)
            .await
            .map_err(AggregationError::Registry)?;
        let mut total_stake_per_quorum = BTreeMap::new();
        let mut quorum_apks_g1 = Vec::with_capacity(quorum_numbers.len());
        for quorum in &quorum_numbers {
            let state = quorums.get(quorum).ok_or_else(|| {
                AggregationError::InvalidTaskParameters(format!(
                    "quorum {quorum} missing from the registry snapshot at block {task_created_block}"
                ))
            })?;
            total_stake_per_quorum.insert(*quorum, state.total_stake);
            quorum_apks_g1.push(state.agg_pub_key_g1);
        }
        let deadline = Instant::now().checked_add(time_to_expiry).ok_or_else(|| {
            AggregationError::InvalidTaskParameters(format!(
                "time to expiry {time_to_expiry:?} is out of range"
            ))
        })?;

        let mut tasks = self.tasks.write().await;
        let Entry::Vacant(slot) = tasks.entry(task_index) else {
            return Err(AggregationError::TaskAlreadyInitialized(task_index));
        };
        self.metrics.tasks_initialized.inc();
        self.metrics.active_tasks.inc();
        let metrics = self.metrics.clone();
        let response = SettledFuture::with_expiry_hook(deadline, move || {
            metrics.tasks_expired.inc();
            metrics.active_tasks.dec();
            warn!(task_index, "task expired before reaching its stake threshold");
        });
        info!(
            task_index,
            task_created_block,
            ?quorum_numbers,
            operators = operators.len(),
            ?time_to_expiry,
            "initialized task"
        );
        slot.insert(Arc::new(Task {
            task_created_block,
            quorum_numbers,
            quorum_threshold_percentages,
            operators,
            total_stake_per_quorum,
            quorum_apks_g1,
            response,
            state: Mutex::new(TaskState::default()),
        }));
        Ok(())
    }

    async fn process_new_signature(
        &self,
        task_index: TaskIndex,
        task_response: Bytes,
        signature: Signature,
        operator_id: OperatorId,
    ) -> Result<SignatureStatus, AggregationError> {
        let task = self.task(task_index).await?;
        let result = self
            .aggregate_signature(task_index, &task, task_response, signature, operator_id)
            .await;
        match &result {
            Ok(SignatureStatus::Accepted | SignatureStatus::Completed) => {
                self.metrics.signatures_processed.inc();
            }
            Ok(status) => {
                debug!(task_index, %operator_id, ?status, "signature for finished task ignored");
            }
            Err(err) => {
                self.metrics.signatures_rejected.inc();
                warn!(task_index, %operator_id, %err, "signature rejected");
            }
        }
        result
    }

    async fn get_aggregated_response(
        &self,
        task_index: TaskIndex,
    ) -> Result<AggregatedResponse, AggregationError> {
        let task = self.task(task_index).await?;
        task.response
            .wait()
            .await
            .map_err(|_| AggregationError::TaskExpired(task_index))
    }

    fn get_aggregated_response_channel(&self) -> AggregatedResponseReceiver {
        self.receiver.clone()
    }
}
