use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alloy_primitives::{Bytes, U256, U512};
use futures::Stream;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::crypto::{G1Point, G2CoordinateOrder, G2Point, Signature};
use crate::types::{
    OperatorAvsState, OperatorId, ProofIndices, QuorumNum, Stake, TaskIndex, TaskResponseDigest,
    ThresholdPercentage,
};

/// Running aggregate for one candidate response digest of a task.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestAggregate {
    /// Sum of the G2 keys of everyone who signed this digest.
    pub signers_apk_g2: G2Point,
    /// Sum of their signatures.
    pub signers_agg_sig_g1: Signature,
    pub signers_operator_ids: BTreeSet<OperatorId>,
    /// Signed stake per quorum.
    pub signers_total_stake_per_quorum: BTreeMap<QuorumNum, Stake>,
}

impl DigestAggregate {
    /// Folds one verified signer into the aggregate.
    pub fn add_signer(&mut self, operator: &OperatorAvsState, signature: &Signature) {
        self.signers_agg_sig_g1 = self.signers_agg_sig_g1.add(signature);
        self.signers_apk_g2 = self
            .signers_apk_g2
            .add(&operator.operator_info.pub_keys.g2_pub_key);
        self.signers_operator_ids.insert(operator.operator_id);
        for (quorum, stake) in &operator.stake_per_quorum {
            let total = self
                .signers_total_stake_per_quorum
                .entry(*quorum)
                .or_default();
            *total = total.saturating_add(*stake);
        }
    }
}

/// `signed * 100 >= total * threshold`, evaluated without any loss of precision.
pub fn stake_threshold_met(signed: Stake, total: Stake, threshold: ThresholdPercentage) -> bool {
    U512::from(signed) * U512::from(100u8) >= U512::from(total) * U512::from(threshold)
}

/// The quorum certificate for a completed task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResponse {
    pub task_index: TaskIndex,
    pub task_response: Bytes,
    pub task_response_digest: TaskResponseDigest,
    /// G1 keys of eligible operators that did not sign, ordered by operator id.
    pub non_signers_pub_keys_g1: Vec<G1Point>,
    /// Aggregate G1 key of each task quorum, in the task's quorum order.
    pub quorum_apks_g1: Vec<G1Point>,
    pub signers_apk_g2: G2Point,
    pub signers_agg_sig_g1: Signature,
    #[serde(flatten)]
    pub proof_indices: ProofIndices,
}

/// Argument layout of the on-chain `NonSignerStakesAndSignature` struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonSignerStakesAndSignature {
    pub non_signer_quorum_bitmap_indices: Vec<u32>,
    pub non_signer_pubkeys: Vec<(U256, U256)>,
    pub quorum_apks: Vec<(U256, U256)>,
    pub apk_g2: ([U256; 2], [U256; 2]),
    pub sigma: (U256, U256),
    pub quorum_apk_indices: Vec<u32>,
    pub total_stake_indices: Vec<u32>,
    pub non_signer_stake_indices: Vec<Vec<u32>>,
}

impl AggregatedResponse {
    /// Flattens the certificate into the integer tuples expected by the signature checker.
    pub fn to_signature_checker_input(&self) -> NonSignerStakesAndSignature {
        NonSignerStakesAndSignature {
            non_signer_quorum_bitmap_indices: self
                .proof_indices
                .non_signer_quorum_bitmap_indices
                .clone(),
            non_signer_pubkeys: self
                .non_signers_pub_keys_g1
                .iter()
                .map(G1Point::to_tuple)
                .collect(),
            quorum_apks: self.quorum_apks_g1.iter().map(G1Point::to_tuple).collect(),
            apk_g2: self.signers_apk_g2.to_tuple(G2CoordinateOrder::Ba),
            sigma: self.signers_agg_sig_g1.point().to_tuple(),
            quorum_apk_indices: self.proof_indices.quorum_apk_indices.clone(),
            total_stake_indices: self.proof_indices.total_stake_indices.clone(),
            non_signer_stake_indices: self.proof_indices.non_signer_stake_indices.clone(),
        }
    }
}

/// Non-error result of submitting a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Aggregated; the task is still below threshold.
    Accepted,
    /// This signature pushed the task over threshold.
    Completed,
    /// The task had already completed; nothing changed.
    AlreadyResponded,
    /// The task expired; nothing changed.
    Expired,
}

/// Shared consumer handle of the engine's completion queue.
///
/// Clones drain the same queue, so each response is delivered to exactly one of them, in
/// completion order.
#[derive(Clone, Debug)]
pub struct AggregatedResponseReceiver {
    inner: Arc<Mutex<mpsc::UnboundedReceiver<AggregatedResponse>>>,
}

impl AggregatedResponseReceiver {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<AggregatedResponse>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Next completed response, `None` once the engine is gone and the queue is drained.
    pub async fn recv(&self) -> Option<AggregatedResponse> {
        self.inner.lock().await.recv().await
    }

    /// Completed responses that are already queued, without waiting.
    pub fn try_recv(&self) -> Option<AggregatedResponse> {
        self.inner.try_lock().ok()?.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = AggregatedResponse> {
        futures::stream::unfold(self, |receiver| async move {
            let next = receiver.recv().await?;
            Some((next, receiver))
        })
    }
}
