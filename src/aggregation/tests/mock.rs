use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alloy_primitives::Bytes;
use anyhow::{Result, bail};

use crate::aggregation::BlsAggregator;
use crate::crypto::{KeyPair, Signature};
use crate::registry::{AvsRegistry, InMemoryAvsRegistry, TestOperator};
use crate::types::{
    BlockNumber, OperatorId, OperatorsAvsState, ProofIndices, QuorumNum, QuorumsAvsState, Stake,
};

pub const BLOCK: BlockNumber = 1;

/// Operator with a fixed key and the given stake per quorum.
pub fn test_operator(key_hex: &str, stakes: &[(QuorumNum, u64)]) -> TestOperator {
    let bls_key_pair = KeyPair::from_hex(key_hex).unwrap();
    TestOperator {
        operator_id: bls_key_pair.operator_id(),
        stake_per_quorum: stakes
            .iter()
            .map(|&(quorum, stake)| (quorum, Stake::from(stake)))
            .collect(),
        bls_key_pair,
    }
}

/// Signature of `operator` over the digest the aggregator expects for `response`.
pub fn sign<R: AvsRegistry>(
    aggregator: &BlsAggregator<R>,
    operator: &TestOperator,
    response: &Bytes,
) -> Signature {
    operator
        .bls_key_pair
        .sign_message(aggregator.digest(response).as_slice())
}

pub fn in_memory_aggregator(operators: &[TestOperator]) -> BlsAggregator<InMemoryAvsRegistry> {
    BlsAggregator::with_keccak(Arc::new(InMemoryAvsRegistry::new(BLOCK, operators)))
}

/// Registry whose checker-indices lookup can be made to fail, and which returns recognizable
/// indices otherwise.
pub struct MockRegistry {
    inner: InMemoryAvsRegistry,
    pub fail_indices: AtomicBool,
    pub indices_calls: AtomicUsize,
}

impl MockRegistry {
    pub fn new(operators: &[TestOperator]) -> Self {
        Self {
            inner: InMemoryAvsRegistry::new(BLOCK, operators),
            fail_indices: AtomicBool::new(false),
            indices_calls: AtomicUsize::new(0),
        }
    }

    pub fn proof_indices(non_signers: usize) -> ProofIndices {
        ProofIndices {
            non_signer_quorum_bitmap_indices: vec![7; non_signers],
            quorum_apk_indices: vec![3],
            total_stake_indices: vec![4],
            non_signer_stake_indices: vec![vec![5; non_signers]],
        }
    }
}

impl AvsRegistry for MockRegistry {
    async fn get_operators_and_quorums_state_at_block(
        &self,
        quorum_numbers: &[QuorumNum],
        block_number: BlockNumber,
    ) -> Result<(OperatorsAvsState, QuorumsAvsState)> {
        self.inner
            .get_operators_and_quorums_state_at_block(quorum_numbers, block_number)
            .await
    }

    async fn get_check_signatures_indices(
        &self,
        _reference_block: BlockNumber,
        _quorum_numbers: &[QuorumNum],
        non_signer_operator_ids: &[OperatorId],
    ) -> Result<ProofIndices> {
        self.indices_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_indices.load(Ordering::SeqCst) {
            bail!("indices lookup unavailable");
        }
        Ok(Self::proof_indices(non_signer_operator_ids.len()))
    }
}
