//! Access to the operator registry at a reference block.
//!
//! The aggregator never reads chain state itself. It asks an [`AvsRegistry`] for the
//! operator and quorum snapshot when a task is created, and for the checker indices when
//! a task completes.

mod in_memory;

pub use in_memory::{InMemoryAvsRegistry, TestOperator};

use std::future::Future;

use anyhow::Result;

use crate::crypto::G1Point;
use crate::types::{
    BlockNumber, OperatorId, OperatorsAvsState, ProofIndices, QuorumAvsState, QuorumNum,
    QuorumsAvsState, Stake,
};

pub trait AvsRegistry: Send + Sync + 'static {
    /// Operators registered in any of `quorum_numbers` at `block_number`, with their stakes,
    /// and the per-quorum totals and aggregate keys for the same block.
    fn get_operators_and_quorums_state_at_block(
        &self,
        quorum_numbers: &[QuorumNum],
        block_number: BlockNumber,
    ) -> impl Future<Output = Result<(OperatorsAvsState, QuorumsAvsState)>> + Send;

    /// Indices used by the on-chain checker to verify a certificate with the given non-signers.
    fn get_check_signatures_indices(
        &self,
        reference_block: BlockNumber,
        quorum_numbers: &[QuorumNum],
        non_signer_operator_ids: &[OperatorId],
    ) -> impl Future<Output = Result<ProofIndices>> + Send;
}

/// Derives quorum totals from an operator snapshot.
///
/// Only operators holding a stake entry for a quorum contribute to that quorum's total
/// stake and aggregate G1 key.
pub fn quorums_state_from_operators(
    quorum_numbers: &[QuorumNum],
    operators: &OperatorsAvsState,
    block_number: BlockNumber,
) -> QuorumsAvsState {
    quorum_numbers
        .iter()
        .map(|&quorum_number| {
            let (total_stake, agg_pub_key_g1) = operators
                .values()
                .filter_map(|operator| {
                    operator
                        .stake_per_quorum
                        .get(&quorum_number)
                        .map(|stake| (stake, &operator.operator_info.pub_keys.g1_pub_key))
                })
                .fold(
                    (Stake::ZERO, G1Point::zero()),
                    |(total, apk), (stake, key)| (total.saturating_add(*stake), apk.add(key)),
                );
            (
                quorum_number,
                QuorumAvsState {
                    quorum_number,
                    total_stake,
                    agg_pub_key_g1,
                    block_number,
                },
            )
        })
        .collect()
}
