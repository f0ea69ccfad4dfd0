use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, anyhow};
use tracing::debug;

use super::{AvsRegistry, quorums_state_from_operators};
use crate::crypto::KeyPair;
use crate::types::{
    BlockNumber, OperatorAvsState, OperatorId, OperatorInfo, OperatorPubkeys, OperatorsAvsState,
    ProofIndices, QuorumNum, QuorumsAvsState, Stake,
};

/// Operator definition for a fixed, locally known operator set.
#[derive(Clone, Debug)]
pub struct TestOperator {
    pub operator_id: OperatorId,
    pub stake_per_quorum: BTreeMap<QuorumNum, Stake>,
    pub bls_key_pair: KeyPair,
}

/// Registry serving a fixed operator set for a single block. Checker indices are empty.
pub struct InMemoryAvsRegistry {
    operators: HashMap<BlockNumber, OperatorsAvsState>,
}

impl InMemoryAvsRegistry {
    pub fn new(block_number: BlockNumber, operators: &[TestOperator]) -> Self {
        let state = operators
            .iter()
            .map(|operator| {
                (
                    operator.operator_id,
                    OperatorAvsState {
                        operator_id: operator.operator_id,
                        operator_info: OperatorInfo {
                            socket: "localhost:9090".to_string(),
                            pub_keys: OperatorPubkeys {
                                g1_pub_key: *operator.bls_key_pair.pub_g1(),
                                g2_pub_key: *operator.bls_key_pair.pub_g2(),
                            },
                        },
                        stake_per_quorum: operator.stake_per_quorum.clone(),
                        block_number,
                    },
                )
            })
            .collect();
        Self {
            operators: HashMap::from([(block_number, state)]),
        }
    }
}

impl AvsRegistry for InMemoryAvsRegistry {
    async fn get_operators_and_quorums_state_at_block(
        &self,
        quorum_numbers: &[QuorumNum],
        block_number: BlockNumber,
    ) -> Result<(OperatorsAvsState, QuorumsAvsState)> {
        let all = self
            .operators
            .get(&block_number)
            .ok_or_else(|| anyhow!("no data for block {block_number}"))?;
        let operators: OperatorsAvsState = all
            .iter()
            .filter(|(_, operator)| {
                quorum_numbers
                    .iter()
                    .any(|quorum| operator.stake_per_quorum.contains_key(quorum))
            })
            .map(|(id, operator)| (*id, operator.clone()))
            .collect();
        let quorums = quorums_state_from_operators(quorum_numbers, &operators, block_number);
        debug!(
            block_number,
            operators = operators.len(),
            quorums = quorums.len(),
            "served registry snapshot"
        );
        Ok((operators, quorums))
    }

    async fn get_check_signatures_indices(
        &self,
        _reference_block: BlockNumber,
        _quorum_numbers: &[QuorumNum],
        _non_signer_operator_ids: &[OperatorId],
    ) -> Result<ProofIndices> {
        Ok(ProofIndices::default())
    }
}
