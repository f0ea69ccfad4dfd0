//! Shared identifiers and the per-block operator/quorum snapshot consumed by the aggregator.

use std::collections::BTreeMap;

use alloy_primitives::{B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::{G1Point, G2Point, Signature};

pub type TaskIndex = u32;
pub type BlockNumber = u32;
pub type QuorumNum = u8;
pub type ThresholdPercentage = u8;
/// 32-byte operator id as assigned by the registry. Ordering is numeric.
pub type OperatorId = B256;
pub type Stake = U256;
/// Digest of a task response, the message operators sign.
pub type TaskResponseDigest = B256;

/// Operator snapshot at a reference block, keyed (and therefore ordered) by operator id.
pub type OperatorsAvsState = BTreeMap<OperatorId, OperatorAvsState>;
/// Quorum snapshot at a reference block.
pub type QuorumsAvsState = BTreeMap<QuorumNum, QuorumAvsState>;

/// Parses an unsigned 256-bit integer from a decimal or `0x`-prefixed hex string.
pub fn parse_u256(value: &str) -> Option<U256> {
    let value = value.trim();
    let (digits, radix) = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (value, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    U256::from_str_radix(digits, u64::from(radix)).ok()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorPubkeys {
    /// Used on-chain, where G1 arithmetic is cheap.
    pub g1_pub_key: G1Point,
    /// Used off-chain to verify signatures, which live on G1.
    pub g2_pub_key: G2Point,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInfo {
    pub socket: String,
    pub pub_keys: OperatorPubkeys,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorAvsState {
    pub operator_id: OperatorId,
    pub operator_info: OperatorInfo,
    /// Stake of the operator for each quorum it belongs to.
    pub stake_per_quorum: BTreeMap<QuorumNum, Stake>,
    pub block_number: BlockNumber,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumAvsState {
    pub quorum_number: QuorumNum,
    pub total_stake: Stake,
    /// Sum of the G1 keys of every operator registered in the quorum.
    pub agg_pub_key_g1: G1Point,
    pub block_number: BlockNumber,
}

/// Indices the on-chain signature checker needs to locate historical registry entries.
/// Produced by the registry and passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofIndices {
    pub non_signer_quorum_bitmap_indices: Vec<u32>,
    pub quorum_apk_indices: Vec<u32>,
    pub total_stake_indices: Vec<u32>,
    pub non_signer_stake_indices: Vec<Vec<u32>>,
}

/// A signature submission as it arrives from an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTaskResponse {
    pub task_index: TaskIndex,
    pub task_response: Bytes,
    pub signature: Signature,
    pub operator_id: OperatorId,
}
