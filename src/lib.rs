//! Off-chain BLS signature aggregation for stake-weighted operator quorums on BN254.

pub mod aggregation;
pub mod config;
pub mod crypto;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod types;
