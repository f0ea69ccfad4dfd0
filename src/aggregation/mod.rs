//! Task bookkeeping and signature aggregation.

mod error;
mod service;
mod settled;
mod traits;
mod types;

pub use error::AggregationError;
pub use service::{BlsAggregator, TaskResponseHasher, keccak_hasher};
pub use settled::{Expired, SettledFuture};
pub use traits::BlsAggregation;
pub use types::{
    AggregatedResponse, AggregatedResponseReceiver, DigestAggregate, NonSignerStakesAndSignature,
    SignatureStatus, stake_threshold_met,
};

#[cfg(test)]
mod tests;
