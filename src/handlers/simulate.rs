use std::sync::Arc;

use alloy_primitives::Bytes;
use anyhow::{Context, Result};
use commonware_utils::hex;
use prometheus_client::registry::Registry;
use tracing::{debug, info, warn};

use crate::aggregation::{
    AggregatedResponse, AggregationError, BlsAggregation, BlsAggregator, keccak_hasher,
};
use crate::config::Config;
use crate::metrics::AggregatorMetrics;
use crate::registry::InMemoryAvsRegistry;
use crate::types::{SignedTaskResponse, TaskIndex};

#[derive(Debug)]
pub enum SimulationOutcome {
    Completed(Box<AggregatedResponse>),
    Expired(TaskIndex),
}

/// Runs one task end to end against an in-memory registry built from the configured operators.
pub struct Simulation {
    config: Config,
}

impl Simulation {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Every configured operator with `sign: true` submits a signature, then the task's
    /// outcome is awaited. Engine metrics are registered in `metrics_registry`.
    ///
    /// # Errors
    ///
    /// Fails if the operators cannot be built or the task cannot be initialized.
    pub async fn run(self, metrics_registry: &mut Registry) -> Result<SimulationOutcome> {
        let operators = self.config.test_operators()?;
        let task = &self.config.task;
        let aggregator = BlsAggregator::new(
            Arc::new(InMemoryAvsRegistry::new(self.config.block_number, &operators)),
            keccak_hasher(),
            AggregatorMetrics::register(metrics_registry),
        );
        aggregator
            .initialize_new_task(
                task.task_index,
                self.config.block_number,
                task.quorum_numbers.clone(),
                task.quorum_threshold_percentages.clone(),
                task.time_to_expiry(),
            )
            .await
            .context("failed to initialize task")?;

        for (operator, operator_config) in operators.iter().zip(&self.config.operators) {
            if !operator_config.sign {
                debug!(operator_id = %operator.operator_id, "operator abstains");
                continue;
            }
            let response = operator_config.response.as_ref().unwrap_or(&task.response);
            let task_response = Bytes::copy_from_slice(response.as_bytes());
            let digest = aggregator.digest(&task_response);
            let submission = SignedTaskResponse {
                task_index: task.task_index,
                task_response,
                signature: operator.bls_key_pair.sign_message(digest.as_slice()),
                operator_id: operator.operator_id,
            };
            match aggregator.process_signed_response(submission).await {
                Ok(status) => info!(
                    operator_id = %operator.operator_id,
                    digest = hex(digest.as_slice()),
                    ?status,
                    "submitted signature"
                ),
                Err(err) => warn!(operator_id = %operator.operator_id, %err, "submission rejected"),
            }
        }

        match aggregator.get_aggregated_response(task.task_index).await {
            Ok(response) => Ok(SimulationOutcome::Completed(Box::new(response))),
            Err(AggregationError::TaskExpired(task_index)) => {
                Ok(SimulationOutcome::Expired(task_index))
            }
            Err(err) => Err(err.into()),
        }
    }
}
