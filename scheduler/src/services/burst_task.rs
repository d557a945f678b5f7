//! In-process burst job

use std::sync::Arc;

use orchestrator::{BurstOrchestrator, BurstPlan, EntityStore, RunLogSink, Transport};

use crate::error::SchedulerResult;
use crate::job::JobTask;

/// Runs one orchestrator burst per fire
pub struct BurstTask<S, T, L>
where
    S: EntityStore + 'static,
    T: Transport + 'static,
    L: RunLogSink + 'static,
{
    orchestrator: Arc<BurstOrchestrator<S, T, L>>,
    plan: BurstPlan,
}

impl<S, T, L> BurstTask<S, T, L>
where
    S: EntityStore + 'static,
    T: Transport + 'static,
    L: RunLogSink + 'static,
{
    pub fn new(orchestrator: Arc<BurstOrchestrator<S, T, L>>, plan: BurstPlan) -> Self {
        Self { orchestrator, plan }
    }
}

#[async_trait::async_trait]
impl<S, T, L> JobTask for BurstTask<S, T, L>
where
    S: EntityStore + 'static,
    T: Transport + 'static,
    L: RunLogSink + 'static,
{
    fn describe(&self) -> String {
        let kind = if self.plan.flag_anomalous { "anomaly" } else { "transaction" };
        format!("{kind} burst ({})", self.plan.policy)
    }

    async fn run(&self) -> SchedulerResult<String> {
        let summary = self.orchestrator.run_burst(&self.plan).await?;
        Ok(summary.to_string())
    }
}
