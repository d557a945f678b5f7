//! Burst orchestrator
//!
//! Composes the entity store, request builder, dispatch engine and run log
//! into the two top-level operations: a traffic burst over existing
//! customers and a registration run that creates new ones.
//!
//! A burst always follows the same sequence: scan, sample, build, dispatch
//! the whole batch once, reconcile every sampled entity with a single store
//! write, then report.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;
use shared::{
    logging, process_debug, process_info, process_warn, ContextConfig, CorrelationId, EntityRecord, ProcessId,
};

use crate::core::{parse_registration, sampling, RequestBuilder, Sample, SyntheticCustomer};
use crate::dispatch::DispatchEngine;
use crate::error::OrchestratorResult;
use crate::traits::{EntityStore, RunLogSink, Transport};
use crate::types::{
    BurstPlan, BurstSummary, DispatchOutcome, DispatchRequest, DispatchResult, EntityUpdate, RegistrationPlan,
    RegistrationSummary, ResponseBody, RunLogEntry,
};

/// Runs bursts and registrations for one context
pub struct BurstOrchestrator<S, T, L>
where
    S: EntityStore + 'static,
    T: Transport + 'static,
    L: RunLogSink + 'static,
{
    process_id: ProcessId,
    builder: RequestBuilder,

    /// Injected services
    store: S,
    engine: DispatchEngine<T>,
    run_log: L,
}

/// Success/failure counts of one dispatched batch
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

impl<S, T, L> BurstOrchestrator<S, T, L>
where
    S: EntityStore + 'static,
    T: Transport + 'static,
    L: RunLogSink + 'static,
{
    pub fn new(config: &ContextConfig, store: S, engine: DispatchEngine<T>, run_log: L) -> Self {
        Self {
            process_id: ProcessId::Orchestrator(config.context),
            builder: RequestBuilder::new(config),
            store,
            engine,
            run_log,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    /// Sample the stored customers and send the plan's traffic for each of them.
    ///
    /// Dispatch failures are counted in the summary, never returned as errors.
    /// Store failures (scan or reconciliation) are returned.
    pub async fn run_burst(&self, plan: &BurstPlan) -> OrchestratorResult<BurstSummary> {
        plan.validate()?;
        if plan.flag_anomalous {
            self.builder.require_core()?;
        }

        let started_at = Utc::now();
        let candidates = self.store.scan_recent_first().await?;
        process_info!(
            self.process_id,
            "📋 {} customers in {}, sampling with {}",
            candidates.len(),
            self.store.collection(),
            plan.policy
        );

        self.burst_over(&candidates, plan, started_at).await
    }

    /// Create a random number of customers and store the ones the platform accepted
    pub async fn register_customers(&self, plan: &RegistrationPlan) -> OrchestratorResult<RegistrationSummary> {
        plan.validate()?;
        self.builder.require_core()?;

        let requests = self.prepare_registration(plan)?;
        process_info!(self.process_id, "👶 Registering {} customers", requests.len());

        let results = self.engine.dispatch(&requests).await;
        let registered_at = Utc::now();

        let records: Vec<EntityRecord> = results
            .iter()
            .filter_map(|result| match &result.outcome {
                DispatchOutcome::Success { body: ResponseBody::Json(body), .. } => {
                    let parsed = parse_registration(body);
                    if parsed.is_none() {
                        process_warn!(
                            self.process_id,
                            "⚠️ {} succeeded but carried no user id",
                            result.correlation_id
                        );
                    }
                    parsed
                }
                _ => None,
            })
            .map(|(entity_id, email)| {
                let record = EntityRecord::new(entity_id, registered_at);
                match email {
                    Some(email) => record.with_email(email),
                    None => record,
                }
            })
            .collect();

        let inserted = if records.is_empty() {
            0
        } else {
            self.store.insert_many(records.clone()).await?
        };
        process_info!(
            self.process_id,
            "💾 Stored {} of {} registered customers in {}",
            inserted,
            records.len(),
            self.store.collection()
        );

        let artifact = if plan.persist_log {
            self.persist("customers", &requests, &results).await
        } else {
            None
        };

        let first_transactions = if plan.send_first_transactions && !records.is_empty() {
            let burst = BurstPlan::first_transactions().with_persist_log(plan.persist_log);
            Some(self.burst_over(&records, &burst, Utc::now()).await?)
        } else {
            None
        };

        let summary = RegistrationSummary {
            context: self.builder.context(),
            requested: requests.len(),
            registered: records.len(),
            failed: requests.len() - records.len(),
            inserted,
            artifact,
            first_transactions,
        };
        logging::log_success(&self.process_id, &summary.to_string());
        Ok(summary)
    }

    async fn burst_over(
        &self,
        candidates: &[EntityRecord],
        plan: &BurstPlan,
        started_at: DateTime<Utc>,
    ) -> OrchestratorResult<BurstSummary> {
        let (sample, requests) = self.prepare_burst(candidates, plan)?;
        if sample.is_empty() {
            process_info!(self.process_id, "📭 No customers to sample, nothing sent");
            return Ok(BurstSummary::empty(self.builder.context(), started_at, candidates.len()));
        }
        if let Some(fraction) = sample.fraction {
            process_debug!(
                self.process_id,
                "🎯 Sampled {} of {} (fraction {:.4})",
                sample.len(),
                candidates.len(),
                fraction
            );
        }

        let results = self.engine.dispatch(&requests).await;
        let tally = self.tally(&requests, &results);

        // Every sampled customer is reconciled with the burst start, whatever its calls returned
        let updates: Vec<EntityUpdate> = sample
            .records
            .iter()
            .map(|record| EntityUpdate {
                entity_id: record.entity_id.clone(),
                last_activity_timestamp: started_at,
                flag: plan.flag_anomalous,
            })
            .collect();
        let reconciled = match self.store.apply_updates(updates).await {
            Ok(matched) => matched,
            Err(e) => {
                logging::log_error(&self.process_id, "Reconciliation", &e);
                return Err(e);
            }
        };

        let artifact = if plan.persist_log {
            let kind = if plan.flag_anomalous { "anomalies" } else { "transactions" };
            self.persist(kind, &requests, &results).await
        } else {
            None
        };

        let summary = BurstSummary {
            context: self.builder.context(),
            started_at,
            candidates_seen: candidates.len(),
            sampled_count: sample.len(),
            dispatched_count: requests.len(),
            success_count: tally.succeeded,
            failure_count: tally.failed,
            reconciled_count: reconciled,
            flagged: plan.flag_anomalous,
            artifact,
        };
        logging::log_success(&self.process_id, &summary.to_string());
        Ok(summary)
    }

    /// Sample and build every request of a burst. Synchronous so the thread-local
    /// rng never lives across an await.
    fn prepare_burst<'a>(
        &self,
        candidates: &'a [EntityRecord],
        plan: &BurstPlan,
    ) -> OrchestratorResult<(Sample<'a>, Vec<DispatchRequest>)> {
        let mut rng = rand::thread_rng();
        let sample = sampling::sample(candidates, &plan.policy, &mut rng);

        let per_entity = plan.transactions_per_entity as usize + usize::from(plan.flag_anomalous);
        let mut requests = Vec::with_capacity(sample.len() * per_entity);
        let now = Utc::now();
        for record in sample.records {
            for _ in 0..plan.transactions_per_entity {
                requests.push(self.builder.transaction(&record.entity_id, now, &mut rng));
            }
            if plan.flag_anomalous {
                requests.push(self.builder.profile_update(&record.entity_id)?);
            }
        }

        Ok((sample, requests))
    }

    fn prepare_registration(&self, plan: &RegistrationPlan) -> OrchestratorResult<Vec<DispatchRequest>> {
        let mut rng = rand::thread_rng();
        let count = rng.gen_range(plan.min_customers..=plan.max_customers);
        let today = Utc::now().date_naive();

        (0..count)
            .map(|_| self.builder.customer_create(&SyntheticCustomer::generate(&mut rng, today)))
            .collect()
    }

    /// Count outcomes, checking every result against the request it answers
    fn tally(&self, requests: &[DispatchRequest], results: &[DispatchResult]) -> Tally {
        let sent: HashSet<CorrelationId> = requests.iter().map(|request| request.correlation_id).collect();

        let mut tally = Tally::default();
        let mut answered = 0;
        for result in results {
            if !sent.contains(&result.correlation_id) {
                process_warn!(self.process_id, "⚠️ Result {} matches no request", result.correlation_id);
                continue;
            }
            answered += 1;
            if result.is_success() {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }
        }

        // Unanswered requests count as failures
        if answered < requests.len() {
            process_warn!(self.process_id, "⚠️ {} requests produced no result", requests.len() - answered);
            tally.failed += requests.len() - answered;
        }
        tally
    }

    /// Write the run artifact; a failed write is logged and leaves the run intact
    async fn persist(&self, kind: &str, requests: &[DispatchRequest], results: &[DispatchResult]) -> Option<PathBuf> {
        let by_id: HashMap<CorrelationId, &DispatchResult> =
            results.iter().map(|result| (result.correlation_id, result)).collect();
        let entries: Vec<RunLogEntry> = requests
            .iter()
            .filter_map(|request| by_id.get(&request.correlation_id).map(|result| RunLogEntry::new(request, result)))
            .collect();

        match self.run_log.persist(kind, entries).await {
            Ok(path) => {
                process_info!(self.process_id, "📝 Run log written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                logging::log_error(&self.process_id, "Writing run log", &e);
                None
            }
        }
    }
}
