//! Fire timing and failure handling of the scheduler loop, on paused tokio time

mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::*;
use scheduler::{JobDefinition, JobOutcome, JobSetSettings, JobState, Scheduler, TokioClock, Trigger};

const HOUR: Duration = Duration::from_secs(3600);

fn at(h: u32, m: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_bounded_interval_fires_until_cutoff() {
    let task = ScriptedTask::new().shared();
    let mut scheduler = paused_scheduler();
    let trigger = Trigger::bounded_interval(HOUR, at(9, 0), at(12, 0)).unwrap();
    scheduler.add_job(JobDefinition::new("hourly_job_today", trigger, task.clone())).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let handle = spawn(scheduler);
    tokio::time::sleep(HOUR * 5).await;
    shutdown.send(()).await.unwrap();
    let scheduler = handle.await.unwrap();

    let fired: Vec<_> = ledger.records().await.iter().map(|record| record.scheduled_for).collect();
    assert_eq!(fired, [at(9, 0), at(10, 0), at(11, 0), at(12, 0)]);
    assert_eq!(task.runs(), 4);
    assert_eq!(scheduler.job_state("hourly_job_today"), Some(&JobState::Removed));
}

#[tokio::test(start_paused = true)]
async fn test_immediate_and_cron_jobs_together() {
    let task = ScriptedTask::new().shared();
    let mut scheduler = paused_scheduler();
    scheduler.add_job(JobDefinition::new("immediate_job", Trigger::Immediate, task.clone())).unwrap();
    scheduler.add_job(JobDefinition::new("hourly_job", Trigger::cron("30 9-17 * * *").unwrap(), task.clone())).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let handle = spawn(scheduler);
    tokio::time::sleep(HOUR * 2).await;
    shutdown.send(()).await.unwrap();
    let scheduler = handle.await.unwrap();

    assert_eq!(ledger.records_for("immediate_job").await.len(), 1);
    let hourly: Vec<_> = ledger.records_for("hourly_job").await.iter().map(|record| record.scheduled_for).collect();
    assert_eq!(hourly, [at(9, 30), at(10, 30)]);
    assert_eq!(scheduler.job_state("hourly_job"), Some(&JobState::Scheduled { next_fire: at(11, 30) }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_and_panicking_runs_do_not_stop_later_fires() {
    let task = ScriptedTask::new().failing_on(0).panicking_on(1).shared();
    let mut scheduler = paused_scheduler();
    scheduler.add_job(JobDefinition::new("every_ten", Trigger::cron("*/10 * * * *").unwrap(), task.clone())).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let handle = spawn(scheduler);
    tokio::time::sleep(Duration::from_secs(25 * 60)).await;
    shutdown.send(()).await.unwrap();
    handle.await.unwrap();

    let records = ledger.records_for("every_ten").await;
    assert_eq!(records.len(), 3);
    match &records[0].outcome {
        JobOutcome::Failed { error } => assert!(error.contains("run 0 failed")),
        other => panic!("expected failure, got {other:?}"),
    }
    match &records[1].outcome {
        JobOutcome::Failed { error } => assert!(error.contains("run 1 blew up")),
        other => panic!("expected panic to be recorded, got {other:?}"),
    }
    assert_eq!(records[2].outcome, JobOutcome::Completed { output: "run 2 ok".to_string() });
    assert_eq!(records[2].scheduled_for, at(9, 20));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_fires_of_a_slow_job() {
    // Each run outlasts the period; the next fire still happens on time
    let task = ScriptedTask::new().taking(Duration::from_secs(90 * 60)).shared();
    let mut scheduler = paused_scheduler();
    let trigger = Trigger::bounded_interval(HOUR, at(9, 0), at(10, 0)).unwrap();
    scheduler.add_job(JobDefinition::new("slow", trigger, task.clone())).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let handle = spawn(scheduler);
    tokio::time::sleep(HOUR + Duration::from_secs(60)).await;
    assert_eq!(task.runs(), 2);
    assert_eq!(ledger.running("slow").await, 2);
    assert!(ledger.is_empty().await);

    shutdown.send(()).await.unwrap();
    handle.await.unwrap();

    let records = ledger.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(ledger.running("slow").await, 0);
    assert!(records.iter().all(|record| record.duration == Duration::from_secs(90 * 60)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_job() {
    let task = ScriptedTask::new().taking(Duration::from_secs(600)).shared();
    let mut scheduler = paused_scheduler();
    scheduler.add_job(JobDefinition::new("immediate_job", Trigger::Immediate, task.clone())).unwrap();
    scheduler.add_job(JobDefinition::new("hourly_job", Trigger::cron("5 * * * *").unwrap(), task.clone())).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let started = tokio::time::Instant::now();
    let handle = spawn(scheduler);
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.send(()).await.unwrap();
    let scheduler = handle.await.unwrap();

    // No new fires after the signal, but the running job finished
    assert_eq!(task.runs(), 1);
    assert!(started.elapsed() >= Duration::from_secs(600));
    assert_eq!(scheduler.in_flight(), 0);

    let records = ledger.records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].outcome.is_success());
    assert_eq!(records[0].finished_at - records[0].started_at, chrono::Duration::seconds(600));
}

#[tokio::test(start_paused = true)]
async fn test_default_job_set_at_half_past_four() {
    let task = ScriptedTask::new().shared();
    let start = at(16, 30);
    let mut scheduler = Scheduler::new(TokioClock::starting_at(start));
    scheduler.add_jobs(JobSetSettings::default().build(start, task.clone()).unwrap()).unwrap();
    let ledger = scheduler.ledger();
    let shutdown = scheduler.get_shutdown_sender();

    let handle = spawn(scheduler);
    tokio::time::sleep(HOUR * 2).await;
    shutdown.send(()).await.unwrap();
    let scheduler = handle.await.unwrap();

    assert_eq!(ledger.records_for("immediate_job").await.len(), 1);
    // One fire at start; 17:30 would pass the cutoff
    let today: Vec<_> = ledger.records_for("hourly_job_today").await.iter().map(|r| r.scheduled_for).collect();
    assert_eq!(today, [at(16, 30)]);
    let hourly: Vec<_> = ledger.records_for("hourly_job").await.iter().map(|r| r.scheduled_for).collect();
    assert_eq!(hourly, [at(17, 0)]);
    assert_eq!(
        scheduler.job_state("hourly_job"),
        Some(&JobState::Scheduled { next_fire: Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap() })
    );
    assert_eq!(task.runs(), 3);
}
