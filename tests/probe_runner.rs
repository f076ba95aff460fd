//! Integration tests for the probe runner against a scripted target

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{ScriptedTarget, StaticLogs, count_probe, info_probe, ping_probe};
use pglab_probe::probe::{
    self, Action, Aggregate, FailureKind, Outcome, Predicate, Probe, ProbeRunner, RetryPolicy,
    RetryWaiter, RunPhase, Termination, WaitOutcome, WaitProgress,
};
use tokio_util::sync::CancellationToken;

fn runner(target: Arc<ScriptedTarget>) -> ProbeRunner {
    ProbeRunner::new(target)
        .with_policy(RetryPolicy::from_secs(5, 1, 2))
        .with_probe_timeout(Duration::from_secs(3))
}

#[tokio::test]
async fn test_all_passing_probes_succeed_in_order() {
    let target = Arc::new(
        ScriptedTarget::new()
            .with_count("tables", 5)
            .with_count("indexes", 12)
            .with_count("extensions", 2),
    );
    let probes = vec![
        ping_probe(),
        count_probe("demo tables", "tables", 5),
        count_probe("indexes", "indexes", 1),
        count_probe("extensions", "extensions", 1),
    ];

    let result = runner(target).run(&probes).await;

    assert_eq!(result.aggregate(), Aggregate::Success);
    assert_eq!(result.total(), probes.len());
    let names: Vec<_> = result.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["database connection", "demo tables", "indexes", "extensions"]);
    assert_eq!(result.termination(), &Termination::Exhausted);
    assert_eq!(result.phase(), RunPhase::Completed(Aggregate::Success));
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_stops_the_run() {
    let target = Arc::new(ScriptedTarget::new().unreachable().with_count("tables", 5));
    let logs = Arc::new(StaticLogs::new("FATAL:  the database system is starting up"));
    let probes = vec![ping_probe(), count_probe("demo tables", "tables", 5)];

    let result = runner(target.clone())
        .with_log_source(logs.clone())
        .run(&probes)
        .await;

    assert_eq!(result.total(), 1);
    let record = &result.records()[0];
    assert_eq!(record.outcome, Outcome::Fail);
    assert!(record.elapsed >= Duration::from_secs(5));
    assert!(record.elapsed <= Duration::from_secs(6));
    match &record.failure {
        Some(FailureKind::ReadinessTimeout { last_error, .. }) => {
            assert_eq!(last_error.as_deref(), Some("connection failed: connection refused"));
        }
        other => panic!("expected readiness timeout, got {:?}", other),
    }

    // Nothing but readiness attempts reached the target
    assert!(target.calls().iter().all(|call| call == "ping"));

    assert_eq!(result.phase(), RunPhase::Failed);
    assert_eq!(
        result.termination(),
        &Termination::Fatal {
            probe: "database connection".into()
        }
    );
    assert_eq!(logs.fetched(), 1);
    assert!(result.diagnostics().unwrap().contains("starting up"));
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_target_ready_at_ten_seconds() {
    let target = ScriptedTarget::new().ready_after(Duration::from_secs(10));
    let waiter = RetryWaiter::new(
        RetryPolicy::from_secs(60, 2, 10),
        Duration::from_secs(10),
        CancellationToken::new(),
    );

    let outcome = waiter.wait_until_ready(&ping_probe(), &target).await;

    assert_eq!(outcome.outcome(), Outcome::Pass);
    assert!(outcome.elapsed() >= Duration::from_secs(10));
    assert!(outcome.elapsed() < Duration::from_secs(12));
    assert_eq!(outcome.attempts(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_progress_follows_elapsed_time_not_attempts() {
    let target = ScriptedTarget::new().unreachable();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let waiter = RetryWaiter::new(
        RetryPolicy::from_secs(60, 2, 10),
        Duration::from_secs(10),
        CancellationToken::new(),
    )
    .on_progress(Some(Arc::new(move |_: &WaitProgress| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    let outcome = waiter.wait_until_ready(&ping_probe(), &target).await;

    assert!(matches!(outcome, WaitOutcome::TimedOut { .. }));
    // 31 attempts, but progress only at 10s, 20s, 30s, 40s and 50s
    assert_eq!(outcome.attempts(), 31);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert!(outcome.elapsed() <= RetryPolicy::from_secs(60, 2, 10).upper_bound());
}

#[tokio::test]
async fn test_assertion_failure_does_not_hide_later_probes() {
    let target = Arc::new(
        ScriptedTarget::new()
            .with_count("tables", 3)
            .with_count("activity", 1),
    );
    let probes = vec![
        ping_probe(),
        count_probe("demo tables exist", "tables", 5),
        count_probe("monitoring query", "activity", 1),
    ];

    let result = runner(target).run(&probes).await;

    assert_eq!(result.total(), 3);
    assert_eq!(result.aggregate(), Aggregate::Failed);
    assert_eq!(result.records()[2].outcome, Outcome::Pass);

    let failed = &result.records()[1];
    assert_eq!(failed.outcome, Outcome::Fail);
    assert_eq!(failed.failure, Some(FailureKind::AssertionFailure));
    assert_eq!(
        failed.message,
        "demo tables exist: expected at least 5, observed 3"
    );
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn test_later_readiness_failure_is_fatal() {
    let target = Arc::new(ScriptedTarget::new().with_count("tables", 5));
    let probes = vec![
        ping_probe(),
        count_probe("demo tables", "tables", 5),
        Probe::readiness(
            "replica reachable",
            Action::Count {
                sql: "replica".to_string(),
            },
        ),
        count_probe("demo tables again", "tables", 5),
    ];

    let result = runner(target).run(&probes).await;

    assert_eq!(result.total(), 3);
    let record = &result.records()[2];
    assert_eq!(record.outcome, Outcome::Fail);
    assert_eq!(record.failure, Some(FailureKind::ReadinessFailure));
    assert_eq!(
        result.termination(),
        &Termination::Fatal {
            probe: "replica reachable".into()
        }
    );
    assert_eq!(result.phase(), RunPhase::Failed);
}

#[tokio::test]
async fn test_informational_failures_only_warn() {
    let target = Arc::new(ScriptedTarget::new().with_count("buffercache", 0));
    let probes = vec![
        ping_probe(),
        info_probe("extension pg_buffercache", "buffercache", 1),
        info_probe("unscripted", "no answer", 1),
    ];

    let result = runner(target).run(&probes).await;

    assert_eq!(result.aggregate(), Aggregate::WithWarnings);
    assert_eq!(result.failed(), 0);
    assert_eq!(result.warned(), 2);
    assert!(
        result
            .records()
            .iter()
            .skip(1)
            .all(|r| r.failure == Some(FailureKind::SoftWarning))
    );
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn test_empty_table_reads_differently_from_missing_table() {
    let target = Arc::new(ScriptedTarget::new().with_table("orders", 0));
    let rows = |table: &str| {
        Probe::assertion(
            format!("rows in {}", table),
            Action::TableRows {
                table: table.to_string(),
            },
            Predicate::at_least(1),
        )
    };
    let probes = vec![ping_probe(), rows("orders"), rows("events")];

    let result = runner(target).run(&probes).await;

    let empty = &result.records()[1];
    let missing = &result.records()[2];
    assert_eq!(empty.outcome, Outcome::Fail);
    assert_eq!(missing.outcome, Outcome::Fail);
    assert_eq!(
        empty.message,
        "rows in orders: expected at least 1 row(s), observed 0 rows (table is empty)"
    );
    assert_eq!(
        missing.message,
        "rows in events: expected table events to exist, observed table not found"
    );
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_is_bounded_per_kind() {
    let target = Arc::new(
        ScriptedTarget::new()
            .hanging_on("slow assertion")
            .hanging_on("slow info")
            .with_count("after", 1),
    );
    let probes = vec![
        ping_probe(),
        count_probe("slow assertion", "slow assertion", 1),
        info_probe("slow info", "slow info", 1),
        count_probe("after", "after", 1),
    ];

    let result = runner(target).run(&probes).await;

    assert_eq!(result.total(), 4);
    let limit = Some(FailureKind::ExecutionTimeout {
        limit: Duration::from_secs(3),
    });
    assert_eq!(result.records()[1].outcome, Outcome::Fail);
    assert_eq!(result.records()[1].failure, limit);
    assert_eq!(result.records()[2].outcome, Outcome::Warn);
    assert_eq!(result.records()[2].failure, limit);
    assert_eq!(result.records()[3].outcome, Outcome::Pass);
    assert!(result.records()[1].message.contains("no result within 3s"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_run_keeps_completed_probes() {
    let target = Arc::new(
        ScriptedTarget::new()
            .with_count("a", 1)
            .with_count("b", 1)
            .with_count("d", 1)
            .hanging_on("c"),
    );
    let probes = vec![
        ping_probe(),
        count_probe("a", "a", 1),
        count_probe("b", "b", 1),
        count_probe("c", "c", 1),
        count_probe("d", "d", 1),
        count_probe("e", "d", 1),
        count_probe("f", "d", 1),
        count_probe("g", "d", 1),
    ];
    let runner = runner(target.clone()).with_probe_timeout(Duration::from_secs(30));
    let token = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let result = runner.run(&probes).await;

    assert_eq!(result.total(), 3);
    assert_eq!(result.termination(), &Termination::Cancelled { completed: 3 });
    assert!(result.was_cancelled());
    assert_eq!(result.aggregate(), Aggregate::Failed);
    assert_eq!(result.exit_code(), 1);
    assert!(!target.calls().iter().any(|call| call == "count d"));
    assert!(probe::render(&result).contains("cancelled after 3 of 8 probe(s)"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_readiness_wait() {
    let target = Arc::new(ScriptedTarget::new().unreachable());
    let runner = runner(target).with_policy(RetryPolicy::from_secs(60, 2, 10));
    let token = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        token.cancel();
    });

    let result = runner.run(&[ping_probe(), count_probe("a", "a", 1)]).await;

    assert_eq!(result.total(), 0);
    assert_eq!(result.termination(), &Termination::Cancelled { completed: 0 });
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn test_same_probes_same_outcomes() {
    let target = Arc::new(
        ScriptedTarget::new()
            .with_count("tables", 3)
            .with_setting("work_mem", "4MB"),
    );
    let probes = vec![
        ping_probe(),
        count_probe("demo tables", "tables", 5),
        Probe::informational(
            "setting work_mem",
            Action::Setting {
                name: "work_mem".into(),
            },
            Predicate::succeeds(),
        ),
    ];
    let runner = runner(target);

    let first = runner.run(&probes).await;
    let second = runner.run(&probes).await;

    let outcomes = |r: &probe::RunResult| r.records().iter().map(|x| x.outcome).collect::<Vec<_>>();
    assert_eq!(outcomes(&first), outcomes(&second));
    assert_eq!(first.aggregate(), second.aggregate());
}

#[tokio::test]
async fn test_report_shows_next_steps_only_on_success() {
    let healthy = runner(Arc::new(ScriptedTarget::new().with_count("a", 1)))
        .run(&[ping_probe(), count_probe("a", "a", 1)])
        .await;
    let unhealthy = runner(Arc::new(ScriptedTarget::new().with_count("a", 0)))
        .run(&[ping_probe(), count_probe("a", "a", 1)])
        .await;

    let healthy_report = probe::render(&healthy);
    let unhealthy_report = probe::render(&unhealthy);

    assert!(healthy_report.contains("Next steps"));
    assert!(healthy_report.contains("Overall: HEALTHY"));
    assert!(!unhealthy_report.contains("Next steps"));
    assert!(unhealthy_report.contains("Overall: UNHEALTHY"));
    assert!(unhealthy_report.contains("a: expected at least 1, observed 0"));
}

#[tokio::test]
async fn test_summary_always_lists_every_count() {
    let result = runner(Arc::new(ScriptedTarget::new().with_count("a", 1)))
        .run(&[ping_probe(), count_probe("a", "a", 1)])
        .await;

    let report = probe::render(&result);

    assert!(report.contains("Passed: 2"));
    assert!(report.contains("Warned: 0"));
    assert!(report.contains("Failed: 0"));
}

#[tokio::test]
async fn test_table_report_lists_every_probe() {
    let result = runner(Arc::new(ScriptedTarget::new().with_count("a", 1)))
        .run(&[ping_probe(), count_probe("a", "a", 1)])
        .await;

    let table = probe::render_table(&result);
    assert!(table.contains("database connection"));
    assert!(table.contains("readiness"));
    assert!(table.contains("assertion"));
    assert!(table.contains("Total probes: 2"));
}
