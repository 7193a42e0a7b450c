mod helpers;

use chrono::Utc;

use helpers::{create_and_activate, force_expire, harness, seed, task_status};
use vmsched::domain::models::{Task, TaskStatus};
use vmsched::domain::ports::TaskRepository;

#[tokio::test]
async fn sweep_kills_tasks_past_their_deadline() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 2).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 5).await;
    force_expire(&h, "t1", 120).await;

    let killed = h.reaper.sweep().await.unwrap();
    assert_eq!(killed, 1);
    assert_eq!(task_status(&h, "t1").await, TaskStatus::Inactive);
    assert_eq!(task_status(&h, "t2").await, TaskStatus::Active);
}

#[tokio::test]
async fn sweep_leaves_slack_for_inflight_timers() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    // Ten seconds overdue is inside the 30s slack; the timer owns it.
    force_expire(&h, "t1", 10).await;

    let killed = h.reaper.sweep().await.unwrap();
    assert_eq!(killed, 0);
    assert_eq!(task_status(&h, "t1").await, TaskStatus::Active);
}

#[tokio::test]
async fn sweep_with_nothing_expired_is_a_no_op() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;
    create_and_activate(&h, "alice", "t1", "tiny", 5).await;

    assert_eq!(h.reaper.sweep().await.unwrap(), 0);
    assert_eq!(h.hypervisor.calls_matching("stop"), 0);
}

#[tokio::test]
async fn activation_arms_an_expiry_timer() {
    let mut h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;

    let expiry = h.expiries.try_recv().expect("expiry armed");
    assert_eq!(expiry.task, "t1");
    let remaining = (expiry.deadline - Utc::now()).num_seconds();
    assert!((295..=300).contains(&remaining), "deadline in {remaining}s");
}

#[tokio::test]
async fn startup_purge_removes_orphaned_creating_rows() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    // A provisioning attempt that died hours ago, and a fresh one.
    let stale = Task {
        name: "orphan".to_string(),
        user: "alice".to_string(),
        instance_type: "tiny".to_string(),
        status: TaskStatus::Creating,
        creation: Utc::now() - chrono::Duration::hours(2),
        queue_time: None,
        end_time: None,
        target_id: None,
        instance: "task-orphan-dead".to_string(),
        version: 0,
    };
    h.tasks.insert(&stale).await.unwrap();
    let mut fresh = stale.clone();
    fresh.name = "fresh".to_string();
    fresh.instance = "task-fresh-live".to_string();
    fresh.creation = Utc::now();
    h.tasks.insert(&fresh).await.unwrap();

    let purged = h.reaper.purge_stale_creating().await.unwrap();
    assert_eq!(purged, 1);
    assert!(!h.tasks.exists("orphan").await.unwrap());
    assert!(h.tasks.exists("fresh").await.unwrap());
}

#[tokio::test]
async fn sweep_reaps_every_expired_task_in_one_pass() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 2).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 5).await;
    force_expire(&h, "t1", 120).await;
    force_expire(&h, "t2", 120).await;

    // Hosts without stateful stop still get reaped via the downgrade.
    helpers::hypervisor::FakeHypervisor::set(&h.hypervisor.reject_stateful, true);
    let killed = h.reaper.sweep().await.unwrap();
    assert_eq!(killed, 2);
    assert_eq!(task_status(&h, "t1").await, TaskStatus::Inactive);
    assert_eq!(task_status(&h, "t2").await, TaskStatus::Inactive);
}
