mod helpers;

use helpers::hypervisor::FakeHypervisor;
use helpers::{
    assert_target_task_bijection, balance_of, create_and_activate, force_expire, harness, seed,
    task_status,
};
use vmsched::domain::models::{TargetStatus, TaskStatus};
use vmsched::domain::ports::{QueueRepository, TargetRepository};
use vmsched::services::Activation;

#[tokio::test]
async fn activation_without_idle_target_queues() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    let first = create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    assert_eq!(first, Activation::Active);

    let second = create_and_activate(&h, "alice", "t2", "tiny", 10).await;
    assert_eq!(second, Activation::Queued);

    assert_eq!(task_status(&h, "t2").await, TaskStatus::Queued);
    assert_eq!(h.queue.count_for_task("t2").await.unwrap(), 1);
    // Charged at enqueue time: 5 + 10 minutes at 1/min.
    assert_eq!(balance_of(&h, "alice", "credit").await, 85);
}

#[tokio::test]
async fn queued_task_has_exactly_one_entry_and_others_none() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 5).await;

    assert_eq!(h.queue.count_for_task("t1").await.unwrap(), 0);
    assert_eq!(h.queue.count_for_task("t2").await.unwrap(), 1);
}

#[tokio::test]
async fn expiry_promotes_queue_head_onto_the_freed_target() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 10).await;
    let t1_target = h.lifecycle.get_task("t1").await.unwrap().target_id.unwrap();

    // Push t1 past its deadline and let the sweep find it.
    force_expire(&h, "t1", 120).await;
    let killed = h.reaper.sweep().await.unwrap();
    assert_eq!(killed, 1);

    assert_eq!(task_status(&h, "t1").await, TaskStatus::Inactive);
    assert_eq!(task_status(&h, "t2").await, TaskStatus::Active);
    // Same target, handed over without an idle window.
    let t2 = h.lifecycle.get_task("t2").await.unwrap();
    assert_eq!(t2.target_id, Some(t1_target));
    assert_eq!(h.queue.count_for_task("t2").await.unwrap(), 0);
    assert_target_task_bijection(&h, "tiny").await;
}

#[tokio::test]
async fn promotion_is_fifo_within_a_type() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 5).await;
    create_and_activate(&h, "alice", "t3", "tiny", 5).await;

    h.lifecycle.kill_task("t1").await.unwrap();
    assert_eq!(task_status(&h, "t2").await, TaskStatus::Active);
    assert_eq!(task_status(&h, "t3").await, TaskStatus::Queued);

    h.lifecycle.kill_task("t2").await.unwrap();
    assert_eq!(task_status(&h, "t3").await, TaskStatus::Active);
    assert_eq!(h.queue.count_for_task("t3").await.unwrap(), 0);
}

#[tokio::test]
async fn kill_without_queue_releases_the_target() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;
    create_and_activate(&h, "alice", "t1", "tiny", 5).await;

    h.lifecycle.kill_task("t1").await.unwrap();

    let targets = h.targets.list_for_type("tiny").await.unwrap();
    assert!(targets.iter().all(|t| t.status == TargetStatus::Idle));
    assert!(targets.iter().all(|t| t.task.is_empty() && t.instance.is_empty()));
}

#[tokio::test]
async fn failed_promotion_requeues_and_frees_the_target() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    create_and_activate(&h, "alice", "t2", "tiny", 10).await;

    // t2's start will fail during promotion; t1's stop still succeeds.
    FakeHypervisor::set(&h.hypervisor.fail_start, true);
    h.lifecycle.kill_task("t1").await.unwrap();

    assert_eq!(task_status(&h, "t1").await, TaskStatus::Inactive);
    assert_eq!(task_status(&h, "t2").await, TaskStatus::Queued);
    // Entry back in the queue, target back to idle: the next sweep or
    // activation can try again.
    assert_eq!(h.queue.count_for_task("t2").await.unwrap(), 1);
    let targets = h.targets.list_for_type("tiny").await.unwrap();
    assert!(targets.iter().all(|t| t.status == TargetStatus::Idle));
}

#[tokio::test]
async fn promotion_skips_types_with_separate_queues() {
    let h = harness().await;
    seed(&h, "alice", &[("credit", 100)], "tiny", &[("credit", 1)], 1).await;
    h.admin
        .define_instance_type(
            "big",
            "second type",
            helpers::CONFIGURE,
            helpers::price(&[("credit", 2)]),
            helpers::descriptors(1),
        )
        .await
        .unwrap();

    create_and_activate(&h, "alice", "t1", "tiny", 5).await;
    // Queued on the other type; must not take tiny's freed target.
    create_and_activate(&h, "alice", "b1", "big", 5).await;
    assert_eq!(task_status(&h, "b1").await, TaskStatus::Active);

    create_and_activate(&h, "alice", "b2", "big", 5).await;
    assert_eq!(task_status(&h, "b2").await, TaskStatus::Queued);

    h.lifecycle.kill_task("t1").await.unwrap();
    assert_eq!(task_status(&h, "b2").await, TaskStatus::Queued);
    let tiny_targets = h.targets.list_for_type("tiny").await.unwrap();
    assert!(tiny_targets.iter().all(|t| t.status == TargetStatus::Idle));
}
