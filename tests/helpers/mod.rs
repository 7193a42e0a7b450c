//! Shared test harness: in-memory database, fake hypervisor and the
//! fully wired service graph.

#![allow(dead_code)]

pub mod database;
pub mod hypervisor;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use vmsched::adapters::sqlite::{
    SqliteInstanceTypeRepository, SqliteQueueRepository, SqliteTargetRepository,
    SqliteTaskRepository, SqliteUserRepository,
};
use vmsched::domain::models::{Balance, Price, Role, TargetDescriptor, TaskStatus};
use vmsched::domain::ports::{
    InstanceTypeRepository, QueueRepository, TargetRepository, TaskRepository, UserRepository,
};
use vmsched::services::{
    expiry_channel, AdminService, BillingGate, Expiry, Placement, QueueEngine, QueueTimeEstimator,
    Reaper, ReaperConfig, TargetPool, TaskLifecycle,
};

use self::hypervisor::FakeHypervisor;

pub const CONFIGURE: &str = "architecture: x86_64\nconfig:\n  limits.cpu: \"1\"\n";

pub struct Harness {
    pub pool: SqlitePool,
    pub hypervisor: Arc<FakeHypervisor>,
    pub users: Arc<dyn UserRepository>,
    pub types: Arc<dyn InstanceTypeRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub targets: Arc<dyn TargetRepository>,
    pub queue: Arc<dyn QueueRepository>,
    pub target_pool: Arc<TargetPool>,
    pub lifecycle: Arc<TaskLifecycle>,
    pub admin: AdminService,
    pub estimator: QueueTimeEstimator,
    pub reaper: Reaper,
    /// Receiver side of the expiry channel; lets tests observe armed
    /// timers without running the reaper loop.
    pub expiries: mpsc::UnboundedReceiver<Expiry>,
}

pub async fn harness() -> Harness {
    let pool = database::setup_test_db().await;
    let hypervisor = Arc::new(FakeHypervisor::new());

    let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let types: Arc<dyn InstanceTypeRepository> =
        Arc::new(SqliteInstanceTypeRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let targets: Arc<dyn TargetRepository> = Arc::new(SqliteTargetRepository::new(pool.clone()));
    let queue: Arc<dyn QueueRepository> = Arc::new(SqliteQueueRepository::new(pool.clone()));

    let target_pool = Arc::new(TargetPool::new(targets.clone()));
    let billing = Arc::new(BillingGate::new(users.clone()));
    let (expiry, expiries) = expiry_channel();
    let placement = Arc::new(Placement::new(
        types.clone(),
        tasks.clone(),
        target_pool.clone(),
        hypervisor.clone(),
        expiry,
    ));
    let queue_engine = Arc::new(QueueEngine::new(
        queue.clone(),
        tasks.clone(),
        target_pool.clone(),
        placement.clone(),
    ));
    let lifecycle = Arc::new(TaskLifecycle::new(
        types.clone(),
        tasks.clone(),
        target_pool.clone(),
        billing,
        placement,
        queue_engine,
        hypervisor.clone(),
    ));
    let admin = AdminService::new(users.clone(), types.clone());
    let estimator = QueueTimeEstimator::new(queue.clone(), tasks.clone(), target_pool.clone());
    let reaper = Reaper::new(lifecycle.clone(), tasks.clone(), ReaperConfig::default());

    Harness {
        pool,
        hypervisor,
        users,
        types,
        tasks,
        targets,
        queue,
        target_pool,
        lifecycle,
        admin,
        estimator,
        reaper,
        expiries,
    }
}

pub fn balance(pairs: &[(&str, i64)]) -> Balance {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

pub fn price(pairs: &[(&str, i64)]) -> Price {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

pub fn descriptors(count: usize) -> Vec<TargetDescriptor> {
    (0..count)
        .map(|i| TargetDescriptor {
            target: format!("node{i}"),
            data: BTreeMap::new(),
        })
        .collect()
}

/// Seed one user and one instance type with `target_count` idle targets.
pub async fn seed(
    h: &Harness,
    user: &str,
    user_balance: &[(&str, i64)],
    instance_type: &str,
    type_price: &[(&str, i64)],
    target_count: usize,
) {
    h.admin
        .upsert_user(user, Role::User, balance(user_balance))
        .await
        .expect("failed to seed user");
    h.admin
        .define_instance_type(
            instance_type,
            "test type",
            CONFIGURE,
            price(type_price),
            descriptors(target_count),
        )
        .await
        .expect("failed to seed instance type");
}

/// Fetch a user's balance for one currency.
pub async fn balance_of(h: &Harness, user: &str, currency: &str) -> i64 {
    let user = h.users.get(user).await.expect("get user").expect("user exists");
    *user.balance.get(currency).unwrap_or(&0)
}

/// Rewrite a task's end_time to `secs_ago` seconds in the past.
pub async fn force_expire(h: &Harness, task: &str, secs_ago: i64) {
    let mut task = h.tasks.get(task).await.expect("get task").expect("task exists");
    task.end_time = Some(Utc::now() - chrono::Duration::seconds(secs_ago));
    assert!(h.tasks.update(&task).await.expect("update task"));
}

/// Assert the busy-target / active-task bijection for one instance type.
pub async fn assert_target_task_bijection(h: &Harness, instance_type: &str) {
    let targets = h.targets.list_for_type(instance_type).await.expect("list targets");
    for target in targets {
        match target.status {
            vmsched::domain::models::TargetStatus::Idle => {
                assert_eq!(target.task, "", "idle target {} still bound", target.id);
                assert_eq!(target.instance, "", "idle target {} still bound", target.id);
            }
            vmsched::domain::models::TargetStatus::Busy => {
                assert_ne!(target.task, "", "busy target {} unbound", target.id);
                let task = h
                    .tasks
                    .get(&target.task)
                    .await
                    .expect("get task")
                    .unwrap_or_else(|| panic!("busy target {} references missing task", target.id));
                assert!(
                    task.status.occupies_target(),
                    "busy target {} references {} task {}",
                    target.id,
                    task.status.as_str(),
                    task.name
                );
                assert_eq!(task.target_id, Some(target.id));
                assert_eq!(task.instance, target.instance);
            }
        }
    }
    // Every occupying task points at a busy target of its type.
    let all: Vec<_> = sqlx::query_as::<_, (String, Option<i64>)>(
        "SELECT name, target_id FROM tasks WHERE instance_type = ? AND status IN ('active', 'terminating')",
    )
    .bind(instance_type)
    .fetch_all(&h.pool)
    .await
    .expect("query tasks");
    for (name, target_id) in all {
        let target_id = target_id.unwrap_or_else(|| panic!("occupying task {name} has no target"));
        let target = h
            .targets
            .get(target_id)
            .await
            .expect("get target")
            .unwrap_or_else(|| panic!("task {name} references missing target {target_id}"));
        assert_eq!(target.task, name);
    }
}

/// Shorthand: create a task and activate it for `minutes`.
pub async fn create_and_activate(
    h: &Harness,
    user: &str,
    task: &str,
    instance_type: &str,
    minutes: u64,
) -> vmsched::services::Activation {
    h.lifecycle
        .create_task(user, task, instance_type)
        .await
        .expect("create task");
    h.lifecycle
        .activate_task(task, Duration::from_secs(minutes * 60))
        .await
        .expect("activate task")
}

pub async fn task_status(h: &Harness, name: &str) -> TaskStatus {
    h.tasks.get(name).await.expect("get task").expect("task exists").status
}
