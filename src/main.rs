//! vmsched CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::info;

use vmsched::adapters::lxd::LxdHypervisor;
use vmsched::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, SqliteInstanceTypeRepository,
    SqliteQueueRepository, SqliteTargetRepository, SqliteTaskRepository, SqliteUserRepository,
};
use vmsched::domain::models::{Balance, Config, Role, User};
use vmsched::domain::ports::{
    InstanceTypeRepository, QueueRepository, TargetRepository, TaskRepository, UserRepository,
};
use vmsched::infrastructure::config::ConfigLoader;
use vmsched::infrastructure::logging::init_logging;
use vmsched::services::{
    expiry_channel, BillingGate, Placement, QueueEngine, QueueTimeEstimator, Reaper, ReaperConfig,
    TargetPool, TaskLifecycle,
};

#[derive(Parser)]
#[command(name = "vmsched", about = "VM scheduling service", version)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "/etc/vmsched.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed the admin user.
    InitDb,
    /// Run the expiry sweep loop.
    Cron,
    /// Print the estimated queue time for an instance type.
    Estimate {
        instance_type: String,
        /// Observation time (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
}

struct Repositories {
    users: Arc<dyn UserRepository>,
    types: Arc<dyn InstanceTypeRepository>,
    tasks: Arc<dyn TaskRepository>,
    targets: Arc<dyn TargetRepository>,
    queue: Arc<dyn QueueRepository>,
}

impl Repositories {
    fn new(pool: &SqlitePool) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            types: Arc::new(SqliteInstanceTypeRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            targets: Arc::new(SqliteTargetRepository::new(pool.clone())),
            queue: Arc::new(SqliteQueueRepository::new(pool.clone())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(&cli.config).context("failed to load configuration")?;
    init_logging(&config.log)?;

    let pool = create_pool(&config.database.path, None)
        .await
        .context("failed to open database")?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("failed to run migrations")?;

    match cli.command {
        Commands::InitDb => init_db(&pool).await,
        Commands::Cron => run_cron(&pool, &config).await,
        Commands::Estimate { instance_type, at } => estimate(&pool, &instance_type, at).await,
    }
}

async fn init_db(pool: &SqlitePool) -> Result<()> {
    let repos = Repositories::new(pool);
    if repos.users.any_with_role("admin").await? {
        println!("database already initialized");
        return Ok(());
    }
    let admin = User {
        name: "admin".to_string(),
        role: Role::Admin,
        balance: Balance::new(),
        version: 0,
    };
    repos.users.upsert(&admin).await?;
    println!("database initialized, admin user created");
    Ok(())
}

async fn run_cron(pool: &SqlitePool, config: &Config) -> Result<()> {
    let repos = Repositories::new(pool);
    let hypervisor = Arc::new(
        LxdHypervisor::new(&config.hypervisor).context("failed to build hypervisor client")?,
    );

    let target_pool = Arc::new(TargetPool::new(repos.targets.clone()));
    let billing = Arc::new(BillingGate::new(repos.users.clone()));
    let (expiry, expiries) = expiry_channel();
    let placement = Arc::new(Placement::new(
        repos.types.clone(),
        repos.tasks.clone(),
        target_pool.clone(),
        hypervisor.clone(),
        expiry,
    ));
    let queue_engine = Arc::new(QueueEngine::new(
        repos.queue.clone(),
        repos.tasks.clone(),
        target_pool.clone(),
        placement.clone(),
    ));
    let lifecycle = Arc::new(TaskLifecycle::new(
        repos.types.clone(),
        repos.tasks.clone(),
        target_pool,
        billing,
        placement,
        queue_engine,
        hypervisor,
    ));

    let reaper = Reaper::new(
        lifecycle,
        repos.tasks.clone(),
        ReaperConfig::from_scheduler_config(&config.scheduler),
    );

    info!(
        interval_secs = config.scheduler.cron_interval_secs,
        "starting expiry sweep loop"
    );
    tokio::select! {
        () = reaper.run(expiries) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    Ok(())
}

async fn estimate(pool: &SqlitePool, instance_type: &str, at: Option<String>) -> Result<()> {
    let repos = Repositories::new(pool);
    let target_pool = Arc::new(TargetPool::new(repos.targets.clone()));
    let estimator = QueueTimeEstimator::new(repos.queue.clone(), repos.tasks.clone(), target_pool);

    let at = match at {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .context("invalid observation time, expected RFC 3339")?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let wait = estimator.estimate(instance_type, at).await?;
    let secs = wait.as_secs();
    println!("{}m{}s", secs / 60, secs % 60);
    Ok(())
}
