//! Scripted in-memory hypervisor for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vmsched::domain::errors::HypervisorError;
use vmsched::domain::models::TargetDescriptor;
use vmsched::domain::ports::{Hypervisor, InstanceAction, InstanceSpec, InstanceState};

/// Records every call and fails on command.
#[derive(Default)]
pub struct FakeHypervisor {
    calls: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Reject stateful stops the way a host without CRIU does.
    pub reject_stateful: AtomicBool,
    /// Report every stop as hitting an already-stopped instance.
    pub already_stopped: AtomicBool,
}

impl FakeHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl Hypervisor for FakeHypervisor {
    async fn create_instance(
        &self,
        name: &str,
        _spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError> {
        self.record(format!("create {name} on {}", target.target));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(HypervisorError::Fatal("create refused".to_string()));
        }
        Ok(())
    }

    async fn start_instance(
        &self,
        name: &str,
        _spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError> {
        self.record(format!("start {name} on {}", target.target));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(HypervisorError::Transient("start refused".to_string()));
        }
        Ok(())
    }

    async fn update_state(
        &self,
        name: &str,
        action: InstanceAction,
        force: bool,
        stateful: bool,
    ) -> Result<(), HypervisorError> {
        self.record(format!(
            "{} {name} force={force} stateful={stateful}",
            action.as_str()
        ));
        if action == InstanceAction::Stop {
            if stateful && self.reject_stateful.load(Ordering::SeqCst) {
                return Err(HypervisorError::StatefulUnsupported(
                    "migration.stateful disabled".to_string(),
                ));
            }
            if self.already_stopped.load(Ordering::SeqCst) {
                return Err(HypervisorError::AlreadyStopped);
            }
        }
        Ok(())
    }

    async fn delete_instance(&self, name: &str) -> Result<(), HypervisorError> {
        self.record(format!("delete {name}"));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(HypervisorError::Fatal("delete refused".to_string()));
        }
        Ok(())
    }

    async fn instance_state(&self, name: &str) -> Result<InstanceState, HypervisorError> {
        self.record(format!("state {name}"));
        Ok(InstanceState {
            name: name.to_string(),
            status: "Running".to_string(),
            cpu_usage: 1_000_000,
            memory_usage: 64 * 1024 * 1024,
        })
    }
}
