//! LXD-style REST hypervisor adapter.
//!
//! Implements the `Hypervisor` port against an LXD-compatible API. Every
//! mutating call submits a request, receives an operation path in the
//! response envelope and blocks on the operation's wait endpoint; failures
//! from either phase are classified onto `HypervisorError` by status and
//! message, including the "already stopped" and stateful-unsupported
//! cases the lifecycle manager keys on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::errors::HypervisorError;
use crate::domain::models::{HypervisorConfig, TargetDescriptor};
use crate::domain::ports::{Hypervisor, InstanceAction, InstanceSpec, InstanceState};

pub struct LxdHypervisor {
    http: reqwest::Client,
    base_url: String,
    operation_timeout: Duration,
}

/// Common LXD response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    operation: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Deserialize)]
struct InstanceInfo {
    #[serde(default)]
    location: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    config: serde_json::Map<String, Value>,
}

impl LxdHypervisor {
    pub fn new(config: &HypervisorConfig) -> Result<Self, HypervisorError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .connect_timeout(Duration::from_secs(10));
        if let Some(pem) = &config.client_pem {
            let identity = reqwest::Identity::from_pem(pem.as_bytes())
                .map_err(|e| HypervisorError::Fatal(format!("invalid client pem: {e}")))?;
            builder = builder.identity(identity);
        }
        let http = builder
            .build()
            .map_err(|e| HypervisorError::Fatal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_envelope(&self, response: reqwest::Response) -> Result<Envelope, HypervisorError> {
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(map_reqwest_error)?;
        if envelope.kind == "error" {
            return Err(classify(status.as_u16(), &envelope.error));
        }
        Ok(envelope)
    }

    /// Submit a request and, when the envelope names an operation, block
    /// on its wait endpoint until completion.
    async fn submit_and_wait(&self, request: reqwest::RequestBuilder) -> Result<(), HypervisorError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let envelope = self.read_envelope(response).await?;
        if envelope.kind != "async" || envelope.operation.is_empty() {
            return Ok(());
        }

        let wait_url = self.url(&format!(
            "{}/wait?timeout={}",
            envelope.operation,
            self.operation_timeout.as_secs()
        ));
        debug!(operation = %envelope.operation, "awaiting hypervisor operation");
        let response = self.http.get(&wait_url).send().await.map_err(map_reqwest_error)?;
        let envelope = self.read_envelope(response).await?;

        let op_status = envelope.metadata.get("status").and_then(Value::as_str).unwrap_or("");
        if op_status == "Failure" {
            let err = envelope
                .metadata
                .get("err")
                .and_then(Value::as_str)
                .unwrap_or("operation failed");
            return Err(classify(0, err));
        }
        Ok(())
    }

    async fn instance_info(&self, name: &str) -> Result<InstanceInfo, HypervisorError> {
        let response = self
            .http
            .get(self.url(&format!("/1.0/instances/{name}")))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let envelope = self.read_envelope(response).await?;
        serde_json::from_value(envelope.metadata)
            .map_err(|e| HypervisorError::Fatal(format!("bad instance payload: {e}")))
    }
}

#[async_trait]
impl Hypervisor for LxdHypervisor {
    async fn create_instance(
        &self,
        name: &str,
        spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError> {
        let mut body = serde_json::to_value(spec)
            .map_err(|e| HypervisorError::Fatal(format!("bad instance spec: {e}")))?;
        body["name"] = json!(name);

        let mut url = self.url("/1.0/instances");
        if !target.target.is_empty() {
            url = format!("{url}?target={}", target.target);
        }
        self.submit_and_wait(self.http.post(&url).json(&body)).await
    }

    async fn start_instance(
        &self,
        name: &str,
        spec: &InstanceSpec,
        target: &TargetDescriptor,
    ) -> Result<(), HypervisorError> {
        let info = self.instance_info(name).await?;
        let running = info.status == "Running";

        // Move the instance when it sits on another cluster member.
        if !target.target.is_empty() && info.location != target.target {
            let url = self.url(&format!("/1.0/instances/{name}?target={}", target.target));
            let body = json!({
                "name": name,
                "migration": true,
                "live": running,
                "instance_only": true,
            });
            self.submit_and_wait(self.http.post(&url).json(&body)).await?;
        }

        // Re-apply the rendered config, carrying over host-volatile keys
        // so the instance keeps its MACs and state hints across moves.
        let mut body = serde_json::to_value(spec)
            .map_err(|e| HypervisorError::Fatal(format!("bad instance spec: {e}")))?;
        let config = body
            .as_object_mut()
            .ok_or_else(|| HypervisorError::Fatal("instance spec is not a mapping".to_string()))?
            .entry("config")
            .or_insert_with(|| json!({}));
        if let Some(config) = config.as_object_mut() {
            for (key, value) in &info.config {
                if key.starts_with("volatile.") {
                    config.insert(key.clone(), value.clone());
                }
            }
        }
        self.submit_and_wait(self.http.put(self.url(&format!("/1.0/instances/{name}"))).json(&body))
            .await?;

        if running {
            return Ok(());
        }
        self.update_state(name, InstanceAction::Start, false, false).await
    }

    async fn update_state(
        &self,
        name: &str,
        action: InstanceAction,
        force: bool,
        stateful: bool,
    ) -> Result<(), HypervisorError> {
        let body = json!({
            "action": action.as_str(),
            "force": force,
            "stateful": stateful,
        });
        self.submit_and_wait(
            self.http
                .put(self.url(&format!("/1.0/instances/{name}/state")))
                .json(&body),
        )
        .await
    }

    async fn delete_instance(&self, name: &str) -> Result<(), HypervisorError> {
        self.submit_and_wait(self.http.delete(self.url(&format!("/1.0/instances/{name}"))))
            .await
    }

    async fn instance_state(&self, name: &str) -> Result<InstanceState, HypervisorError> {
        let response = self
            .http
            .get(self.url(&format!("/1.0/instances/{name}/state")))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let envelope = self.read_envelope(response).await?;
        let metadata = &envelope.metadata;
        Ok(InstanceState {
            name: name.to_string(),
            status: metadata
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            cpu_usage: metadata
                .pointer("/cpu/usage")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            memory_usage: metadata
                .pointer("/memory/usage")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HypervisorError {
    if err.is_timeout() || err.is_connect() {
        HypervisorError::Transient(err.to_string())
    } else {
        HypervisorError::Fatal(err.to_string())
    }
}

/// Map a failure message (and HTTP status when known) onto the error
/// classes the lifecycle manager distinguishes.
fn classify(http_status: u16, message: &str) -> HypervisorError {
    if message.contains("already stopped") {
        return HypervisorError::AlreadyStopped;
    }
    if message.contains("migration.stateful") || message.contains("CRIU") {
        return HypervisorError::StatefulUnsupported(message.to_string());
    }
    match http_status {
        404 => HypervisorError::InstanceNotFound(message.to_string()),
        408 | 500 | 502 | 503 | 504 => HypervisorError::Transient(message.to_string()),
        _ => HypervisorError::Fatal(message.to_string()),
    }
}
