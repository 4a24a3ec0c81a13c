//! Summarisation through a pre-trained model behind an asynchronous endpoint.

#[cfg(feature = "aws")]
pub mod sagemaker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    error::{DigestError, Result},
    retry::{self, Poll, WaitPolicy, INFERENCE_RESULT_WAIT},
    storage::StorageLocation,
};

/// Concurrent invocations allowed per endpoint instance.
pub const MAX_CONCURRENT_INVOCATIONS: u32 = 4;

/// Everything needed to stand up an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    pub model_id: String,
    pub task: String,
    /// Serving container; pins the framework versions.
    pub image_uri: String,
    pub instance_type: String,
    pub role_arn: String,
    pub max_concurrent_invocations: u32,
    /// Where asynchronous results are written.
    pub output: StorageLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointHandle {
    pub endpoint_name: String,
    pub config_name: String,
    pub model_name: String,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    Creating(String),
    InService,
    Failed(String),
}

/// Request body accepted by the model server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub inputs: String,
}

impl SummaryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            inputs: text.into(),
        }
    }
}

/// Result handle returned by an asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInference {
    pub inference_id: Option<String>,
    pub output_location: String,
    pub failure_location: Option<String>,
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn deploy(&self, spec: &EndpointSpec) -> Result<EndpointHandle>;

    async fn endpoint_status(&self, endpoint: &EndpointHandle) -> Result<EndpointStatus>;

    async fn submit(
        &self,
        endpoint: &EndpointHandle,
        request: &SummaryRequest,
    ) -> Result<PendingInference>;

    /// Raw response body once written, `None` while still pending.
    async fn poll_result(&self, pending: &PendingInference) -> Result<Option<Vec<u8>>>;

    /// Release the endpoint. Deleting an already-deleted endpoint succeeds.
    async fn delete(&self, endpoint: &EndpointHandle) -> Result<()>;
}

/// Wait until a deployed endpoint accepts requests. A `Failed` endpoint is
/// terminal.
#[instrument(skip(service, endpoint), fields(endpoint = %endpoint.endpoint_name))]
pub async fn wait_in_service(
    service: &dyn InferenceService,
    endpoint: &EndpointHandle,
    policy: WaitPolicy,
) -> Result<()> {
    retry::poll_until(policy, "endpoint to come in service", move || async move {
        match service.endpoint_status(endpoint).await? {
            EndpointStatus::InService => Ok(Poll::Ready(())),
            EndpointStatus::Creating(state) => {
                info!(endpoint = %endpoint.endpoint_name, %state, "endpoint not ready");
                Ok(Poll::Pending)
            }
            EndpointStatus::Failed(reason) => Err(DigestError::EndpointFailed {
                endpoint: endpoint.endpoint_name.clone(),
                reason,
            }),
        }
    })
    .await?;
    info!(endpoint = %endpoint.endpoint_name, "endpoint in service");
    Ok(())
}

/// Submit one text and wait for the generated summary.
#[instrument(skip(service, endpoint, text), fields(endpoint = %endpoint.endpoint_name, chars = text.chars().count()))]
pub async fn summarize(
    service: &dyn InferenceService,
    endpoint: &EndpointHandle,
    text: &str,
) -> Result<String> {
    summarize_with(service, endpoint, text, INFERENCE_RESULT_WAIT).await
}

pub async fn summarize_with(
    service: &dyn InferenceService,
    endpoint: &EndpointHandle,
    text: &str,
    policy: WaitPolicy,
) -> Result<String> {
    let request = SummaryRequest::new(text);
    let pending = service.submit(endpoint, &request).await?;
    info!(output = %pending.output_location, "inference submitted");

    let pending = &pending;
    let body = retry::poll_until(policy, "inference result", move || async move {
        Ok(match service.poll_result(pending).await? {
            Some(body) => Poll::Ready(body),
            None => Poll::Pending,
        })
    })
    .await?;
    parse_summary(&body)
}

/// Unwrap `[{"summary_text": ...}]`-style responses to the generated text.
pub fn parse_summary(body: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(body)?;
    extract_text(&value).ok_or_else(|| {
        DigestError::Service(format!("unexpected inference response: {value}"))
    })
}

fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => items.first().and_then(extract_text),
        Value::Object(map) => ["summary_text", "generated_text"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
