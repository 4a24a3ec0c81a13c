//! SageMaker asynchronous inference backed by `aws-sdk-sagemaker` and
//! `aws-sdk-sagemakerruntime`. Request payloads are staged in object storage
//! because async invocations take an input location rather than a body.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sagemaker::{
    error::ProvideErrorMetadata,
    types::{
        AsyncInferenceClientConfig, AsyncInferenceConfig, AsyncInferenceOutputConfig,
        ContainerDefinition, EndpointStatus as SageMakerStatus, ProductionVariant,
        ProductionVariantInstanceType,
    },
};
use chrono::Utc;
use tracing::{info, warn};

use super::{EndpointHandle, EndpointSpec, EndpointStatus, InferenceService, PendingInference, SummaryRequest};
use crate::{
    error::{DigestError, Result},
    storage::{ObjectStore, StorageLocation},
};

const VARIANT_NAME: &str = "AllTraffic";

pub struct SageMakerInference {
    control: aws_sdk_sagemaker::Client,
    runtime: aws_sdk_sagemakerruntime::Client,
    store: Arc<dyn ObjectStore>,
    /// Prefix where request payloads are uploaded before invocation.
    inputs: StorageLocation,
}

impl SageMakerInference {
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        store: Arc<dyn ObjectStore>,
        inputs: StorageLocation,
    ) -> Self {
        Self {
            control: aws_sdk_sagemaker::Client::new(sdk_config),
            runtime: aws_sdk_sagemakerruntime::Client::new(sdk_config),
            store,
            inputs,
        }
    }

    fn err(msg: impl Into<String>) -> DigestError {
        DigestError::Service(msg.into())
    }
}

fn is_missing<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.message()
        .is_some_and(|message| message.contains("Could not find"))
}

#[async_trait]
impl InferenceService for SageMakerInference {
    async fn deploy(&self, spec: &EndpointSpec) -> Result<EndpointHandle> {
        let model_name = format!("{}-model", spec.name);
        let config_name = format!("{}-config", spec.name);

        let container = ContainerDefinition::builder()
            .image(&spec.image_uri)
            .environment("HF_MODEL_ID", &spec.model_id)
            .environment("HF_TASK", &spec.task)
            .build();
        self.control
            .create_model()
            .model_name(&model_name)
            .execution_role_arn(&spec.role_arn)
            .primary_container(container)
            .send()
            .await
            .map_err(|e| Self::err(format!("create model {model_name} failed: {e}")))?;
        info!(%model_name, model_id = %spec.model_id, "created model");

        let variant = ProductionVariant::builder()
            .variant_name(VARIANT_NAME)
            .model_name(&model_name)
            .initial_instance_count(1)
            .instance_type(ProductionVariantInstanceType::from(spec.instance_type.as_str()))
            .build()
            .map_err(|e| Self::err(e.to_string()))?;
        let async_config = AsyncInferenceConfig::builder()
            .client_config(
                AsyncInferenceClientConfig::builder()
                    .max_concurrent_invocations_per_instance(spec.max_concurrent_invocations as i32)
                    .build(),
            )
            .output_config(
                AsyncInferenceOutputConfig::builder()
                    .s3_output_path(spec.output.uri())
                    .build(),
            )
            .build();
        self.control
            .create_endpoint_config()
            .endpoint_config_name(&config_name)
            .production_variants(variant)
            .async_inference_config(async_config)
            .send()
            .await
            .map_err(|e| Self::err(format!("create endpoint config {config_name} failed: {e}")))?;

        self.control
            .create_endpoint()
            .endpoint_name(&spec.name)
            .endpoint_config_name(&config_name)
            .send()
            .await
            .map_err(|e| Self::err(format!("create endpoint {} failed: {e}", spec.name)))?;
        info!(endpoint = %spec.name, instance = %spec.instance_type, "endpoint creation started");

        Ok(EndpointHandle {
            endpoint_name: spec.name.clone(),
            config_name,
            model_name,
            deployed_at: Utc::now(),
        })
    }

    async fn endpoint_status(&self, endpoint: &EndpointHandle) -> Result<EndpointStatus> {
        let response = self
            .control
            .describe_endpoint()
            .endpoint_name(&endpoint.endpoint_name)
            .send()
            .await
            .map_err(|e| {
                Self::err(format!(
                    "describe endpoint {} failed: {e}",
                    endpoint.endpoint_name
                ))
            })?;

        Ok(match response.endpoint_status() {
            Some(SageMakerStatus::InService) => EndpointStatus::InService,
            Some(SageMakerStatus::Failed) => EndpointStatus::Failed(
                response
                    .failure_reason()
                    .unwrap_or("no failure reason reported")
                    .to_string(),
            ),
            Some(other) => EndpointStatus::Creating(other.as_str().to_string()),
            None => EndpointStatus::Creating("Unknown".to_string()),
        })
    }

    async fn submit(
        &self,
        endpoint: &EndpointHandle,
        request: &SummaryRequest,
    ) -> Result<PendingInference> {
        let body = serde_json::to_vec(request)?;
        let key = self
            .inputs
            .key_for(&format!("{}.json", Utc::now().timestamp_millis()));
        self.store.put(&self.inputs.bucket, &key, body).await?;
        let input_location = format!("s3://{}/{key}", self.inputs.bucket);

        let response = self
            .runtime
            .invoke_endpoint_async()
            .endpoint_name(&endpoint.endpoint_name)
            .input_location(&input_location)
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| {
                Self::err(format!(
                    "invoke endpoint {} failed: {e}",
                    endpoint.endpoint_name
                ))
            })?;

        let output_location = response
            .output_location()
            .ok_or_else(|| Self::err("async invocation returned no output location"))?
            .to_string();
        Ok(PendingInference {
            inference_id: response.inference_id().map(str::to_string),
            output_location,
            failure_location: response.failure_location().map(str::to_string),
        })
    }

    async fn poll_result(&self, pending: &PendingInference) -> Result<Option<Vec<u8>>> {
        let output: StorageLocation = pending.output_location.parse()?;
        if let Some(body) = self.store.try_get(&output.bucket, &output.prefix).await? {
            return Ok(Some(body));
        }
        if let Some(failure) = &pending.failure_location {
            let failure: StorageLocation = failure.parse()?;
            if let Some(body) = self.store.try_get(&failure.bucket, &failure.prefix).await? {
                return Err(Self::err(format!(
                    "inference failed: {}",
                    String::from_utf8_lossy(&body)
                )));
            }
        }
        Ok(None)
    }

    async fn delete(&self, endpoint: &EndpointHandle) -> Result<()> {
        match self
            .control
            .delete_endpoint()
            .endpoint_name(&endpoint.endpoint_name)
            .send()
            .await
        {
            Ok(_) => info!(endpoint = %endpoint.endpoint_name, "deleted endpoint"),
            Err(e) => {
                let e = e.into_service_error();
                if !is_missing(&e) {
                    return Err(Self::err(format!(
                        "delete endpoint {} failed: {e}",
                        endpoint.endpoint_name
                    )));
                }
                warn!(endpoint = %endpoint.endpoint_name, "endpoint already deleted");
            }
        }

        if let Err(e) = self
            .control
            .delete_endpoint_config()
            .endpoint_config_name(&endpoint.config_name)
            .send()
            .await
        {
            let e = e.into_service_error();
            if !is_missing(&e) {
                return Err(Self::err(format!(
                    "delete endpoint config {} failed: {e}",
                    endpoint.config_name
                )));
            }
        }

        if let Err(e) = self
            .control
            .delete_model()
            .model_name(&endpoint.model_name)
            .send()
            .await
        {
            let e = e.into_service_error();
            if !is_missing(&e) {
                return Err(Self::err(format!(
                    "delete model {} failed: {e}",
                    endpoint.model_name
                )));
            }
        }
        Ok(())
    }
}
