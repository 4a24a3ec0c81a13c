//! Amazon Comprehend topic detection backed by `aws-sdk-comprehend`.

use async_trait::async_trait;
use aws_sdk_comprehend::{
    types::{InputDataConfig, InputFormat, JobStatus as ComprehendStatus, OutputDataConfig},
    Client,
};
use chrono::Utc;
use tracing::info;

use super::{JobDescription, JobHandle, JobStatus, TopicJobRequest, TopicModeler};
use crate::error::{DigestError, Result};

#[derive(Debug, Clone)]
pub struct ComprehendTopicModeler {
    client: Client,
}

impl ComprehendTopicModeler {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    fn err(msg: impl Into<String>) -> DigestError {
        DigestError::Service(msg.into())
    }
}

fn map_status(status: Option<&ComprehendStatus>) -> Result<JobStatus> {
    match status {
        Some(ComprehendStatus::Submitted) => Ok(JobStatus::Submitted),
        Some(ComprehendStatus::InProgress) => Ok(JobStatus::InProgress),
        Some(ComprehendStatus::Completed) => Ok(JobStatus::Completed),
        // A stopped job never produces output; treat it like a failure.
        Some(ComprehendStatus::Failed)
        | Some(ComprehendStatus::StopRequested)
        | Some(ComprehendStatus::Stopped) => Ok(JobStatus::Failed),
        Some(other) => Err(ComprehendTopicModeler::err(format!(
            "unrecognised job status {}",
            other.as_str()
        ))),
        None => Err(ComprehendTopicModeler::err("job status missing")),
    }
}

#[async_trait]
impl TopicModeler for ComprehendTopicModeler {
    async fn submit(&self, request: &TopicJobRequest) -> Result<JobHandle> {
        let input = InputDataConfig::builder()
            .s3_uri(request.input.uri())
            .input_format(InputFormat::OneDocPerFile)
            .build()
            .map_err(|e| Self::err(e.to_string()))?;
        let output = OutputDataConfig::builder()
            .s3_uri(request.output.uri())
            .build()
            .map_err(|e| Self::err(e.to_string()))?;

        let response = self
            .client
            .start_topics_detection_job()
            .job_name(&request.job_name)
            .input_data_config(input)
            .output_data_config(output)
            .data_access_role_arn(&request.role_arn)
            .number_of_topics(request.num_topics as i32)
            .send()
            .await
            .map_err(|e| Self::err(format!("start topics detection job failed: {e}")))?;

        let job_id = response
            .job_id()
            .ok_or_else(|| Self::err("start topics detection job returned no job id"))?
            .to_string();
        info!(%job_id, job_name = %request.job_name, "submitted topic detection job");
        Ok(JobHandle {
            job_id,
            job_name: request.job_name.clone(),
            submitted_at: Utc::now(),
        })
    }

    async fn describe(&self, job_id: &str) -> Result<JobDescription> {
        let response = self
            .client
            .describe_topics_detection_job()
            .job_id(job_id)
            .send()
            .await
            .map_err(|e| Self::err(format!("describe job {job_id} failed: {e}")))?;
        let properties = response
            .topics_detection_job_properties()
            .ok_or_else(|| Self::err(format!("job {job_id} has no properties")))?;

        Ok(JobDescription {
            status: map_status(properties.job_status())?,
            output_uri: properties
                .output_data_config()
                .map(|config| config.s3_uri().to_string()),
            message: properties.message().map(str::to_string),
        })
    }
}
