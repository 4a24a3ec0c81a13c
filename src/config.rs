//! Runtime configuration utilities for article-digest.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, Context};

use crate::{
    retry::WaitPolicy,
    select::DEFAULT_SELECTION_ATTEMPTS,
    storage::StorageLocation,
    summarize::{EndpointSpec, MAX_CONCURRENT_INVOCATIONS},
};

const DEFAULT_SOURCE_URI: &str = "s3://ai2-semanticscholar-cord-19/2020-03-13/";
const DEFAULT_MODEL_ID: &str = "facebook/bart-large-cnn";
const DEFAULT_MODEL_TASK: &str = "summarization";
const DEFAULT_INSTANCE_TYPE: &str = "ml.m5.xlarge";
/// Hugging Face inference container (transformers 4.26, PyTorch 1.13).
const DEFAULT_IMAGE_TAG: &str =
    "huggingface-pytorch-inference:1.13.1-transformers4.26.0-cpu-py39-ubuntu20.04";

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub aws_region: String,
    /// Read-only dataset the articles are sampled from.
    pub source: StorageLocation,
    /// Working prefix owned by this tool; removed at teardown.
    pub work: StorageLocation,
    pub comprehend_role_arn: Option<String>,
    pub sagemaker_role_arn: Option<String>,
    pub sample_size: usize,
    pub num_topics: u32,
    pub model_id: String,
    pub model_task: String,
    pub image_uri: String,
    pub instance_type: String,
    /// Serve object storage from this directory instead of S3.
    pub store_root: Option<PathBuf>,
    pub job_wait: WaitPolicy,
    pub endpoint_wait: WaitPolicy,
    pub selection_attempts: usize,
    /// Root folder for staged copies and run state.
    pub data_dir: PathBuf,
    /// Root folder for joined results.
    pub outputs_dir: PathBuf,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::from_lookup(|key| env::var(key).ok())?;

        std::fs::create_dir_all(&settings.data_dir).context("creating data dir")?;
        std::fs::create_dir_all(&settings.outputs_dir).context("creating outputs dir")?;
        Ok(settings)
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let aws_region = text("AWS_REGION", "us-east-1");
        let source = StorageLocation::from_str(&text("SOURCE_URI", DEFAULT_SOURCE_URI))
            .context("parsing SOURCE_URI")?;
        let work = StorageLocation::new(
            text("WORK_BUCKET", "article-digest-work"),
            text("WORK_PREFIX", "article-digest/"),
        );
        let image_uri = lookup("IMAGE_URI").unwrap_or_else(|| {
            format!("763104351884.dkr.ecr.{aws_region}.amazonaws.com/{DEFAULT_IMAGE_TAG}")
        });

        Ok(Self {
            source,
            work,
            comprehend_role_arn: lookup("COMPREHEND_ROLE_ARN"),
            sagemaker_role_arn: lookup("SAGEMAKER_ROLE_ARN"),
            sample_size: parse_or(&lookup, "SAMPLE_SIZE", 100)?,
            num_topics: parse_or(&lookup, "NUM_TOPICS", 10)?,
            model_id: text("MODEL_ID", DEFAULT_MODEL_ID),
            model_task: text("MODEL_TASK", DEFAULT_MODEL_TASK),
            image_uri,
            instance_type: text("INSTANCE_TYPE", DEFAULT_INSTANCE_TYPE),
            store_root: lookup("STORE_ROOT").map(PathBuf::from),
            job_wait: WaitPolicy::new(
                parse_or(&lookup, "JOB_POLL_ATTEMPTS", 120)?,
                Duration::from_secs(parse_or(&lookup, "JOB_POLL_SECONDS", 30)?),
            ),
            endpoint_wait: WaitPolicy::new(
                parse_or(&lookup, "ENDPOINT_WAIT_ATTEMPTS", 40)?,
                Duration::from_secs(parse_or(&lookup, "ENDPOINT_WAIT_SECONDS", 30)?),
            ),
            selection_attempts: parse_or(
                &lookup,
                "SELECTION_ATTEMPTS",
                DEFAULT_SELECTION_ATTEMPTS,
            )?,
            data_dir: text("DATA_DIR", "./data").into(),
            outputs_dir: text("OUTPUTS_DIR", "./outputs").into(),
            aws_region,
        })
    }

    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }

    pub fn staged_location(&self) -> StorageLocation {
        self.work.child("staged")
    }

    pub fn topics_output_location(&self) -> StorageLocation {
        self.work.child("topics-output")
    }

    pub fn async_inputs_location(&self) -> StorageLocation {
        self.work.child("async-inputs")
    }

    pub fn async_outputs_location(&self) -> StorageLocation {
        self.work.child("async-outputs")
    }

    pub fn staged_dir(&self) -> PathBuf {
        self.join_data("staged")
    }

    pub fn state_path(&self) -> PathBuf {
        self.join_data("run_state.json")
    }

    pub fn comprehend_role(&self) -> anyhow::Result<&str> {
        self.comprehend_role_arn
            .as_deref()
            .ok_or_else(|| anyhow!("COMPREHEND_ROLE_ARN is not set"))
    }

    /// Endpoint description for the configured model.
    pub fn endpoint_spec(&self, name: String) -> anyhow::Result<EndpointSpec> {
        let role_arn = self
            .sagemaker_role_arn
            .clone()
            .ok_or_else(|| anyhow!("SAGEMAKER_ROLE_ARN is not set"))?;
        Ok(EndpointSpec {
            name,
            model_id: self.model_id.clone(),
            task: self.model_task.clone(),
            image_uri: self.image_uri.clone(),
            instance_type: self.instance_type.clone(),
            role_arn,
            max_concurrent_invocations: MAX_CONCURRENT_INVOCATIONS,
            output: self.async_outputs_location(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("parsing {key}={raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.sample_size, 100);
        assert_eq!(s.num_topics, 10);
        assert_eq!(s.work.uri(), "s3://article-digest-work/article-digest/");
        assert_eq!(s.staged_location().prefix, "article-digest/staged/");
        assert!(s.image_uri.contains("us-east-1"));
        assert!(s.comprehend_role().is_err());
    }

    #[test]
    fn overrides_and_endpoint_spec() {
        let s = settings(&[
            ("AWS_REGION", "eu-west-1"),
            ("SOURCE_URI", "s3://papers/abstracts/"),
            ("SAMPLE_SIZE", "25"),
            ("SAGEMAKER_ROLE_ARN", "arn:aws:iam::1:role/sm"),
        ])
        .unwrap();
        assert_eq!(s.source.bucket, "papers");
        assert_eq!(s.sample_size, 25);
        assert!(s.image_uri.contains("eu-west-1"));
        let spec = s.endpoint_spec("digest-1".into()).unwrap();
        assert_eq!(spec.max_concurrent_invocations, 4);
        assert_eq!(spec.output.prefix, "article-digest/async-outputs/");
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = settings(&[("NUM_TOPICS", "many")]).unwrap_err();
        assert!(err.to_string().contains("NUM_TOPICS"));
    }
}
