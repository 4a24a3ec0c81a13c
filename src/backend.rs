//! Service wiring: which object store, topic modeler and inference service
//! a command talks to.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::{
    config::Settings,
    storage::{local::LocalObjectStore, ObjectStore},
    summarize::InferenceService,
    topics::TopicModeler,
};

const NO_AWS_FEATURE: &str = "needs a build with the `aws` feature";
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
const STORAGE_ONLY: &str =
    "is disabled while STORE_ROOT selects the local object store (storage-only mode)";

#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn ObjectStore>,
    topics: Option<Arc<dyn TopicModeler>>,
    inference: Option<Arc<dyn InferenceService>>,
    unavailable: &'static str,
}

impl Backend {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        topics: Option<Arc<dyn TopicModeler>>,
        inference: Option<Arc<dyn InferenceService>>,
    ) -> Self {
        Self {
            store,
            topics,
            inference,
            unavailable: NO_AWS_FEATURE,
        }
    }

    /// Filesystem store with no cloud services behind it.
    fn local_only(root: impl Into<std::path::PathBuf>, unavailable: &'static str) -> Self {
        let root = root.into();
        info!(root = %root.display(), "using local object store");
        Self {
            unavailable,
            ..Self::new(Arc::new(LocalObjectStore::new(root)), None, None)
        }
    }

    /// Build the backend for the current feature set and settings.
    ///
    /// `STORE_ROOT` switches to storage-only mode. The managed services only
    /// see real S3, so they are left out.
    #[cfg(feature = "aws")]
    pub async fn connect(settings: &Settings) -> Result<Self> {
        use aws_config::BehaviorVersion;
        use aws_sdk_s3::config::Region;
        use tracing::warn;

        use crate::{
            storage::s3::S3ObjectStore, summarize::sagemaker::SageMakerInference,
            topics::comprehend::ComprehendTopicModeler,
        };

        if let Some(root) = &settings.store_root {
            warn!("STORE_ROOT is set; topic modeling and summarisation are disabled");
            return Ok(Self::local_only(root, STORAGE_ONLY));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.aws_region.clone()))
            .load()
            .await;

        let s3: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&sdk_config));
        let store = s3.clone();
        let topics = Arc::new(ComprehendTopicModeler::new(&sdk_config)) as Arc<dyn TopicModeler>;
        let inference = Arc::new(SageMakerInference::new(
            &sdk_config,
            s3,
            settings.async_inputs_location(),
        )) as Arc<dyn InferenceService>;
        info!(region = %settings.aws_region, "connected to AWS");
        Ok(Self::new(store, Some(topics), Some(inference)))
    }

    /// Without cloud support only the filesystem store is available.
    #[cfg(not(feature = "aws"))]
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let root = settings
            .store_root
            .clone()
            .unwrap_or_else(|| settings.join_data("store"));
        Ok(Self::local_only(root, NO_AWS_FEATURE))
    }

    pub fn topics(&self) -> Result<&dyn TopicModeler> {
        self.topics
            .as_deref()
            .ok_or_else(|| anyhow!("topic modeling {}", self.unavailable))
    }

    pub fn inference(&self) -> Result<&dyn InferenceService> {
        self.inference
            .as_deref()
            .ok_or_else(|| anyhow!("summarisation {}", self.unavailable))
    }
}
