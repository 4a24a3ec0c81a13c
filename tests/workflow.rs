//! Drives every stage against the filesystem store and scripted services.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use article_digest::{
    error::{DigestError, Result},
    join::JoinedTable,
    retry::WaitPolicy,
    sampler,
    select,
    storage::{local::LocalObjectStore, ObjectStore, StorageLocation},
    summarize::{
        self, EndpointHandle, EndpointSpec, EndpointStatus, InferenceService, PendingInference,
        SummaryRequest,
    },
    teardown,
    topics::{self, JobDescription, JobHandle, JobStatus, TopicJobRequest, TopicModeler},
};
use async_trait::async_trait;
use chrono::Utc;
use flate2::{write::GzEncoder, Compression};
use rand::{rngs::StdRng, SeedableRng};

const TOPIC_TERMS: &str = "topic,term,weight\n000,gene,0.9\n000,cell,0.5\n001,virus,0.8\n";

/// Completes on the second describe and drops its archive into the store.
struct InstantModeler {
    store: Arc<LocalObjectStore>,
    described: AtomicUsize,
}

#[async_trait]
impl TopicModeler for InstantModeler {
    async fn submit(&self, request: &TopicJobRequest) -> Result<JobHandle> {
        let staged = self.store.list(&request.input).await?;
        let doc_topics: String = staged
            .iter()
            .map(|key| format!("{},000,0.75\n", sampler_name(key)))
            .collect();
        let archive = tarball(&[
            ("output/topic-terms.csv", TOPIC_TERMS.to_string()),
            (
                "output/doc-topics.csv",
                format!("docname,topic,proportion\n{doc_topics}"),
            ),
        ]);
        let key = request.output.key_for("job-1/output/output.tar.gz");
        self.store.put(&request.output.bucket, &key, archive).await?;
        Ok(JobHandle {
            job_id: "job-1".into(),
            job_name: request.job_name.clone(),
            submitted_at: Utc::now(),
        })
    }

    async fn describe(&self, _job_id: &str) -> Result<JobDescription> {
        let n = self.described.fetch_add(1, Ordering::SeqCst);
        Ok(if n == 0 {
            JobDescription {
                status: JobStatus::InProgress,
                output_uri: None,
                message: None,
            }
        } else {
            JobDescription {
                status: JobStatus::Completed,
                output_uri: Some("s3://work/digest/topics-output/job-1/output/output.tar.gz".into()),
                message: None,
            }
        })
    }
}

fn sampler_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn tarball(entries: &[(&str, String)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// Echoes the first sentence back as the summary after one pending poll.
struct EchoInference {
    store: Arc<LocalObjectStore>,
    polls: AtomicUsize,
    deleted: AtomicBool,
}

#[async_trait]
impl InferenceService for EchoInference {
    async fn deploy(&self, spec: &EndpointSpec) -> Result<EndpointHandle> {
        assert_eq!(spec.max_concurrent_invocations, 4);
        Ok(EndpointHandle {
            endpoint_name: spec.name.clone(),
            config_name: format!("{}-config", spec.name),
            model_name: format!("{}-model", spec.name),
            deployed_at: Utc::now(),
        })
    }

    async fn endpoint_status(&self, _endpoint: &EndpointHandle) -> Result<EndpointStatus> {
        Ok(EndpointStatus::InService)
    }

    async fn submit(
        &self,
        _endpoint: &EndpointHandle,
        request: &SummaryRequest,
    ) -> Result<PendingInference> {
        let first = request.inputs.split('.').next().unwrap_or_default();
        let body = serde_json::to_vec(&serde_json::json!([{ "summary_text": first }]))?;
        self.store
            .put("work", "digest/async-outputs/result.out", body)
            .await?;
        Ok(PendingInference {
            inference_id: Some("inf-1".into()),
            output_location: "s3://work/digest/async-outputs/result.out".into(),
            failure_location: None,
        })
    }

    async fn poll_result(&self, pending: &PendingInference) -> Result<Option<Vec<u8>>> {
        if self.polls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        let location: StorageLocation = pending.output_location.parse()?;
        self.store.try_get(&location.bucket, &location.prefix).await
    }

    async fn delete(&self, _endpoint: &EndpointHandle) -> Result<()> {
        self.deleted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn seed_source(store: &LocalObjectStore, count: usize) {
    for i in 0..count {
        let body = if i % 2 == 0 {
            format!("Paper {i}\nBackground\tViruses replicate in host cells. More text.")
        } else {
            format!("Paper {i}\nMethods only.")
        };
        store
            .put("corpus", &format!("papers/{i:03}.txt"), body.into_bytes())
            .await
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn full_workflow_against_fakes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path().join("store")));
    seed_source(&store, 6).await;

    let source = StorageLocation::new("corpus", "papers/");
    let work = StorageLocation::new("work", "digest/");
    let local = dir.path().join("staged");

    let articles = sampler::list_articles(store.as_ref(), &source).await.unwrap();
    assert_eq!(articles.len(), 6);
    let mut rng = StdRng::seed_from_u64(42);
    let picked = sampler::sample_articles(&articles, 6, &mut rng).unwrap();
    let staged = sampler::stage_articles(
        store.as_ref(),
        &source,
        &picked,
        &work.child("staged"),
        &local,
    )
    .await
    .unwrap();
    assert_eq!(staged.len(), 6);
    assert_eq!(store.list(&work.child("staged")).await.unwrap().len(), 6);

    let modeler = InstantModeler {
        store: store.clone(),
        described: AtomicUsize::new(0),
    };
    let job = modeler
        .submit(&TopicJobRequest {
            job_name: "digest".into(),
            input: staged.location.clone(),
            output: work.child("topics-output"),
            num_topics: 2,
            role_arn: "arn:aws:iam::1:role/comprehend".into(),
        })
        .await
        .unwrap();
    assert!(matches!(
        topics::check_job(&modeler, &job.job_id).await,
        Err(DigestError::JobIncomplete { .. })
    ));
    let output_uri = topics::await_job(&modeler, &job.job_id, WaitPolicy::new(3, Duration::from_secs(60)))
        .await
        .unwrap();
    let files = topics::fetch_output(store.as_ref(), &output_uri, &dir.path().join("topics"))
        .await
        .unwrap();
    let table = JoinedTable::from_files(&files.topic_terms, &files.doc_topics).unwrap();
    assert_eq!(table.len(), 6);
    assert!(table
        .rows
        .iter()
        .all(|row| row.terms.as_deref() == Some("gene, cell")));

    let inference = EchoInference {
        store: store.clone(),
        polls: AtomicUsize::new(0),
        deleted: AtomicBool::new(false),
    };
    let spec = EndpointSpec {
        name: "digest-endpoint".into(),
        model_id: "facebook/bart-large-cnn".into(),
        task: "summarization".into(),
        image_uri: "image".into(),
        instance_type: "ml.m5.xlarge".into(),
        role_arn: "arn:aws:iam::1:role/sagemaker".into(),
        max_concurrent_invocations: summarize::MAX_CONCURRENT_INVOCATIONS,
        output: work.child("async-outputs"),
    };
    let endpoint = inference.deploy(&spec).await.unwrap();
    summarize::wait_in_service(&inference, &endpoint, WaitPolicy::new(2, Duration::from_secs(30)))
        .await
        .unwrap();
    let selected = select::select_input(&staged.local_files, &mut rng, 20).unwrap();
    assert!(selected.text.starts_with("Background Viruses"));
    let summary = summarize::summarize(&inference, &endpoint, &selected.text)
        .await
        .unwrap();
    assert_eq!(summary, "Background Viruses replicate in host cells");

    let service: &dyn InferenceService = &inference;
    let report = teardown::teardown(
        Some((service, &endpoint)),
        store.as_ref(),
        &work,
        &[local.as_path()],
    )
    .await
    .unwrap();
    assert!(report.endpoint_deleted);
    assert!(inference.deleted.load(Ordering::SeqCst));
    assert!(store.list(&work).await.unwrap().is_empty());
    assert_eq!(store.list(&source).await.unwrap().len(), 6);
    assert!(!local.exists());
}

#[tokio::test]
async fn sampling_more_than_available_fails_before_staging() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(dir.path());
    seed_source(&store, 3).await;
    let articles = sampler::list_articles(&store, &StorageLocation::new("corpus", "papers/"))
        .await
        .unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(
        sampler::sample_articles(&articles, 4, &mut rng),
        Err(DigestError::InsufficientData {
            requested: 4,
            available: 3
        })
    ));
}

#[test]
fn request_payload_shape() {
    insta::assert_json_snapshot!(SummaryRequest::new("Background Genes matter."), @r###"
    {
      "inputs": "Background Genes matter."
    }
    "###);
}
