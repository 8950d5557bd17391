//! End-to-end pipeline tests with stub collaborators
//!
//! Run all of a job's stages against in-memory fetchers, a scripted model
//! provider, and a capturing renderer; no network involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use trailer_bill_analysis::error::{FetchError, ReportError};
use trailer_bill_analysis::gateway::{
    ModelError, ModelGateway, ModelProvider, PromptSpec, ProviderReply, RateLimiter, RetryPolicy,
};
use trailer_bill_analysis::models::job::{ProgressKind, ProviderKind};
use trailer_bill_analysis::services::report_builder::ReportPayload;
use trailer_bill_analysis::services::{ImpactAnalyzer, SectionMatcher};
use trailer_bill_analysis::{
    AnalysisPipeline, BillTextFetcher, CollectingSink, Config, JobRegistry, JobRequest, JobStatus,
    ReportRenderer, Stage,
};

const TWO_ITEM_BILL: &str = r#"
Assembly Bill No. 200

CHAPTER 5

An act to amend Sections 100 and 200 of the Education Code, relating to pupils.

LEGISLATIVE COUNSEL'S DIGEST

AB 200, Author. Pupils.

(1) Existing law regulates pupil records. This bill would amend Section 100 of the Education Code to require parental notice.

(2) Existing law regulates attendance accounting. This bill would amend Section 200 of the Education Code to require an annual report.

The people of the State of California do enact as follows:

SECTION 1. Section 100 of the Education Code is amended to read:
100. Parental notice text.

SEC. 2. Section 200 of the Education Code is amended to read:
200. Annual report text.
"#;

const DIGEST_ONLY_BILL: &str = r#"
Senate Bill No. 50

An act to add Section 12 to the Government Code, relating to state finance.

LEGISLATIVE COUNSEL'S DIGEST

Existing law establishes the annual budget process. This bill would state findings regarding Section 999 of the Water Code.

The people of the State of California do enact as follows:

SECTION 1. Section 12 is added to the Government Code, to read:
12. Findings text.
"#;

const THREE_ITEM_BILL: &str = r#"
Assembly Bill No. 300

An act to amend Sections 100, 200, and 300 of the Education Code, relating to school facilities.

LEGISLATIVE COUNSEL'S DIGEST

(1) Existing law does A. This bill would amend Section 100 of the Education Code.

(2) Existing law does B. This bill would amend Section 200 of the Education Code.

(3) Existing law does C. This bill would amend Section 300 of the Education Code.

The people of the State of California do enact as follows:

SECTION 1. Section 100 of the Education Code is amended to read:
100. Text A.

SEC. 2. Section 200 of the Education Code is amended to read:
200. Text B.

SEC. 3. Section 300 of the Education Code is amended to read:
300. Text C.
"#;

// ---------- stubs ----------

struct StubFetcher {
    text: &'static str,
}

#[async_trait]
impl BillTextFetcher for StubFetcher {
    async fn fetch(&self, _bill: &str, _session: &str) -> Result<String, FetchError> {
        Ok(self.text.to_string())
    }
}

struct SlowFetcher;

#[async_trait]
impl BillTextFetcher for SlowFetcher {
    async fn fetch(&self, _bill: &str, _session: &str) -> Result<String, FetchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }
}

/// Scripted provider: answers matching prompts with an empty match list and
/// analysis prompts with a canned impact; can be told to always fail the
/// analysis of one digest item.
struct ScriptedProvider {
    match_calls: AtomicUsize,
    analysis_calls: AtomicUsize,
    fail_analysis_of_item: Option<usize>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            match_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
            fail_analysis_of_item: None,
        }
    }

    fn failing_item(index: usize) -> Self {
        Self {
            fail_analysis_of_item: Some(index),
            ..Self::new()
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, prompt: &PromptSpec) -> Result<ProviderReply, ModelError> {
        if prompt.user.contains("Candidate operative sections") {
            self.match_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(ProviderReply {
                text: r#"{"matches": []}"#.to_string(),
                rationale: None,
            });
        }

        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(index) = self.fail_analysis_of_item {
            if prompt.user.contains(&format!("Digest item {}:", index)) {
                return Err(ModelError::InvalidRequest {
                    provider: ProviderKind::OpenAi,
                    message: "context too large".to_string(),
                });
            }
        }
        Ok(ProviderReply {
            text: r#"{
                "summary": "Imposes a new obligation on school districts.",
                "agency_impacts": [{
                    "agency_type": "School District",
                    "impact": "Must comply with the new requirement.",
                    "deadlines": [],
                    "requirements": ["Update board policy"]
                }],
                "practice_groups": [
                    {"name": "Governance", "relevance": "primary", "justification": "Board duty"}
                ],
                "action_items": ["Review current policy"],
                "deadlines": [],
                "requirements": []
            }"#
            .to_string(),
            rationale: None,
        })
    }
}

struct MemoryRenderer {
    payloads: Mutex<Vec<ReportPayload>>,
}

impl MemoryRenderer {
    fn new() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
        }
    }

    fn last_payload(&self) -> Option<ReportPayload> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ReportRenderer for MemoryRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<String, ReportError> {
        let mut payloads = self.payloads.lock().unwrap();
        payloads.push(payload.clone());
        Ok(format!("memory://report/{}", payloads.len()))
    }
}

// ---------- harness ----------

struct Harness {
    registry: JobRegistry,
    provider: Arc<ScriptedProvider>,
    renderer: Arc<MemoryRenderer>,
    sink: Arc<CollectingSink>,
}

fn harness(text: &'static str, provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let limiter = RateLimiter::new(4, Duration::from_secs(5));
    let retry = RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };
    let mut gateway = ModelGateway::new(limiter, retry, Duration::from_secs(5));
    gateway.register(provider.clone());
    let gateway = Arc::new(gateway);

    let renderer = Arc::new(MemoryRenderer::new());
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(StubFetcher { text }),
        SectionMatcher::new(gateway.clone()),
        ImpactAnalyzer::new(gateway),
        renderer.clone(),
    ));
    let sink = Arc::new(CollectingSink::new());
    let registry = JobRegistry::new(pipeline, sink.clone(), &Config::default());
    Harness {
        registry,
        provider,
        renderer,
        sink,
    }
}

fn request(job_id: &str, bill: &str) -> JobRequest {
    JobRequest::parse(job_id, bill, "2025", "gpt-4o").unwrap()
}

// ---------- scenarios ----------

#[tokio::test]
async fn two_item_bill_succeeds_with_deterministic_matching() {
    let h = harness(TWO_ITEM_BILL, ScriptedProvider::new());
    h.registry.submit(request("job-a", "AB 200")).unwrap();
    let job = h.registry.wait_for_terminal("job-a").await.unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(job.result_ref.as_deref().unwrap().starts_with("memory://"));
    // both items matched by code reference; no matching escalation
    assert_eq!(h.provider.match_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.provider.analysis_calls.load(Ordering::SeqCst), 2);

    let payload = h.renderer.last_payload().unwrap();
    assert_eq!(payload.bill.bill_number, "AB 200");
    assert_eq!(payload.metadata.total_changes, 2);
    assert_eq!(payload.metadata.digest_only, 0);
    assert_eq!(payload.metadata.failed, 0);
    assert_eq!(payload.sections.len(), 1);
    assert_eq!(payload.sections[0].title, "Governance");
}

#[tokio::test]
async fn stages_advance_monotonically() {
    let h = harness(TWO_ITEM_BILL, ScriptedProvider::new());
    h.registry.submit(request("job-stages", "AB 200")).unwrap();
    let job = h.registry.wait_for_terminal("job-stages").await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.current_stage, Some(Stage::Reporting));

    let stages: Vec<Stage> = h
        .sink
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            ProgressKind::StageStarted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            Stage::Fetching,
            Stage::Parsing,
            Stage::Structuring,
            Stage::Matching,
            Stage::Analyzing,
            Stage::Reporting,
        ]
    );
    for window in stages.windows(2) {
        assert!(window[0] < window[1]);
    }
    // terminal event is delivered exactly once
    let finished: Vec<_> = h
        .sink
        .events()
        .iter()
        .filter(|e| matches!(e.kind, ProgressKind::Finished { .. }))
        .cloned()
        .collect();
    assert_eq!(finished.len(), 1);
}

#[tokio::test]
async fn unresolvable_digest_item_becomes_digest_only() {
    let h = harness(DIGEST_ONLY_BILL, ScriptedProvider::new());
    h.registry.submit(request("job-b", "SB 50")).unwrap();
    let job = h.registry.wait_for_terminal("job-b").await.unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    // one escalation call, zero analysis calls
    assert_eq!(h.provider.match_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.analysis_calls.load(Ordering::SeqCst), 0);

    let payload = h.renderer.last_payload().unwrap();
    assert_eq!(payload.metadata.total_changes, 1);
    assert_eq!(payload.metadata.digest_only, 1);
    assert_eq!(payload.sections.len(), 1);
    assert_eq!(payload.sections[0].title, "No Local Agency Impact");
    let change = &payload.sections[0].changes[0];
    assert!(change.is_digest_only);
    assert!(change
        .substantive_change
        .starts_with("(Legislative Counsel's Digest) "));
    assert_eq!(
        change.impact_description,
        "No direct impact on local agencies identified."
    );
}

#[tokio::test]
async fn one_failed_unit_does_not_fail_the_job() {
    let h = harness(THREE_ITEM_BILL, ScriptedProvider::failing_item(2));
    h.registry.submit(request("job-c", "AB 300")).unwrap();
    let job = h.registry.wait_for_terminal("job-c").await.unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    let payload = h.renderer.last_payload().unwrap();
    assert_eq!(payload.metadata.total_changes, 2);
    assert_eq!(payload.metadata.failed, 1);
    assert_eq!(payload.failed_units.len(), 1);
    assert_eq!(payload.failed_units[0].digest_index, 2);
    assert_eq!(payload.failed_units[0].kind, "invalid_request");
}

#[tokio::test]
async fn all_units_failing_fails_the_job() {
    // every analysis call fails: items 1 and 2 and 3 never succeed
    struct AlwaysFailing;

    #[async_trait]
    impl ModelProvider for AlwaysFailing {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }
        async fn complete(&self, prompt: &PromptSpec) -> Result<ProviderReply, ModelError> {
            if prompt.user.contains("Candidate operative sections") {
                return Ok(ProviderReply {
                    text: r#"{"matches": []}"#.to_string(),
                    rationale: None,
                });
            }
            Err(ModelError::Auth {
                provider: ProviderKind::OpenAi,
            })
        }
    }

    let limiter = RateLimiter::new(4, Duration::from_secs(5));
    let retry = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };
    let mut gateway = ModelGateway::new(limiter, retry, Duration::from_secs(5));
    gateway.register(Arc::new(AlwaysFailing));
    let gateway = Arc::new(gateway);

    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(StubFetcher {
            text: THREE_ITEM_BILL,
        }),
        SectionMatcher::new(gateway.clone()),
        ImpactAnalyzer::new(gateway),
        Arc::new(MemoryRenderer::new()),
    ));
    let registry = JobRegistry::new(pipeline, Arc::new(CollectingSink::new()), &Config::default());

    registry.submit(request("job-fail", "AB 300")).unwrap();
    let job = registry.wait_for_terminal("job-fail").await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let (kind, _) = job.last_error.unwrap();
    assert_eq!(kind, "analysis_error");
}

#[tokio::test]
async fn cancellation_stops_a_running_job() {
    let sink = Arc::new(CollectingSink::new());
    let limiter = RateLimiter::new(1, Duration::from_secs(5));
    let mut gateway = ModelGateway::new(limiter, RetryPolicy::default(), Duration::from_secs(5));
    gateway.register(Arc::new(ScriptedProvider::new()));
    let gateway = Arc::new(gateway);
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(SlowFetcher),
        SectionMatcher::new(gateway.clone()),
        ImpactAnalyzer::new(gateway),
        Arc::new(MemoryRenderer::new()),
    ));
    let registry = JobRegistry::new(pipeline, sink.clone(), &Config::default());

    registry.submit(request("job-cancel", "AB 1")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.cancel("job-cancel"));

    // cancelled records are evicted immediately, so observe the terminal
    // event rather than the job record
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let finished = loop {
        if let Some(event) = sink
            .events()
            .into_iter()
            .find(|e| matches!(e.kind, ProgressKind::Finished { .. }))
        {
            break event;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "cancellation did not take effect"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    match finished.kind {
        ProgressKind::Finished { status, .. } => assert_eq!(status, JobStatus::Cancelled),
        _ => unreachable!(),
    }

    // the record is gone once the terminal event is out
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(registry.status("job-cancel").is_none());
}

#[tokio::test]
async fn duplicate_job_ids_are_rejected() {
    let h = harness(TWO_ITEM_BILL, ScriptedProvider::new());
    h.registry.submit(request("job-dup", "AB 200")).unwrap();
    let err = h.registry.submit(request("job-dup", "AB 200")).unwrap_err();
    assert!(err.to_string().contains("already registered"));
    // the first submission still completes
    let job = h.registry.wait_for_terminal("job-dup").await.unwrap();
    assert!(job.status.is_terminal());
}

#[tokio::test]
async fn job_timeout_fails_the_job() {
    let mut config = Config::default();
    config.job_timeout_secs = Some(1);

    let limiter = RateLimiter::new(1, Duration::from_secs(5));
    let mut gateway = ModelGateway::new(limiter, RetryPolicy::default(), Duration::from_secs(5));
    gateway.register(Arc::new(ScriptedProvider::new()));
    let gateway = Arc::new(gateway);
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(SlowFetcher),
        SectionMatcher::new(gateway.clone()),
        ImpactAnalyzer::new(gateway),
        Arc::new(MemoryRenderer::new()),
    ));
    let registry = JobRegistry::new(pipeline, Arc::new(CollectingSink::new()), &config);

    registry.submit(request("job-timeout", "AB 1")).unwrap();
    let job = tokio::time::timeout(
        Duration::from_secs(10),
        registry.wait_for_terminal("job-timeout"),
    )
    .await
    .expect("timeout never fired")
    .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error.unwrap().0, "job_timeout");
}

#[tokio::test]
async fn substeps_report_full_coverage() {
    let h = harness(THREE_ITEM_BILL, ScriptedProvider::new());
    h.registry.submit(request("job-steps", "AB 300")).unwrap();
    h.registry.wait_for_terminal("job-steps").await.unwrap();

    let analyzing_steps: Vec<(usize, usize)> = h
        .sink
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            ProgressKind::SubStep {
                stage: Stage::Analyzing,
                current,
                total,
                ..
            } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(analyzing_steps.len(), 3);
    assert!(analyzing_steps.iter().all(|&(_, total)| total == 3));
    assert_eq!(analyzing_steps.last().unwrap().0, 3);
}
