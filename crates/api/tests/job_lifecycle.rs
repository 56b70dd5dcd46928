//! Integration tests for the job lifecycle: submission, progress, results,
//! terminal states and the history record written on completion.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use genstudio_api::engine::SubmitImage;
use genstudio_core::error::CoreError;
use genstudio_core::job::{Job, JobErrorKind, JobStatus};
use genstudio_core::params::{ImageParams, VideoParams};
use genstudio_core::types::JobId;
use genstudio_provider::scripted::ScriptStep;
use genstudio_provider::GenerationRequest;
use genstudio_store::models::{HistoryFilter, PageRequest};

fn image_params(count: u32) -> ImageParams {
    serde_json::from_value(serde_json::json!({ "prompt": "a red fox in snow", "count": count }))
        .unwrap()
}

fn video_params() -> VideoParams {
    serde_json::from_value(serde_json::json!({ "prompt": "waves at dusk" })).unwrap()
}

async fn wait_terminal(env: &common::TestEnv, id: JobId) -> Job {
    env.engine
        .watch(id)
        .unwrap()
        .wait_terminal()
        .await
        .expect("job should reach a terminal state")
}

// ---------------------------------------------------------------------------
// Test: results become visible one by one while the job is processing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn partial_results_grow_while_processing() {
    let env = common::test_env().await;
    env.provider.push_script(vec![
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Artifact("fox-1.png".into()),
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Artifact("fox-2.png".into()),
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Artifact("fox-3.png".into()),
    ]);

    let submission = env
        .engine
        .submit_image(SubmitImage {
            params: image_params(3),
            session_id: None,
        })
        .unwrap();

    let mut lengths = Vec::new();
    let mut progress = Vec::new();
    let job = loop {
        let job = env.engine.get_status(submission.job_id).unwrap();
        if lengths.last() != Some(&job.partial_results.len()) {
            lengths.push(job.partial_results.len());
        }
        progress.push(job.progress);
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    assert_eq!(lengths, vec![0, 1, 2, 3]);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.partial_results.len(), 3);
    assert!(job.error.is_none());
}

// ---------------------------------------------------------------------------
// Test: a completed job is already in history when Completed is observable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_job_is_recorded_in_history() {
    let env = common::test_env().await;
    let submission = env.engine.submit_video(video_params()).unwrap();

    let job = wait_terminal(&env, submission.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    let page = env
        .history
        .list(HistoryFilter::default(), PageRequest::default())
        .await;
    assert_eq!(page.total, 1);
    let item = &page.items[0];
    assert_eq!(item.job_id, submission.job_id);
    assert_eq!(item.prompt, "waves at dusk");
    assert_eq!(item.result_refs, job.partial_results);
}

// ---------------------------------------------------------------------------
// Test: two jobs finishing together both land in history exactly once
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_completions_are_all_recorded() {
    let env = common::test_env().await;
    for name in ["left.png", "right.png"] {
        env.provider.push_script(vec![
            ScriptStep::Wait(Duration::from_millis(20)),
            ScriptStep::Artifact(name.into()),
        ]);
    }

    let first = env
        .engine
        .submit_image(SubmitImage {
            params: image_params(1),
            session_id: None,
        })
        .unwrap();
    let second = env
        .engine
        .submit_image(SubmitImage {
            params: image_params(1),
            session_id: None,
        })
        .unwrap();

    wait_terminal(&env, first.job_id).await;
    wait_terminal(&env, second.job_id).await;

    let page = env
        .history
        .list(HistoryFilter::default(), PageRequest::default())
        .await;
    assert_eq!(page.total, 2);
    let mut job_ids: Vec<JobId> = page.items.iter().map(|i| i.job_id).collect();
    job_ids.sort();
    let mut expected = vec![first.job_id, second.job_id];
    expected.sort();
    assert_eq!(job_ids, expected);
}

// ---------------------------------------------------------------------------
// Test: provider errors fail the job and nothing is recorded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_error_marks_job_failed() {
    let env = common::test_env().await;
    env.provider.push_script(vec![
        ScriptStep::Progress(40),
        ScriptStep::Fail("content policy violation".into()),
    ]);

    let submission = env.engine.submit_video(video_params()).unwrap();
    let job = wait_terminal(&env, submission.job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.kind, JobErrorKind::Provider);
    assert!(error.message.contains("content policy violation"));
    assert!(env.history.is_empty().await);
}

#[tokio::test]
async fn provider_panic_marks_job_failed() {
    let env = common::test_env().await;
    env.provider
        .push_script(vec![ScriptStep::Panic("decoder crashed".into())]);

    let submission = env.engine.submit_video(video_params()).unwrap();
    let job = wait_terminal(&env, submission.job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().kind, JobErrorKind::Internal);
}

// ---------------------------------------------------------------------------
// Test: a job that never finishes is failed by the processing limit
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stuck_job_times_out() {
    let env = common::test_env_with(|engine| {
        engine.processing_job_max = Duration::from_secs(30);
    })
    .await;
    env.provider
        .push_script(vec![ScriptStep::Progress(30), ScriptStep::Hang]);

    let submission = env.engine.submit_video(video_params()).unwrap();
    let job = wait_terminal(&env, submission.job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert_eq!(error.kind, JobErrorKind::Timeout);
    assert_eq!(job.progress, 30);
}

// ---------------------------------------------------------------------------
// Test: invalid submissions are rejected before any job exists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_submission_creates_no_job() {
    let env = common::test_env().await;

    let mut params = video_params();
    params.duration_seconds = 5;
    assert_matches!(
        env.engine.submit_video(params),
        Err(CoreError::Validation(_))
    );

    assert_matches!(
        env.engine.submit_image(SubmitImage {
            params: image_params(11),
            session_id: None,
        }),
        Err(CoreError::Validation(_))
    );

    assert!(env.engine.registry().is_empty());
    assert_eq!(env.provider.call_count(), 0);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let env = common::test_env().await;
    assert_matches!(
        env.engine.get_status(JobId::new()),
        Err(CoreError::NotFound { entity: "Job", .. })
    );
    assert_matches!(
        env.engine.watch(JobId::new()),
        Err(CoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: abandoning a watch does not stop the job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disposing_a_watch_leaves_the_job_running() {
    let env = common::test_env().await;
    let submission = env.engine.submit_video(video_params()).unwrap();

    let watch = env.engine.watch(submission.job_id).unwrap();
    watch.dispose();

    let job = wait_terminal(&env, submission.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
}

// ---------------------------------------------------------------------------
// Test: the provider receives the client's parameters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reference_images_reach_provider_but_not_job_record() {
    let env = common::test_env().await;
    let mut params = image_params(1);
    params.reference_images = vec!["aGVsbG8=".into()];

    let submission = env
        .engine
        .submit_image(SubmitImage {
            params,
            session_id: None,
        })
        .unwrap();
    wait_terminal(&env, submission.job_id).await;

    let calls = env.provider.calls();
    assert_eq!(calls.len(), 1);
    assert_matches!(&calls[0], GenerationRequest::Image(req) if req.params.reference_images.len() == 1 && !req.is_edit);

    let job = env.engine.get_status(submission.job_id).unwrap();
    let json = serde_json::to_value(&job).unwrap();
    assert!(json["params"].get("reference_images").is_none());
}
