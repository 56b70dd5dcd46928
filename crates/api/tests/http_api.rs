//! Integration tests for the HTTP surface: status codes, envelopes, error
//! bodies and middleware.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, body_text, delete, get, post_json};
use genstudio_core::types::JobId;
use serde_json::json;

async fn wait_for_status(env: &common::TestEnv, job_id: &str, status: &str) -> serde_json::Value {
    for _ in 0..200 {
        let json = body_json(get(env.app(), &format!("/api/v1/jobs/{job_id}")).await).await;
        if json["data"]["status"] == status {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {status}");
}

// ---------------------------------------------------------------------------
// Test: GET /health reports engine occupancy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let env = common::test_env().await;
    let response = get(env.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["provider"], "scripted");
    assert_eq!(json["active_jobs"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let env = common::test_env().await;
    let response = get(env.app(), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: submitting an image job returns 202 and the job becomes pollable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_submission_is_accepted_and_completes() {
    let env = common::test_env().await;
    let response = post_json(
        env.app(),
        "/api/v1/images",
        json!({ "prompt": "a paper boat", "count": 2, "aspect_ratio": "1:1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();
    assert!(json["data"]["session_id"].is_string());

    let job = wait_for_status(&env, &job_id, "completed").await;
    assert_eq!(job["kind"], "image");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["partial_results"].as_array().unwrap().len(), 2);
    assert!(job["error"].is_null());
}

// ---------------------------------------------------------------------------
// Test: validation failures map to 400 with the standard error body
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_video_returns_400() {
    let env = common::test_env().await;
    let response = post_json(
        env.app(),
        "/api/v1/videos",
        json!({ "prompt": "a comet", "resolution": "1080p", "duration_seconds": 4 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("8"));
    assert!(env.engine.registry().is_empty());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let env = common::test_env().await;
    let response = get(env.app(), &format!("/api/v1/jobs/{}", JobId::new())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn expired_session_returns_410() {
    let env = common::test_env().await;
    let stale = env.engine.sessions().open_at(
        genstudio_core::types::ConversationHandle::generate(),
        chrono::Utc::now() - chrono::Duration::hours(7),
    );

    let response = post_json(
        env.app(),
        "/api/v1/images",
        json!({ "prompt": "make it blue", "session_id": stale.id }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_json(response).await["code"], "SESSION_EXPIRED");
}

// ---------------------------------------------------------------------------
// Test: extension endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_extension_round_trip() {
    let env = common::test_env().await;
    let response = post_json(env.app(), "/api/v1/videos", json!({ "prompt": "a desert road" })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let source_id = body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_status(&env, &source_id, "completed").await;

    let capability =
        body_json(get(env.app(), &format!("/api/v1/jobs/{source_id}/extension")).await).await;
    assert_eq!(capability["data"]["extendable"], true);
    assert_eq!(capability["data"]["extensions_remaining"], 20);

    let response = post_json(
        env.app(),
        &format!("/api/v1/videos/{source_id}/extend"),
        json!({ "prompt": "the road climbs into hills" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let child_id = body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let child = wait_for_status(&env, &child_id, "completed").await;
    assert_eq!(child["parent_job_id"], source_id.as_str());
    assert_eq!(child["total_duration_secs"], 15);
}

// ---------------------------------------------------------------------------
// Test: the events endpoint streams snapshots until the job finishes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_events_stream_ends_with_terminal_snapshot() {
    let env = common::test_env().await;
    let response = post_json(env.app(), "/api/v1/videos", json!({ "prompt": "rain on glass" })).await;
    let job_id = body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get(env.app(), &format!("/api/v1/jobs/{job_id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = body_text(response).await;
    let snapshots: Vec<serde_json::Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    assert!(!snapshots.is_empty());
    assert_eq!(snapshots.last().unwrap()["status"], "completed");
    assert!(body.contains("event: job"));
}

#[tokio::test]
async fn job_events_are_not_compressed() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let env = common::test_env().await;
    let response = post_json(env.app(), "/api/v1/videos", json!({ "prompt": "rain on glass" })).await;
    let job_id = body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .uri(format!("/api/v1/jobs/{job_id}/events"))
        .header("accept-encoding", "gzip")
        .body(Body::empty())
        .unwrap();
    let response = env.app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-encoding").is_none());
    assert!(body_text(response).await.contains("event: job"));
}

// ---------------------------------------------------------------------------
// Test: sessions can be closed over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_session_returns_204_then_404() {
    let env = common::test_env().await;
    let response = post_json(env.app(), "/api/v1/images", json!({ "prompt": "a lamp" })).await;
    let session_id = body_json(response).await["data"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let uri = format!("/api/v1/sessions/{session_id}");
    assert_eq!(delete(env.app(), &uri).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(env.app(), &uri).await.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: history listing, filtering, deletion and clearing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_endpoints() {
    let env = common::test_env().await;

    let image = post_json(env.app(), "/api/v1/images", json!({ "prompt": "a kite" })).await;
    let image_id = body_json(image).await["data"]["job_id"].as_str().unwrap().to_string();
    let video = post_json(env.app(), "/api/v1/videos", json!({ "prompt": "a kite flying" })).await;
    let video_id = body_json(video).await["data"]["job_id"].as_str().unwrap().to_string();
    wait_for_status(&env, &image_id, "completed").await;
    wait_for_status(&env, &video_id, "completed").await;

    let all = body_json(get(env.app(), "/api/v1/history").await).await;
    assert_eq!(all["data"]["total"], 2);

    let videos = body_json(get(env.app(), "/api/v1/history?kind=video").await).await;
    assert_eq!(videos["data"]["total"], 1);
    let record = &videos["data"]["items"][0];
    assert_eq!(record["job_id"], video_id.as_str());
    let record_id = record["record_id"].as_str().unwrap().to_string();

    let page = body_json(get(env.app(), "/api/v1/history?limit=1").await).await;
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["data"]["next_cursor"], 1);

    let fetched = get(env.app(), &format!("/api/v1/history/{record_id}")).await;
    assert_eq!(fetched.status(), StatusCode::OK);

    let uri = format!("/api/v1/history/{record_id}");
    assert_eq!(delete(env.app(), &uri).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(env.app(), &uri).await.status(), StatusCode::NOT_FOUND);

    let cleared = body_json(delete(env.app(), "/api/v1/history?kind=image").await).await;
    assert_eq!(cleared["data"]["deleted"], 1);
    assert!(env.history.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: prompt enhancement answers synchronously and creates no job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enhance_prompt_returns_rewritten_prompt() {
    let env = common::test_env().await;

    let response = post_json(
        env.app(),
        "/api/v1/prompts/enhance",
        json!({ "prompt": "a cat in space", "target_type": "video" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let enhanced = json["data"]["enhanced_prompt"].as_str().unwrap();
    assert!(enhanced.starts_with("a cat in space, "));

    // target_type defaults to image.
    let image = body_json(
        post_json(
            env.app(),
            "/api/v1/prompts/enhance",
            json!({ "prompt": "a cat in space" }),
        )
        .await,
    )
    .await;
    assert_ne!(image["data"]["enhanced_prompt"], json["data"]["enhanced_prompt"]);

    assert!(env.engine.registry().is_empty());
    assert_eq!(env.provider.call_count(), 0);
}

#[tokio::test]
async fn enhance_prompt_rejects_empty_prompt() {
    let env = common::test_env().await;
    let response = post_json(
        env.app(),
        "/api/v1/prompts/enhance",
        json!({ "prompt": "   ", "target_type": "image" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn enhance_prompt_provider_failure_is_internal_error() {
    let env = common::test_env().await;
    env.provider.fail_next_enhancement("model unavailable");

    let response = post_json(
        env.app(),
        "/api/v1/prompts/enhance",
        json!({ "prompt": "a cat" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("model unavailable"));
}
