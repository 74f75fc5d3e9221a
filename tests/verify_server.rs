mod support;

use newsverify_rs::server::{self, Engine};
use serde_json::{json, Value};
use support::*;
use tower::ServiceExt; // for `oneshot`

fn engine(fetched: Option<&str>) -> Engine {
    let claim = "The city council approved a 2 billion dollar budget on Tuesday";
    Engine::new(pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(claim, 0.9)])),
        FakeSearcher::returning(vec![hit(
            "https://reuters.com/world/budget",
            "The city council approved a 2 billion dollar budget on Tuesday, officials said.",
        )]),
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: fetched.map(str::to_string) },
    ))
}

async fn call(engine: Engine, req: http::Request<axum::body::Body>) -> (http::StatusCode, Value) {
    let resp = server::router(engine).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_verify(payload: Value) -> http::Request<axum::body::Body> {
    http::Request::post("/verify")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(&payload).unwrap().into())
        .unwrap()
}

#[tokio::test]
async fn verify_text_returns_verdict_json() {
    let (status, v) = call(
        engine(None),
        post_verify(json!({ "text": "The city council approved a 2 billion dollar budget on Tuesday." })),
    )
    .await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(v["overallVerdict"], "LIKELY_TRUE");
    assert_eq!(v["claimBreakdown"].as_array().unwrap().len(), 1);
    assert_eq!(v["evidenceCards"][0]["relationship"], "SUPPORTS");
    assert_eq!(v["evidenceCards"][0]["sourceURL"], "https://reuters.com/world/budget");
    let confidence = v["confidenceScore"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&confidence));
    assert!(!v["explanation"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn verify_url_uses_fetcher() {
    let article = "The city council approved a 2 billion dollar budget on Tuesday.";
    let (status, v) = call(engine(Some(article)), post_verify(json!({ "url": "https://news.example/a" }))).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(v["overallVerdict"], "LIKELY_TRUE");

    let (status, v) = call(engine(None), post_verify(json!({ "url": "https://news.example/gone" }))).await;
    assert_eq!(status, http::StatusCode::BAD_GATEWAY);
    assert!(v["error"].as_str().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (status, _) = call(engine(None), post_verify(json!({}))).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);

    let both = json!({ "text": "some text", "url": "https://news.example/a" });
    let (status, _) = call(engine(None), post_verify(both)).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);

    let (status, v) = call(engine(None), post_verify(json!({ "text": "   " }))).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("invalid input"));
}

#[tokio::test]
async fn health_reports_collaborators() {
    let req = http::Request::get("/health").body(axum::body::Body::empty()).unwrap();
    let (status, v) = call(engine(None), req).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["llm"], "fake-llm");
    assert_eq!(v["search"], "fake-search");
    assert_eq!(v["nliModel"], "fake-nli");
    assert_eq!(v["nliState"], "unloaded");
}
