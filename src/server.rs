// src/server.rs
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::VerifyError;
use crate::pipeline::{Pipeline, PipelineStatus};
use crate::types::FinalVerdict;

#[derive(Clone)]
pub struct Engine {
    pub pipeline: Arc<Pipeline>,
}

impl Engine {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }
}

/// Exactly one of `text` or `url`.
#[derive(Debug, Deserialize)]
pub struct VerifyReq {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    #[serde(flatten)]
    pipeline: PipelineStatus,
}

pub struct ApiError(StatusCode, String);

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        let status = match &e {
            VerifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VerifyError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

pub async fn verify(State(engine): State<Engine>, Json(req): Json<VerifyReq>) -> Result<Json<FinalVerdict>, ApiError> {
    let input = match (req.text, req.url) {
        (Some(text), None) => text,
        (None, Some(url)) => url,
        _ => return Err(ApiError(StatusCode::BAD_REQUEST, "provide exactly one of `text` or `url`".into())),
    };
    match engine.pipeline.verify_article(&input).await {
        Ok(verdict) => {
            info!(verdict = %verdict.overall_verdict, confidence = verdict.confidence_score, "article verified");
            Ok(Json(verdict))
        }
        Err(e) => {
            error!(error = %e, "verification failed");
            Err(e.into())
        }
    }
}

pub async fn health(State(engine): State<Engine>) -> impl IntoResponse {
    Json(HealthResp { status: "ok", pipeline: engine.pipeline.status() })
}

pub fn router(engine: Engine) -> Router {
    Router::new().route("/verify", post(verify)).route("/health", get(health)).with_state(engine)
}

pub async fn run_server(engine: Engine, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}
