use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use texforge_core::api::{ErrorResponse, OutputsResponse, SubmitRequest, SubmitResponse};
use texforge_core::export::output_file_name;
use texforge_core::{OutputKind, Pipeline, RunSnapshot, SubmitError};
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let state = AppState { pipeline };
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/v1/runs", post(submit_run))
        .route("/v1/runs/current", get(current_run))
        .route("/v1/outputs", get(list_outputs))
        .route("/v1/outputs/{kind}", get(download_output))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Accepts the prompt, then runs the pipeline in the background.
async fn submit_run(
    State(st): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let ticket = st.pipeline.submit(&req.prompt).await?;
    let run_id = ticket.run_id().to_string();
    tracing::info!(%run_id, prompt = ticket.prompt(), "run accepted");

    let pipeline = Arc::clone(&st.pipeline);
    tokio::spawn(async move {
        pipeline.drive(ticket).await;
    });

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { run_id })))
}

async fn current_run(State(st): State<AppState>) -> Json<RunSnapshot> {
    Json(st.pipeline.snapshot().await)
}

async fn list_outputs(State(st): State<AppState>) -> Json<OutputsResponse> {
    let snap = st.pipeline.snapshot().await;
    Json(OutputsResponse::from_snapshot(&snap))
}

async fn download_output(
    State(st): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Response, AppError> {
    let kind: OutputKind = kind
        .parse()
        .map_err(|e| AppError::new(StatusCode::NOT_FOUND, e))?;

    let snap = st.pipeline.snapshot().await;
    let image = snap
        .results
        .get(&kind)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("{kind} not available")))?;

    let bytes = image
        .decode()
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let disposition = format!("attachment; filename=\"{}\"", output_file_name(kind, image));

    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl ToString) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(value: SubmitError) -> Self {
        let status = match value {
            SubmitError::BlankPrompt => StatusCode::BAD_REQUEST,
            SubmitError::RunActive => StatusCode::CONFLICT,
        };
        Self::new(status, value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.message, "request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "request rejected");
        }
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use async_trait::async_trait;
    use texforge_core::{GenerationError, Generator, ImageData, RunPhase};
    use tokio::sync::Notify;

    use super::*;

    struct FakeGenerator {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate_base(&self, _prompt: &str) -> Result<ImageData, GenerationError> {
            self.gate.notified().await;
            Ok(ImageData::from_bytes("image/png", b"albedo-bytes"))
        }

        async fn generate_derived(
            &self,
            _base: &ImageData,
            kind: OutputKind,
        ) -> Result<ImageData, GenerationError> {
            if kind == OutputKind::Metallic {
                return Err(GenerationError::NoImageProduced { kind });
            }
            Ok(ImageData::from_bytes("image/png", kind.as_str().as_bytes()))
        }
    }

    async fn spawn_app() -> (SocketAddr, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let pipeline = Arc::new(Pipeline::new(Arc::new(FakeGenerator {
            gate: Arc::clone(&gate),
        })));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(pipeline)).await.unwrap();
        });
        (addr, gate)
    }

    async fn wait_until_idle(client: &reqwest::Client, addr: SocketAddr) -> RunSnapshot {
        for _ in 0..200 {
            let snap: RunSnapshot = client
                .get(format!("http://{addr}/v1/runs/current"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if !snap.phase.is_active() {
                return snap;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("run did not finish");
    }

    #[tokio::test]
    async fn serves_index_and_health() {
        let (addr, _) = spawn_app().await;
        let client = reqwest::Client::new();

        let page = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("<form"));

        let health = client
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "ok");
    }

    #[tokio::test]
    async fn blank_prompt_is_bad_request() {
        let (addr, _) = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{addr}/v1/runs"))
            .json(&SubmitRequest {
                prompt: "   ".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let snap = wait_until_idle(&client, addr).await;
        assert_eq!(snap.run_id, None);
    }

    #[tokio::test]
    async fn full_run_over_http() {
        let (addr, gate) = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{addr}/v1/runs"))
            .json(&SubmitRequest {
                prompt: "weathered basalt rock".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
        let accepted: SubmitResponse = resp.json().await.unwrap();

        // Base call is parked on the gate, so the run is still active.
        let busy = client
            .post(format!("http://{addr}/v1/runs"))
            .json(&SubmitRequest {
                prompt: "other".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(busy.status(), reqwest::StatusCode::CONFLICT);

        let pending: OutputsResponse = client
            .get(format!("http://{addr}/v1/outputs"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            pending.outputs[0].status,
            texforge_core::OutputStatus::Pending
        );

        gate.notify_one();
        let snap = wait_until_idle(&client, addr).await;
        assert_eq!(snap.run_id.as_deref(), Some(accepted.run_id.as_str()));
        assert_eq!(snap.phase, RunPhase::Done);
        assert_eq!(snap.results.len(), 4);
        assert!(snap.failures.contains_key(&OutputKind::Metallic));

        let download = client
            .get(format!("http://{addr}/v1/outputs/albedo"))
            .send()
            .await
            .unwrap();
        assert_eq!(download.status(), reqwest::StatusCode::OK);
        assert_eq!(
            download.headers()[reqwest::header::CONTENT_DISPOSITION],
            "attachment; filename=\"albedo.png\""
        );
        assert_eq!(download.bytes().await.unwrap().as_ref(), b"albedo-bytes");

        let missing = client
            .get(format!("http://{addr}/v1/outputs/metallic"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let unknown = client
            .get(format!("http://{addr}/v1/outputs/roughness"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
