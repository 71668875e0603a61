use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kfrs_common::tasks::wait_for_task;

const GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);

/// Flips to unhealthy the moment any supervised component reports trouble, and back once
/// it recovers; the `/health` endpoint just reads this flag.
#[derive(Clone, Default)]
pub struct HealthState {
    healthy: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

/// Serves `GET /health`, returning 200 while [`HealthState`] is healthy and 503 otherwise.
pub struct HealthServer {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl HealthServer {
    pub async fn start(port: u16, state: HealthState) -> Result<Self, std::io::Error> {
        let app = Router::new().route("/health", get(health_handler)).with_state(state);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app);
            tokio::select! {
                () = task_token.cancelled() => {},
                result = server => if let Err(error) = result {
                    tracing::error!(%error, "health endpoint server error");
                },
            }
        });

        Ok(Self { cancellation_token, task })
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        wait_for_task(Some(self.task), "health endpoint", GRACE_PERIOD).await;
    }
}

async fn health_handler(State(state): State<HealthState>) -> StatusCode {
    if state.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
