//! HTTP boundary for admitline.
//!
//! Routes:
//! - `POST /chat` — one message through the orchestrator
//! - `GET /health` — liveness
//! - `GET /status` — capacity counters and active sessions
//! - `GET /branches` — branch codes with cutoff data
//!
//! Input validation, rate limiting, body size, CORS and request tracing
//! live here so the orchestrator never sees a request it must reject for
//! transport reasons.

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use admitline_agent::{ChatReply, ChatRequest, Orchestrator};
use admitline_config::GatewayConfig;
use admitline_telemetry::{CapacityMonitor, CapacitySnapshot};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub monitor: Arc<CapacityMonitor>,
    pub institution: String,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every route and layer.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let limiter = Arc::new(RateLimiter::new(
        config.requests_per_minute as usize,
        Duration::from_secs(60),
    ));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/branches", get(branches_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve(
    state: SharedState,
    config: &GatewayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state, config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Gateway stopped");
    Ok(())
}

// --- Rate Limiter ---

/// In-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key. Thread-safe via
/// `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Record a request. On refusal returns how long until the oldest
    /// request in the window expires.
    fn check(&self, client_key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict idle clients when the map grows large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .first()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        timestamps.push(now);
        Ok(())
    }
}

/// Client key: first `X-Forwarded-For` hop, else the peer address.
fn client_key(req: &axum::extract::Request) -> String {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

#[derive(Serialize)]
struct RateLimitedBody {
    error: &'static str,
    retry_after_secs: u64,
}

/// Returns 429 with a back-off hint when a client exceeds its window.
/// `/health` is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let client = client_key(&req);
    if let Err(retry_after) = limiter.check(&client) {
        let retry_after_secs = retry_after.as_secs().max(1);
        warn!(client = %client, retry_after_secs, "Rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitedBody {
                error: "Too many requests. Please wait before sending another message.",
                retry_after_secs,
            }),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        return response;
    }

    next.run(req).await
}

// --- Handlers ---

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ErrorBody>)> {
    match state.orchestrator.handle(request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            info!(error = %e, "Rejected chat request");
            Err((StatusCode::BAD_REQUEST, Json(ErrorBody { error: e.to_string() })))
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    institution: String,
    version: &'static str,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        institution: state.institution.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    active_sessions: usize,
    cutoff_records: usize,
    capacity: CapacitySnapshot,
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        active_sessions: state.orchestrator.sessions().len(),
        cutoff_records: state.orchestrator.cutoffs().len(),
        capacity: state.monitor.snapshot(),
    })
}

#[derive(Serialize)]
struct BranchesResponse {
    branches: Vec<String>,
}

async fn branches_handler(State(state): State<SharedState>) -> Json<BranchesResponse> {
    Json(BranchesResponse { branches: state.orchestrator.cutoffs().branches() })
}
