//! HTTP server: run requests in, run reports out

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use shopcheck_common::{Error as RequestError, RunDefaults, RunReport, RunRequestInput, ServiceConfig};
use shopcheck_e2e::{E2eError, JourneyRunner, SessionFactory, StorefrontProfile, WebDriverFactory};

/// Shared state for all handlers
pub struct AppState<F: SessionFactory> {
    runner: JourneyRunner<F>,
    defaults: RunDefaults,
    permits: Semaphore,
}

impl<F: SessionFactory> AppState<F> {
    pub fn runner(&self) -> &JourneyRunner<F> {
        &self.runner
    }

    pub fn defaults(&self) -> &RunDefaults {
        &self.defaults
    }

    /// Runs that could start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Serve the WebDriver-backed service described by `config`
pub async fn serve(config: ServiceConfig, defaults: RunDefaults) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen.parse()?;
    let profile = StorefrontProfile::load(config.profile_path.as_deref())?;

    info!(
        "Starting Shopcheck service (webdriver: {}, profile: {}, max concurrent runs: {})",
        config.webdriver.url, profile.name, config.max_concurrent_runs
    );

    let runner = JourneyRunner::new(WebDriverFactory::new(config.webdriver.clone()), profile);
    WebServer::new(runner, defaults, &config).serve(addr).await
}

pub struct WebServer<F: SessionFactory> {
    state: Arc<AppState<F>>,
    cors_origins: Vec<String>,
}

impl<F: SessionFactory + 'static> WebServer<F> {
    pub fn new(runner: JourneyRunner<F>, defaults: RunDefaults, config: &ServiceConfig) -> Self {
        Self {
            state: Arc::new(AppState {
                runner,
                defaults,
                permits: Semaphore::new(config.max_concurrent_runs.max(1)),
            }),
            cors_origins: config.cors_origins.clone(),
        }
    }

    pub fn state(&self) -> &Arc<AppState<F>> {
        &self.state
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/run-tests", post(run_tests_handler::<F>))
            .route("/api/health", get(health_handler))
            .layer(cors_layer(&self.cors_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("Shopcheck service listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shopcheck service stopped");
        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a run request, mapped onto an HTTP status
#[derive(Debug)]
pub enum ApiError {
    /// The request was rejected before a session was allocated
    Request(RequestError),
    /// The run could not start
    Run(E2eError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Request(RequestError::MissingParameters(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Request(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Run(
                E2eError::SessionStart(_)
                | E2eError::DriverStartup(_)
                | E2eError::DriverHealthCheck(_)
                | E2eError::Http(_),
            ) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Run(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

impl From<E2eError> for ApiError {
    fn from(err: E2eError) -> Self {
        match err {
            E2eError::Config(e) => ApiError::Request(e),
            other => ApiError::Run(other),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Request(e) => write!(f, "{}", e),
            ApiError::Run(e) => write!(f, "{}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Request(RequestError::MissingParameters(missing)) => json!({
                "error": self.to_string(),
                "missing": missing,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "shopcheck-web",
        "version": shopcheck_common::VERSION,
    }))
}

async fn run_tests_handler<F: SessionFactory + 'static>(
    State(state): State<Arc<AppState<F>>>,
    Json(input): Json<RunRequestInput>,
) -> Result<Json<RunReport>, ApiError> {
    let request = match input.resolve(&state.defaults) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected run request: {}", e);
            return Err(e.into());
        }
    };

    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|_| ApiError::Run(E2eError::SessionStart("run queue closed".to_string())))?;

    match state.runner.run(&request).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Run could not start: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use shopcheck_e2e::testing::{fast_profile, FakeFactory, FakeSlot, FakeStorefront};
    use tower::ServiceExt;

    fn server(factory: FakeFactory, defaults: RunDefaults) -> WebServer<FakeFactory> {
        let runner = JourneyRunner::new(factory, fast_profile());
        WebServer::new(runner, defaults, &ServiceConfig::default())
    }

    fn storefront_factory() -> FakeFactory {
        let dom = FakeStorefront::new(&fast_profile())
            .tab("0", vec![FakeSlot::available("A")])
            .build();
        FakeFactory::new(dom)
    }

    fn full_defaults() -> RunDefaults {
        RunDefaults {
            url: Some("https://shop.test/".into()),
            username: Some("shopper@example.com".into()),
            password: Some("hunter2".into()),
            product_url: Some("https://shop.test/p/1".into()),
        }
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/run-tests")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = server(storefront_factory(), RunDefaults::default());
        let response = server
            .router()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected_without_session() {
        let server = server(storefront_factory(), RunDefaults::default());
        let response = server
            .router()
            .oneshot(post_json(json!({ "username": "shopper@example.com" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["missing"], json!(["url", "password", "product_url"]));
        assert_eq!(server.state().runner().factory().opened(), 0);
    }

    #[tokio::test]
    async fn test_empty_journey_selection_is_bad_request() {
        let server = server(storefront_factory(), full_defaults());
        let response = server
            .router()
            .oneshot(post_json(json!({ "journeys": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(server.state().runner().factory().opened(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_browser_is_503() {
        let server = server(FakeFactory::unavailable(), full_defaults());
        let response = server.router().oneshot(post_json(json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_report_for_every_journey() {
        let server = server(storefront_factory(), full_defaults());
        let response = server.router().oneshot(post_json(json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        for key in ["login", "add_to_cart", "checkout"] {
            assert_eq!(body[key]["status"], "success", "{}", key);
        }
        assert_eq!(body["login"]["message"], "Login successful");
        assert_eq!(server.state().runner().factory().closed(), 1);
        assert_eq!(server.state().available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_journey_carries_screenshot() {
        let dom = FakeStorefront::new(&fast_profile()).build();
        let server = server(FakeFactory::new(dom), full_defaults());
        let response = server
            .router()
            .oneshot(post_json(json!({ "journeys": ["checkout"] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checkout"]["status"], "failed");
        assert_eq!(body["checkout"]["message"], "no available slot found");
        assert!(body["checkout"]["screenshot"].as_str().map(|s| !s.is_empty()).unwrap_or(false));
        assert!(body.get("login").is_none());
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let server = server(storefront_factory(), RunDefaults::default());
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/run-tests")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = server
            .router()
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let denied = server
            .router()
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
