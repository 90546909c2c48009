//! HTTP API component.
//!
//! # Responsibilities
//! - Mount registered `RestController`s under the configured base path
//! - Wire up middleware (request ID, tracing, panic recovery, compression,
//!   timeout, CORS) plus any caller-supplied layers
//! - Bind the listener on start and serve on a background task
//! - Stop serving gracefully on shutdown
//!
//! # Design Decisions
//! - Binding happens inside `start`, so a taken port fails startup
//! - Serve errors after startup go to the engine's error channel
//! - Controllers receive the locator when the router is built; sibling
//!   lookups succeed once the engine published it

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, Route},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::{Layer, Service, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::engine::EngineHandle;
use crate::lifecycle::{Component, ComponentBase, ComponentError, Locator};

/// A group of routes mounted by the API component.
pub trait RestController: Send + Sync + 'static {
    /// Path the controller is mounted at, relative to the API base path.
    fn base_path(&self) -> &str;

    /// Build the controller's routes.
    fn router(&self, locator: Locator) -> Router;
}

/// `[components.api]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Prefix every controller is mounted under.
    pub base_path: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    pub cors: CorsConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            base_path: "/api".to_string(),
            request_timeout_secs: 30,
            cors: CorsConfig::default(),
        }
    }
}

/// Allowed CORS origins, methods and headers. `"*"` allows any origin.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origins: Vec<String>,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
}

type RouterLayer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

struct RunningServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Serves the registered controllers over HTTP.
pub struct ApiComponent {
    base: ComponentBase,
    controllers: Vec<Arc<dyn RestController>>,
    layers: Vec<RouterLayer>,
    config: ArcSwapOption<ApiConfig>,
    server: Mutex<Option<RunningServer>>,
}

impl ApiComponent {
    /// Create the component under its default name, `api`.
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new("api"),
            controllers: Vec::new(),
            layers: Vec::new(),
            config: ArcSwapOption::empty(),
            server: Mutex::new(None),
        }
    }

    /// Add a controller; only effective before the engine starts the component.
    pub fn with_controller(mut self, controller: impl RestController) -> Self {
        self.controllers.push(Arc::new(controller));
        self
    }

    /// Wrap every route in `layer`.
    ///
    /// Caller layers run inside the built-in middleware, in the order they
    /// were added (the last one added sees the request first).
    pub fn with_layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layers
            .push(Arc::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server().as_ref().map(|server| server.addr)
    }

    /// Applied configuration, once configured.
    pub fn config(&self) -> Option<Arc<ApiConfig>> {
        self.config.load_full()
    }

    fn server(&self) -> MutexGuard<'_, Option<RunningServer>> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, config: &ApiConfig, locator: Locator) -> Result<Router, ComponentError> {
        let mut api = Router::new()
            .route("/components", get(list_components))
            .with_state(locator.clone());

        for controller in &self.controllers {
            let path = normalize_path(controller.base_path());
            let routes = controller.router(locator.clone());
            api = if path == "/" {
                api.merge(routes)
            } else {
                api.nest(&path, routes)
            };
        }

        let base_path = normalize_path(&config.base_path);
        let app = if base_path == "/" {
            api
        } else {
            Router::new().nest(&base_path, api)
        };
        let app = self.layers.iter().fold(app, |app, layer| layer(app));

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CompressionLayer::new())
            .layer(cors_layer(&config.cors)?)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        Ok(app.layer(middleware))
    }

    fn log_routes(&self, base_path: &str) {
        let base_path = normalize_path(base_path);
        tracing::info!(parent: Component::logger(self), route = %join_path(&base_path, "/components"), "Route mounted");
        for controller in &self.controllers {
            let route = join_path(&base_path, &normalize_path(controller.base_path()));
            tracing::info!(parent: Component::logger(self), route = %route, "Route mounted");
        }
        if self.controllers.is_empty() {
            tracing::warn!(parent: Component::logger(self), "No controller registered, only built-in routes installed");
        }
    }
}

impl Default for ApiComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for ApiComponent {
    type Config = ApiConfig;

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn configure(&self, config: ApiConfig) -> Result<(), ComponentError> {
        config
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ComponentError::invalid_config(format!("bind_address: {e}")))?;
        if config.request_timeout_secs == 0 {
            return Err(ComponentError::invalid_config(
                "request_timeout_secs must be greater than zero",
            ));
        }
        cors_layer(&config.cors)?;

        tracing::debug!(
            bind_address = %config.bind_address,
            base_path = %config.base_path,
            "API configured"
        );
        self.config.store(Some(Arc::new(config)));
        Ok(())
    }

    async fn start(&self, engine: EngineHandle) -> Result<(), ComponentError> {
        let config = self
            .config
            .load_full()
            .ok_or_else(|| ComponentError::failed("API component was not configured"))?;
        let router = self.build_router(&config, engine.locator().clone())?;

        let listener = TcpListener::bind(&config.bind_address).await?;
        let addr = listener.local_addr()?;
        self.log_routes(&config.base_path);

        let (stop, stopped) = oneshot::channel::<()>();
        let reporter = engine.reporter().clone();
        let task = tokio::spawn(
            async move {
                tracing::info!(address = %addr, "HTTP server starting");
                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = stopped.await;
                    })
                    .await;

                match result {
                    Ok(()) => tracing::info!("HTTP server stopped"),
                    Err(e) => reporter.report(ComponentError::failed(format!("HTTP server failed: {e}"))),
                }
            }
            .instrument(Component::logger(self).clone()),
        );

        *self.server() = Some(RunningServer { addr, stop, task });
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        let server = self.server().take();
        let Some(server) = server else {
            tracing::debug!("HTTP server was never started");
            return Ok(());
        };

        let _ = server.stop.send(());
        server
            .task
            .await
            .map_err(|e| ComponentError::failed(format!("HTTP server task panicked: {e}")))
    }
}

async fn list_components(State(locator): State<Locator>) -> Result<Json<Value>, StatusCode> {
    let names = locator
        .names()
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(json!({ "components": names })))
}

fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ComponentError> {
    let mut layer = CorsLayer::new();

    if config.origins.iter().any(|origin| origin == "*") {
        layer = layer.allow_origin(AllowOrigin::any());
    } else if !config.origins.is_empty() {
        let origins = config
            .origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ComponentError::invalid_config(format!("cors.origins: {e}")))?;
        layer = layer.allow_origin(origins);
    }

    if !config.methods.is_empty() {
        let methods = config
            .methods
            .iter()
            .map(|method| Method::from_bytes(method.to_ascii_uppercase().as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ComponentError::invalid_config(format!("cors.methods: {e}")))?;
        layer = layer.allow_methods(methods);
    }

    if !config.headers.is_empty() {
        let headers = config
            .headers
            .iter()
            .map(|header| HeaderName::from_bytes(header.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ComponentError::invalid_config(format!("cors.headers: {e}")))?;
        layer = layer.allow_headers(headers);
    }

    Ok(layer)
}

/// Leading slash, no trailing slash; empty becomes "/".
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}

fn join_path(base: &str, path: &str) -> String {
    match (base, path) {
        ("/", path) => path.to_string(),
        (base, "/") => base.to_string(),
        (base, path) => format!("{base}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Publication, Registry};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::RwLock;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct Echo;

    impl RestController for Echo {
        fn base_path(&self) -> &str {
            "echo"
        }

        fn router(&self, _locator: Locator) -> Router {
            Router::new().route("/ping", get(|| async { "pong" }))
        }
    }

    struct Faulty;

    impl RestController for Faulty {
        fn base_path(&self) -> &str {
            "faulty"
        }

        fn router(&self, _locator: Locator) -> Router {
            Router::new().route("/", get(explode))
        }
    }

    async fn explode() -> &'static str {
        panic!("handler bug")
    }

    fn locator(publication: Publication) -> (Locator, watch::Sender<Publication>) {
        let mut registry = Registry::new();
        registry.register(Arc::new(ApiComponent::new())).unwrap();
        let (tx, rx) = watch::channel(publication);
        (Locator::new(Arc::new(RwLock::new(registry)), rx), tx)
    }

    async fn get_status(router: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, request_id, body)
    }

    #[tokio::test]
    async fn controllers_mount_under_base_path() {
        let api = ApiComponent::new().with_controller(Echo);
        let (locator, _tx) = locator(Publication::Published);
        let router = api.build_router(&ApiConfig::default(), locator).unwrap();

        let (status, request_id, body) = get_status(router, "/api/echo/ping").await;

        assert_eq!(status, StatusCode::OK);
        assert!(request_id.is_some());
        assert_eq!(body, b"pong");
    }

    #[tokio::test]
    async fn components_route_lists_names_once_published() {
        let api = ApiComponent::new();
        let (locator, tx) = locator(Publication::Pending);
        let router = api.build_router(&ApiConfig::default(), locator).unwrap();

        let (status, _, _) = get_status(router.clone(), "/api/components").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        tx.send_replace(Publication::Published);
        let (status, _, body) = get_status(router, "/api/components").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "components": ["api"] }));
    }

    #[tokio::test]
    async fn caller_layers_wrap_every_route() {
        let api = ApiComponent::new()
            .with_controller(Echo)
            .with_layer(axum::middleware::map_response(
                |mut response: axum::response::Response| async move {
                    response
                        .headers_mut()
                        .insert("x-served-by", HeaderValue::from_static("component-engine"));
                    response
                },
            ));
        let (locator, _tx) = locator(Publication::Published);
        let router = api.build_router(&ApiConfig::default(), locator).unwrap();

        for uri in ["/api/echo/ping", "/api/components"] {
            let response = router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-served-by"], "component-engine");
        }
    }

    #[tokio::test]
    async fn handler_panic_becomes_server_error() {
        let api = ApiComponent::new().with_controller(Faulty);
        let (locator, _tx) = locator(Publication::Published);
        let router = api.build_router(&ApiConfig::default(), locator).unwrap();

        let (status, request_id, _) = get_status(router.clone(), "/api/faulty").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(request_id.is_some());

        let (status, _, _) = get_status(router, "/api/components").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("api/"), "/api");
        assert_eq!(normalize_path("/v1/users"), "/v1/users");
    }

    #[test]
    fn joined_paths_have_no_double_slash() {
        assert_eq!(join_path("/", "/users"), "/users");
        assert_eq!(join_path("/api", "/"), "/api");
        assert_eq!(join_path("/api", "/users"), "/api/users");
    }

    #[test]
    fn cors_rejects_bad_method() {
        let config = CorsConfig {
            methods: vec!["GET".into(), "NOT A METHOD".into()],
            ..Default::default()
        };
        assert!(matches!(
            cors_layer(&config),
            Err(ComponentError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn configure_rejects_bad_bind_address() {
        let api = ApiComponent::new();
        let config = ApiConfig {
            bind_address: "not-an-address".into(),
            ..Default::default()
        };

        let err = api.configure(config).await.unwrap_err();

        assert!(matches!(err, ComponentError::InvalidConfig(_)));
        assert!(api.config().is_none());
    }

    #[tokio::test]
    async fn shutdown_without_start_is_noop() {
        let api = ApiComponent::new();
        assert!(Component::shutdown(&api).await.is_ok());
        assert!(api.local_addr().is_none());
    }
}
