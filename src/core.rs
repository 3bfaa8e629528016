use crate::{
    app::AppContext,
    config::Config,
    error::{PayhookError, Result},
    health,
    http::RouteModule,
    middleware::MakeRequestUuid,
    timeout::build_timeout_layer,
    webhooks::WebhookModule,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// The webhook service: routes, shared context, and the middleware stack
///
/// `/health` and the webhook endpoint (at `config.webhook.path`) are mounted
/// on construction; further route modules can be registered on top.
pub struct App {
    router: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Create an App from explicit configuration and context
    pub fn new(config: Config, context: AppContext) -> Self {
        let router = Self::build_router(&config);
        Self {
            router,
            config,
            context,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// # Errors
    ///
    /// Fails if the store or mailer cannot be constructed.
    pub async fn from_config(config: Config) -> Result<Self> {
        let context = AppContext::from_config(&config).await?;
        Ok(Self::new(config, context))
    }

    /// Builder pattern for constructing an App
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    fn build_router(config: &Config) -> Router<AppContext> {
        let router = Router::<AppContext>::new().route("/health", get(health::health_handler));
        WebhookModule::new(config.webhook.path.clone()).register(router)
    }

    /// Register a route module with the application
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.router = module.register(self.router);
        self
    }

    /// Replace the application context
    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Router with state and the full middleware stack applied
    ///
    /// Drive it with [`crate::testing`] helpers.
    pub fn into_test_router(self) -> Router {
        self.into_router()
    }

    fn into_router(self) -> Router {
        let config = self.config;
        let mut router = self.router;

        // Middleware order (from inner to outer):
        // 1. Body size limit - reject oversized bodies before the handler buffers them
        router = router.layer(DefaultBodyLimit::max(config.server.max_body_size));

        // 2. Timeout - whole-request ceiling on top of the per-step limits
        if let Some(timeout_layer) = build_timeout_layer(&config.timeout) {
            router = router.layer(timeout_layer);
        }

        // 3. Request ID - the setter must wrap the propagator so the id exists
        // by the time the response is copied back
        router = router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        // 4. Trace layer - HTTP tracing
        router = router.layer(TraceLayer::new_for_http());

        router.with_state(self.context)
    }

    /// Start the server and run until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Fails if the configured address is invalid or cannot be bound.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.addr().map_err(|e| {
            PayhookError::config(format!("Invalid server address in config: {}", e))
        })?;
        let webhook_path = self.config.webhook.path.clone();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PayhookError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Webhooks accepted at http://{}{}", addr, webhook_path);
        tracing::info!("Health check available at http://{}/health", addr);

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PayhookError::internal(format!("Server error: {}", e)))
    }
}

/// Builder for App with fluent API
#[must_use = "builder does nothing until you call build()"]
pub struct AppBuilder {
    config: Config,
    context: Option<AppContext>,
    modules: Vec<Box<dyn FnOnce(Router<AppContext>) -> Router<AppContext> + Send>>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            context: None,
            modules: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn register_module<M: RouteModule + Send + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(move |router| module.register(router)));
        self
    }

    /// # Errors
    ///
    /// Fails only when no context was given and the default one cannot be built.
    pub fn build(self) -> Result<App> {
        let context = match self.context {
            Some(context) => context,
            None => AppContext::builder()
                .with_dev_mode(!self.config.environment.is_production())
                .build()?,
        };

        let mut app = App::new(self.config, context);
        for register in self.modules {
            app.router = register(app.router);
        }
        Ok(app)
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // In-flight deliveries get a grace period to finish reconciling
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigBuilder;
    use crate::testing;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_is_mounted() {
        let app = App::builder().build().unwrap().into_test_router();

        let response = testing::get(app, "/health")
            .execute()
            .await
            .assert_ok()
            .assert_json();

        // No signing secret, so verification reports degraded
        let body: serde_json::Value = response.json().await;
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_webhook_path_follows_config() {
        let config = ConfigBuilder::new()
            .with_webhook_path("/hooks/payments")
            .build()
            .unwrap();
        let router = App::builder()
            .with_config(config)
            .build()
            .unwrap()
            .into_test_router();

        testing::post(router.clone(), "/hooks/payments")
            .text_body(r#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#)
            .execute()
            .await
            .assert_ok();
        testing::post(router, "/webhooks/stripe")
            .text_body("{}")
            .execute()
            .await
            .assert_not_found();
    }

    #[tokio::test]
    async fn test_request_id_header_is_set() {
        let app = App::builder().build().unwrap().into_test_router();
        let response = testing::get(app, "/health").execute().await.response();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_body_limit_applies() {
        let config = ConfigBuilder::new().with_max_body_size(64).build().unwrap();
        let app = App::builder()
            .with_config(config)
            .build()
            .unwrap()
            .into_test_router();

        testing::post(app, "/webhooks/stripe")
            .text_body("x".repeat(1024))
            .execute()
            .await
            .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }
}
