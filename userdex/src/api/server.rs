use crate::api::routes;
use crate::config::{CorsConfig, ServerConfig};
use crate::store::UserStore;
use crate::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    store: Arc<dyn UserStore>,
    cors_config: CorsConfig,
    max_body_size: usize,
    metrics: Option<PrometheusHandle>,
}

impl ApiServer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self::with_config(store, &ServerConfig::default())
    }

    pub fn with_config(store: Arc<dyn UserStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            cors_config: config.cors.clone(),
            max_body_size: config.max_body_size,
            metrics: None,
        }
    }

    /// Serve the Prometheus exposition at GET /metrics
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build CORS layer from configuration
    fn build_cors_layer(&self) -> CorsLayer {
        if !self.cors_config.enabled {
            return CorsLayer::new();
        }

        let origins: Vec<HeaderValue> = self
            .cors_config
            .origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();

        let has_wildcard = self.cors_config.origins.iter().any(|o| o == "*");

        let cors = if has_wildcard {
            CorsLayer::new().allow_origin(tower_http::cors::Any)
        } else if origins.is_empty() {
            CorsLayer::new()
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    pub fn router(&self) -> Router {
        let user_routes = Router::new()
            .route("/create-index", post(routes::create_index))
            .route("/add-user", post(routes::add_user))
            .route("/update-user", post(routes::update_user))
            .route("/get-user/:key", get(routes::get_user))
            .route("/get-all-user", get(routes::get_all_users))
            .route("/delete-user/:key", delete(routes::delete_user))
            .route("/delete-all-user", delete(routes::delete_all_users));

        let mut router: Router = Router::new()
            .nest("/api/user", user_routes)
            .route("/health", get(routes::health))
            .with_state(self.store.clone());

        if let Some(handle) = self.metrics.clone() {
            router = router.route(
                "/metrics",
                get(move || std::future::ready(handle.render())),
            );
        }

        router
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(self.build_cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            "Server listening on {} (backend: {})",
            addr,
            self.store.backend_name()
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Server(e.to_string()))?;

        Ok(())
    }
}
