//! Application startup and lifecycle management.

use crate::config::AccountConfig;
use crate::handlers;
use crate::middleware::auth_middleware;
use crate::services::{
    AccountRepository, AccountService, AuthService, MongoAccountRepository, MongoDb,
    TokenSettings,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub auth: AuthService,
    pub repo: Arc<dyn AccountRepository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn AccountRepository>, tokens: TokenSettings) -> Self {
        Self {
            accounts: AccountService::new(repo.clone()),
            auth: AuthService::new(repo.clone(), tokens),
            repo,
        }
    }
}

/// Protected routes sit behind the bearer check via `route_layer`, so paths
/// that match nothing fall through to the JSON 404 instead of a 401.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/login", post(handlers::login))
        .route("/users", post(handlers::create_account))
        .merge(
            Router::new()
                .route("/users", get(handlers::list_accounts))
                .route(
                    "/users/:id",
                    get(handlers::get_account)
                        .put(handlers::update_account)
                        .delete(handlers::delete_account),
                )
                .route_layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(from_fn(handlers::json_method_not_allowed))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    db: MongoDb,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AccountConfig) -> Result<Self, AppError> {
        let timeout = config.mongodb.timeout();
        let db = MongoDb::connect(config.mongodb_uri(), &config.mongodb.database, timeout)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let repo: Arc<dyn AccountRepository> =
            Arc::new(MongoAccountRepository::new(db.clone(), timeout));
        let tokens = TokenSettings::new(config.jwt.secret.clone(), config.jwt.ttl());
        let router = build_router(AppState::new(repo, tokens));

        // Port 0 = random port for testing
        let addr = config.common.bind_addr()?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Account service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            db,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &MongoDb {
        &self.db
    }

    /// Run the application until `shutdown` resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryAccountRepository;
    use axum::{body::Body, http::Request, http::StatusCode};
    use secrecy::Secret;
    use std::sync::Mutex;
    use tower::util::ServiceExt;
    use tracing::{span, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records the name of every span opened while installed.
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _: &span::Id, _: Context<'_, S>) {
            self.0.lock().unwrap().push(attrs.metadata().name());
        }
    }

    #[tokio::test]
    async fn each_request_opens_one_http_span() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(SpanNames(names.clone())),
        );
        let tokens = TokenSettings::new(
            Secret::new("span-test-secret".to_string()),
            chrono::Duration::minutes(5),
        );
        let app = build_router(AppState::new(
            Arc::new(InMemoryAccountRepository::new()),
            tokens,
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let names = names.lock().unwrap();
        assert_eq!(names.iter().filter(|n| **n == "http_request").count(), 1);
        assert!(!names.contains(&"request"));
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn panicking_handler_renders_internal_error() {
        let app = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(handlers::handle_panic));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "Internal server error");
    }
}
