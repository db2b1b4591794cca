use crate::clock::Clock;
use crate::config::Config;
use crate::error::ProxyResult;
use crate::forward::{Forwarder, HttpForwarder};
use crate::handlers::{health_check, proxy_request, update_config, AppState, SharedState};
use crate::middleware::logging_middleware;
use crate::route_table::RouteTable;
use crate::router::RequestRouter;
use crate::updater::RuntimeConfigUpdater;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub const CONFIG_PATH: &str = "/config";
pub const HEALTH_PATH: &str = "/health";

/// Builds the axum application: administrative endpoints plus the proxy fallback.
pub fn create_app<F: Forwarder>(state: SharedState<F>) -> Router {
    Router::new()
        .route(CONFIG_PATH, post(update_config::<F>))
        .route(HEALTH_PATH, get(health_check::<F>))
        .fallback(proxy_request::<F>)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_address: SocketAddr,
    table: Arc<RouteTable>,
}

impl Server {
    /// Must be called inside a Tokio runtime; throttle rules start their
    /// pruning tasks here.
    pub fn new(config: &Config) -> ProxyResult<Self> {
        Self::with_forwarder(config, HttpForwarder::new()?, Clock::monotonic())
    }

    pub fn with_forwarder<F: Forwarder>(config: &Config, forwarder: F, clock: Clock) -> ProxyResult<Self> {
        let table = Arc::new(RouteTable::from_config(config, &clock)?);
        let state = Arc::new(AppState {
            router: RequestRouter::new(table.clone(), forwarder, clock, config.request_timeout),
            updater: RuntimeConfigUpdater::new(table.clone()),
        });

        Ok(Self {
            app: create_app(state),
            bind_address: config.bind_address,
            table,
        })
    }

    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub fn table(&self) -> Arc<RouteTable> {
        self.table.clone()
    }

    pub async fn run(self) -> ProxyResult<()> {
        let listener = TcpListener::bind(self.bind_address).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, lets in-flight requests finish,
    /// then stops every route's background work.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> ProxyResult<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!("Proxy server listening on {}", local_addr);
        tracing::info!("Window updates accepted at POST {}", CONFIG_PATH);
        tracing::info!("Health check available at {}", HEALTH_PATH);

        let result = axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        self.table.shutdown().await;
        tracing::info!("Proxy server stopped");
        result.map_err(Into::into)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
