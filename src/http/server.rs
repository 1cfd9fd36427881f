//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: every path goes to the request handler
//! - Wire up middleware (request id, tracing)
//! - Run each request on its own task with a timeout-driven abort signal
//! - Provide the per-request load context (session storage)
//! - Apply config reloads by swapping the active handler
//!
//! # Design Decisions
//! - The handler lives behind `ArcSwap`; in-flight requests finish on the
//!   handler they started with
//! - Session storage is built once; reloads never drop stored sessions
//! - Timeouts and client disconnects cancel the request's signal instead of
//!   dropping the handler future, so the handler still reports the abort

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Extensions;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ConfigState, ConfigUpdate, ReloadError, ServerConfig};
use crate::handler::{responses, LoadContext, RequestHandler, ServerBuild};
use crate::http::request::{into_route_request, RequestUuid, X_REQUEST_ID};
use crate::observability::metrics;
use crate::sessions::{self, SessionHandle};

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<ArcSwap<RequestHandler>>,
    sessions: SessionHandle,
    max_body_size: usize,
    request_timeout: Duration,
}

impl AppState {
    fn load_context(&self) -> LoadContext {
        let mut extensions = Extensions::new();
        extensions.insert(self.sessions.clone());
        LoadContext::provider(extensions)
    }
}

/// HTTP front end for a `ServerBuild`.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    build: ServerBuild,
    handler: Arc<ArcSwap<RequestHandler>>,
}

impl HttpServer {
    /// Apply `config` to `build` and prepare the router.
    pub fn new(config: ServerConfig, build: ServerBuild) -> Result<Self, ReloadError> {
        let build = build.reconfigure(&config)?;
        let sessions = sessions::from_config(&config.sessions)?;
        let handler = Arc::new(ArcSwap::from_pointee(RequestHandler::new(
            build.clone(),
            config.mode,
        )));

        let state = AppState {
            handler: handler.clone(),
            sessions,
            max_body_size: config.security.max_body_size,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };
        let router = Self::build_router(state);

        Ok(Self {
            router,
            config,
            build,
            handler,
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(route_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(RequestUuid))
    }

    /// Serve until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ConfigUpdate>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.config.mode,
            routes = self.build.routes().len(),
            "HTTP server starting"
        );

        let handler = self.handler.clone();
        let build = self.build.clone();
        let mut state = ConfigState::new(self.config.clone());
        let reloader = tokio::spawn(async move {
            while let Some(update) = config_updates.recv().await {
                apply_update(&mut state, &build, &handler, update);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handler currently serving requests.
    pub fn handler(&self) -> Arc<RequestHandler> {
        self.handler.load_full()
    }
}

/// Rebuild and publish the handler for a reload attempt.
pub(crate) fn apply_update(
    state: &mut ConfigState,
    build: &ServerBuild,
    handler: &ArcSwap<RequestHandler>,
    update: ConfigUpdate,
) {
    let mut next_build = None;
    let attempt = update.map_err(ReloadError::from).and_then(|config| {
        next_build = Some(build.reconfigure(&config)?);
        Ok(config)
    });

    match state.apply(attempt) {
        Ok(config) => {
            if let Some(next) = next_build {
                tracing::info!(routes = next.routes().len(), mode = ?config.mode, "Configuration reloaded");
                handler.store(Arc::new(RequestHandler::new(next, config.mode)));
            }
            metrics::record_config_reload(true);
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration rejected; serving last good configuration");
            metrics::record_config_reload(false);
        }
    }
}

async fn route_handler(State(state): State<AppState>, request: Request) -> Response {
    let route_request = match into_route_request(request, state.max_body_size).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected request before routing");
            return e.into_response();
        }
    };

    let handler = state.handler.load_full();
    let signal = CancellationToken::new();
    // Fires when the client goes away (this future is dropped) and on completion.
    let _abort_on_drop = signal.clone().drop_guard();
    tokio::spawn(abort_after(signal.clone(), state.request_timeout));

    let method = route_request.method.clone();
    let url = route_request.url.to_string();
    let context = state.load_context();
    let task = tokio::spawn(async move { handler.handle(route_request, context, signal).await });

    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, method = %method, url = %url, "Request task failed");
            responses::text(axum::http::StatusCode::INTERNAL_SERVER_ERROR, "Unexpected Server Error")
        }
    }
}

/// Cancel `signal` once `timeout` elapses, unless it is cancelled first.
async fn abort_after(signal: CancellationToken, timeout: Duration) {
    tokio::select! {
        biased;
        _ = signal.cancelled() => {}
        _ = sleep(timeout) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Request timed out, aborting");
            signal.cancel();
        }
    }
}
