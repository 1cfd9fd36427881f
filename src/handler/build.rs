//! The application build: route tree, route modules and hooks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::handler::context::StaticHandlerContext;
use crate::handler::error::{ErrorContext, HandleErrorFn, ServerError};
use crate::handler::outcome::{BoxError, RouteResult};
use crate::handler::request::{RouteArgs, RouteRequest};
use crate::routing::{RouteDefinition, RouteTree, RouteTreeError};

pub type RouteFn = Arc<dyn Fn(RouteArgs) -> BoxFuture<'static, RouteResult> + Send + Sync>;

pub type RenderDocumentFn =
    Arc<dyn Fn(RenderArgs) -> BoxFuture<'static, Result<Response<Body>, BoxError>> + Send + Sync>;

/// Loader and action registered for one route.
#[derive(Clone, Default)]
pub struct RouteModule {
    pub(crate) loader: Option<RouteFn>,
    pub(crate) action: Option<RouteFn>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RouteArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouteResult> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RouteArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouteResult> + Send + 'static,
    {
        self.action = Some(Arc::new(move |args| f(args).boxed()));
        self
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("loader", &self.loader.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Input to the document renderer.
#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub request: RouteRequest,
    pub status: StatusCode,
    /// Headers collected from loaders and actions.
    pub headers: HeaderMap,
    pub context: Arc<StaticHandlerContext>,
}

/// Per-build request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub basename: Option<String>,
    pub allowed_action_origins: Option<Vec<String>>,
    /// Future flag: require a provider load context.
    pub middleware: bool,
}

impl BuildOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            basename: config.basename.clone(),
            allowed_action_origins: (!config.csrf.allowed_origins.is_empty())
                .then(|| config.csrf.allowed_origins.clone()),
            middleware: config.future.middleware,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    Routes(#[from] RouteTreeError),

    #[error("no document renderer registered")]
    MissingRenderer,

    #[error("module registered for unknown route `{0}`")]
    UnknownRoute(String),

    #[error("route `{0}` declares a loader but none is registered")]
    MissingLoader(String),

    #[error("route `{0}` declares an action but none is registered")]
    MissingAction(String),

    #[error("route `{0}` has a loader registered but does not declare one")]
    UndeclaredLoader(String),

    #[error("route `{0}` has an action registered but does not declare one")]
    UndeclaredAction(String),
}

/// Immutable application build. Cheap to clone.
#[derive(Clone)]
pub struct ServerBuild {
    routes: Arc<RouteTree>,
    modules: Arc<HashMap<String, RouteModule>>,
    render_document: RenderDocumentFn,
    handle_error: Option<HandleErrorFn>,
    options: BuildOptions,
}

impl ServerBuild {
    pub fn builder(routes: Vec<RouteDefinition>) -> ServerBuildBuilder {
        ServerBuildBuilder {
            routes,
            modules: HashMap::new(),
            render_document: None,
            handle_error: None,
            options: BuildOptions::default(),
        }
    }

    pub fn routes(&self) -> &RouteTree {
        &self.routes
    }

    pub fn module(&self, route_id: &str) -> Option<&RouteModule> {
        self.modules.get(route_id)
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub(crate) fn render_document(&self) -> &RenderDocumentFn {
        &self.render_document
    }

    pub(crate) fn handle_error(&self) -> Option<&HandleErrorFn> {
        self.handle_error.as_ref()
    }

    /// Rebuild with options from `config`.
    ///
    /// The route tree is replaced only when `config` lists routes; the
    /// registered modules must still line up with it.
    pub fn reconfigure(&self, config: &ServerConfig) -> Result<ServerBuild, BuildError> {
        let routes = if config.routes.is_empty() {
            self.routes.clone()
        } else {
            Arc::new(RouteTree::new(config.routes.clone())?)
        };
        validate_modules(&routes, &self.modules)?;

        Ok(ServerBuild {
            routes,
            modules: self.modules.clone(),
            render_document: self.render_document.clone(),
            handle_error: self.handle_error.clone(),
            options: BuildOptions::from_config(config),
        })
    }
}

impl fmt::Debug for ServerBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuild")
            .field("routes", &self.routes.len())
            .field("modules", &self.modules.len())
            .field("options", &self.options)
            .finish()
    }
}

pub struct ServerBuildBuilder {
    routes: Vec<RouteDefinition>,
    modules: HashMap<String, RouteModule>,
    render_document: Option<RenderDocumentFn>,
    handle_error: Option<HandleErrorFn>,
    options: BuildOptions,
}

impl ServerBuildBuilder {
    pub fn module(mut self, route_id: impl Into<String>, module: RouteModule) -> Self {
        self.modules.insert(route_id.into(), module);
        self
    }

    pub fn render_document<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RenderArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Body>, BoxError>> + Send + 'static,
    {
        self.render_document = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    pub fn handle_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ServerError, ErrorContext<'_>) + Send + Sync + 'static,
    {
        self.handle_error = Some(Arc::new(f));
        self
    }

    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.options.basename = Some(basename.into());
        self
    }

    pub fn allowed_action_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.allowed_action_origins = Some(origins.into_iter().map(Into::into).collect());
        self
    }

    pub fn middleware(mut self, enabled: bool) -> Self {
        self.options.middleware = enabled;
        self
    }

    pub fn build(self) -> Result<ServerBuild, BuildError> {
        let routes = RouteTree::new(self.routes)?;
        validate_modules(&routes, &self.modules)?;
        let render_document = self.render_document.ok_or(BuildError::MissingRenderer)?;

        Ok(ServerBuild {
            routes: Arc::new(routes),
            modules: Arc::new(self.modules),
            render_document,
            handle_error: self.handle_error,
            options: self.options,
        })
    }
}

fn validate_modules(routes: &RouteTree, modules: &HashMap<String, RouteModule>) -> Result<(), BuildError> {
    if let Some(id) = modules.keys().find(|id| routes.get(id).is_none()) {
        return Err(BuildError::UnknownRoute(id.clone()));
    }

    for route in routes.routes() {
        let module = modules.get(&route.id);
        let has_loader = module.is_some_and(|m| m.loader.is_some());
        let has_action = module.is_some_and(|m| m.action.is_some());

        match (route.has_loader, has_loader) {
            (true, false) => return Err(BuildError::MissingLoader(route.id.clone())),
            (false, true) => return Err(BuildError::UndeclaredLoader(route.id.clone())),
            _ => {}
        }
        match (route.has_action, has_action) {
            (true, false) => return Err(BuildError::MissingAction(route.id.clone())),
            (false, true) => return Err(BuildError::UndeclaredAction(route.id.clone())),
            _ => {}
        }
    }
    Ok(())
}
