//! Minimal application served by `arbor`.
//!
//! ```text
//! cargo run --example basic_app -- [config.toml]
//! ```
//!
//! Routes:
//! - `/`            greeting, shows the flash message left by `/login`
//! - `/login`       POST `name=...` stores the user in the session
//! - `/api/health`  resource route returning JSON

use std::path::PathBuf;
use std::sync::Arc;

use arbor::config::{load_config, ConfigWatcher};
use arbor::cookies::CookieOptions;
use arbor::handler::responses::text;
use arbor::handler::{json, BoxError, RenderArgs, RouteArgs, RouteModule, RouteResult, ServerBuild, Thrown};
use arbor::lifecycle::shutdown_on_signal;
use arbor::observability::{logging, metrics};
use arbor::routing::RouteDefinition;
use arbor::sessions::SessionHandle;
use arbor::{HttpServer, ServerConfig, Shutdown};
use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn sessions(args: &RouteArgs) -> Result<&SessionHandle, Thrown> {
    args.context
        .get::<SessionHandle>()
        .ok_or_else(|| Thrown::message("session storage missing from load context"))
}

async fn root_loader(args: RouteArgs) -> RouteResult {
    let storage = sessions(&args)?;
    let mut session = storage.get_session(args.request.cookie_header());
    let flash = session.get("flash");
    let user = session.get("user");

    let mut response = json(json!({ "user": user, "flash": flash }));
    // Reading a flash value consumes it; persist that.
    let set_cookie = storage.commit_session(&session, &CookieOptions::default())?;
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_str(&set_cookie)?);
    Ok(response.into())
}

async fn login_action(args: RouteArgs) -> RouteResult {
    let name = args
        .request
        .form()
        .into_iter()
        .find_map(|(k, v)| (k == "name").then_some(v))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Thrown::status(StatusCode::BAD_REQUEST, json!({ "name": "required" })))?;

    let storage = sessions(&args)?;
    let mut session = storage.get_session(args.request.cookie_header());
    session.set("user", name.as_str());
    session.flash("flash", format!("Welcome, {name}"));
    let set_cookie = storage.commit_session(&session, &CookieOptions::default())?;

    let mut response = arbor::handler::redirect("/");
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_str(&set_cookie)?);
    Err(Thrown::response(response))
}

async fn render(args: RenderArgs) -> Result<Response<Body>, BoxError> {
    let context = &args.context;
    let root = context.loader_data.get("root").cloned().unwrap_or_default();
    let body = match context.errors.as_ref().and_then(|errors| errors.values().next()) {
        Some(error) => format!(
            "<!doctype html><h1>{}</h1><pre>{}</pre>",
            args.status,
            serde_json::to_string_pretty(error)?
        ),
        None => format!(
            "<!doctype html><h1>Hello {}</h1><p>{}</p><form method=post action=/login>\
             <input name=name><button>Log in</button></form>",
            root["user"].as_str().unwrap_or("stranger"),
            root["flash"].as_str().unwrap_or(""),
        ),
    };

    let mut response = text(args.status, body);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    Ok(response)
}

fn app() -> Result<ServerBuild, BoxError> {
    let routes = vec![
        RouteDefinition::new("root").path("/").loader().error_boundary(),
        RouteDefinition::new("login").path("login").parent("root").action(),
        RouteDefinition::new("health").path("api/health").parent("root").resource().loader(),
    ];

    Ok(ServerBuild::builder(routes)
        .render_document(render)
        .handle_error(|err, ctx| {
            tracing::error!(error = %err, url = %ctx.request.url, "Request failed");
        })
        .module("root", RouteModule::new().loader(root_loader))
        .module("login", RouteModule::new().action(login_action))
        .module(
            "health",
            RouteModule::new().loader(|_| async { RouteResult::Ok(json(json!({ "status": "ok" })).into()) }),
        )
        .build()?)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(mode = ?config.mode, config = ?config_path, "basic_app starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Without a config file there is nothing to watch; the channel just stays idle.
    let (_idle_tx, idle_rx) = mpsc::unbounded_channel();
    let (_watcher, updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, idle_rx),
    };

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, app()?)?;
    server.run(listener, updates, shutdown.subscribe()).await?;
    Ok(())
}
