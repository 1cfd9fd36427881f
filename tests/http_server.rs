//! HTTP server tests over a real listener.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use arbor::config::{ConfigUpdate, ServerMode};
use arbor::cookies::CookieOptions;
use arbor::handler::{json, RouteArgs, RouteModule, RouteResult, ServerBuild, Thrown};
use arbor::routing::RouteDefinition;
use arbor::sessions::SessionHandle;
use arbor::{HttpServer, ServerConfig, Shutdown};
use axum::http::{header, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use common::{render_context, Reports};

/// Counts visits in the session and echoes the count.
async fn visits(args: RouteArgs) -> RouteResult {
    let sessions = args
        .context
        .get::<SessionHandle>()
        .ok_or_else(|| Thrown::message("no session storage in context"))?;
    let mut session = sessions.get_session(args.request.cookie_header());
    let count = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    session.set("visits", count);

    let set_cookie = sessions.commit_session(&session, &CookieOptions::default())?;
    let mut response = json(json!(count));
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_str(&set_cookie)?);
    Ok(response.into())
}

/// Outlives any timeout the tests configure.
async fn slow(_args: RouteArgs) -> RouteResult {
    tokio::time::sleep(Duration::from_secs(10)).await;
    RouteResult::Ok(json(json!("late")).into())
}

struct TestServer {
    addr: SocketAddr,
    reports: Reports,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
    _updates: mpsc::UnboundedSender<ConfigUpdate>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let reports = Reports::default();
        let build = ServerBuild::builder(vec![
            RouteDefinition::new("root").path("/"),
            RouteDefinition::new("visits").path("visits").parent("root").loader(),
            RouteDefinition::new("slow").path("slow").parent("root").loader(),
        ])
        .render_document(render_context)
        .handle_error(reports.hook())
        .module("visits", RouteModule::new().loader(visits))
        .module("slow", RouteModule::new().loader(slow))
        .build()
        .unwrap();

        let server = HttpServer::new(config, build).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let (updates, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(server.run(listener, receiver, shutdown.subscribe()));

        Self {
            addr,
            reports,
            shutdown,
            task,
            _updates: updates,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap();
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().redirect(Policy::none()).build().unwrap()
}

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.mode = ServerMode::Development;
    config.sessions.cookie.secrets = vec!["integration-secret".into()];
    config
}

#[tokio::test]
async fn test_session_round_trip() {
    let server = TestServer::start(config()).await;
    let client = client();

    let first = client.get(server.url("/visits")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().contains_key("x-request-id"));
    let set_cookie = first.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("__session="));
    let context: Value = first.json().await.unwrap();
    assert_eq!(context["loaderData"]["visits"], 1);

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let second = client
        .get(server.url("/visits"))
        .header("cookie", cookie)
        .send()
        .await
        .unwrap();
    let context: Value = second.json().await.unwrap();
    assert_eq!(context["loaderData"]["visits"], 2);

    server.stop().await;
}

#[tokio::test]
async fn test_data_request_and_redirect() {
    let server = TestServer::start(config()).await;
    let client = client();

    let response = client.get(server.url("/visits.data")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"visits": {"data": 1}}));

    let response = client.get(server.url("//visits//?a=1")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.headers()["location"], "/visits/?a=1");

    let response = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_body_limit() {
    let mut config = config();
    config.security.max_body_size = 16;
    let server = TestServer::start(config).await;

    let response = client()
        .post(server.url("/visits"))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    server.stop().await;
}

#[tokio::test]
async fn test_forwarded_host_feeds_csrf_check() {
    let server = TestServer::start(config()).await;

    let response = client()
        .post(server.url("/visits"))
        .header("origin", "https://shop.example.com")
        .header("x-forwarded-host", "shop.example.com")
        .send()
        .await
        .unwrap();
    // Origin matches the forwarded host; `visits` has no action.
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = client()
        .post(server.url("/visits"))
        .header("origin", "https://evil.test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    server.stop().await;
}

fn is_slow_abort(line: &str) -> bool {
    line.starts_with("aborted GET ") && line.ends_with("/slow")
}

#[tokio::test]
async fn test_timeout_aborts_and_reports() {
    let mut config = config();
    config.timeouts.request_secs = 1;
    let server = TestServer::start(config).await;

    let response = client().get(server.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let reports = server.reports.all();
    assert_eq!(reports.len(), 1, "{reports:?}");
    assert!(is_slow_abort(&reports[0]), "{reports:?}");

    server.stop().await;
}

#[tokio::test]
async fn test_client_disconnect_aborts_and_reports() {
    let server = TestServer::start(config()).await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    assert!(impatient.get(server.url("/slow")).send().await.is_err());
    drop(impatient);

    let mut reported = false;
    for _ in 0..50 {
        if server.reports.all().iter().any(|line| is_slow_abort(line)) {
            reported = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(reported, "{:?}", server.reports.all());

    server.stop().await;
}
