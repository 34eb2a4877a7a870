// tests/gateway_tests.rs
use async_trait::async_trait;
use health_gateway::backends::{MemoryStore, NullStore};
use health_gateway::config::{CloudTasksConfig, Environment, QueueConfig, QueueConnections};
use health_gateway::health::{
    CacheStore, DatabaseProbe, Dependency, HealthAggregator, HealthSettings, KeyValueProbe,
    ProbeError,
};
use health_gateway::scheduler::{SchedulerTrigger, TaskError, TaskRunner, TokenGuard};
use health_gateway::server::{
    RequestHandler, ServerBuilder, HEALTH_CHECK_PATH, REQUEST_ID_HEADER, SCHEDULER_RUN_PATH,
};
use hyper::{Body, Client, Request, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};
use tower::ServiceExt;

const SECRET: &str = "cron-secret";

struct FakeDatabase(Result<&'static str, &'static str>);

#[async_trait]
impl DatabaseProbe for FakeDatabase {
    async fn database_name(&self) -> Result<String, ProbeError> {
        self.0
            .map(str::to_string)
            .map_err(|e| ProbeError::Backend(e.to_string()))
    }
}

struct FakeRedis(bool);

#[async_trait]
impl KeyValueProbe for FakeRedis {
    async fn ping(&self) -> Result<(), ProbeError> {
        if self.0 {
            Ok(())
        } else {
            Err(ProbeError::Backend("Connection refused".to_string()))
        }
    }
}

struct BrokenCache;

#[async_trait]
impl CacheStore for BrokenCache {
    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), ProbeError> {
        Err(ProbeError::Backend("READONLY You can't write against a read only replica.".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, ProbeError> {
        Ok(None)
    }
}

/// Stores whatever it is given but reads back a different value.
struct CorruptingCache;

#[async_trait]
impl CacheStore for CorruptingCache {
    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, ProbeError> {
        Ok(Some("stale".to_string()))
    }
}

#[derive(Default)]
struct FakeRunner {
    calls: AtomicUsize,
}

#[async_trait]
impl TaskRunner for FakeRunner {
    async fn run_due(&self) -> Result<String, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Running [App\\Console\\Commands\\Prune] DONE\n".to_string())
    }
}

struct FailingRunner;

#[async_trait]
impl TaskRunner for FailingRunner {
    async fn run_due(&self) -> Result<String, TaskError> {
        Err(TaskError::Spawn {
            program: "php".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    }
}

/// Signals when it starts, then takes `delay` to finish.
struct SlowRunner {
    delay: Duration,
    started: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

impl SlowRunner {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::new(Notify::new()),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl TaskRunner for SlowRunner {
    async fn run_due(&self) -> Result<String, TaskError> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok("slow task done\n".to_string())
    }
}

fn queue(driver: &str) -> QueueConfig {
    QueueConfig {
        default: driver.to_string(),
        connections: QueueConnections {
            cloudtasks: Some(CloudTasksConfig {
                project: Some("acme-prod".to_string()),
            }),
        },
    }
}

struct Fixture {
    database: Arc<dyn DatabaseProbe>,
    redis: Arc<dyn KeyValueProbe>,
    cache: Arc<dyn CacheStore>,
    cache_store: &'static str,
    queue: QueueConfig,
    environment: Environment,
    token: Option<String>,
    runner: Arc<dyn TaskRunner>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            database: Arc::new(FakeDatabase(Ok("app"))),
            redis: Arc::new(FakeRedis(true)),
            cache: Arc::new(MemoryStore::new()),
            cache_store: "memory",
            queue: queue("cloudtasks"),
            environment: Environment::Production,
            token: Some(SECRET.to_string()),
            runner: Arc::new(FakeRunner::default()),
        }
    }
}

impl Fixture {
    fn handler(self) -> RequestHandler {
        let health = HealthAggregator::new(
            self.database,
            self.redis,
            self.cache,
            HealthSettings {
                cache_store: self.cache_store.to_string(),
                queue: self.queue,
            },
            None,
        );
        let scheduler = SchedulerTrigger::new(
            TokenGuard::new(self.token, self.environment),
            self.runner,
            None,
        );
        RequestHandler::new(Arc::new(health), Arc::new(scheduler), None)
    }
}

async fn get_health(handler: RequestHandler) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(HEALTH_CHECK_PATH)
        .body(Body::empty())
        .unwrap();
    let response = handler.oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_string(response).await)
}

async fn trigger(handler: RequestHandler, token: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("POST").uri(SCHEDULER_RUN_PATH);
    if let Some(token) = token {
        request = request.header("X-CloudScheduler-Token", token);
    }
    handler
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn healthy_dependencies_report_success_for_every_key() {
    let (status, body) = get_health(Fixture::default().handler()).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["database"], "✅ Connected (app)");
    assert_eq!(json["redis"], "✅ Connected");
    assert_eq!(json["cache"], "✅ Working (memory)");
    assert_eq!(json["queue"], "✅ Driver: cloudtasks (project: acme-prod)");
}

#[tokio::test]
async fn report_keys_follow_check_order() {
    let (_, body) = get_health(Fixture::default().handler()).await;

    let positions: Vec<usize> = Dependency::ALL
        .iter()
        .map(|d| body.find(&format!("\"{}\"", d.as_str())).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{body}");
}

#[tokio::test]
async fn failing_dependencies_still_yield_all_four_entries_and_200() {
    let fixture = Fixture {
        database: Arc::new(FakeDatabase(Err("SQLSTATE[08006] connection refused"))),
        redis: Arc::new(FakeRedis(false)),
        cache: Arc::new(BrokenCache),
        queue: queue("sync"),
        ..Fixture::default()
    };
    let (status, body) = get_health(fixture.handler()).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_str(&body).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 4);
    assert_eq!(json["database"], "❌ SQLSTATE[08006] connection refused");
    assert_eq!(json["redis"], "❌ Connection refused");
    assert_eq!(json["cache"], "❌ READONLY You can't write against a read only replica.");
    assert_eq!(json["queue"], "✅ Driver: sync");
}

#[tokio::test]
async fn missing_cache_value_reports_failed() {
    let fixture = Fixture {
        cache: Arc::new(NullStore),
        cache_store: "null",
        ..Fixture::default()
    };
    let (_, body) = get_health(fixture.handler()).await;

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["cache"], "❌ Failed");
}

#[tokio::test]
async fn mismatched_cache_value_reports_failed() {
    let fixture = Fixture {
        cache: Arc::new(CorruptingCache),
        ..Fixture::default()
    };
    let (_, body) = get_health(fixture.handler()).await;

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["cache"], "❌ Failed");
}

#[tokio::test]
async fn repeated_checks_are_identical() {
    let handler = Fixture::default().handler();

    let (_, first) = get_health(handler.clone()).await;
    let (_, second) = get_health(handler).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn health_response_is_json_with_request_id() {
    let request = Request::builder()
        .uri(HEALTH_CHECK_PATH)
        .body(Body::empty())
        .unwrap();
    let response = Fixture::default().handler().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn trigger_without_token_is_forbidden() {
    let runner = Arc::new(FakeRunner::default());
    let fixture = Fixture {
        runner: runner.clone(),
        ..Fixture::default()
    };

    let response = trigger(fixture.handler(), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Unauthorized");
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trigger_with_wrong_token_is_forbidden() {
    let response = trigger(Fixture::default().handler(), Some("cron-secret ")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Unauthorized");
}

#[tokio::test]
async fn trigger_with_matching_token_returns_output() {
    let runner = Arc::new(FakeRunner::default());
    let fixture = Fixture {
        runner: runner.clone(),
        ..Fixture::default()
    };

    let response = trigger(fixture.handler(), Some(SECRET)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["output"], "Running [App\\Console\\Commands\\Prune] DONE\n");
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn local_environment_skips_token_check() {
    let fixture = Fixture {
        environment: Environment::Local,
        token: None,
        ..Fixture::default()
    };

    let response = trigger(fixture.handler(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn runner_failure_is_an_internal_error() {
    let fixture = Fixture {
        runner: Arc::new(FailingRunner),
        ..Fixture::default()
    };

    let response = trigger(fixture.handler(), Some(SECRET)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn wrong_method_and_unknown_path() {
    let handler = Fixture::default().handler();

    let request = Request::builder()
        .method("GET")
        .uri(SCHEDULER_RUN_PATH)
        .body(Body::empty())
        .unwrap();
    let response = handler.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = handler.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Serves `handler` on an ephemeral port, fires one authorized trigger, and
/// sends the shutdown signal once the runner has started. Returns how long
/// `serve_on` took to return after the signal, and the in-flight response
/// (if the client got one).
async fn shut_down_during_trigger(
    handler: RequestHandler,
    started: Arc<Notify>,
    grace: Duration,
) -> (Duration, Result<Response<Body>, hyper::Error>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(
        ServerBuilder::new(addr)
            .with_handler(handler)
            .with_shutdown(async move {
                let _ = stop_rx.await;
            })
            .with_grace_period(grace)
            .serve_on(listener),
    );

    let client = Client::new();
    let request = Request::builder()
        .method("POST")
        .uri(format!("http://{addr}{SCHEDULER_RUN_PATH}"))
        .header("X-CloudScheduler-Token", SECRET)
        .body(Body::empty())
        .unwrap();
    let in_flight = tokio::spawn(async move { client.request(request).await });

    started.notified().await;
    let signalled = Instant::now();
    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    let elapsed = signalled.elapsed();

    (elapsed, in_flight.await.unwrap())
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_trigger() {
    let runner = SlowRunner::new(Duration::from_millis(300));
    let started = runner.started.clone();
    let finished = runner.finished.clone();
    let fixture = Fixture {
        runner: Arc::new(runner),
        ..Fixture::default()
    };

    let (_, response) =
        shut_down_during_trigger(fixture.handler(), started, Duration::from_secs(10)).await;

    assert!(finished.load(Ordering::SeqCst));
    let response = response.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["output"], "slow task done\n");
}

#[tokio::test]
async fn shutdown_gives_up_after_grace_period() {
    let runner = SlowRunner::new(Duration::from_secs(30));
    let started = runner.started.clone();
    let finished = runner.finished.clone();
    let fixture = Fixture {
        runner: Arc::new(runner),
        ..Fixture::default()
    };

    let (elapsed, _) =
        shut_down_during_trigger(fixture.handler(), started, Duration::from_millis(100)).await;

    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert!(!finished.load(Ordering::SeqCst));
}
