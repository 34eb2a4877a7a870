// src/server/handler.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::health::HealthAggregator;
use crate::metrics::MetricsCollector;
use crate::scheduler::{SchedulerTrigger, TriggerError};

pub const HEALTH_CHECK_PATH: &str = "/health/check";
pub const SCHEDULER_RUN_PATH: &str = "/cloud-scheduler/run";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Serialize)]
struct SchedulerOutput {
    output: String,
}

#[derive(Clone)]
pub struct RequestHandler {
    health: Arc<HealthAggregator>,
    scheduler: Arc<SchedulerTrigger>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RequestHandler {
    pub fn new(
        health: Arc<HealthAggregator>,
        scheduler: Arc<SchedulerTrigger>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            health,
            scheduler,
            metrics,
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let request_id = Uuid::new_v4();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = info_span!("request", id = %request_id, %method, %path);

        async move {
            let mut response = self.route(req).await;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            if let Some(metrics) = &self.metrics {
                let route = match path.as_str() {
                    HEALTH_CHECK_PATH | SCHEDULER_RUN_PATH => path.as_str(),
                    _ => "other",
                };
                metrics.record_request(method_label(&method), route, response.status().as_u16());
            }

            tracing::debug!(status = response.status().as_u16(), "request complete");
            response
        }
        .instrument(span)
        .await
    }

    async fn route(&self, req: Request<Body>) -> Response<Body> {
        match (req.method(), req.uri().path()) {
            (&Method::GET, HEALTH_CHECK_PATH) => {
                let report = self.health.run_health_check().await;
                json_response(StatusCode::OK, &report)
            }
            (&Method::POST, SCHEDULER_RUN_PATH) => {
                match self.scheduler.trigger(req.headers()).await {
                    Ok(output) => json_response(StatusCode::OK, &SchedulerOutput { output }),
                    Err(TriggerError::Unauthorized) => {
                        text_response(StatusCode::FORBIDDEN, "Unauthorized")
                    }
                    Err(TriggerError::Task(e)) => {
                        error!(%e, "scheduler run failed");
                        internal_error()
                    }
                }
            }
            (_, HEALTH_CHECK_PATH) | (_, SCHEDULER_RUN_PATH) => {
                text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            }
            _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}

/// Bounded `method` label; extension methods would otherwise grow the
/// counter's cardinality without limit.
fn method_label(method: &Method) -> &'static str {
    if method == Method::GET {
        "GET"
    } else if method == Method::POST {
        "POST"
    } else if method == Method::HEAD {
        "HEAD"
    } else {
        "other"
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(%e, "failed to serialize response body");
            internal_error()
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn internal_error() -> Response<Body> {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
