// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::metrics::MetricsCollector;
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::Service;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Builder so `main.rs` can inject the request handler and a shutdown signal.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    shutdown: Option<BoxFuture<'static, ()>>,
    metrics: Option<Arc<MetricsCollector>>,
    grace: Duration,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            shutdown: None,
            metrics: None,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Stop accepting connections once `signal` resolves.
    pub fn with_shutdown<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(Box::pin(signal));
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// How long in-flight connections get to finish after shutdown.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Consume the builder, boot the TCP listener and serve until shutdown.
    pub async fn serve(self) -> Result<()> {
        let listener = bind_tcp(self.addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener. One task per connection; once the
    /// shutdown signal fires, accepting stops, every open connection is told
    /// to finish its current request, and `serve_on` waits for them up to the
    /// grace period.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;
        let mut shutdown = self
            .shutdown
            .unwrap_or_else(|| Box::pin(std::future::pending()));

        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            // EMFILE and friends clear up once connections close.
                            tracing::warn!(%err, "accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    let svc = handler.clone();
                    let metrics = self.metrics.clone();
                    let drain_rx = drain_rx.clone();

                    connections.spawn(async move {
                        if let Some(metrics) = &metrics {
                            metrics.increment_active_connections();
                        }
                        if let Err(err) = serve_connection(stream, svc, drain_rx).await {
                            tracing::warn!(%peer, %err, "connection error");
                        }
                        if let Some(metrics) = &metrics {
                            metrics.decrement_active_connections();
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let _ = drain_tx.send(true);

        let open = connections.len();
        if open > 0 {
            tracing::info!("Waiting for {} open connection(s) to finish", open);
        }
        let drained = tokio::time::timeout(self.grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "Grace period of {:?} elapsed, aborting {} connection(s)",
                self.grace,
                connections.len()
            );
            connections.shutdown().await;
        }

        Ok(())
    }
}

async fn serve_connection<H>(
    stream: TcpStream,
    svc: H,
    mut drain_rx: watch::Receiver<bool>,
) -> Result<(), hyper::Error>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    let conn = Http::new().serve_connection(stream, svc);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => return result,
            _ = drain_rx.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
