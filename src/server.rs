//! HTTP server and graceful shutdown.
//!
//! # Request flow
//!
//! hyper parses the request, the body is collected into memory, and the
//! whole handler chain then runs on tokio's blocking pool. Chains are plain
//! synchronous code, so a slow handler ties up one blocking thread and never
//! an async worker. A panic no middleware caught stays inside its own task:
//! that request gets a `500`, every other request is unaffected.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting and tells every open
//! connection to shut down gracefully: idle keep-alive connections close at
//! once, connections with a request in flight close after answering it.
//! If that takes longer than [`Server::shutdown_timeout`], the remaining
//! connections are aborted, [`Server::serve`] returns
//! [`Error::ShutdownTimeout`] and the caller decides how hard to exit.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseWriter;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use zapi::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 3000));
    /// ```
    pub fn bind(addr: impl Into<SocketAddr>) -> Self {
        Self { addr: addr.into(), shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::bind(config.addr).shutdown_timeout(config.shutdown_timeout())
    }

    /// How long in-flight connections may take to finish after a shutdown
    /// signal.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.run(listener, app, signal).await
    }

    async fn run(
        self,
        listener: TcpListener,
        app: App,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let app = Arc::new(app);
        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();

        info!(addr = %listener.local_addr()?, "zapi listening");

        let mut tasks = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(connections = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { handle(app, req, remote_addr).await }
                    });
                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), svc)
                        .into_owned();
                    let conn = graceful.watch(conn);

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Stop accepting before waiting on the open connections.
        drop(listener);

        let drain = async {
            graceful.shutdown().await;
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            let in_flight = tasks.len();
            warn!(in_flight, "graceful shutdown timed out");
            tasks.abort_all();
            return Err(Error::ShutdownTimeout { in_flight });
        }

        info!("zapi stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Collects the body and runs the dispatcher off the async workers.
///
/// The error type is [`Infallible`](std::convert::Infallible): every failure
/// becomes a response, so hyper never sees an error.
async fn handle(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };
    let request = Request::new(parts, body).with_remote_addr(remote_addr);

    let response = match tokio::task::spawn_blocking(move || app.dispatch(request)).await {
        Ok(res) => res.into_http(),
        Err(e) => {
            error!(peer = %remote_addr, "unrecovered handler failure: {e}");
            status_only(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };
    Ok(response)
}

fn status_only(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = ResponseWriter::new();
    res.write_header(status);
    res.into_http()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT. If a handler cannot be
/// installed that signal is ignored rather than stopping the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
