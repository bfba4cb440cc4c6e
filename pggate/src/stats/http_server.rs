//! Metrics webserver.

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Error, Registry};

const OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Serves a [`Registry`] over HTTP.
#[derive(Debug, Clone)]
pub struct Webserver {
    listen_address: String,
    port: u16,
    registry: Registry,
}

impl Webserver {
    /// Create webserver for the global registry.
    ///
    /// `listen_address` is a comma-separated list of hosts.
    pub fn new(listen_address: &str, port: u16) -> Self {
        Self {
            listen_address: listen_address.to_owned(),
            port,
            registry: Registry::global(),
        }
    }

    /// Serve this registry instead.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Bind all listen addresses and start serving.
    ///
    /// Returns once every address is bound. Any bind failure
    /// is returned and nothing is served.
    pub async fn start(&self) -> Result<ServerHandle, Error> {
        let hosts = self
            .listen_address
            .split(',')
            .map(|host| host.trim())
            .filter(|host| !host.is_empty())
            .collect::<Vec<_>>();

        if hosts.is_empty() {
            return Err(Error::NoListenAddress);
        }

        let mut listeners = vec![];
        for host in hosts {
            let address = if host.contains(':') && !host.starts_with('[') {
                format!("[{}]:{}", host, self.port)
            } else {
                format!("{}:{}", host, self.port)
            };

            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| Error::Bind { address, source })?;
            listeners.push(listener);
        }

        let shutdown = CancellationToken::new();
        let mut addrs = vec![];
        let mut tasks = vec![];

        for listener in listeners {
            let addr = listener.local_addr().map_err(|source| Error::Bind {
                address: self.listen_address.clone(),
                source,
            })?;
            info!("OpenMetrics endpoint http://{}/metrics", addr);
            addrs.push(addr);

            let registry = self.registry.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                serve(listener, registry, shutdown).await;
            }));
        }

        Ok(ServerHandle {
            addrs,
            shutdown,
            tasks,
        })
    }
}

/// Running webserver.
#[derive(Debug)]
pub struct ServerHandle {
    addrs: Vec<SocketAddr>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound addresses.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Stop accepting connections and wait for the listeners to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

async fn serve(listener: TcpListener, registry: Registry, shutdown: CancellationToken) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accept = listener.accept() => match accept {
                Ok((stream, peer)) => {
                    debug!("metrics request from {}", peer);
                    stream
                }
                Err(err) => {
                    error!("metrics webserver accept error: {}", err);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let registry = registry.clone();

        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let registry = registry.clone();
                async move { handle(request, &registry) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("metrics webserver error: {:?}", err);
            }
        });
    }
}

fn handle(
    request: Request<Incoming>,
    registry: &Registry,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if request.method() != Method::GET {
        return Ok(respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "method not allowed\n",
        ));
    }

    let response = match request.uri().path() {
        "/metrics" => respond(StatusCode::OK, OPENMETRICS, registry.openmetrics()),
        "/metrics.json" => match serde_json::to_string(&registry.snapshot()) {
            Ok(json) => respond(StatusCode::OK, "application/json", json),
            Err(err) => respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("{}\n", err),
            ),
        },
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found\n"),
    };

    Ok(response)
}

fn respond(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
