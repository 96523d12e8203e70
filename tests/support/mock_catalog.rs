use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Serves a farm catalog JSON document over HTTP. The body can be swapped
/// between requests and failures can be injected to exercise the
/// keep-previous-output path.
#[derive(Clone)]
pub struct MockCatalog {
    body: Arc<RwLock<Value>>,
    failing: Arc<AtomicBool>,
    requests: Arc<AtomicU64>,
}

impl MockCatalog {
    pub fn new(body: Value) -> Self {
        Self {
            body: Arc::new(RwLock::new(body)),
            failing: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_body(&self, body: Value) {
        *self.body.write().expect("mock catalog poisoned") = body;
    }

    /// While enabled, every request is answered with HTTP 500.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

pub struct MockCatalogServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockCatalogServer {
    pub async fn start(catalog: MockCatalog) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock catalog listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let catalog = catalog.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    serve_request(catalog.clone(), req)
                }))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock catalog server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock catalog server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    catalog: MockCatalog,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    catalog.requests.fetch_add(1, Ordering::SeqCst);

    if catalog.failing.load(Ordering::SeqCst) {
        let mut response = Response::new(Body::from("catalog offline"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }

    let body = catalog
        .body
        .read()
        .expect("mock catalog poisoned")
        .to_string();
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}
