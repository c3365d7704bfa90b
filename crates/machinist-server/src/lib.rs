//! HTTP front end for machinist.
//!
//! Routes:
//! - `POST /machine/add`      create; 201 with the stored machine
//! - `GET  /machine/{id}`     fetch; 404 when absent
//! - `GET  /machines/{name}`  `{"machines": [...]}` of every machine with that name
//! - `GET  /machines`         `{"machines": [...]}` of every machine
//! - `PUT  /machine/{id}`     upsert; 201 when created, 200 when replaced
//! - `POST /machine/{id}`     partial update; 404 when absent
//! - `GET  /health`           liveness
//!
//! Validation failures answer 400 with the violation messages as plain text.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod config;
pub mod routes;

pub use config::{ConfigError, ServerConfig};
pub use routes::{parse_route, Route};

use machinist_core::{MachineService, ServiceError};
use machinist_schema::{Machine, MachineDraft, MachineId, MachinePatch, Machines};
use machinist_store::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
#[cfg(test)]
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn respond_text(req: tiny_http::Request, code: u16, msg: &str) {
    let header =
        Header::from_bytes("Content-Type", "text/plain; charset=utf-8").expect("valid header");
    let _ = req.respond(
        Response::from_string(msg)
            .with_status_code(StatusCode(code))
            .with_header(header),
    );
}

fn respond_json<T: Serialize>(req: tiny_http::Request, code: u16, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let header =
                Header::from_bytes("Content-Type", "application/json").expect("valid header");
            let _ = req.respond(
                Response::from_data(body)
                    .with_status_code(StatusCode(code))
                    .with_header(header),
            );
        }
        Err(e) => {
            error!("failed to encode response: {e}");
            respond_text(req, 500, "failed to encode response");
        }
    }
}

fn respond_service_err(req: tiny_http::Request, err: &ServiceError) {
    match err {
        ServiceError::Validation(violations) => {
            warn!("rejected {} {}: {violations}", req.method(), req.url());
            respond_text(req, 400, &violations.to_string());
        }
        ServiceError::NotFound(_) => respond_text(req, 404, &err.to_string()),
        ServiceError::Store(e) => {
            error!("{} {}: {e}", req.method(), req.url());
            respond_text(req, 500, &err.to_string());
        }
    }
}

fn read_json<T: DeserializeOwned>(req: &mut tiny_http::Request) -> Result<T, String> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("failed to read request body: {e}"))?;
    serde_json::from_slice(&body).map_err(|e| format!("invalid JSON body: {e}"))
}

fn respond_bad_request(req: tiny_http::Request, msg: &str) {
    warn!("{} {}: {msg}", req.method(), req.url());
    respond_text(req, 400, msg);
}

fn handle_add(service: &MachineService, mut req: tiny_http::Request) {
    let draft = match read_json::<MachineDraft>(&mut req) {
        Ok(draft) => draft,
        Err(msg) => return respond_bad_request(req, &msg),
    };
    match service.create(&draft) {
        Ok(machine) => respond_json(req, 201, &machine),
        Err(e) => respond_service_err(req, &e),
    }
}

fn handle_machine(
    service: &MachineService,
    mut req: tiny_http::Request,
    method: &Method,
    raw_id: &str,
) {
    let id = match raw_id.parse::<MachineId>() {
        Ok(id) => id,
        Err(e) => return respond_bad_request(req, &e.to_string()),
    };

    match *method {
        Method::Get => match service.get_by_id(id) {
            Ok(machine) => respond_json(req, 200, &machine),
            Err(e) => respond_service_err(req, &e),
        },
        Method::Put => {
            let draft = match read_json::<MachineDraft>(&mut req) {
                Ok(draft) => draft,
                Err(msg) => return respond_bad_request(req, &msg),
            };
            match service.upsert(id, &draft) {
                Ok(outcome) => {
                    let code = if outcome.was_created() { 201 } else { 200 };
                    respond_json(req, code, outcome.machine());
                }
                Err(e) => respond_service_err(req, &e),
            }
        }
        Method::Post => {
            let patch = match read_json::<MachinePatch>(&mut req) {
                Ok(patch) => patch,
                Err(msg) => return respond_bad_request(req, &msg),
            };
            match service.update(id, &patch) {
                Ok(machine) => respond_json(req, 200, &machine),
                Err(e) => respond_service_err(req, &e),
            }
        }
        _ => respond_text(req, 405, "method not allowed"),
    }
}

fn respond_list(req: tiny_http::Request, result: Result<Vec<Machine>, ServiceError>) {
    match result {
        Ok(machines) => respond_json(req, 200, &Machines::from(machines)),
        Err(e) => respond_service_err(req, &e),
    }
}

/// Handle a single HTTP request, dispatching to the matching route handler.
pub fn handle_request(service: &MachineService, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let Some(route) = parse_route(&url) else {
        return respond_text(req, 404, "not found");
    };

    match (route, &method) {
        (Route::Health, Method::Get) => {
            respond_json(req, 200, &serde_json::json!({ "status": "ok" }));
        }
        (Route::AddMachine, Method::Post) => handle_add(service, req),
        (Route::Machine(raw_id), Method::Get | Method::Put | Method::Post) => {
            handle_machine(service, req, &method, raw_id);
        }
        (Route::Machines, Method::Get) => respond_list(req, service.get_all()),
        (Route::MachinesByName(name), Method::Get) => {
            respond_list(req, service.get_by_name(&name));
        }
        _ => respond_text(req, 405, "method not allowed"),
    }
}

fn worker_loop(server: &Server, service: &MachineService, shutdown: &AtomicBool) {
    loop {
        match server.recv() {
            Ok(req) => handle_request(service, req),
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!("failed to accept request: {e}");
            }
        }
    }
}

/// Stops a running server from another thread (e.g. a signal handler).
#[derive(Clone)]
pub struct ShutdownTrigger {
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    workers: usize,
}

impl ShutdownTrigger {
    /// Ask every worker to stop. Returns `false` if shutdown was already requested.
    pub fn fire(&self) -> bool {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return false;
        }
        // One unblock per worker blocked in recv().
        for _ in 0..self.workers {
            self.server.unblock();
        }
        true
    }
}

/// A bound server and its worker threads. Dropping it stops the workers.
pub struct ServerHandle {
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    port: u16,
}

impl ServerHandle {
    /// Bind `addr` and start `workers` threads pulling requests from the shared listener.
    pub fn start(service: &MachineService, addr: &str, workers: usize) -> Result<Self, ServerError> {
        let server = Server::http(addr).map_err(|e| ServerError::Bind {
            addr: addr.to_owned(),
            reason: e.to_string(),
        })?;
        let port = server.server_addr().to_ip().map_or(0, |a| a.port());
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            let service = service.clone();
            let handle = std::thread::Builder::new()
                .name(format!("http-worker-{i}"))
                .spawn(move || worker_loop(&server, &service, &shutdown))?;
            handles.push(handle);
        }
        info!("listening on {addr} (port {port}, {count} workers)");

        Ok(Self {
            server,
            shutdown,
            workers: handles,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            server: Arc::clone(&self.server),
            shutdown: Arc::clone(&self.shutdown),
            workers: self.workers.len(),
        }
    }

    /// Block until every worker has exited.
    pub fn join(mut self) {
        self.join_workers();
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.trigger().fire();
            self.join_workers();
        }
    }
}

/// Open the configured store and start serving on the configured address.
pub fn serve(config: &ServerConfig) -> Result<ServerHandle, ServerError> {
    config.validate()?;
    let service = MachineService::new(config.open_store()?);
    ServerHandle::start(&service, &config.addr(), config.workers)
}

/// A test helper that starts a machinist server on a random port in background threads.
///
/// The server listens on `127.0.0.1:{port}`. Drop the `TestServer` to stop it;
/// a file-backed store releases its data directory once the workers have exited.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    _handle: ServerHandle,
}

impl TestServer {
    /// Start a test server backed by an in-memory store.
    pub fn start() -> Self {
        Self::start_with(None)
    }

    /// Start a test server backed by a file store under `data_dir`.
    pub fn start_with_data_dir(data_dir: PathBuf) -> Self {
        Self::start_with(Some(data_dir))
    }

    fn start_with(data_dir: Option<PathBuf>) -> Self {
        let config = ServerConfig {
            bind: "127.0.0.1".to_owned(),
            port: 0,
            data_dir: data_dir.clone(),
            workers: 2,
        };
        let handle = serve(&config).expect("failed to start test HTTP server");
        let port = handle.port();
        Self {
            url: format!("http://127.0.0.1:{port}"),
            port,
            data_dir,
            _handle: handle,
        }
    }
}
