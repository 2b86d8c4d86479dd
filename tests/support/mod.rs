//! In-process stand-in for the scheduling service.
//!
//! Binds a `tiny_http` server to an ephemeral loopback port, answers every
//! request through a handler closure and records what it saw. Because the
//! port is never the dashboard port, primary and decision traffic both land
//! on the same server.

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde_json::Value;
use tiny_http::{Header, Response, Server};

use schedash::config::DashConfig;

/// A request as received by the mock service.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// What the handler answers with.
pub struct Reply {
    pub status: u16,
    pub body: String,
}

pub fn reply_json(status: u16, body: Value) -> Reply {
    Reply {
        status,
        body: body.to_string(),
    }
}

pub fn reply_raw(status: u16, body: &str) -> Reply {
    Reply {
        status,
        body: body.to_string(),
    }
}

pub struct MockService {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    pub origin: String,
}

impl MockService {
    pub fn start(handler: impl Fn(&Recorded) -> Reply + Send + 'static) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let worker = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let recorded = Recorded {
                        method: request.method().as_str().to_string(),
                        path: request.url().to_string(),
                        authorization: request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("Authorization"))
                            .map(|h| h.value.as_str().to_string()),
                        body,
                    };
                    let reply = handler(&recorded);
                    requests.lock().unwrap().push(recorded);

                    let content_type =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap();
                    let response = Response::from_string(reply.body)
                        .with_status_code(reply.status)
                        .with_header(content_type);
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            worker: Some(worker),
            requests,
            origin: format!("http://{addr}"),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Config pointing both services at this server.
    pub fn config(&self) -> DashConfig {
        let mut config = DashConfig::default();
        config.service.origin = self.origin.clone();
        config.service.timeout_ms = 5000;
        config
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Config pointing at a loopback port nothing listens on.
pub fn unreachable_config() -> DashConfig {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut config = DashConfig::default();
    config.service.origin = format!("http://127.0.0.1:{port}");
    config.service.timeout_ms = 2000;
    config
}
