//! Loopback HTTP responders and a lookup-counting registry for client tests.

use reqwest::blocking::Client;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::ServiceRegistry;
use super::registry::ServiceEndpoint;
use crate::error::CollaboratorError;

pub struct CountingRegistry {
    lookups: AtomicUsize,
    endpoints: Vec<ServiceEndpoint>,
}

impl CountingRegistry {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ServiceRegistry for CountingRegistry {
    fn lookup(&self, _service: &str) -> Result<Vec<ServiceEndpoint>, CollaboratorError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.clone())
    }
}

pub fn counting(endpoints: Vec<ServiceEndpoint>) -> Arc<CountingRegistry> {
    Arc::new(CountingRegistry {
        lookups: AtomicUsize::new(0),
        endpoints,
    })
}

/// Client that never goes through a proxy, so loopback requests stay local.
pub fn client() -> Client {
    Client::builder().no_proxy().timeout(Duration::from_secs(5)).build().unwrap()
}

/// Accept a single request and answer it with `status` (e.g. `"200 OK"`)
/// and `body`. The handle yields the request body that was received.
pub fn respond_once(status: &str, body: &str) -> (ServiceEndpoint, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.is_empty() || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8(request_body).unwrap()
    });

    (ServiceEndpoint::new("127.0.0.1", port), handle)
}

/// An endpoint nothing listens on.
pub fn closed_endpoint() -> ServiceEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ServiceEndpoint::new("127.0.0.1", port)
}
