#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use wprdc::catalog::{CatalogClient, Transport};
use wprdc::DatasetError;

pub const BASE_URL: &str = "https://catalog.test";
pub const NAME: &str = "allegheny-county-crash-data";
pub const SUB_PACKAGE: &str = "2011 Crash Data";
pub const CSV_URL: &str = "https://catalog.test/files/2011.csv";

pub const CRASHES_2011: &str = "\
CRASH_CRN,DISTRICT,CRASH_YEAR,COUNTY
2011000001,11,2011,Allegheny
2011000002,12,2011,Allegheny
2011000003,11,2011,Allegheny
";

pub const CRASHES_2011_REVISED: &str = "\
CRASH_CRN,DISTRICT,CRASH_YEAR,COUNTY
2011000001,11,2011,Allegheny
";

pub fn package_url(name: &str) -> String {
    format!("{BASE_URL}/api/3/action/package_show?id={name}")
}

/// A `package_show` body with the crash-data resource plus a PDF dictionary.
pub fn package_body(format: &str, last_modified: Option<&str>) -> String {
    package_body_for(CSV_URL, format, last_modified)
}

/// Like [`package_body`], with the crash-data resource served from `csv_url`.
pub fn package_body_for(csv_url: &str, format: &str, last_modified: Option<&str>) -> String {
    serde_json::json!({
        "help": "https://catalog.test/api/3/action/help_show?name=package_show",
        "success": true,
        "result": {
            "name": NAME,
            "resources": [
                {
                    "name": "Data Dictionary",
                    "format": "PDF",
                    "url": "https://catalog.test/files/dictionary.pdf",
                    "last_modified": null
                },
                {
                    "name": SUB_PACKAGE,
                    "format": format,
                    "url": csv_url,
                    "last_modified": last_modified
                }
            ]
        }
    })
    .to_string()
}

/// In-memory transport that serves scripted bodies and records every request.
///
/// A URL can have a queue of one-shot responses in front of its steady body;
/// queued entries are served first, in order.
#[derive(Default)]
pub struct FakeTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    queued: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, String>>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport serving the crash package with a CSV resource.
    pub fn crash_catalog(last_modified: Option<&str>) -> Arc<Self> {
        let transport = Self::new();
        transport.set(&package_url(NAME), &package_body("CSV", last_modified));
        transport.set(CSV_URL, CRASHES_2011);
        transport
    }

    pub fn set(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .insert(url.to_string(), body.as_bytes().to_vec());
    }

    pub fn remove(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    pub fn fail_next(&self, url: &str, message: &str) {
        self.queued
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        self.requests.lock().push(url.to_string());

        let queued = self
            .queued
            .lock()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = queued {
            return response.map_err(|message| DatasetError::Http {
                url: url.to_string(),
                message,
            });
        }

        self.bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| DatasetError::Http {
                url: url.to_string(),
                message: "http status: 404".to_string(),
            })
    }
}

pub fn client(transport: &Arc<FakeTransport>) -> CatalogClient {
    let transport: Arc<dyn Transport> = transport.clone();
    CatalogClient::with_transport(BASE_URL, transport).expect("catalog client")
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, s))
        .expect("valid time")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// A local HTTP server for the crash catalog, for tests that go through the
/// real transport (such as the CLI). Returns the catalog base URL.
///
/// The server thread lives until the test process exits.
pub fn serve_crash_catalog(last_modified: Option<&str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));

    let mut routes = HashMap::new();
    routes.insert(
        format!("/api/3/action/package_show?id={NAME}"),
        package_body_for(&format!("{base}/files/2011.csv"), "CSV", last_modified),
    );
    routes.insert("/files/2011.csv".to_string(), CRASHES_2011.to_string());

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            respond(stream, &routes);
        }
    });

    base
}

fn respond(mut stream: TcpStream, routes: &HashMap<String, String>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let target = head.split_whitespace().nth(1).unwrap_or_default();
    let (status, body) = match routes.get(target) {
        Some(body) => ("200 OK", body.as_str()),
        None => ("404 Not Found", "not found"),
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}
